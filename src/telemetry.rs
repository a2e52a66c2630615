//! 日志与追踪系统
//! 初始化结构化日志和指标描述

use crate::config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// 初始化日志与追踪系统
///
/// `RUST_LOG` takes precedence over `logging.level`. Calling this twice in
/// one process is an error reported by `try_init`, so the binary calls it
/// exactly once.
pub fn init_telemetry(config: &AppConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let log_layer = match config.logging.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        "pretty" => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    if let Err(e) = tracing_subscriber::registry().with(env_filter).with(log_layer).try_init() {
        eprintln!("Telemetry already initialized: {}", e);
        return;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.logging.level,
        format = %config.logging.format,
        roles_storage_mode = ?config.security.storage_mode(),
        "Telemetry initialized"
    );
}

/// 注册指标描述
pub fn init_metrics() {
    metrics::describe_counter!("security.roles.resolved", "Role definitions resolved for users");
    metrics::describe_counter!(
        "security.predicate_cache.miss",
        "In-memory constraint predicates compiled on cache miss"
    );
    metrics::describe_counter!("security.data_context.merged", "Instances newly managed by a data context");
    metrics::describe_counter!("security.data_context.commits", "Data context commits");
    tracing::debug!("Metrics initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_without_recorder() {
        // no recorder installed: describing and counting are no-ops
        init_metrics();
        metrics::counter!("security.data_context.commits").increment(1);
    }
}

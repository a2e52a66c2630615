//! 数据库连接池与迁移管理
//! 提供 PostgreSQL 连接池、安全表迁移和健康检查

use crate::config::DatabaseConfig;
use secrecy::ExposeSecret;
use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// 创建数据库连接池
///
/// Returns `Ok(None)` when no URL is configured; deployments that keep
/// roles in code only run without a database.
pub async fn create_pool(config: &DatabaseConfig) -> Result<Option<PgPool>, DbError> {
    let Some(url) = &config.url else {
        tracing::info!("No database URL configured, skipping connection pool");
        return Ok(None);
    };

    tracing::debug!("Creating database connection pool...");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .connect(url.expose_secret())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create database pool: {}", e);
            DbError::ConnectionFailed(e.to_string())
        })?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database pool created successfully"
    );

    Ok(Some(pool))
}

/// 运行数据库迁移
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        tracing::error!("Migration failed: {}", e);
        DbError::MigrationFailed(e.to_string())
    })?;

    tracing::info!("Migrations completed successfully");
    Ok(())
}

/// Tables the role and group stores read from.
pub const SECURITY_TABLES: [&str; 6] = [
    "sec_role",
    "sec_permission",
    "sec_group",
    "sec_group_hierarchy",
    "sec_constraint",
    "sec_session_attribute",
];

/// 数据库健康检查
///
/// Connectivity alone is not enough: the stores need every security table,
/// so a reachable database without the schema reports `SchemaMissing`.
pub async fn health_check(pool: &PgPool) -> HealthStatus {
    let present: Vec<String> = match sqlx::query_scalar(
        "SELECT table_name::text FROM information_schema.tables \
         WHERE table_schema = current_schema() AND table_name = ANY($1)",
    )
    .bind(&SECURITY_TABLES[..])
    .fetch_all(pool)
    .await
    {
        Ok(tables) => tables,
        Err(e) => {
            tracing::warn!("Database health check failed: {}", e);
            return HealthStatus::Unhealthy(e.to_string());
        }
    };

    let missing = missing_tables(&present);
    if !missing.is_empty() {
        tracing::warn!(missing = ?missing, "Security schema is incomplete, run `security-inspect migrate`");
        return HealthStatus::SchemaMissing(missing);
    }

    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sec_role")
        .fetch_one(pool)
        .await
    {
        Ok(roles) => {
            tracing::debug!(roles, "Database health check: OK");
            HealthStatus::Healthy { roles }
        }
        Err(e) => HealthStatus::Unhealthy(e.to_string()),
    }
}

fn missing_tables(present: &[String]) -> Vec<String> {
    SECURITY_TABLES
        .iter()
        .filter(|table| !present.iter().any(|p| p == *table))
        .map(|table| table.to_string())
        .collect()
}

/// 数据库错误类型
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// 健康状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum HealthStatus {
    /// schema present, with the number of persisted roles
    Healthy { roles: i64 },
    SchemaMissing(Vec<String>),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy { .. })
    }
}

//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::Secret;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL（可选，仅在角色存储模式包含数据库时需要）
    pub url: Option<Secret<String>>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// 角色来源: database, source_code, mixed
    pub roles_storage_mode: String,
    /// 约束谓词缓存容量
    pub predicate_cache_capacity: u64,
    /// 未定义权限时是否拒绝访问
    pub strict_default_deny: bool,
}

impl SecurityConfig {
    /// 解析角色存储模式，未设置或无法识别时回退为 MIXED
    pub fn storage_mode(&self) -> RolesStorageMode {
        RolesStorageMode::parse_or_mixed(Some(&self.roles_storage_mode))
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            roles_storage_mode: "mixed".to_string(),
            predicate_cache_capacity: 100,
            strict_default_deny: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
}

/// Where role definitions come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RolesStorageMode {
    Database,
    SourceCode,
    Mixed,
}

impl RolesStorageMode {
    pub const DATABASE_BIT: u8 = 1;
    pub const CODE_BIT: u8 = 2;

    pub fn bits(self) -> u8 {
        match self {
            RolesStorageMode::Database => Self::DATABASE_BIT,
            RolesStorageMode::SourceCode => Self::CODE_BIT,
            RolesStorageMode::Mixed => Self::DATABASE_BIT | Self::CODE_BIT,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "database" => Some(RolesStorageMode::Database),
            "source_code" | "sourcecode" | "code" => Some(RolesStorageMode::SourceCode),
            "mixed" => Some(RolesStorageMode::Mixed),
            _ => None,
        }
    }

    pub fn parse_or_mixed(value: Option<&str>) -> Self {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => RolesStorageMode::Mixed,
            Some(raw) => Self::parse(raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "Unknown roles storage mode, falling back to MIXED");
                RolesStorageMode::Mixed
            }),
        }
    }
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        settings = settings
            .set_default("database.max_connections", 5)?
            .set_default("database.min_connections", 1)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("security.roles_storage_mode", "mixed")?
            .set_default("security.predicate_cache_capacity", 100)?
            .set_default("security.strict_default_deny", true)?;

        // 从环境变量加载配置（前缀为 PSEC_）
        settings = settings.add_source(
            Environment::with_prefix("PSEC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    fn validate(&self) -> Result<(), ConfigError> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        if self.security.predicate_cache_capacity == 0 {
            return Err(ConfigError::Message(
                "predicate_cache_capacity must be greater than 0".to_string(),
            ));
        }

        if self.security.storage_mode().bits() & RolesStorageMode::DATABASE_BIT != 0
            && self.database.url.is_none()
        {
            tracing::debug!("Database roles enabled without a database URL, only code roles will resolve");
        }

        Ok(())
    }
}

//! 统一错误模型
//! 定义安全子系统与数据上下文的错误类型

use thiserror::Error;

use crate::models::datatype::DatatypeError;
use crate::models::entity::EntityKey;

/// 安全子系统错误类型
#[derive(Debug, Error)]
pub enum SecurityError {
    /// Framework invariant violated: wrong permission type for a ledger,
    /// unknown metaclass, unsupported persisted permission type id.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed declaration or inconsistent registry state.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Unable to load session attribute {attribute} for group {group}")]
    SessionAttribute {
        attribute: String,
        group: String,
        #[source]
        source: DatatypeError,
    },

    #[error("Access denied: {permission_type} {target}")]
    AccessDenied { permission_type: String, target: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SecurityError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            SecurityError::InvalidArgument(_) => "invalid_argument",
            SecurityError::IllegalState(_) => "illegal_state",
            SecurityError::SessionAttribute { .. } => "session_attribute",
            SecurityError::AccessDenied { .. } => "access_denied",
            SecurityError::Database(_) => "database",
            SecurityError::Config(_) => "config",
        }
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            SecurityError::Database(_) => "Database error occurred".to_string(),
            SecurityError::Config(_) => "Configuration error".to_string(),
            other => other.to_string(),
        }
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for SecurityError {
    fn from(e: config::ConfigError) -> Self {
        SecurityError::Config(e.to_string())
    }
}

pub type Result<T, E = SecurityError> = std::result::Result<T, E>;

/// 数据上下文错误类型
#[derive(Debug, Error)]
pub enum DataContextError {
    #[error("Entity {0} is not part of the merged graph")]
    UnknownEntity(EntityKey),

    #[error("Entity {0} is not managed by this data context")]
    NotManaged(EntityKey),

    #[error("Reference to {0} can not be resolved")]
    UnresolvedReference(EntityKey),

    #[error("Property {property} of {entity} is not a collection")]
    NotACollection { entity: EntityKey, property: String },

    #[error("Commit delegate is not set")]
    NoCommitDelegate,

    #[error("Commit failed: {0}")]
    Commit(String),

    #[error(transparent)]
    Security(#[from] SecurityError),
}

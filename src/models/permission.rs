//! Permission domain models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SecurityError};

/// Separator used in hierarchical permission targets, e.g. `sec$User:create`.
pub const TARGET_PATH_DELIMITER: char = ':';

/// Permission type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionType {
    Screen,
    EntityOp,
    EntityAttr,
    Specific,
    Ui,
}

impl PermissionType {
    pub const ALL: [PermissionType; 5] = [
        PermissionType::EntityOp,
        PermissionType::EntityAttr,
        PermissionType::Specific,
        PermissionType::Screen,
        PermissionType::Ui,
    ];

    pub fn id(self) -> i32 {
        match self {
            PermissionType::Screen => 10,
            PermissionType::EntityOp => 20,
            PermissionType::EntityAttr => 30,
            PermissionType::Specific => 40,
            PermissionType::Ui => 50,
        }
    }

    /// Decodes a persisted type id. Unknown ids are an invariant violation.
    pub fn from_id(id: i32) -> Result<Self> {
        match id {
            10 => Ok(PermissionType::Screen),
            20 => Ok(PermissionType::EntityOp),
            30 => Ok(PermissionType::EntityAttr),
            40 => Ok(PermissionType::Specific),
            50 => Ok(PermissionType::Ui),
            other => Err(SecurityError::InvalidArgument(format!(
                "Unsupported permission type: {}",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PermissionType::Screen => "SCREEN",
            PermissionType::EntityOp => "ENTITY_OP",
            PermissionType::EntityAttr => "ENTITY_ATTR",
            PermissionType::Specific => "SPECIFIC",
            PermissionType::Ui => "UI",
        }
    }
}

impl std::fmt::Display for PermissionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub permission_type: PermissionType,
    pub target: String,
    pub value: i32,
    pub role_id: Option<Uuid>,
}

impl Permission {
    pub fn new(permission_type: PermissionType, target: impl Into<String>, value: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            permission_type,
            target: target.into(),
            value,
            role_id: None,
        }
    }

    pub fn with_role(mut self, role_id: Uuid) -> Self {
        self.role_id = Some(role_id);
        self
    }
}

/// Builds `first:second` targets.
pub fn target_path(first: &str, second: &str) -> String {
    format!("{}{}{}", first, TARGET_PATH_DELIMITER, second)
}

/// Entity operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityOp {
    Create,
    Read,
    Update,
    Delete,
}

impl EntityOp {
    pub const ALL: [EntityOp; 4] = [EntityOp::Create, EntityOp::Read, EntityOp::Update, EntityOp::Delete];

    pub fn id(self) -> &'static str {
        match self {
            EntityOp::Create => "create",
            EntityOp::Read => "read",
            EntityOp::Update => "update",
            EntityOp::Delete => "delete",
        }
    }
}

impl std::fmt::Display for EntityOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Allow/deny access used for entity operations, screens, specific permissions
/// and screen elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessOperation {
    Deny,
    Allow,
}

impl AccessOperation {
    pub fn id(self) -> i32 {
        match self {
            AccessOperation::Deny => 0,
            AccessOperation::Allow => 1,
        }
    }
}

/// Entity attribute access level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityAttrAccess {
    Deny,
    View,
    Modify,
}

impl EntityAttrAccess {
    pub fn id(self) -> i32 {
        match self {
            EntityAttrAccess::Deny => 0,
            EntityAttrAccess::View => 1,
            EntityAttrAccess::Modify => 2,
        }
    }
}

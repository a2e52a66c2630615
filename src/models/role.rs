//! Role domain models

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::metadata::Metadata;
use crate::models::permission::{EntityOp, Permission, PermissionType, TARGET_PATH_DELIMITER};
use crate::models::permissions::Permissions;

/// Attributes every strictly denying role can still read.
const SYSTEM_ATTRIBUTES: [&str; 2] = ["deleteTs", "version"];

/// Role archetype, ordered by id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleType {
    #[default]
    Standard,
    Super,
    Readonly,
    Denying,
    StrictlyDenying,
}

impl RoleType {
    pub fn id(self) -> i32 {
        match self {
            RoleType::Standard => 0,
            RoleType::Super => 10,
            RoleType::Readonly => 20,
            RoleType::Denying => 30,
            RoleType::StrictlyDenying => 40,
        }
    }

    /// A missing id decodes as `Standard`; an unknown id as `None`.
    pub fn from_id(id: Option<i32>) -> Option<Self> {
        match id {
            None | Some(0) => Some(RoleType::Standard),
            Some(10) => Some(RoleType::Super),
            Some(20) => Some(RoleType::Readonly),
            Some(30) => Some(RoleType::Denying),
            Some(40) => Some(RoleType::StrictlyDenying),
            Some(_) => None,
        }
    }

    /// Access value implied by the archetype alone, regardless of what the
    /// role's ledgers hold. `None` means the ledgers decide.
    pub fn permission_value(
        self,
        permission_type: PermissionType,
        target: &str,
        metadata: &Metadata,
    ) -> Option<i32> {
        match self {
            RoleType::Standard => None,
            RoleType::Super => Some(i32::MAX),
            RoleType::Readonly => match permission_type {
                PermissionType::EntityOp => {
                    let modifying = [EntityOp::Create, EntityOp::Update, EntityOp::Delete]
                        .iter()
                        .any(|op| target.ends_with(op.id()));
                    if modifying {
                        Some(0)
                    } else {
                        None
                    }
                }
                PermissionType::EntityAttr
                | PermissionType::Screen
                | PermissionType::Specific
                | PermissionType::Ui => None,
            },
            RoleType::Denying => match permission_type {
                PermissionType::Screen | PermissionType::Specific | PermissionType::EntityOp => Some(0),
                PermissionType::EntityAttr | PermissionType::Ui => None,
            },
            RoleType::StrictlyDenying => match permission_type {
                PermissionType::Screen | PermissionType::Specific | PermissionType::EntityOp => Some(0),
                PermissionType::EntityAttr => Some(strict_attribute_permission(target, metadata)),
                PermissionType::Ui => None,
            },
        }
    }
}

fn strict_attribute_permission(target: &str, metadata: &Metadata) -> i32 {
    let paths: Vec<&str> = target
        .split(TARGET_PATH_DELIMITER)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if let [entity_name, attribute] = paths.as_slice() {
        if SYSTEM_ATTRIBUTES.contains(attribute) {
            return 1;
        }
        if metadata.primary_key_name(entity_name) == Some(*attribute) {
            return 1;
        }
    }
    0
}

/// Immutable role definition: five typed ledgers plus an archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleDef {
    pub name: String,
    pub description: String,
    pub role_type: RoleType,
    pub is_default: bool,
    pub entity_access: Permissions,
    pub attribute_access: Permissions,
    pub specific: Permissions,
    pub screen: Permissions,
    pub screen_elements: Permissions,
}

impl RoleDef {
    /// Ledger holding permissions of the given type.
    pub fn permissions(&self, permission_type: PermissionType) -> &Permissions {
        match permission_type {
            PermissionType::EntityOp => &self.entity_access,
            PermissionType::EntityAttr => &self.attribute_access,
            PermissionType::Specific => &self.specific,
            PermissionType::Screen => &self.screen,
            PermissionType::Ui => &self.screen_elements,
        }
    }
}

/// Role in its persisted shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub role_type: RoleType,
    pub default_role: bool,
    /// Set for roles materialised from code definitions; never stored.
    #[serde(default)]
    pub predefined: bool,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Role {
    pub fn new(name: impl Into<String>, role_type: RoleType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            role_type,
            default_role: false,
            predefined: false,
            permissions: Vec::new(),
        }
    }
}

/// Assignment of a role to a user. The role may be referenced by a resolved
/// definition, by name or by a persisted role.
#[derive(Debug, Clone)]
pub struct UserRole {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role_name: Option<String>,
    pub role: Option<Role>,
    pub role_def: Option<Arc<RoleDef>>,
}

impl UserRole {
    pub fn by_name(user_id: Uuid, role_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            role_name: Some(role_name.into()),
            role: None,
            role_def: None,
        }
    }

    pub fn by_role(user_id: Uuid, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            role_name: None,
            role: Some(role),
            role_def: None,
        }
    }

    pub fn by_def(user_id: Uuid, role_def: Arc<RoleDef>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            role_name: None,
            role: None,
            role_def: Some(role_def),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metadata::MetaClass;

    fn metadata() -> Metadata {
        Metadata::new().with_class(MetaClass::new("sec$User"))
    }

    #[test]
    fn test_default_role_type_is_standard() {
        assert_eq!(RoleType::default(), RoleType::Standard);
        assert_eq!(RoleType::default().id(), 0);
    }

    #[test]
    fn test_role_type_ordering_and_ids() {
        assert!(RoleType::Standard < RoleType::Super);
        assert!(RoleType::Denying < RoleType::StrictlyDenying);
        assert_eq!(RoleType::from_id(None), Some(RoleType::Standard));
        assert_eq!(RoleType::from_id(Some(30)), Some(RoleType::Denying));
        assert_eq!(RoleType::from_id(Some(7)), None);
    }

    #[test]
    fn test_standard_and_super() {
        let metadata = metadata();
        assert_eq!(
            RoleType::Standard.permission_value(PermissionType::Screen, "x", &metadata),
            None
        );
        assert_eq!(
            RoleType::Super.permission_value(PermissionType::Ui, "x:y", &metadata),
            Some(i32::MAX)
        );
    }

    #[test]
    fn test_readonly_denies_modifying_operations_only() {
        let metadata = metadata();
        let value = |target| RoleType::Readonly.permission_value(PermissionType::EntityOp, target, &metadata);

        assert_eq!(value("sec$User:create"), Some(0));
        assert_eq!(value("sec$User:update"), Some(0));
        assert_eq!(value("sec$User:delete"), Some(0));
        assert_eq!(value("sec$User:read"), None);
        assert_eq!(
            RoleType::Readonly.permission_value(PermissionType::Screen, "sec$User.browse", &metadata),
            None
        );
    }

    #[test]
    fn test_denying_leaves_attributes_to_ledger() {
        let metadata = metadata();
        assert_eq!(
            RoleType::Denying.permission_value(PermissionType::Specific, "cuba.restApi.enabled", &metadata),
            Some(0)
        );
        assert_eq!(
            RoleType::Denying.permission_value(PermissionType::EntityAttr, "sec$User:login", &metadata),
            None
        );
    }

    #[test]
    fn test_strictly_denying_keeps_identifier_and_system_attributes_readable() {
        let metadata = metadata();
        let value = |target| {
            RoleType::StrictlyDenying.permission_value(PermissionType::EntityAttr, target, &metadata)
        };

        assert_eq!(value("sec$User:id"), Some(1));
        assert_eq!(value("sec$User:version"), Some(1));
        assert_eq!(value(" sec$User : deleteTs "), Some(1));
        assert_eq!(value("sec$User:login"), Some(0));
        assert_eq!(value("sec$User"), Some(0));
        assert_eq!(value("sec$Unknown:id"), Some(0));
        assert_eq!(
            RoleType::StrictlyDenying.permission_value(PermissionType::EntityOp, "sec$User:read", &metadata),
            Some(0)
        );
        assert_eq!(
            RoleType::StrictlyDenying.permission_value(PermissionType::Ui, "screen:button", &metadata),
            None
        );
    }
}

//! Typed permission ledger

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SecurityError};
use crate::models::permission::{Permission, PermissionType};

/// A single-type map from target to access value.
///
/// Re-adding a target never lowers its value: the highest access wins.
/// Removal is explicit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    permission_type: PermissionType,
    permissions: HashMap<String, i32>,
}

impl Permissions {
    pub fn new(permission_type: PermissionType) -> Self {
        Self {
            permission_type,
            permissions: HashMap::new(),
        }
    }

    pub fn entity_access() -> Self {
        Self::new(PermissionType::EntityOp)
    }

    pub fn attribute_access() -> Self {
        Self::new(PermissionType::EntityAttr)
    }

    pub fn specific() -> Self {
        Self::new(PermissionType::Specific)
    }

    pub fn screen() -> Self {
        Self::new(PermissionType::Screen)
    }

    pub fn screen_elements() -> Self {
        Self::new(PermissionType::Ui)
    }

    pub fn permission_type(&self) -> PermissionType {
        self.permission_type
    }

    pub fn permissions(&self) -> &HashMap<String, i32> {
        &self.permissions
    }

    pub fn permission_value(&self, target: &str) -> Option<i32> {
        self.permissions.get(target).copied()
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Stores `value` unless the target already holds an equal or higher one.
    pub fn add_value(&mut self, target: &str, value: i32) {
        self.add_target(target, None, value);
    }

    /// Same as [`add_value`](Self::add_value); when the value is taken the
    /// extended target receives it as well.
    pub fn add_target(&mut self, target: &str, ext_target: Option<&str>, value: i32) {
        let current = self.permissions.get(target).copied();
        if current.map_or(true, |current| current < value) {
            self.permissions.insert(target.to_string(), value);
            if let Some(ext_target) = ext_target {
                self.permissions.insert(ext_target.to_string(), value);
            }
        }
    }

    pub fn add_permission(&mut self, permission: &Permission) -> Result<()> {
        self.check_permission(permission)?;
        self.add_value(&permission.target, permission.value);
        Ok(())
    }

    /// Type-checks the whole batch before touching the ledger.
    pub fn add_permissions(&mut self, permissions: &[Permission]) -> Result<()> {
        for permission in permissions {
            self.check_permission(permission)?;
        }
        for permission in permissions {
            self.add_value(&permission.target, permission.value);
        }
        Ok(())
    }

    pub fn add_values(&mut self, values: &HashMap<String, i32>) {
        for (target, value) in values {
            self.add_value(target, *value);
        }
    }

    pub fn remove_permission(&mut self, target: &str) {
        self.permissions.remove(target);
    }

    pub fn remove_permissions(&mut self) {
        self.permissions.clear();
    }

    fn check_permission(&self, permission: &Permission) -> Result<()> {
        if permission.permission_type != self.permission_type {
            return Err(SecurityError::InvalidArgument(format!(
                "Permission type must be {}",
                self.permission_type
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_value_twice_keeps_single_entry() {
        let mut ledger = Permissions::screen();
        ledger.add_value("sec$Role.browse", 1);
        ledger.add_value("sec$Role.browse", 1);

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.permission_value("sec$Role.browse"), Some(1));
    }

    #[test]
    fn test_lower_value_never_downgrades() {
        let mut ledger = Permissions::screen();
        ledger.add_value("sec$Role.browse", 1);
        ledger.add_value("sec$Role.browse", 0);

        assert_eq!(ledger.permission_value("sec$Role.browse"), Some(1));
    }

    #[test]
    fn test_higher_value_upgrades() {
        let mut ledger = Permissions::attribute_access();
        ledger.add_value("sec$User:login", 1);
        ledger.add_value("sec$User:login", 2);

        assert_eq!(ledger.permission_value("sec$User:login"), Some(2));
    }

    #[test]
    fn test_extended_target_follows_accepted_value() {
        let mut ledger = Permissions::entity_access();
        ledger.add_target("sec$User:read", Some("sec$ExtUser:read"), 1);
        assert_eq!(ledger.permission_value("sec$ExtUser:read"), Some(1));

        ledger.add_target("sec$User:read", Some("sec$Other:read"), 0);
        assert_eq!(ledger.permission_value("sec$Other:read"), None);
    }

    #[test]
    fn test_mismatched_type_is_rejected() {
        let mut ledger = Permissions::screen();
        let permission = Permission::new(PermissionType::Specific, "cuba.gui.loginToClient", 1);

        let err = ledger.add_permission(&permission).unwrap_err();
        assert!(matches!(err, SecurityError::InvalidArgument(_)));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_batch_is_validated_before_mutation() {
        let mut ledger = Permissions::screen();
        let batch = vec![
            Permission::new(PermissionType::Screen, "sec$User.browse", 1),
            Permission::new(PermissionType::Ui, "sec$User.browse:okBtn", 1),
        ];

        assert!(ledger.add_permissions(&batch).is_err());
        assert!(ledger.is_empty());

        ledger.add_permissions(&batch[..1]).unwrap();
        assert_eq!(ledger.permission_value("sec$User.browse"), Some(1));
    }

    #[test]
    fn test_removal_is_absolute() {
        let mut ledger = Permissions::specific();
        ledger.add_value("a", 1);
        ledger.add_value("b", 1);

        ledger.remove_permission("a");
        assert_eq!(ledger.permission_value("a"), None);

        ledger.add_value("a", 0);
        assert_eq!(ledger.permission_value("a"), Some(0));

        ledger.remove_permissions();
        assert!(ledger.is_empty());
    }
}

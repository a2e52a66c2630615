//! 权限检查服务
//! 角色类型的隐式权限优先于角色中显式登记的权限值，多个角色之间取最大值

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::SecurityConfig;
use crate::error::{Result, SecurityError};
use crate::models::metadata::Metadata;
use crate::models::permission::{target_path, AccessOperation, EntityAttrAccess, EntityOp, PermissionType};
use crate::models::role::RoleDef;

pub struct PermissionService {
    metadata: Arc<Metadata>,
    strict_default_deny: bool,
}

impl PermissionService {
    pub fn new(metadata: Arc<Metadata>, config: &SecurityConfig) -> Self {
        Self {
            metadata,
            strict_default_deny: config.strict_default_deny,
        }
    }

    /// 单个角色的权限值：角色类型给出的隐式值优先，其次是角色登记的值
    pub fn role_value(&self, role: &RoleDef, permission_type: PermissionType, target: &str) -> Option<i32> {
        role.role_type
            .permission_value(permission_type, target, &self.metadata)
            .or_else(|| role.permissions(permission_type).permission_value(target))
    }

    /// 多个角色的有效权限值，取最大值；均未定义时返回 None
    pub fn effective_value(&self, roles: &[Arc<RoleDef>], permission_type: PermissionType, target: &str) -> Option<i32> {
        roles
            .iter()
            .filter_map(|role| self.role_value(role, permission_type, target))
            .max()
    }

    /// 检查有效权限值是否达到要求
    pub fn is_permitted(
        &self,
        roles: &[Arc<RoleDef>],
        permission_type: PermissionType,
        target: &str,
        required: i32,
    ) -> bool {
        match self.effective_value(roles, permission_type, target) {
            Some(value) => value >= required,
            None => !self.strict_default_deny,
        }
    }

    pub fn is_entity_op_permitted(&self, roles: &[Arc<RoleDef>], entity_name: &str, operation: EntityOp) -> bool {
        let target = target_path(entity_name, operation.id());
        self.is_permitted(roles, PermissionType::EntityOp, &target, AccessOperation::Allow.id())
    }

    pub fn is_entity_attr_permitted(
        &self,
        roles: &[Arc<RoleDef>],
        entity_name: &str,
        attribute: &str,
        access: EntityAttrAccess,
    ) -> bool {
        let target = target_path(entity_name, attribute);
        self.is_permitted(roles, PermissionType::EntityAttr, &target, access.id())
    }

    pub fn is_screen_permitted(&self, roles: &[Arc<RoleDef>], window_alias: &str) -> bool {
        self.is_permitted(roles, PermissionType::Screen, window_alias, AccessOperation::Allow.id())
    }

    pub fn is_specific_permitted(&self, roles: &[Arc<RoleDef>], target: &str) -> bool {
        self.is_permitted(roles, PermissionType::Specific, target, AccessOperation::Allow.id())
    }

    pub fn is_screen_element_permitted(&self, roles: &[Arc<RoleDef>], window_alias: &str, component: &str) -> bool {
        let target = target_path(window_alias, component);
        self.is_permitted(roles, PermissionType::Ui, &target, AccessOperation::Allow.id())
    }

    /// 检查权限，如果无权限则返回错误
    pub fn require_permission(
        &self,
        roles: &[Arc<RoleDef>],
        permission_type: PermissionType,
        target: &str,
        required: i32,
    ) -> Result<()> {
        if !self.is_permitted(roles, permission_type, target, required) {
            tracing::warn!(
                permission_type = %permission_type,
                target = %target,
                required,
                "Permission denied"
            );
            return Err(SecurityError::AccessDenied {
                permission_type: permission_type.to_string(),
                target: target.to_string(),
            });
        }

        Ok(())
    }

    /// 获取所有角色在某一类型下登记的权限摘要（已应用角色类型的隐式值）
    pub fn effective_permissions(&self, roles: &[Arc<RoleDef>], permission_type: PermissionType) -> BTreeMap<String, i32> {
        let mut summary = BTreeMap::new();

        for role in roles {
            for target in role.permissions(permission_type).permissions().keys() {
                if summary.contains_key(target) {
                    continue;
                }
                if let Some(value) = self.effective_value(roles, permission_type, target) {
                    summary.insert(target.clone(), value);
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metadata::MetaClass;
    use crate::models::role::RoleType;
    use crate::services::role_builder::RoleBuilder;

    fn service(strict: bool) -> PermissionService {
        let config = SecurityConfig {
            strict_default_deny: strict,
            ..SecurityConfig::default()
        };
        PermissionService::new(Arc::new(Metadata::new().with_class(MetaClass::new("sec$User"))), &config)
    }

    fn role(role_type: RoleType) -> Arc<RoleDef> {
        let user = MetaClass::new("sec$User");
        Arc::new(
            RoleBuilder::create_role_with_type(role_type)
                .with_name(format!("{:?}", role_type))
                .with_entity_access_permission(&user, EntityOp::Update, AccessOperation::Allow)
                .with_screen_permission("sec$User.browse", AccessOperation::Allow)
                .build(),
        )
    }

    #[test]
    fn test_implicit_override_wins_over_ledger() {
        let service = service(true);
        let readonly = [role(RoleType::Readonly)];

        assert!(!service.is_entity_op_permitted(&readonly, "sec$User", EntityOp::Update));
        assert!(service.is_screen_permitted(&readonly, "sec$User.browse"));
    }

    #[test]
    fn test_values_combine_by_max_across_roles() {
        let service = service(true);
        let roles = [role(RoleType::Readonly), role(RoleType::Standard)];

        assert_eq!(
            service.effective_value(&roles, PermissionType::EntityOp, "sec$User:update"),
            Some(1)
        );
        assert!(service.is_entity_op_permitted(&roles, "sec$User", EntityOp::Update));
    }

    #[test]
    fn test_super_role_allows_everything() {
        let service = service(true);
        let roles = [role(RoleType::Super)];
        assert!(service.is_specific_permitted(&roles, "anything"));
        assert!(service.is_entity_attr_permitted(&roles, "sec$User", "password", EntityAttrAccess::Modify));
    }

    #[test]
    fn test_undefined_permission_follows_default_policy() {
        let roles = [role(RoleType::Standard)];
        assert!(!service(true).is_screen_element_permitted(&roles, "sec$User.edit", "okBtn"));
        assert!(service(false).is_screen_element_permitted(&roles, "sec$User.edit", "okBtn"));
    }

    #[test]
    fn test_require_permission() {
        let service = service(true);
        let roles = [role(RoleType::Denying)];

        let err = service
            .require_permission(&roles, PermissionType::Screen, "sec$User.browse", 1)
            .unwrap_err();
        assert_eq!(err.code(), "access_denied");
        assert!(service
            .require_permission(&[role(RoleType::Standard)], PermissionType::Screen, "sec$User.browse", 1)
            .is_ok());
    }

    #[test]
    fn test_effective_permissions_summary() {
        let service = service(true);
        let roles = [role(RoleType::Readonly)];

        let summary = service.effective_permissions(&roles, PermissionType::EntityOp);
        assert_eq!(summary.get("sec$User:update"), Some(&0));
    }
}

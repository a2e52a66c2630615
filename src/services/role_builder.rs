//! 角色构建器
//! 汇总显式授权、合并角色与持久化角色的权限，同一目标取最大值

use crate::models::metadata::MetaClass;
use crate::models::permission::{
    target_path, AccessOperation, EntityAttrAccess, EntityOp, Permission, PermissionType,
};
use crate::models::permissions::Permissions;
use crate::models::role::{Role, RoleDef, RoleType};

#[derive(Debug, Clone)]
pub struct RoleBuilder {
    name: String,
    description: String,
    role_type: RoleType,
    is_default: bool,
    entity_access: Permissions,
    attribute_access: Permissions,
    specific: Permissions,
    screen: Permissions,
    screen_elements: Permissions,
}

impl RoleBuilder {
    /// Empty STANDARD role without name or description.
    pub fn create_role() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            role_type: RoleType::Standard,
            is_default: false,
            entity_access: Permissions::entity_access(),
            attribute_access: Permissions::attribute_access(),
            specific: Permissions::specific(),
            screen: Permissions::screen(),
            screen_elements: Permissions::screen_elements(),
        }
    }

    pub fn create_role_with_type(role_type: RoleType) -> Self {
        Self::create_role().with_role_type(role_type)
    }

    /// Seeds name, description, type and all five ledgers from a definition.
    pub fn from_role_def(role_def: &RoleDef) -> Self {
        Self::create_role()
            .with_role_type(role_def.role_type)
            .with_name(&role_def.name)
            .with_description(&role_def.description)
            .with_default(role_def.is_default)
            .join(role_def)
    }

    /// Seeds the builder from a persisted role, re-dispatching each stored
    /// permission by type.
    pub fn from_role(role: &Role) -> Self {
        Self::create_role()
            .with_role_type(role.role_type)
            .with_name(&role.name)
            .with_description(role.description.as_deref().unwrap_or_default())
            .with_default(role.default_role)
            .join_role(role)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_role_type(mut self, role_type: RoleType) -> Self {
        self.role_type = role_type;
        self
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    pub fn with_permission(mut self, permission: &Permission) -> Self {
        self.join_permission(permission.permission_type, &permission.target, permission.value);
        self
    }

    pub fn with_typed_permission(mut self, permission_type: PermissionType, target: &str, value: i32) -> Self {
        self.join_permission(permission_type, target, value);
        self
    }

    pub fn with_entity_access_permission(
        self,
        meta_class: &MetaClass,
        operation: EntityOp,
        access: AccessOperation,
    ) -> Self {
        let target = target_path(&meta_class.name, operation.id());
        self.with_typed_permission(PermissionType::EntityOp, &target, access.id())
    }

    pub fn with_entity_attr_access_permission(
        self,
        meta_class: &MetaClass,
        property: &str,
        access: EntityAttrAccess,
    ) -> Self {
        let target = target_path(&meta_class.name, property);
        self.with_typed_permission(PermissionType::EntityAttr, &target, access.id())
    }

    pub fn with_specific_permission(self, target: &str, access: AccessOperation) -> Self {
        self.with_typed_permission(PermissionType::Specific, target, access.id())
    }

    pub fn with_screen_permission(self, window_alias: &str, access: AccessOperation) -> Self {
        self.with_typed_permission(PermissionType::Screen, window_alias, access.id())
    }

    pub fn with_screen_element_permission(
        self,
        window_alias: &str,
        component: &str,
        access: AccessOperation,
    ) -> Self {
        let target = target_path(window_alias, component);
        self.with_typed_permission(PermissionType::Ui, &target, access.id())
    }

    /// Folds another definition's ledgers into this builder.
    pub fn join(mut self, role_def: &RoleDef) -> Self {
        self.entity_access.add_values(role_def.entity_access.permissions());
        self.attribute_access.add_values(role_def.attribute_access.permissions());
        self.specific.add_values(role_def.specific.permissions());
        self.screen.add_values(role_def.screen.permissions());
        self.screen_elements.add_values(role_def.screen_elements.permissions());
        self
    }

    pub fn join_role(mut self, role: &Role) -> Self {
        for permission in &role.permissions {
            self.join_permission(permission.permission_type, &permission.target, permission.value);
        }
        self
    }

    pub fn build(self) -> RoleDef {
        RoleDef {
            name: self.name,
            description: self.description,
            role_type: self.role_type,
            is_default: self.is_default,
            entity_access: self.entity_access,
            attribute_access: self.attribute_access,
            specific: self.specific,
            screen: self.screen,
            screen_elements: self.screen_elements,
        }
    }

    fn join_permission(&mut self, permission_type: PermissionType, target: &str, value: i32) {
        let ledger = match permission_type {
            PermissionType::EntityOp => &mut self.entity_access,
            PermissionType::EntityAttr => &mut self.attribute_access,
            PermissionType::Specific => &mut self.specific,
            PermissionType::Screen => &mut self.screen,
            PermissionType::Ui => &mut self.screen_elements,
        };
        ledger.add_value(target, value);
    }
}

impl Default for RoleBuilder {
    fn default() -> Self {
        Self::create_role()
    }
}

//! 角色查询服务
//! 面向界面的角色列表、角色详情与权限查询

use std::sync::Arc;

use crate::error::Result;
use crate::models::permission::{Permission, PermissionType};
use crate::models::role::Role;
use crate::repository::role_store::RoleStore;
use crate::repository::roles_repository::RolesRepository;

pub struct RolesService<S> {
    roles_repository: Arc<RolesRepository<S>>,
}

impl<S: RoleStore> RolesService<S> {
    pub fn new(roles_repository: Arc<RolesRepository<S>>) -> Self {
        Self { roles_repository }
    }

    /// 列出所有角色
    pub async fn all_roles(&self) -> Result<Vec<Role>> {
        self.roles_repository.roles_for_ui().await
    }

    /// 根据名称查找角色
    pub async fn role_by_name(&self, name: &str) -> Result<Option<Role>> {
        self.roles_repository.role_by_name_for_ui(name).await
    }

    pub fn permissions(&self, predefined_role_name: &str, permission_type: PermissionType) -> Vec<Permission> {
        self.roles_repository.permissions(predefined_role_name, permission_type)
    }

    pub fn is_database_mode_available(&self) -> bool {
        self.roles_repository.is_database_mode_available()
    }

    pub fn is_predefined_roles_mode_available(&self) -> bool {
        self.roles_repository.is_predefined_roles_mode_available()
    }
}

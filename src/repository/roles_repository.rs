//! 角色仓库
//! 按存储模式合并代码定义角色与数据库角色

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::{RolesStorageMode, SecurityConfig};
use crate::error::Result;
use crate::models::permission::{Permission, PermissionType};
use crate::models::permissions::Permissions;
use crate::models::role::{Role, RoleDef, UserRole};
use crate::repository::role_store::RoleStore;
use crate::services::role_builder::RoleBuilder;

/// Immutable name index of code-defined roles.
#[derive(Debug, Clone, Default)]
pub struct RoleIndex {
    roles: HashMap<String, Arc<RoleDef>>,
}

impl RoleIndex {
    pub fn builder() -> RoleIndexBuilder {
        RoleIndexBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RoleDef>> {
        self.roles.get(name)
    }

    /// Definitions sorted by name.
    pub fn roles(&self) -> Vec<&Arc<RoleDef>> {
        let mut roles: Vec<&Arc<RoleDef>> = self.roles.values().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        roles
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RoleIndexBuilder {
    roles: HashMap<String, Arc<RoleDef>>,
}

impl RoleIndexBuilder {
    /// Registers a definition; a later definition with the same name replaces
    /// the earlier one.
    pub fn register(self, role_def: RoleDef) -> Self {
        self.register_shared(Arc::new(role_def))
    }

    pub fn register_shared(mut self, role_def: Arc<RoleDef>) -> Self {
        if self.roles.contains_key(&role_def.name) {
            tracing::warn!(role = %role_def.name, "Duplicate role definition, replacing");
        }
        self.roles.insert(role_def.name.clone(), role_def);
        self
    }

    pub fn build(self) -> RoleIndex {
        tracing::debug!(count = self.roles.len(), "Built role index");
        RoleIndex { roles: self.roles }
    }
}

pub struct RolesRepository<S> {
    index: Arc<RoleIndex>,
    store: S,
    mode: u8,
}

impl<S: RoleStore> RolesRepository<S> {
    /// The storage mode is read once here.
    pub fn new(index: Arc<RoleIndex>, store: S, config: &SecurityConfig) -> Self {
        Self {
            index,
            store,
            mode: config.storage_mode().bits(),
        }
    }

    pub fn index(&self) -> &RoleIndex {
        &self.index
    }

    pub fn is_database_mode_available(&self) -> bool {
        self.mode & RolesStorageMode::DATABASE_BIT == RolesStorageMode::DATABASE_BIT
    }

    pub fn is_predefined_roles_mode_available(&self) -> bool {
        self.mode & RolesStorageMode::CODE_BIT == RolesStorageMode::CODE_BIT
    }

    pub fn role_def_by_name(&self, name: &str) -> Option<Arc<RoleDef>> {
        self.index.get(name).cloned()
    }

    /// Resolves each user role by its definition, its role name or its
    /// persisted role, caching the result on the user role. Result is
    /// ordered by role name.
    pub fn role_defs(&self, user_roles: &mut [UserRole]) -> Vec<Arc<RoleDef>> {
        let mut result: BTreeMap<String, Arc<RoleDef>> = BTreeMap::new();

        for user_role in user_roles.iter() {
            if let Some(role_def) = &user_role.role_def {
                result.insert(role_def.name.clone(), role_def.clone());
            }
        }

        // both groups are taken before either pass resolves anything
        let unresolved = |ur: &UserRole| ur.role_def.is_none();
        let by_name: Vec<usize> = (0..user_roles.len())
            .filter(|&i| unresolved(&user_roles[i]) && user_roles[i].role_name.is_some())
            .collect();
        let by_role: Vec<usize> = (0..user_roles.len())
            .filter(|&i| unresolved(&user_roles[i]) && user_roles[i].role.is_some())
            .collect();

        if self.is_predefined_roles_mode_available() {
            for i in by_name {
                let user_role = &mut user_roles[i];
                let Some(role_name) = &user_role.role_name else {
                    continue;
                };
                if let Some(role_def) = self.role_def_by_name(role_name) {
                    user_role.role_def = Some(role_def.clone());
                    result.insert(role_def.name.clone(), role_def);
                }
            }
        }

        if self.is_database_mode_available() {
            for i in by_role {
                let user_role = &mut user_roles[i];
                let Some(role) = &user_role.role else {
                    continue;
                };
                let role_def = Arc::new(RoleBuilder::from_role(role).build());
                user_role.role_def = Some(role_def.clone());
                result.insert(role_def.name.clone(), role_def);
            }
        }

        metrics::counter!("security.roles.resolved").increment(result.len() as u64);
        tracing::debug!(requested = user_roles.len(), resolved = result.len(), "Resolved user roles");

        result.into_values().collect()
    }

    /// Default roles by name. Code roles map to `None`, database roles to the
    /// stored role.
    pub async fn default_roles(&self) -> Result<HashMap<String, Option<Role>>> {
        let mut defaults = HashMap::new();

        if self.is_predefined_roles_mode_available() {
            for role_def in self.index.roles() {
                if role_def.is_default {
                    defaults.insert(role_def.name.clone(), None);
                }
            }
        }

        if self.is_database_mode_available() {
            for role in self.store.load_default_roles().await? {
                defaults.insert(role.name.clone(), Some(role));
            }
        }

        Ok(defaults)
    }

    pub fn role_with_permissions(&self, role_def: &RoleDef) -> Role {
        let mut role = self.role_without_permissions(role_def);

        let mut permissions = Vec::new();
        for permission_type in PermissionType::ALL {
            permissions.extend(transform_permissions(
                permission_type,
                role_def.permissions(permission_type),
                &role,
            ));
        }
        role.permissions = permissions;

        role
    }

    pub fn role_without_permissions(&self, role_def: &RoleDef) -> Role {
        let mut role = Role::new(&role_def.name, role_def.role_type);
        role.predefined = true;
        role.description = Some(role_def.description.clone());
        role.default_role = role_def.is_default;
        role
    }

    /// Flattened ledger of a code role; empty for unknown roles.
    pub fn permissions(&self, role_name: &str, permission_type: PermissionType) -> Vec<Permission> {
        match self.role_def_by_name(role_name) {
            Some(role_def) => {
                let role = self.role_without_permissions(&role_def);
                transform_permissions(permission_type, role_def.permissions(permission_type), &role)
            }
            None => Vec::new(),
        }
    }

    /// Code roles (without permissions) followed by database roles, each
    /// sorted by name.
    pub async fn roles_for_ui(&self) -> Result<Vec<Role>> {
        let mut roles = Vec::new();

        if self.is_predefined_roles_mode_available() {
            roles.extend(self.index.roles().into_iter().map(|d| self.role_without_permissions(d)));
        }

        if self.is_database_mode_available() {
            roles.extend(self.store.load_roles_ordered_by_name().await?);
        }

        Ok(roles)
    }

    pub async fn role_by_name_for_ui(&self, name: &str) -> Result<Option<Role>> {
        if self.is_predefined_roles_mode_available() {
            if let Some(role_def) = self.role_def_by_name(name) {
                return Ok(Some(self.role_with_permissions(&role_def)));
            }
        }

        if self.is_database_mode_available() {
            return self.store.find_role_by_name(name).await;
        }

        Ok(None)
    }
}

fn transform_permissions(permission_type: PermissionType, ledger: &Permissions, role: &Role) -> Vec<Permission> {
    let mut permissions: Vec<Permission> = ledger
        .permissions()
        .iter()
        .map(|(target, value)| Permission::new(permission_type, target.clone(), *value).with_role(role.id))
        .collect();
    permissions.sort_by(|a, b| a.target.cmp(&b.target));
    permissions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::permission::AccessOperation;
    use crate::models::role::RoleType;
    use crate::repository::role_store::InMemoryRoleStore;
    use uuid::Uuid;

    fn config(mode: &str) -> SecurityConfig {
        SecurityConfig {
            roles_storage_mode: mode.to_string(),
            ..SecurityConfig::default()
        }
    }

    fn index() -> Arc<RoleIndex> {
        Arc::new(
            RoleIndex::builder()
                .register(
                    RoleBuilder::create_role()
                        .with_name("code-reader")
                        .with_default(true)
                        .with_screen_permission("sec$User.browse", AccessOperation::Allow)
                        .build(),
                )
                .build(),
        )
    }

    fn db_role() -> Role {
        let mut role = Role::new("db-admin", RoleType::Super);
        role.default_role = true;
        role.permissions = vec![Permission::new(PermissionType::Specific, "cuba.restApi.enabled", 1)];
        role
    }

    #[test]
    fn test_mode_bits() {
        let store = InMemoryRoleStore::default;
        let database = RolesRepository::new(index(), store(), &config("database"));
        assert!(database.is_database_mode_available());
        assert!(!database.is_predefined_roles_mode_available());

        let code = RolesRepository::new(index(), store(), &config("source_code"));
        assert!(!code.is_database_mode_available());
        assert!(code.is_predefined_roles_mode_available());

        let fallback = RolesRepository::new(index(), store(), &config("nonsense"));
        assert!(fallback.is_database_mode_available());
        assert!(fallback.is_predefined_roles_mode_available());
    }

    #[test]
    fn test_role_defs_memoises_resolution() {
        let repository = RolesRepository::new(index(), InMemoryRoleStore::default(), &config("mixed"));
        let user_id = Uuid::new_v4();
        let mut user_roles = vec![
            UserRole::by_name(user_id, "code-reader"),
            UserRole::by_role(user_id, db_role()),
            UserRole::by_name(user_id, "missing"),
        ];

        let defs = repository.role_defs(&mut user_roles);
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["code-reader", "db-admin"]);

        assert!(user_roles[0].role_def.is_some());
        assert_eq!(user_roles[1].role_def.as_ref().unwrap().role_type, RoleType::Super);
        assert!(user_roles[2].role_def.is_none());
    }

    #[test]
    fn test_role_defs_resolves_name_and_persisted_role() {
        let repository = RolesRepository::new(index(), InMemoryRoleStore::default(), &config("mixed"));
        let mut user_role = UserRole::by_name(Uuid::new_v4(), "code-reader");
        user_role.role = Some(db_role());
        let mut user_roles = vec![user_role];

        let defs = repository.role_defs(&mut user_roles);
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["code-reader", "db-admin"]);
        assert_eq!(user_roles[0].role_def.as_ref().unwrap().name, "db-admin");
    }

    #[test]
    fn test_role_defs_respects_mode() {
        let repository = RolesRepository::new(index(), InMemoryRoleStore::default(), &config("source_code"));
        let user_id = Uuid::new_v4();
        let mut user_roles = vec![UserRole::by_role(user_id, db_role())];

        assert!(repository.role_defs(&mut user_roles).is_empty());
        assert!(user_roles[0].role_def.is_none());
    }

    #[tokio::test]
    async fn test_default_roles_union() {
        let store = InMemoryRoleStore::new(vec![db_role(), Role::new("plain", RoleType::Standard)]);
        let repository = RolesRepository::new(index(), store, &config("mixed"));

        let defaults = repository.default_roles().await.unwrap();
        assert_eq!(defaults.len(), 2);
        assert!(defaults["code-reader"].is_none());
        assert_eq!(defaults["db-admin"].as_ref().unwrap().role_type, RoleType::Super);
    }

    #[test]
    fn test_role_with_permissions_flattens_ledgers() {
        let repository = RolesRepository::new(index(), InMemoryRoleStore::default(), &config("mixed"));
        let role_def = repository.role_def_by_name("code-reader").unwrap();

        let role = repository.role_with_permissions(&role_def);
        assert!(role.predefined);
        assert!(role.default_role);
        assert_eq!(role.permissions.len(), 1);
        assert_eq!(role.permissions[0].permission_type, PermissionType::Screen);
        assert_eq!(role.permissions[0].role_id, Some(role.id));

        assert!(repository.role_without_permissions(&role_def).permissions.is_empty());
    }

    #[test]
    fn test_permissions_for_unknown_role_is_empty() {
        let repository = RolesRepository::new(index(), InMemoryRoleStore::default(), &config("mixed"));
        assert!(repository.permissions("missing", PermissionType::Screen).is_empty());
        assert_eq!(repository.permissions("code-reader", PermissionType::Screen).len(), 1);
    }
}

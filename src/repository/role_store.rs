//! Persisted role access (角色数据访问)

use std::collections::HashMap;
use std::future::Future;

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{Result, SecurityError};
use crate::models::permission::{Permission, PermissionType};
use crate::models::role::{Role, RoleType};

/// Source of roles stored in the database.
pub trait RoleStore: Send + Sync {
    /// 默认角色
    fn load_default_roles(&self) -> impl Future<Output = Result<Vec<Role>>> + Send;

    /// 按名称排序的全部角色
    fn load_roles_ordered_by_name(&self) -> impl Future<Output = Result<Vec<Role>>> + Send;

    fn find_role_by_name(&self, name: &str) -> impl Future<Output = Result<Option<Role>>> + Send;
}

/// Role store backed by a fixed list.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRoleStore {
    roles: Vec<Role>,
}

impl InMemoryRoleStore {
    pub fn new(roles: Vec<Role>) -> Self {
        Self { roles }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }
}

impl RoleStore for InMemoryRoleStore {
    async fn load_default_roles(&self) -> Result<Vec<Role>> {
        Ok(self.roles.iter().filter(|r| r.default_role).cloned().collect())
    }

    async fn load_roles_ordered_by_name(&self) -> Result<Vec<Role>> {
        let mut roles = self.roles.clone();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        Ok(self.roles.iter().find(|r| r.name == name).cloned())
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    role_type: Option<i32>,
    default_role: bool,
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    id: Uuid,
    role_id: Uuid,
    permission_type: i32,
    target: String,
    value: i32,
}

impl TryFrom<PermissionRow> for Permission {
    type Error = SecurityError;

    fn try_from(row: PermissionRow) -> Result<Self> {
        Ok(Permission {
            id: row.id,
            permission_type: PermissionType::from_id(row.permission_type)?,
            target: row.target,
            value: row.value,
            role_id: Some(row.role_id),
        })
    }
}

/// Postgres-backed role store over `sec_role` and `sec_permission`.
#[derive(Debug, Clone)]
pub struct PgRoleStore {
    db: PgPool,
}

impl PgRoleStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Attaches permissions to the loaded role rows, keeping row order.
    async fn with_permissions(&self, rows: Vec<RoleRow>) -> Result<Vec<Role>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let permission_rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT id, role_id, permission_type, target, value
            FROM sec_permission
            WHERE role_id = ANY($1)
            ORDER BY target
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut permissions: HashMap<Uuid, Vec<Permission>> = HashMap::new();
        for row in permission_rows {
            let role_id = row.role_id;
            permissions.entry(role_id).or_default().push(Permission::try_from(row)?);
        }

        rows.into_iter()
            .map(|row| {
                let role_type = RoleType::from_id(row.role_type).ok_or_else(|| {
                    SecurityError::InvalidArgument(format!(
                        "Unsupported role type {:?} for role {}",
                        row.role_type, row.name
                    ))
                })?;
                Ok(Role {
                    id: row.id,
                    permissions: permissions.remove(&row.id).unwrap_or_default(),
                    name: row.name,
                    description: row.description,
                    role_type,
                    default_role: row.default_role,
                    predefined: false,
                })
            })
            .collect()
    }
}

impl RoleStore for PgRoleStore {
    async fn load_default_roles(&self) -> Result<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, description, role_type, default_role FROM sec_role WHERE default_role = true",
        )
        .fetch_all(&self.db)
        .await?;

        self.with_permissions(rows).await
    }

    async fn load_roles_ordered_by_name(&self) -> Result<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, description, role_type, default_role FROM sec_role ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        self.with_permissions(rows).await
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, description, role_type, default_role FROM sec_role WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Ok(self.with_permissions(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store_queries() {
        let mut admin = Role::new("admin", RoleType::Super);
        admin.default_role = true;
        let store = InMemoryRoleStore::new(vec![Role::new("zeta", RoleType::Standard)]).with_role(admin);

        let defaults = store.load_default_roles().await.unwrap();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].name, "admin");

        let names: Vec<String> = store
            .load_roles_ordered_by_name()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["admin", "zeta"]);

        assert!(store.find_role_by_name("missing").await.unwrap().is_none());
    }

    #[test]
    fn test_unsupported_persisted_permission_type() {
        let row = PermissionRow {
            id: Uuid::new_v4(),
            role_id: Uuid::new_v4(),
            permission_type: 99,
            target: "x".to_string(),
            value: 1,
        };
        assert!(matches!(
            Permission::try_from(row),
            Err(SecurityError::InvalidArgument(_))
        ));
    }
}

//! Persisted access group access (访问组数据访问)

use std::collections::HashMap;
use std::future::Future;

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::group::{ConstraintRecord, SessionAttributeRecord};

/// Source of constraints and session attributes stored for database groups.
pub trait GroupStore: Send + Sync {
    /// Constraints declared on the group's hierarchy.
    fn load_constraints(&self, group_id: Uuid) -> impl Future<Output = Result<Vec<ConstraintRecord>>> + Send;

    /// Session attributes of the group's hierarchy, ordered by hierarchy level
    /// descending.
    fn load_session_attributes(
        &self,
        group_id: Uuid,
    ) -> impl Future<Output = Result<Vec<SessionAttributeRecord>>> + Send;
}

/// Group store returning prepared rows per group id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGroupStore {
    constraints: HashMap<Uuid, Vec<ConstraintRecord>>,
    session_attributes: HashMap<Uuid, Vec<SessionAttributeRecord>>,
}

impl InMemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constraint(mut self, group_id: Uuid, constraint: ConstraintRecord) -> Self {
        self.constraints.entry(group_id).or_default().push(constraint);
        self
    }

    /// Attributes are returned in insertion order.
    pub fn with_session_attribute(mut self, group_id: Uuid, attribute: SessionAttributeRecord) -> Self {
        self.session_attributes.entry(group_id).or_default().push(attribute);
        self
    }
}

impl GroupStore for InMemoryGroupStore {
    async fn load_constraints(&self, group_id: Uuid) -> Result<Vec<ConstraintRecord>> {
        Ok(self.constraints.get(&group_id).cloned().unwrap_or_default())
    }

    async fn load_session_attributes(&self, group_id: Uuid) -> Result<Vec<SessionAttributeRecord>> {
        Ok(self.session_attributes.get(&group_id).cloned().unwrap_or_default())
    }
}

/// Postgres-backed group store over `sec_group_hierarchy`, `sec_constraint`
/// and `sec_session_attribute`.
#[derive(Debug, Clone)]
pub struct PgGroupStore {
    db: PgPool,
}

impl PgGroupStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

impl GroupStore for PgGroupStore {
    async fn load_constraints(&self, group_id: Uuid) -> Result<Vec<ConstraintRecord>> {
        let constraints = sqlx::query_as::<_, ConstraintRecord>(
            r#"
            SELECT c.id, c.group_id, c.entity_name, c.operation_type,
                   c.where_clause, c.join_clause, c.groovy_script, c.is_active
            FROM sec_group_hierarchy h
            JOIN sec_constraint c ON c.group_id = h.parent_id
            WHERE h.group_id = $1
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.db)
        .await?;

        Ok(constraints)
    }

    async fn load_session_attributes(&self, group_id: Uuid) -> Result<Vec<SessionAttributeRecord>> {
        let attributes = sqlx::query_as::<_, SessionAttributeRecord>(
            r#"
            SELECT a.id, a.group_id, a.name, a.datatype, a.string_value
            FROM sec_group_hierarchy h
            JOIN sec_session_attribute a ON a.group_id = h.parent_id
            WHERE h.group_id = $1
            ORDER BY h.hierarchy_level DESC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.db)
        .await?;

        Ok(attributes)
    }
}

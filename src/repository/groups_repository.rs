//! 访问组仓库
//! 代码定义的访问组按名称查找，数据库访问组按 ID 加载

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Result, SecurityError};
use crate::models::datatype::DatatypeRegistry;
use crate::models::group::{
    ConstraintOperationType, ConstraintRecord, GroupDef, GroupIdentifier, ScriptEvaluator,
};
use crate::models::metadata::Metadata;
use crate::models::permission::EntityOp;
use crate::repository::group_store::GroupStore;
use crate::services::group_def_builder::GroupDefBuilder;

/// Immutable name index of code-defined groups.
#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    groups: HashMap<String, Arc<GroupDef>>,
}

impl GroupRegistry {
    pub fn new<I>(groups: I) -> Self
    where
        I: IntoIterator<Item = GroupDef>,
    {
        let groups = groups
            .into_iter()
            .map(|group| (group.name.clone(), Arc::new(group)))
            .collect();
        Self { groups }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<GroupDef>> {
        self.groups.get(name)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

pub struct BasicGroupsRepository<S> {
    registry: Arc<GroupRegistry>,
    store: S,
    metadata: Arc<Metadata>,
    datatypes: DatatypeRegistry,
    scripts: Option<Arc<dyn ScriptEvaluator>>,
}

impl<S: GroupStore> BasicGroupsRepository<S> {
    pub fn new(registry: Arc<GroupRegistry>, store: S, metadata: Arc<Metadata>, datatypes: DatatypeRegistry) -> Self {
        Self {
            registry,
            store,
            metadata,
            datatypes,
            scripts: None,
        }
    }

    pub fn with_script_evaluator(mut self, scripts: Arc<dyn ScriptEvaluator>) -> Self {
        self.scripts = Some(scripts);
        self
    }

    pub async fn group_definition(&self, identifier: &GroupIdentifier) -> Result<Arc<GroupDef>> {
        match identifier {
            GroupIdentifier::DbId(group_id) => Ok(Arc::new(self.group_definition_from_db(*group_id).await?)),
            GroupIdentifier::Name(name) => self.group_definition_from_code(name),
        }
    }

    fn group_definition_from_code(&self, name: &str) -> Result<Arc<GroupDef>> {
        self.registry.get(name).cloned().ok_or_else(|| {
            SecurityError::IllegalState(format!("Unable to find predefined group definition {}", name))
        })
    }

    async fn group_definition_from_db(&self, group_id: Uuid) -> Result<GroupDef> {
        let mut builder = GroupDefBuilder::new(self.metadata.clone()).with_name(group_id.to_string());
        if let Some(scripts) = &self.scripts {
            builder = builder.with_script_evaluator(scripts.clone());
        }

        let constraints = self.store.load_constraints(group_id).await?;
        for constraint in &constraints {
            builder = process_constraint(constraint, builder)?;
        }

        let attributes = self.store.load_session_attributes(group_id).await?;
        let mut attribute_keys = HashSet::new();
        for attribute in attributes {
            if attribute_keys.contains(&attribute.name) {
                tracing::warn!(
                    attribute = %attribute.name,
                    group_id = %group_id,
                    "Duplicate definition of session attribute in the group hierarchy"
                );
            }

            let datatype = self.datatypes.get(&attribute.datatype).ok_or_else(|| {
                SecurityError::IllegalState(format!("Datatype {} is not registered", attribute.datatype))
            })?;
            let value = datatype
                .parse(&attribute.string_value)
                .map_err(|source| SecurityError::SessionAttribute {
                    attribute: attribute.name.clone(),
                    group: group_id.to_string(),
                    source,
                })?;

            builder = builder.with_session_attribute(attribute.name.clone(), value);
            attribute_keys.insert(attribute.name);
        }

        tracing::debug!(
            group_id = %group_id,
            constraints = constraints.len(),
            session_attributes = attribute_keys.len(),
            "Loaded group definition from database"
        );

        Ok(builder.build())
    }
}

/// Inactive constraints are skipped; CUSTOM constraints expand to no
/// operations.
fn process_constraint(constraint: &ConstraintRecord, mut builder: GroupDefBuilder) -> Result<GroupDefBuilder> {
    if constraint.is_active != Some(true) {
        return Ok(builder);
    }

    let operation_type = ConstraintOperationType::from_id(&constraint.operation_type).ok_or_else(|| {
        SecurityError::InvalidArgument(format!(
            "Unsupported constraint operation type: {}",
            constraint.operation_type
        ))
    })?;

    let where_clause = constraint.where_clause.as_deref().filter(|w| !w.is_empty());
    let script = constraint.groovy_script.as_deref().filter(|s| !s.is_empty());

    for operation in operation_type.to_entity_ops() {
        if let (EntityOp::Read, Some(where_clause)) = (operation, where_clause) {
            builder = builder.with_jpql_constraint(
                &constraint.entity_name,
                where_clause,
                constraint.join_clause.as_deref(),
            )?;
        }
        if let Some(script) = script {
            builder = builder.with_groovy_constraint(&constraint.entity_name, operation, script)?;
        }
    }

    Ok(builder)
}

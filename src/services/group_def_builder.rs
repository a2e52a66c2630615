//! 访问组定义构建器

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::models::datatype::AttributeValue;
use crate::models::group::{ConstraintPredicate, GroupDef, ScriptEvaluator};
use crate::models::metadata::Metadata;
use crate::models::permission::EntityOp;
use crate::services::access_constraints_builder::AccessConstraintsBuilder;

pub struct GroupDefBuilder {
    name: String,
    constraints: AccessConstraintsBuilder,
    inherited_attributes: HashMap<String, AttributeValue>,
    session_attributes: HashMap<String, AttributeValue>,
}

impl GroupDefBuilder {
    pub fn new(metadata: Arc<Metadata>) -> Self {
        Self::with_constraints_builder(AccessConstraintsBuilder::new(metadata))
    }

    pub fn with_constraints_builder(constraints: AccessConstraintsBuilder) -> Self {
        Self {
            name: String::new(),
            constraints,
            inherited_attributes: HashMap::new(),
            session_attributes: HashMap::new(),
        }
    }

    pub fn with_script_evaluator(self, scripts: Arc<dyn ScriptEvaluator>) -> Self {
        self.map_constraints(|builder| builder.with_script_evaluator(scripts))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_jpql_constraint(self, entity_name: &str, where_clause: &str, join_clause: Option<&str>) -> Result<Self> {
        self.with_constraints(|builder| builder.with_jpql(entity_name, where_clause, join_clause))
    }

    pub fn with_in_memory_constraint(
        self,
        entity_name: &str,
        operation: EntityOp,
        predicate: ConstraintPredicate,
    ) -> Result<Self> {
        self.with_constraints(|builder| builder.with_in_memory(entity_name, operation, predicate))
    }

    pub fn with_groovy_constraint(self, entity_name: &str, operation: EntityOp, script: &str) -> Result<Self> {
        self.with_constraints(|builder| builder.with_groovy(entity_name, operation, script))
    }

    /// Hands the underlying constraint builder to `f`.
    pub fn with_constraints<F>(mut self, f: F) -> Result<Self>
    where
        F: FnOnce(AccessConstraintsBuilder) -> Result<AccessConstraintsBuilder>,
    {
        self.constraints = f(self.constraints)?;
        Ok(self)
    }

    pub fn with_session_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.session_attributes.insert(key.into(), value);
        self
    }

    /// Inherits the parent's constraints and session attributes. Attributes
    /// set on this builder win over inherited ones.
    pub fn with_parent(mut self, parent: &GroupDef) -> Self {
        self = self.map_constraints(|builder| builder.join(parent.entity_constraints.clone()));
        for (key, value) in &parent.session_attributes {
            self.inherited_attributes.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn build(self) -> GroupDef {
        let mut session_attributes = self.inherited_attributes;
        session_attributes.extend(self.session_attributes);
        GroupDef {
            name: self.name,
            entity_constraints: self.constraints.build(),
            session_attributes,
        }
    }

    fn map_constraints<F>(mut self, f: F) -> Self
    where
        F: FnOnce(AccessConstraintsBuilder) -> AccessConstraintsBuilder,
    {
        self.constraints = f(self.constraints);
        self
    }
}

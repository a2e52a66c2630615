//! Access group models: entity constraints and group definitions

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::datatype::AttributeValue;
use crate::models::entity::Entity;
use crate::models::permission::EntityOp;

type PredicateFn = dyn Fn(&Entity) -> bool + Send + Sync;

/// In-memory check applied to loaded entity instances.
#[derive(Clone)]
pub struct ConstraintPredicate(Arc<PredicateFn>);

impl ConstraintPredicate {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Entity) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    pub fn test(&self, entity: &Entity) -> bool {
        (self.0)(entity)
    }

    /// Whether both handles share the same closure.
    pub fn same_as(&self, other: &ConstraintPredicate) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ConstraintPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConstraintPredicate(..)")
    }
}

/// Evaluates constraint scripts against entity instances.
pub trait ScriptEvaluator: Send + Sync {
    fn evaluate(&self, entity: &Entity, script: &str) -> bool;
}

/// Query filter constraint. Always applies to reads.
#[derive(Debug, Clone)]
pub struct JpqlConstraint {
    pub entity_type: String,
    pub where_clause: Option<String>,
    pub join_clause: Option<String>,
    pub predicate: Option<ConstraintPredicate>,
}

#[derive(Debug, Clone)]
pub struct InMemoryConstraint {
    pub entity_type: String,
    pub operation: EntityOp,
    pub predicate: ConstraintPredicate,
}

#[derive(Debug, Clone)]
pub enum EntityConstraint {
    Jpql(JpqlConstraint),
    InMemory(InMemoryConstraint),
}

impl EntityConstraint {
    pub fn entity_type(&self) -> &str {
        match self {
            EntityConstraint::Jpql(c) => &c.entity_type,
            EntityConstraint::InMemory(c) => &c.entity_type,
        }
    }

    pub fn operation(&self) -> EntityOp {
        match self {
            EntityConstraint::Jpql(_) => EntityOp::Read,
            EntityConstraint::InMemory(c) => c.operation,
        }
    }

    pub fn predicate(&self) -> Option<&ConstraintPredicate> {
        match self {
            EntityConstraint::Jpql(c) => c.predicate.as_ref(),
            EntityConstraint::InMemory(c) => Some(&c.predicate),
        }
    }

    pub fn is_jpql(&self) -> bool {
        matches!(self, EntityConstraint::Jpql(_))
    }

    /// Runs the in-memory part of the constraint; constraints without a
    /// predicate accept every instance.
    pub fn permits(&self, entity: &Entity) -> bool {
        self.predicate().map_or(true, |p| p.test(entity))
    }
}

/// Constraints grouped by entity name, in registration order.
#[derive(Debug, Clone, Default)]
pub struct SetOfEntityConstraints {
    constraints: HashMap<String, Vec<EntityConstraint>>,
}

impl SetOfEntityConstraints {
    pub fn new(constraints: HashMap<String, Vec<EntityConstraint>>) -> Self {
        Self { constraints }
    }

    pub fn constraints(&self) -> &HashMap<String, Vec<EntityConstraint>> {
        &self.constraints
    }

    pub fn for_entity(&self, entity_name: &str) -> &[EntityConstraint] {
        self.constraints
            .get(entity_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn constraints_for(&self, entity_name: &str, operation: EntityOp) -> Vec<&EntityConstraint> {
        self.for_entity(entity_name)
            .iter()
            .filter(|c| c.operation() == operation)
            .collect()
    }

    pub fn has_constraints(&self, entity_name: &str) -> bool {
        !self.for_entity(entity_name).is_empty()
    }

    /// Total number of constraints over all entities.
    pub fn len(&self) -> usize {
        self.constraints.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Named bundle of constraints and session attribute defaults.
#[derive(Debug, Clone, Default)]
pub struct GroupDef {
    pub name: String,
    pub entity_constraints: SetOfEntityConstraints,
    pub session_attributes: HashMap<String, AttributeValue>,
}

impl GroupDef {
    pub fn session_attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.session_attributes.get(name)
    }
}

/// Reference to a group either stored in the database or defined in code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupIdentifier {
    DbId(Uuid),
    Name(String),
}

impl fmt::Display for GroupIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupIdentifier::DbId(id) => write!(f, "GroupIdentifier{{dbId={}}}", id),
            GroupIdentifier::Name(name) => write!(f, "GroupIdentifier{{name={}}}", name),
        }
    }
}

/// Operation scope of a stored constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintOperationType {
    Create,
    Read,
    Update,
    Delete,
    All,
    Custom,
}

impl ConstraintOperationType {
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "create" => Some(ConstraintOperationType::Create),
            "read" => Some(ConstraintOperationType::Read),
            "update" => Some(ConstraintOperationType::Update),
            "delete" => Some(ConstraintOperationType::Delete),
            "all" => Some(ConstraintOperationType::All),
            "custom" => Some(ConstraintOperationType::Custom),
            _ => None,
        }
    }

    pub fn to_entity_ops(self) -> Vec<EntityOp> {
        match self {
            ConstraintOperationType::Create => vec![EntityOp::Create],
            ConstraintOperationType::Read => vec![EntityOp::Read],
            ConstraintOperationType::Update => vec![EntityOp::Update],
            ConstraintOperationType::Delete => vec![EntityOp::Delete],
            ConstraintOperationType::All => EntityOp::ALL.to_vec(),
            ConstraintOperationType::Custom => Vec::new(),
        }
    }
}

/// Constraint row as stored in `sec_constraint`
#[derive(Debug, Clone, FromRow)]
pub struct ConstraintRecord {
    pub id: Uuid,
    pub group_id: Uuid,
    pub entity_name: String,
    pub operation_type: String,
    pub where_clause: Option<String>,
    pub join_clause: Option<String>,
    pub groovy_script: Option<String>,
    pub is_active: Option<bool>,
}

/// Session attribute row as stored in `sec_session_attribute`
#[derive(Debug, Clone, FromRow)]
pub struct SessionAttributeRecord {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub datatype: String,
    pub string_value: String,
}

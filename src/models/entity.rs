//! Dynamic entity instances
//!
//! Entities carry their attribute values in a map; references between
//! entities are expressed by [`EntityKey`], never by pointers, so cyclic graphs
//! are plain data.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityId {
    Uuid(Uuid),
    Long(i64),
    String(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Uuid(id) => write!(f, "{}", id),
            EntityId::Long(id) => write!(f, "{}", id),
            EntityId::String(id) => f.write_str(id),
        }
    }
}

impl From<Uuid> for EntityId {
    fn from(id: Uuid) -> Self {
        EntityId::Uuid(id)
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId::Long(id)
    }
}

impl From<i32> for EntityId {
    fn from(id: i32) -> Self {
        EntityId::Long(i64::from(id))
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId::String(id.to_string())
    }
}

/// Identity of an entity: its entity name plus identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub entity_name: String,
    pub id: EntityId,
}

impl EntityKey {
    pub fn new(entity_name: impl Into<String>, id: impl Into<EntityId>) -> Self {
        Self {
            entity_name: entity_name.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.entity_name, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Reference(EntityKey),
    List(Vec<EntityKey>),
    /// Insertion-ordered set of references.
    Set(Vec<EntityKey>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&EntityKey> {
        match self {
            Value::Reference(key) => Some(key),
            _ => None,
        }
    }

    /// Items of a list or set value.
    pub fn as_collection(&self) -> Option<&[EntityKey]> {
        match self {
            Value::List(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<EntityKey> for Value {
    fn from(v: EntityKey) -> Self {
        Value::Reference(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityState {
    /// Not saved yet
    New,
    /// Loaded from or saved to the database
    Detached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub key: EntityKey,
    pub version: Option<i32>,
    pub state: EntityState,
    values: BTreeMap<String, Value>,
    /// Loaded attributes of a partially fetched instance; `None` means fully loaded.
    fetch_group: Option<BTreeSet<String>>,
}

impl Entity {
    pub fn new(entity_name: impl Into<String>, id: impl Into<EntityId>) -> Self {
        Self {
            key: EntityKey::new(entity_name, id),
            version: None,
            state: EntityState::New,
            values: BTreeMap::new(),
            fetch_group: None,
        }
    }

    pub fn detached(entity_name: impl Into<String>, id: impl Into<EntityId>, version: i32) -> Self {
        let mut entity = Self::new(entity_name, id);
        entity.state = EntityState::Detached;
        entity.version = Some(version);
        entity
    }

    /// Instance with the same identity and version but no state.
    pub(crate) fn bare_copy(&self) -> Self {
        Self {
            key: self.key.clone(),
            version: self.version,
            state: EntityState::New,
            values: BTreeMap::new(),
            fetch_group: None,
        }
    }

    pub fn with(mut self, property: &str, value: impl Into<Value>) -> Self {
        self.values.insert(property.to_string(), value.into());
        self
    }

    pub fn with_fetch_group<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fetch_group = Some(properties.into_iter().map(Into::into).collect());
        self
    }

    pub fn entity_name(&self) -> &str {
        &self.key.entity_name
    }

    pub fn is_new(&self) -> bool {
        self.state == EntityState::New
    }

    pub fn value(&self, property: &str) -> Option<&Value> {
        self.values.get(property)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Sets or clears (`None`) a value without any change tracking.
    pub fn set_value(&mut self, property: &str, value: Option<Value>) {
        match value {
            Some(value) => {
                self.values.insert(property.to_string(), value);
            }
            None => {
                self.values.remove(property);
            }
        }
    }

    pub(crate) fn value_mut(&mut self, property: &str) -> Option<&mut Value> {
        self.values.get_mut(property)
    }

    pub fn fetch_group(&self) -> Option<&BTreeSet<String>> {
        self.fetch_group.as_ref()
    }

    pub(crate) fn set_fetch_group(&mut self, fetch_group: Option<BTreeSet<String>>) {
        self.fetch_group = fetch_group;
    }

    /// New instances are always fully loaded.
    pub fn is_loaded(&self, property: &str) -> bool {
        if self.is_new() {
            return true;
        }
        match &self.fetch_group {
            None => true,
            Some(group) => group.contains(property),
        }
    }
}

/// A detached object graph handed to the data context for merging.
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    entities: HashMap<EntityKey, Entity>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, entity: Entity) -> Self {
        self.insert(entity);
        self
    }

    pub fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.key.clone(), entity);
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.entities.keys()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl FromIterator<Entity> for EntityGraph {
    fn from_iter<T: IntoIterator<Item = Entity>>(iter: T) -> Self {
        let mut graph = EntityGraph::new();
        for entity in iter {
            graph.insert(entity);
        }
        graph
    }
}

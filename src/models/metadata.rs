//! Entity metadata
//!
//! Resolves entity names to their class description. Security builders use it
//! to validate constraint and permission targets; the data context uses the
//! property list to drive merges.

use std::collections::HashMap;

use crate::error::{Result, SecurityError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// Scalar value
    Datatype,
    /// Reference to another entity
    Reference,
    /// Value object owned by the entity
    Embedded,
    List,
    Set,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaProperty {
    pub name: String,
    pub kind: PropertyKind,
    pub read_only: bool,
}

impl MetaProperty {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            read_only: false,
        }
    }

    pub fn datatype(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Datatype)
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Reference)
    }

    pub fn embedded(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Embedded)
    }

    pub fn list(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::List)
    }

    pub fn set(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Set)
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn is_embedded(&self) -> bool {
        self.kind == PropertyKind::Embedded
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaClass {
    pub name: String,
    pub primary_key: Option<String>,
    pub versioned: bool,
    pub properties: Vec<MetaProperty>,
}

impl MetaClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: Some("id".to_string()),
            versioned: false,
            properties: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = Some(primary_key.into());
        self
    }

    pub fn without_primary_key(mut self) -> Self {
        self.primary_key = None;
        self
    }

    pub fn versioned(mut self) -> Self {
        self.versioned = true;
        self
    }

    pub fn with_property(mut self, property: MetaProperty) -> Self {
        self.properties.push(property);
        self
    }

    pub fn property(&self, name: &str) -> Option<&MetaProperty> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Registry of entity classes keyed by entity name.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    classes: HashMap<String, MetaClass>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, meta_class: MetaClass) -> Self {
        self.register(meta_class);
        self
    }

    pub fn register(&mut self, meta_class: MetaClass) {
        self.classes.insert(meta_class.name.clone(), meta_class);
    }

    pub fn class(&self, name: &str) -> Option<&MetaClass> {
        self.classes.get(name)
    }

    /// Like [`class`](Self::class) but an unknown name is an error.
    pub fn class_nn(&self, name: &str) -> Result<&MetaClass> {
        self.classes.get(name).ok_or_else(|| {
            SecurityError::InvalidArgument(format!("MetaClass not found for {}", name))
        })
    }

    pub fn primary_key_name(&self, name: &str) -> Option<&str> {
        self.class(name).and_then(|c| c.primary_key.as_deref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }
}

//! Declarative role and group definitions
//!
//! A definition describes itself as data: a type-level descriptor plus a list
//! of declared methods, each carrying the annotations the compilers in
//! `services::annotation_group_builder` and `services::annotation_role_builder`
//! turn into constraints and permissions.

use std::fmt;
use std::sync::Arc;

use crate::models::entity::Entity;
use crate::models::permission::{AccessOperation, EntityOp};
use crate::models::role::RoleType;

/// Body of a constraint method, evaluated against the entity it constrains.
pub type MethodBody = fn(&Entity) -> bool;

#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// Query constraint. `value` takes precedence over `where_clause`.
    JpqlConstraint {
        target: Option<String>,
        value: String,
        where_clause: String,
        join: String,
    },
    /// In-memory constraint implemented by the method body.
    Constraint { operations: Vec<EntityOp> },
    SessionAttribute {
        name: String,
        value: String,
        datatype: String,
    },
    EntityAccess {
        target: String,
        allow: Vec<EntityOp>,
        deny: Vec<EntityOp>,
    },
    EntityAttributeAccess {
        target: String,
        allow: Vec<String>,
        read_only: Vec<String>,
        deny: Vec<String>,
    },
    SpecificAccess {
        target: String,
        access: AccessOperation,
    },
    ScreenAccess { allow: Vec<String>, deny: Vec<String> },
    ScreenElementAccess {
        screen: String,
        allow: Vec<String>,
        deny: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    JpqlConstraint,
    Constraint,
    SessionAttribute,
    EntityAccess,
    EntityAttributeAccess,
    SpecificAccess,
    ScreenAccess,
    ScreenElementAccess,
}

impl Annotation {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Annotation::JpqlConstraint { .. } => AnnotationKind::JpqlConstraint,
            Annotation::Constraint { .. } => AnnotationKind::Constraint,
            Annotation::SessionAttribute { .. } => AnnotationKind::SessionAttribute,
            Annotation::EntityAccess { .. } => AnnotationKind::EntityAccess,
            Annotation::EntityAttributeAccess { .. } => AnnotationKind::EntityAttributeAccess,
            Annotation::SpecificAccess { .. } => AnnotationKind::SpecificAccess,
            Annotation::ScreenAccess { .. } => AnnotationKind::ScreenAccess,
            Annotation::ScreenElementAccess { .. } => AnnotationKind::ScreenElementAccess,
        }
    }

    pub fn jpql(where_clause: impl Into<String>) -> Self {
        Annotation::JpqlConstraint {
            target: None,
            value: where_clause.into(),
            where_clause: String::new(),
            join: String::new(),
        }
    }

    pub fn constraint(operations: &[EntityOp]) -> Self {
        Annotation::Constraint {
            operations: operations.to_vec(),
        }
    }

    pub fn session_attribute(
        name: impl Into<String>,
        value: impl Into<String>,
        datatype: impl Into<String>,
    ) -> Self {
        Annotation::SessionAttribute {
            name: name.into(),
            value: value.into(),
            datatype: datatype.into(),
        }
    }
}

/// A method of a definition together with its annotations.
#[derive(Clone)]
pub struct DeclaredMethod {
    pub name: String,
    /// Parameter type names; entity parameters use the entity name.
    pub parameters: Vec<String>,
    pub annotations: Vec<Annotation>,
    pub body: Option<MethodBody>,
}

impl DeclaredMethod {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            annotations: Vec::new(),
            body: None,
        }
    }

    pub fn with_parameter(mut self, type_name: impl Into<String>) -> Self {
        self.parameters.push(type_name.into());
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn with_body(mut self, body: MethodBody) -> Self {
        self.body = Some(body);
        self
    }
}

impl fmt::Debug for DeclaredMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclaredMethod")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("annotations", &self.annotations)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Type-level `@Group` descriptor
#[derive(Clone)]
pub struct GroupAnnotation {
    pub name: String,
    pub parent: Option<Arc<dyn GroupDefinition>>,
}

impl GroupAnnotation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: Arc<dyn GroupDefinition>) -> Self {
        self.parent = Some(parent);
        self
    }
}

impl fmt::Debug for GroupAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupAnnotation")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.owner().to_string()))
            .finish()
    }
}

/// Type-level `@Role` descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAnnotation {
    pub name: String,
    pub role_type: RoleType,
    pub description: String,
    pub is_default: bool,
}

impl RoleAnnotation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role_type: RoleType::Standard,
            description: String::new(),
            is_default: false,
        }
    }

    pub fn with_role_type(mut self, role_type: RoleType) -> Self {
        self.role_type = role_type;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn default_role(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Access group declared in code.
pub trait GroupDefinition: Send + Sync {
    /// Name of the declaring type; keys the predicate cache and error messages.
    fn owner(&self) -> &str;

    fn annotation(&self) -> Option<GroupAnnotation>;

    fn methods(&self) -> Vec<DeclaredMethod>;
}

/// Role declared in code.
pub trait RoleDefinition: Send + Sync {
    fn owner(&self) -> &str;

    fn annotation(&self) -> Option<RoleAnnotation>;

    fn methods(&self) -> Vec<DeclaredMethod>;
}

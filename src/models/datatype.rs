//! Datatype parsing for session attribute values

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Typed, serializable session attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    String(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Uuid(Uuid),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot parse '{value}' as {datatype}")]
pub struct DatatypeError {
    pub datatype: String,
    pub value: String,
}

impl DatatypeError {
    pub fn new(datatype: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            datatype: datatype.into(),
            value: value.into(),
        }
    }
}

pub trait Datatype: Send + Sync {
    fn id(&self) -> &str;

    fn parse(&self, value: &str) -> Result<AttributeValue, DatatypeError>;
}

/// Built-in datatypes, addressed by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardDatatype {
    String,
    Int,
    Long,
    Double,
    Boolean,
    Uuid,
    Date,
    DateTime,
}

impl StandardDatatype {
    pub const ALL: [StandardDatatype; 8] = [
        StandardDatatype::String,
        StandardDatatype::Int,
        StandardDatatype::Long,
        StandardDatatype::Double,
        StandardDatatype::Boolean,
        StandardDatatype::Uuid,
        StandardDatatype::Date,
        StandardDatatype::DateTime,
    ];
}

impl Datatype for StandardDatatype {
    fn id(&self) -> &str {
        match self {
            StandardDatatype::String => "string",
            StandardDatatype::Int => "int",
            StandardDatatype::Long => "long",
            StandardDatatype::Double => "double",
            StandardDatatype::Boolean => "boolean",
            StandardDatatype::Uuid => "uuid",
            StandardDatatype::Date => "date",
            StandardDatatype::DateTime => "dateTime",
        }
    }

    fn parse(&self, value: &str) -> Result<AttributeValue, DatatypeError> {
        let err = || DatatypeError::new(self.id(), value);
        let trimmed = value.trim();
        match self {
            StandardDatatype::String => Ok(AttributeValue::String(value.to_string())),
            StandardDatatype::Int => trimmed.parse().map(AttributeValue::Int).map_err(|_| err()),
            StandardDatatype::Long => trimmed.parse().map(AttributeValue::Long).map_err(|_| err()),
            StandardDatatype::Double => trimmed.parse().map(AttributeValue::Double).map_err(|_| err()),
            StandardDatatype::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" => Ok(AttributeValue::Boolean(true)),
                "false" => Ok(AttributeValue::Boolean(false)),
                _ => Err(err()),
            },
            StandardDatatype::Uuid => Uuid::parse_str(trimmed)
                .map(AttributeValue::Uuid)
                .map_err(|_| err()),
            StandardDatatype::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(AttributeValue::Date)
                .map_err(|_| err()),
            StandardDatatype::DateTime => DateTime::parse_from_rfc3339(trimmed)
                .map(|dt| AttributeValue::DateTime(dt.with_timezone(&Utc)))
                .map_err(|_| err()),
        }
    }
}

/// Datatypes available to session attribute declarations.
#[derive(Clone)]
pub struct DatatypeRegistry {
    datatypes: HashMap<String, Arc<dyn Datatype>>,
}

impl DatatypeRegistry {
    pub fn empty() -> Self {
        Self {
            datatypes: HashMap::new(),
        }
    }

    pub fn register(&mut self, datatype: Arc<dyn Datatype>) {
        self.datatypes.insert(datatype.id().to_string(), datatype);
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Datatype>> {
        self.datatypes.get(id)
    }
}

impl Default for DatatypeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for datatype in StandardDatatype::ALL {
            registry.register(Arc::new(datatype));
        }
        registry
    }
}

impl std::fmt::Debug for DatatypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.datatypes.keys().collect();
        ids.sort();
        f.debug_struct("DatatypeRegistry").field("datatypes", &ids).finish()
    }
}

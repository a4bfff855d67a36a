//! Records and field values as seen by the engine.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference from one record to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    /// Entity of the referenced record.
    pub entity: String,
    /// Id of the referenced record.
    pub id: String,
    /// Display name, when the store already knows it.
    #[serde(default)]
    pub name: Option<String>,
}

/// A field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Explicitly empty.
    Null,
    /// Free text.
    Text(String),
    /// Whole number.
    Integer(i64),
    /// Decimal number.
    Decimal(f64),
    /// Two-state flag.
    Boolean(bool),
    /// Option-set value whose label lives in metadata.
    OptionSet(i32),
    /// Point in time, stored in UTC.
    DateTime(DateTime<Utc>),
    /// Lookup to another record.
    Reference(EntityRef),
}

impl Value {
    /// Returns the text when the value is [`Value::Text`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(text) => f.write_str(text),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Decimal(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::OptionSet(n) => write!(f, "{n}"),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Self::Reference(r) => f.write_str(r.name.as_deref().unwrap_or(&r.id)),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// A record: entity name, id, and its field values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Entity (table) name.
    pub entity: String,
    /// Record id.
    pub id: String,
    /// Field values by name.
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    /// Pre-formatted display labels by field name.
    #[serde(default)]
    pub formatted: BTreeMap<String, String>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self { entity: entity.into(), id: id.into(), ..Self::default() }
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Sets a field value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Returns `true` when the field is present, even if null.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns the field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// A reference pointing at this record.
    #[must_use]
    pub fn to_ref(&self) -> EntityRef {
        EntityRef { entity: self.entity.clone(), id: self.id.clone(), name: None }
    }
}

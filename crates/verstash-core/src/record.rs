//! Record contract
//!
//! The file behaviors never own database records. They read attributes and the
//! primary key through [`Record`], and ask the record layer to persist the
//! version/extension pair after a successful save.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Scalar attribute value as exposed by the record layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Interpret the value as a non-negative counter.
    ///
    /// Blank text and null read as `None`; negative numbers are rejected.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AttributeValue::Integer(value) => u64::try_from(*value).ok(),
            AttributeValue::Text(value) => value.trim().parse::<u64>().ok(),
            AttributeValue::Float(value) if *value >= 0.0 && value.fract() == 0.0 => {
                Some(*value as u64)
            }
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => Ok(()),
            AttributeValue::Bool(value) => write!(f, "{}", value),
            AttributeValue::Integer(value) => write!(f, "{}", value),
            AttributeValue::Float(value) => write!(f, "{}", value),
            AttributeValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self {
        i64::try_from(value)
            .map(AttributeValue::Integer)
            .unwrap_or_else(|_| AttributeValue::Text(value.to_string()))
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

/// Named attribute values, ordered by name
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Primary key of a record, either a single column or a composite
#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryKey {
    Single(AttributeValue),
    Composite(Vec<AttributeValue>),
}

impl PrimaryKey {
    /// String form used for file names and the `{pk}` placeholder.
    ///
    /// Composite keys are joined with `_`.
    pub fn to_key_string(&self) -> String {
        match self {
            PrimaryKey::Single(value) => value.to_string(),
            PrimaryKey::Composite(values) => values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("_"),
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key_string())
    }
}

/// Database-backed record the file behaviors attach to
#[async_trait]
pub trait Record: Send + Sync {
    /// Fully-qualified type name, e.g. `app::models::UserAvatar`
    fn type_name(&self) -> &str;

    /// Current primary key value
    fn primary_key(&self) -> PrimaryKey;

    /// Read an attribute by name.
    ///
    /// Returns `None` when the record has no such attribute at all, and
    /// `Some(AttributeValue::Null)` when it exists but holds no value.
    fn attribute(&self, name: &str) -> Option<AttributeValue>;

    /// Persist the given attribute values on the record
    async fn update_attributes(&mut self, values: AttributeMap) -> Result<(), RecordError>;
}

fn default_primary_key() -> Vec<String> {
    vec!["id".to_string()]
}

/// Record held entirely in memory.
///
/// Useful as a stand-in for a database row in tests and tools: attribute
/// updates are applied to the in-memory map and never fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub type_name: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub attributes: AttributeMap,
}

impl MemoryRecord {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            primary_key: default_primary_key(),
            attributes: AttributeMap::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attribute(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Use the given attribute names as the (possibly composite) primary key
    pub fn with_primary_key(mut self, names: &[&str]) -> Self {
        self.primary_key = names.iter().map(|name| name.to_string()).collect();
        self
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<AttributeValue>) {
        self.attributes.insert(name.to_string(), value.into());
    }
}

#[async_trait]
impl Record for MemoryRecord {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn primary_key(&self) -> PrimaryKey {
        let mut values: Vec<AttributeValue> = self
            .primary_key
            .iter()
            .map(|name| {
                self.attributes
                    .get(name)
                    .cloned()
                    .unwrap_or(AttributeValue::Null)
            })
            .collect();

        if values.len() == 1 {
            PrimaryKey::Single(values.remove(0))
        } else {
            PrimaryKey::Composite(values)
        }
    }

    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        self.attributes.get(name).cloned()
    }

    async fn update_attributes(&mut self, values: AttributeMap) -> Result<(), RecordError> {
        self.attributes.extend(values);
        Ok(())
    }
}

//! Transformation set loading
//!
//! Transformations are configured in JSON either as an object mapping names
//! to settings, or as a list mixing bare names with single-entry objects:
//!
//! ```json
//! ["origin", {"main": [800, 600]}, {"thumb": [200, 150]}]
//! ```
//!
//! A bare name, or a `null` setting, stores the source file unmodified.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{FileError, FileResult};

/// One named variant produced from every saved source file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transformation {
    pub name: String,
    /// Settings handed to the transform function; `None` copies the source verbatim
    pub settings: Option<Value>,
}

impl Transformation {
    /// Variant storing the source unchanged
    pub fn verbatim(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: None,
        }
    }

    pub fn with_settings(name: impl Into<String>, settings: Value) -> Self {
        Self {
            name: name.into(),
            settings: Some(settings).filter(|value| !value.is_null()),
        }
    }

    pub fn is_verbatim(&self) -> bool {
        self.settings.is_none()
    }
}

impl From<&str> for Transformation {
    fn from(name: &str) -> Self {
        Transformation::verbatim(name)
    }
}

/// Ordered list of transformations
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TransformationSet(Vec<Transformation>);

impl TransformationSet {
    pub fn new(transformations: Vec<Transformation>) -> Self {
        Self(transformations)
    }

    pub fn from_json(value: Value) -> FileResult<Self> {
        Self::deserialize(value)
            .map_err(|e| FileError::Configuration(format!("Invalid transformation set: {}", e)))
    }

    pub fn from_json_str(json: &str) -> FileResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| FileError::Configuration(format!("Invalid transformation set: {}", e)))
    }

    pub fn push(&mut self, transformation: impl Into<Transformation>) {
        self.0.push(transformation.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transformation> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&Transformation> {
        self.0.first()
    }

    pub fn get(&self, name: &str) -> Option<&Transformation> {
        self.0.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|t| t.name.as_str())
    }
}

impl<'a> IntoIterator for &'a TransformationSet {
    type Item = &'a Transformation;
    type IntoIter = std::slice::Iter<'a, Transformation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Transformation> for TransformationSet {
    fn from_iter<I: IntoIterator<Item = Transformation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for TransformationSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let mut transformations = Vec::new();

        match value {
            Value::Object(entries) => {
                for (name, settings) in entries {
                    transformations.push(Transformation::with_settings(name, settings));
                }
            }
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::String(name) => transformations.push(Transformation::verbatim(name)),
                        Value::Object(entries) => {
                            for (name, settings) in entries {
                                transformations.push(Transformation::with_settings(name, settings));
                            }
                        }
                        other => {
                            return Err(D::Error::custom(format!(
                                "expected a transformation name or object, got {}",
                                other
                            )))
                        }
                    }
                }
            }
            other => {
                return Err(D::Error::custom(format!(
                    "expected a list or object of transformations, got {}",
                    other
                )))
            }
        }

        if let Some(duplicate) = transformations
            .iter()
            .enumerate()
            .find(|(i, t)| transformations[..*i].iter().any(|prev| prev.name == t.name))
            .map(|(_, t)| t.name.clone())
        {
            return Err(D::Error::custom(format!(
                "duplicate transformation name '{}'",
                duplicate
            )));
        }

        Ok(Self(transformations))
    }
}

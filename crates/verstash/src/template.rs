//! Sub-directory templates
//!
//! A template such as `{^^pk}/{^pk}` is evaluated against a record to build
//! the directory part of a storage key. Placeholders have the form
//! `{name}`; each leading `^` selects one character of the resolved value:
//! `{^pk}` is the first character of the primary key, `{^^pk}` the second,
//! and so on. A position past the end of the value yields `0`.
//!
//! Recognized names:
//! - `pk`: primary key string, composite keys joined with `_`
//! - `__model__`: full record type name with `::` replaced by `_`
//! - `__basemodel__`: last segment of the record type name
//! - `__modelid__`: kebab-cased `__basemodel__`
//! - `__file__`: name of the upload field
//!
//! Any other name is read from the record's attributes. Unknown attributes
//! resolve to the placeholder name itself.

use std::fmt;
use std::sync::{Arc, LazyLock};

use convert_case::{Case, Casing};
use regex::{Captures, Regex};
use verstash_core::Record;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\^*)(\w+)\}").expect("placeholder pattern is valid"));

type ComputedSubDir = dyn Fn(&dyn Record) -> String + Send + Sync;

/// How the sub-directory of a record's files is determined
#[derive(Clone)]
pub enum SubDirTemplate {
    /// Fixed directory, used verbatim
    Literal(String),
    /// Directory with placeholders
    Template(String),
    /// Directory computed from the record
    Computed(Arc<ComputedSubDir>),
}

impl SubDirTemplate {
    /// Classify a configured template string
    pub fn parse(template: &str) -> Self {
        if PLACEHOLDER.is_match(template) {
            SubDirTemplate::Template(template.to_string())
        } else {
            SubDirTemplate::Literal(template.to_string())
        }
    }

    pub fn computed<F>(func: F) -> Self
    where
        F: Fn(&dyn Record) -> String + Send + Sync + 'static,
    {
        SubDirTemplate::Computed(Arc::new(func))
    }

    /// Evaluate the template for `record`
    pub fn resolve(&self, record: &dyn Record, file_attribute: &str) -> String {
        match self {
            SubDirTemplate::Literal(dir) => dir.clone(),
            SubDirTemplate::Template(template) => {
                resolve_placeholders(template, record, file_attribute)
            }
            SubDirTemplate::Computed(func) => func(record),
        }
    }
}

impl fmt::Debug for SubDirTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubDirTemplate::Literal(dir) => f.debug_tuple("Literal").field(dir).finish(),
            SubDirTemplate::Template(template) => {
                f.debug_tuple("Template").field(template).finish()
            }
            SubDirTemplate::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<&str> for SubDirTemplate {
    fn from(template: &str) -> Self {
        SubDirTemplate::parse(template)
    }
}

/// Last `::`-separated segment of a type name
pub fn base_type_name(type_name: &str) -> &str {
    type_name
        .rsplit([':', '\\', '.'])
        .find(|segment| !segment.is_empty())
        .unwrap_or(type_name)
}

/// Kebab-cased base type name, e.g. `app::models::UserAvatar` -> `user-avatar`
pub fn type_id(type_name: &str) -> String {
    base_type_name(type_name).to_case(Case::Kebab)
}

/// Replace every placeholder in `template` with its value for `record`
pub fn resolve_placeholders(template: &str, record: &dyn Record, file_attribute: &str) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let carets = caps[1].len();
            let value = placeholder_value(&caps[2], record, file_attribute);
            if carets == 0 {
                value
            } else {
                value
                    .chars()
                    .nth(carets - 1)
                    .unwrap_or('0')
                    .to_string()
            }
        })
        .into_owned()
}

fn placeholder_value(name: &str, record: &dyn Record, file_attribute: &str) -> String {
    match name {
        "pk" => record.primary_key().to_key_string(),
        "__model__" => record.type_name().replace("::", "_"),
        "__basemodel__" => base_type_name(record.type_name()).to_string(),
        "__modelid__" => type_id(record.type_name()),
        "__file__" => file_attribute.to_string(),
        _ => record
            .attribute(name)
            .map(|value| value.to_string())
            .unwrap_or_else(|| name.to_string()),
    }
}

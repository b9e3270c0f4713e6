//! Storage key naming
//!
//! A stored file is addressed as `{sub_dir}/{self_name}`, where the self name
//! is `{primary_key}[_{transformation}]_{version}.{extension}`. Names are a
//! pure function of the record snapshot and the arguments.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use verstash_core::Record;

use crate::template::SubDirTemplate;
use crate::version::VersionTracker;

type GlobalExtensionFn = dyn Fn(&str, &str) -> String + Send + Sync;
type ExtensionFn = dyn Fn(&str) -> String + Send + Sync;

/// Extension override for one transformation
#[derive(Clone)]
pub enum ExtensionRule {
    Literal(String),
    /// Receives the original extension
    Computed(Arc<ExtensionFn>),
}

impl ExtensionRule {
    pub fn computed<F>(func: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        ExtensionRule::Computed(Arc::new(func))
    }

    fn apply(&self, extension: &str) -> String {
        match self {
            ExtensionRule::Literal(ext) => ext.clone(),
            ExtensionRule::Computed(func) => func(extension),
        }
    }
}

impl From<&str> for ExtensionRule {
    fn from(ext: &str) -> Self {
        ExtensionRule::Literal(ext.to_string())
    }
}

/// Extension remapping for transformed variants
#[derive(Clone)]
pub enum TransformationExtensions {
    /// Receives the original extension and the transformation name
    Computed(Arc<GlobalExtensionFn>),
    /// Rules per transformation name; unlisted names keep the original extension
    PerName(IndexMap<String, ExtensionRule>),
}

impl TransformationExtensions {
    pub fn computed<F>(func: F) -> Self
    where
        F: Fn(&str, &str) -> String + Send + Sync + 'static,
    {
        TransformationExtensions::Computed(Arc::new(func))
    }

    pub fn per_name<I, K, V>(rules: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ExtensionRule>,
    {
        TransformationExtensions::PerName(
            rules
                .into_iter()
                .map(|(name, rule)| (name.into(), rule.into()))
                .collect(),
        )
    }

    /// Extension used for the `transformation` variant of a file
    pub fn apply(&self, extension: &str, transformation: &str) -> String {
        match self {
            TransformationExtensions::Computed(func) => func(extension, transformation),
            TransformationExtensions::PerName(rules) => rules
                .get(transformation)
                .map(|rule| rule.apply(extension))
                .unwrap_or_else(|| extension.to_string()),
        }
    }
}

impl fmt::Debug for TransformationExtensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformationExtensions::Computed(_) => f.write_str("Computed(..)"),
            TransformationExtensions::PerName(rules) => f
                .debug_map()
                .entries(rules.iter().map(|(name, rule)| {
                    let rule = match rule {
                        ExtensionRule::Literal(ext) => ext.as_str(),
                        ExtensionRule::Computed(_) => "..",
                    };
                    (name, rule)
                }))
                .finish(),
        }
    }
}

/// Composes storage keys for a record's files
#[derive(Debug, Clone)]
pub struct FileNamer {
    sub_dir: Option<SubDirTemplate>,
    file_attribute: String,
    extension_attribute: String,
    version: VersionTracker,
    extensions: Option<TransformationExtensions>,
}

impl FileNamer {
    pub fn new(
        sub_dir: Option<SubDirTemplate>,
        file_attribute: impl Into<String>,
        extension_attribute: impl Into<String>,
        version: VersionTracker,
    ) -> Self {
        Self {
            sub_dir,
            file_attribute: file_attribute.into(),
            extension_attribute: extension_attribute.into(),
            version,
            extensions: None,
        }
    }

    pub fn with_extensions(mut self, extensions: TransformationExtensions) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn set_sub_dir(&mut self, sub_dir: Option<SubDirTemplate>) {
        self.sub_dir = sub_dir;
    }

    pub fn set_extensions(&mut self, extensions: Option<TransformationExtensions>) {
        self.extensions = extensions;
    }

    pub fn version(&self) -> &VersionTracker {
        &self.version
    }

    pub fn extension_attribute(&self) -> &str {
        &self.extension_attribute
    }

    /// Extension recorded for the current file, empty when none
    pub fn current_extension(&self, record: &dyn Record) -> String {
        record
            .attribute(&self.extension_attribute)
            .map(|value| value.to_string())
            .unwrap_or_default()
    }

    /// Resolved sub-directory, empty when no template is configured
    pub fn sub_dir(&self, record: &dyn Record) -> String {
        self.sub_dir
            .as_ref()
            .map(|template| template.resolve(record, &self.file_attribute))
            .unwrap_or_default()
    }

    /// File name without the sub-directory.
    ///
    /// `version` and `extension` default to the values recorded on the
    /// record. A transformation name adds its own segment and goes through
    /// extension remapping.
    pub fn self_name(
        &self,
        record: &dyn Record,
        transformation: Option<&str>,
        version: Option<u64>,
        extension: Option<&str>,
    ) -> String {
        let version = version.unwrap_or_else(|| self.version.current(record));
        let extension = match extension {
            Some(ext) => ext.to_string(),
            None => self.current_extension(record),
        };
        let base = record.primary_key().to_key_string();

        match transformation {
            Some(name) => {
                let extension = match &self.extensions {
                    Some(extensions) => extensions.apply(&extension, name),
                    None => extension,
                };
                format!("{}_{}_{}.{}", base, name, version, extension)
            }
            None => format!("{}_{}.{}", base, version, extension),
        }
    }

    /// Storage key: sub-directory and self name joined with `/`
    pub fn full_name(
        &self,
        record: &dyn Record,
        transformation: Option<&str>,
        version: Option<u64>,
        extension: Option<&str>,
    ) -> String {
        let name = self.self_name(record, transformation, version, extension);
        let sub_dir = self.sub_dir(record);
        if sub_dir.is_empty() {
            name
        } else {
            format!("{}/{}", sub_dir, name)
        }
    }
}

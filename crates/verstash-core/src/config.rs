//! Configuration module
//!
//! Storage backend configuration (read from the environment) and the
//! per-behavior settings that describe how a record's files are named and
//! where they live.

use std::env;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::storage_types::StorageBackend;

const DEFAULT_STORAGE_PATH: &str = "./storage";
const DEFAULT_STORAGE_BASE_URL: &str = "http://localhost:8080/files";
const DEFAULT_SUB_DIR_TEMPLATE: &str = "{^^pk}/{^pk}";

fn default_temp_dir() -> PathBuf {
    env::temp_dir().join("verstash")
}

/// Storage backend configuration
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory of the local backend; each bucket is a sub-directory
    pub local_storage_path: PathBuf,
    /// Base URL files are served from
    pub base_url: String,
    /// Directory used to stage transformed files before they enter a bucket
    pub temp_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            base_url: DEFAULT_STORAGE_BASE_URL.to_string(),
            temp_dir: default_temp_dir(),
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let backend = match env::var("VERSTASH_STORAGE_BACKEND") {
            Ok(value) => value.parse::<StorageBackend>()?,
            Err(_) => StorageBackend::Local,
        };

        let local_storage_path = env::var("VERSTASH_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORAGE_PATH));

        let base_url = env::var("VERSTASH_STORAGE_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_STORAGE_BASE_URL.to_string());

        let temp_dir = env::var("VERSTASH_TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_temp_dir());

        let config = StorageConfig {
            backend,
            local_storage_path,
            base_url,
            temp_dir,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.backend == StorageBackend::Local
            && self.local_storage_path.as_os_str().is_empty()
        {
            return Err(anyhow::anyhow!(
                "VERSTASH_STORAGE_PATH must be set when using local storage backend"
            ));
        }

        if self.base_url.trim().is_empty() {
            return Err(anyhow::anyhow!("VERSTASH_STORAGE_BASE_URL must not be empty"));
        }

        if self.temp_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("VERSTASH_TEMP_DIR must not be empty"));
        }

        Ok(())
    }
}

/// URL returned for a file that does not exist
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultUrl {
    /// Same URL for every variant
    Single(String),
    /// URL per transformation name, in declaration order
    PerVariant(IndexMap<String, String>),
}

impl DefaultUrl {
    /// Resolve the default URL for a variant.
    ///
    /// A per-variant mapping looks the variant up by name, or uses its first
    /// entry when no variant is given. Empty strings count as unset.
    pub fn for_variant(&self, variant: Option<&str>) -> Option<&str> {
        let url = match self {
            DefaultUrl::Single(url) => Some(url.as_str()),
            DefaultUrl::PerVariant(urls) => match variant {
                Some(name) => urls.get(name).map(String::as_str),
                None => urls.first().map(|(_, url)| url.as_str()),
            },
        };
        url.filter(|url| !url.is_empty())
    }
}

/// Settings shared by the single-file and transformation behaviors
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBehaviorSettings {
    /// Name of the virtual upload field
    pub file_attribute: String,
    /// Bucket name; derived from the record type when unset
    pub bucket: Option<String>,
    /// Sub-directory template, see the `template` module of the `verstash` crate
    pub sub_dir_template: Option<String>,
    /// Record attribute holding the file extension
    pub extension_attribute: String,
    /// Record attribute holding the file version
    pub version_attribute: String,
    /// Index of the upload field for tabular input
    pub tabular_index: Option<usize>,
    pub default_url: Option<DefaultUrl>,
    /// Fetch uploads from the intake layer when nothing is attached explicitly
    pub auto_fetch_upload: bool,
    /// Staging directory for transformed files
    pub temp_dir: PathBuf,
}

impl Default for FileBehaviorSettings {
    fn default() -> Self {
        Self {
            file_attribute: "file".to_string(),
            bucket: None,
            sub_dir_template: Some(DEFAULT_SUB_DIR_TEMPLATE.to_string()),
            extension_attribute: "file_extension".to_string(),
            version_attribute: "file_version".to_string(),
            tabular_index: None,
            default_url: None,
            auto_fetch_upload: true,
            temp_dir: default_temp_dir(),
        }
    }
}

impl FileBehaviorSettings {
    /// Settings with the staging directory taken from the storage configuration
    pub fn from_storage_config(config: &StorageConfig) -> Self {
        Self {
            temp_dir: config.temp_dir.clone(),
            ..Self::default()
        }
    }
}

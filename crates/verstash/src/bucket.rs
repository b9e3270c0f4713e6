use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;
use verstash_core::Record;
use verstash_storage::{Bucket, StorageProvider};

use crate::error::{FileError, FileResult};
use crate::template::type_id;

/// Which bucket a behavior stores its files in
#[derive(Clone, Default)]
pub enum BucketTarget {
    /// Bucket named after the record type, e.g. `user-avatar`
    #[default]
    Default,
    Named(String),
    /// Already resolved bucket
    Handle(Arc<dyn Bucket>),
}

impl fmt::Debug for BucketTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketTarget::Default => f.write_str("Default"),
            BucketTarget::Named(name) => f.debug_tuple("Named").field(name).finish(),
            BucketTarget::Handle(bucket) => f.debug_tuple("Handle").field(&bucket.name()).finish(),
        }
    }
}

impl From<Option<String>> for BucketTarget {
    fn from(name: Option<String>) -> Self {
        name.map(BucketTarget::Named).unwrap_or_default()
    }
}

/// Default bucket name for a record type
pub fn default_bucket_name(type_name: &str) -> String {
    type_id(type_name)
}

/// Resolves a behavior's bucket once and memoizes the handle.
///
/// Named and default buckets are created through the storage provider when
/// they do not exist yet.
pub struct BucketResolver {
    provider: Option<Arc<dyn StorageProvider>>,
    target: BucketTarget,
    resolved: OnceCell<Arc<dyn Bucket>>,
}

impl BucketResolver {
    pub fn new(provider: Option<Arc<dyn StorageProvider>>, target: BucketTarget) -> Self {
        let resolved = match &target {
            BucketTarget::Handle(bucket) => OnceCell::new_with(Some(Arc::clone(bucket))),
            _ => OnceCell::new(),
        };

        Self {
            provider,
            target,
            resolved,
        }
    }

    pub fn target(&self) -> &BucketTarget {
        &self.target
    }

    /// Bucket handle, provisioning the bucket on first use
    pub async fn resolve(&self, record: &dyn Record) -> FileResult<Arc<dyn Bucket>> {
        let bucket = self
            .resolved
            .get_or_try_init(|| self.provision(record))
            .await?;
        Ok(Arc::clone(bucket))
    }

    async fn provision(&self, record: &dyn Record) -> FileResult<Arc<dyn Bucket>> {
        let name = match &self.target {
            BucketTarget::Handle(bucket) => return Ok(Arc::clone(bucket)),
            BucketTarget::Named(name) => name.clone(),
            BucketTarget::Default => default_bucket_name(record.type_name()),
        };

        let provider = self.provider.as_ref().ok_or_else(|| {
            FileError::Configuration(format!(
                "No storage provider configured to resolve bucket '{}'",
                name
            ))
        })?;

        if !provider.has_bucket(&name).await? {
            provider.add_bucket(&name).await?;
        }

        tracing::debug!(bucket = %name, backend = %provider.backend_type(), "Bucket resolved");
        Ok(provider.get_bucket(&name).await?)
    }
}

impl fmt::Debug for BucketResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketResolver")
            .field("target", &self.target)
            .field("resolved", &self.resolved.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use verstash_core::{MemoryRecord, StorageBackend};
    use verstash_storage::{MemoryStorage, StorageResult};

    /// Provider counting lookups, delegating to memory storage
    struct CountingProvider {
        inner: MemoryStorage,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl StorageProvider for CountingProvider {
        async fn has_bucket(&self, name: &str) -> StorageResult<bool> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.has_bucket(name).await
        }

        async fn add_bucket(&self, name: &str) -> StorageResult<()> {
            self.inner.add_bucket(name).await
        }

        async fn get_bucket(&self, name: &str) -> StorageResult<Arc<dyn Bucket>> {
            self.inner.get_bucket(name).await
        }

        fn backend_type(&self) -> StorageBackend {
            StorageBackend::Memory
        }
    }

    #[test]
    fn test_default_bucket_name() {
        assert_eq!(default_bucket_name("app::models::UserAvatar"), "user-avatar");
        assert_eq!(default_bucket_name("Item"), "item");
    }

    #[tokio::test]
    async fn test_default_bucket_is_created_once() {
        let provider = Arc::new(CountingProvider {
            inner: MemoryStorage::default(),
            lookups: AtomicUsize::new(0),
        });
        let resolver = BucketResolver::new(
            Some(provider.clone() as Arc<dyn StorageProvider>),
            BucketTarget::Default,
        );
        let record = MemoryRecord::new("app::models::UserAvatar");

        let first = resolver.resolve(&record).await.unwrap();
        let second = resolver.resolve(&record).await.unwrap();

        assert_eq!(first.name(), "user-avatar");
        assert_eq!(second.name(), "user-avatar");
        assert!(provider.inner.has_bucket("user-avatar").await.unwrap());
        assert_eq!(provider.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handle_needs_no_provider() {
        let storage = MemoryStorage::default();
        storage.add_bucket("given").await.unwrap();
        let handle = storage.get_bucket("given").await.unwrap();

        let resolver = BucketResolver::new(None, BucketTarget::Handle(handle));
        let bucket = resolver.resolve(&MemoryRecord::new("app::X")).await.unwrap();
        assert_eq!(bucket.name(), "given");
    }

    #[tokio::test]
    async fn test_missing_provider_is_configuration_error() {
        let resolver = BucketResolver::new(None, BucketTarget::Named("files".into()));
        let result = resolver.resolve(&MemoryRecord::new("app::X")).await;
        assert!(matches!(result, Err(FileError::Configuration(_))));
    }
}

use crate::traits::{FileTransformer, TransformResult, TransformSettings};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Transformer storing the source unchanged, ignoring its settings
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyTransformer;

#[async_trait]
impl FileTransformer for CopyTransformer {
    async fn transform(
        &self,
        source: &Path,
        destination: &Path,
        _settings: &TransformSettings,
    ) -> TransformResult<bool> {
        if !tokio::fs::try_exists(source).await? {
            return Ok(false);
        }
        tokio::fs::copy(source, destination).await?;
        Ok(true)
    }
}

type TransformFn = dyn Fn(&Path, &Path, &TransformSettings) -> TransformResult<bool> + Send + Sync;

/// Transformer wrapping a blocking closure
///
/// The closure runs on the blocking thread pool, so it may do synchronous I/O.
#[derive(Clone)]
pub struct FnTransformer {
    func: Arc<TransformFn>,
}

impl FnTransformer {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Path, &Path, &TransformSettings) -> TransformResult<bool> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }
}

impl std::fmt::Debug for FnTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTransformer").finish_non_exhaustive()
    }
}

#[async_trait]
impl FileTransformer for FnTransformer {
    async fn transform(
        &self,
        source: &Path,
        destination: &Path,
        settings: &TransformSettings,
    ) -> TransformResult<bool> {
        let func = Arc::clone(&self.func);
        let source = source.to_path_buf();
        let destination = destination.to_path_buf();
        let settings = settings.clone();

        tokio::task::spawn_blocking(move || func(&source, &destination, &settings))
            .await
            .map_err(|e| crate::TransformError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransformError;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_copy_transformer() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.dat");
        let destination = dir.path().join("out.dat");
        std::fs::write(&source, b"payload").unwrap();

        let copied = CopyTransformer
            .transform(&source, &destination, &json!({"ignored": true}))
            .await
            .unwrap();
        assert!(copied);
        assert_eq!(std::fs::read(&destination).unwrap(), b"payload");

        let missing = CopyTransformer
            .transform(&dir.path().join("none"), &destination, &json!(null))
            .await
            .unwrap();
        assert!(!missing);
    }

    #[tokio::test]
    async fn test_fn_transformer_receives_settings() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.txt");
        let destination = dir.path().join("out.txt");
        std::fs::write(&source, b"abc").unwrap();

        let upper = FnTransformer::new(|source, destination, settings| {
            let suffix = settings["suffix"].as_str().unwrap_or_default();
            let content = std::fs::read_to_string(source)?;
            std::fs::write(destination, format!("{}{}", content.to_uppercase(), suffix))?;
            Ok(true)
        });

        assert!(upper
            .transform(&source, &destination, &json!({"suffix": "!"}))
            .await
            .unwrap());
        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "ABC!");
    }

    #[tokio::test]
    async fn test_fn_transformer_propagates_errors() {
        let failing = FnTransformer::new(|_, _, _| {
            Err(TransformError::InvalidSettings("nope".to_string()))
        });
        let result = failing
            .transform(Path::new("a"), Path::new("b"), &json!(null))
            .await;
        assert!(matches!(result, Err(TransformError::InvalidSettings(_))));
    }
}

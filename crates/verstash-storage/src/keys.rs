//! Shared key and bucket name validation for storage backends.

use crate::traits::{StorageError, StorageResult};

/// Validate a file key.
///
/// Keys are relative `/`-separated paths; empty keys, `..` segments and
/// absolute paths are rejected so no backend can escape its bucket. A `..`
/// inside a segment, as in `john..doe`, is an ordinary name.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }

    if key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|segment| segment == "..")
    {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid characters: {}",
            key
        )));
    }

    Ok(())
}

/// Validate a bucket name: a single non-empty path segment.
pub fn validate_bucket_name(name: &str) -> StorageResult<()> {
    if name.is_empty() || name == "." || name.contains("..") || name.contains(['/', '\\']) {
        return Err(StorageError::InvalidKey(format!(
            "Invalid bucket name: {:?}",
            name
        )));
    }

    Ok(())
}

/// Join a base URL and path segments with single slashes
pub fn join_url(base_url: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", base_url.trim_end_matches('/'), bucket, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        assert!(validate_key("5/4/54321_1.txt").is_ok());
        assert!(validate_key("54321_main_2.png").is_ok());
    }

    #[test]
    fn test_invalid_keys() {
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("a\\b").is_err());
        assert!(validate_key("a/../b").is_err());
        assert!(validate_key("a/..").is_err());
    }

    #[test]
    fn test_dots_inside_segment_allowed() {
        assert!(validate_key("john..doe/5_1.txt").is_ok());
        assert!(validate_key("7/a..b_1.").is_ok());
        assert!(validate_key("x/...").is_ok());
    }

    #[test]
    fn test_bucket_names() {
        assert!(validate_bucket_name("user-avatar").is_ok());
        assert!(validate_bucket_name("").is_err());
        assert!(validate_bucket_name("a/b").is_err());
        assert!(validate_bucket_name("..").is_err());
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("http://localhost/files/", "avatars", "1/1_1.png"),
            "http://localhost/files/avatars/1/1_1.png"
        );
    }
}

use verstash_core::Record;

/// Reads the file version counter kept in a record attribute.
///
/// An absent, null or unparsable value counts as version 0, meaning the
/// record has no file yet. Persisting the next version is up to the caller.
#[derive(Debug, Clone)]
pub struct VersionTracker {
    attribute: String,
}

impl VersionTracker {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn current(&self, record: &dyn Record) -> u64 {
        record
            .attribute(&self.attribute)
            .and_then(|value| value.as_u64())
            .unwrap_or(0)
    }

    pub fn next(&self, record: &dyn Record) -> u64 {
        self.current(record).saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verstash_core::{AttributeValue, MemoryRecord};

    #[test]
    fn test_absent_version_is_zero() {
        let tracker = VersionTracker::new("file_version");
        let record = MemoryRecord::new("app::File");
        assert_eq!(tracker.current(&record), 0);
        assert_eq!(tracker.next(&record), 1);

        let record = record.with_attribute("file_version", AttributeValue::Null);
        assert_eq!(tracker.current(&record), 0);
    }

    #[test]
    fn test_next_increments_current() {
        let tracker = VersionTracker::new("v");
        let record = MemoryRecord::new("app::File").with_attribute("v", 41i64);
        assert_eq!(tracker.current(&record), 41);
        assert_eq!(tracker.next(&record), 42);
    }

    #[test]
    fn test_next_at_counter_limit_does_not_overflow() {
        let tracker = VersionTracker::new("v");
        let record = MemoryRecord::new("app::File").with_attribute("v", u64::MAX.to_string());
        assert_eq!(tracker.current(&record), u64::MAX);
        assert_eq!(tracker.next(&record), u64::MAX);
    }
}

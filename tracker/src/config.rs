use crate::error::{Result, TrackerError};
use relint_issue_store::DEFAULT_CACHE_CAPACITY;
use std::path::PathBuf;

/// Configuration shared by every tracker a registry creates.
#[derive(Clone, Debug)]
pub struct TrackingConfig {
    /// Directory under which each project gets its own issue-store root.
    pub storage_root: PathBuf,

    /// How many files each project keeps live in memory before the least
    /// recently used one is written back to disk.
    pub cache_capacity: usize,
}

impl TrackingConfig {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage_root.as_os_str().is_empty() {
            return Err(TrackerError::Config("storage_root is empty".to_string()));
        }
        if self.cache_capacity == 0 {
            return Err(TrackerError::Config(
                "cache_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

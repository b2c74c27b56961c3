use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning for the publish protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Maximum number of files read concurrently while resolving one level.
    pub read_files_in_parallel: usize,
    /// Maximum number of reference levels below the uploaded files.
    pub max_depth: usize,
    /// Delete files no longer reachable from the root after a commit.
    pub prune_files: bool,
    /// Also prune after a complete publish that wrote final names directly.
    pub prune_direct_mode: bool,
    /// Age after which an uncommitted staged file is swept.
    pub stale_temp_ttl_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            read_files_in_parallel: 50,
            max_depth: 10,
            prune_files: true,
            prune_direct_mode: true,
            stale_temp_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl PublishConfig {
    /// Chunk size for concurrent reads; never zero.
    pub fn read_chunk_size(&self) -> usize {
        self.read_files_in_parallel.max(1)
    }

    pub fn stale_temp_ttl(&self) -> Duration {
        Duration::from_secs(self.stale_temp_ttl_secs)
    }
}

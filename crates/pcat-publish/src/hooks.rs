use async_trait::async_trait;
use tracing::info;

use crate::error::PublishResult;

/// Called once a publish has made a new catalog version visible.
///
/// Typical implementations invalidate read caches of the query layer.
#[async_trait]
pub trait PublishHook: Send + Sync {
    async fn on_publish_complete(&self, database_id: &str) -> PublishResult<()>;
}

/// Hook that only logs the completed publish.
pub struct LogHook;

#[async_trait]
impl PublishHook for LogHook {
    async fn on_publish_complete(&self, database_id: &str) -> PublishResult<()> {
        info!(database_id, "publish complete");
        Ok(())
    }
}

use std::sync::Arc;

use tokio::net::TcpListener;

use pcat_publish::{LogHook, PublishHook};

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::router::build_router;
use crate::state::AppState;

/// Catalog publish server.
pub struct PcatServer {
    config: ServerConfig,
    hook: Arc<dyn PublishHook>,
}

impl PcatServer {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_hook(config, Arc::new(LogHook))
    }

    /// Run `hook` after every complete publish.
    pub fn with_hook(config: ServerConfig, hook: Arc<dyn PublishHook>) -> Self {
        Self { config, hook }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState::new(&self.config, self.hook.clone()))
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            root = %self.config.storage_root.display(),
            "pcat server listening"
        );
        axum::serve(listener, app).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_construction() {
        let server = PcatServer::new(ServerConfig::default());
        assert_eq!(server.config().bind_addr, "0.0.0.0:4500".parse().unwrap());
    }

    #[test]
    fn router_builds() {
        let server = PcatServer::new(ServerConfig::default());
        let _router = server.router();
    }
}

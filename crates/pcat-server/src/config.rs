use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use pcat_publish::PublishConfig;

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Directory holding one sub-directory per database.
    pub storage_root: PathBuf,
    /// Upper bound on one multipart publish request body.
    pub max_upload_bytes: usize,
    pub publish: PublishConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 4500)),
            storage_root: PathBuf::from("uploads"),
            max_upload_bytes: 256 * 1024 * 1024,
            publish: PublishConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> ServerResult<Self> {
        let config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_toml_file(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Apply the deployment environment variables `IP_ADDRESS`, `PORT`,
    /// `FILES_PATH`, `READ_FILES_PARALLEL`, `PRUNE_FILES` and
    /// `MAX_RESOLVE_DEPTH`, looked up through `var`.
    pub fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> ServerResult<Self> {
        if let Some(ip) = var("IP_ADDRESS") {
            self.bind_addr.set_ip(parse_var::<IpAddr>("IP_ADDRESS", &ip)?);
        }
        if let Some(port) = var("PORT") {
            self.bind_addr.set_port(parse_var("PORT", &port)?);
        }
        if let Some(path) = var("FILES_PATH") {
            self.storage_root = PathBuf::from(path);
        }
        if let Some(n) = var("READ_FILES_PARALLEL") {
            self.publish.read_files_in_parallel = parse_var("READ_FILES_PARALLEL", &n)?;
        }
        if let Some(prune) = var("PRUNE_FILES") {
            self.publish.prune_files = parse_var("PRUNE_FILES", &prune)?;
        }
        if let Some(depth) = var("MAX_RESOLVE_DEPTH") {
            self.publish.max_depth = parse_var("MAX_RESOLVE_DEPTH", &depth)?;
        }
        Ok(self)
    }
}

fn parse_var<T>(key: &str, value: &str) -> ServerResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ServerError::Config(format!("{key}={value:?}: {e}")))
}

//! Configuration for the watcher.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, time::Duration};

use crate::matcher::DEFAULT_WORKERS;

/// Watcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatcherConfig {
    /// JSON-RPC endpoint of the node to watch
    #[serde(default = "default_rpc_endpoint")]
    pub rpc_endpoint: String,

    /// Address the query API listens on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Seconds between scanner ticks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Number of matcher workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Timeout for a single RPC request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_rpc_endpoint() -> String {
    "https://ethereum-rpc.publicnode.com".to_string()
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_poll_interval() -> u64 {
    5
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: default_rpc_endpoint(),
            listen_addr: default_listen_addr(),
            poll_interval_secs: default_poll_interval(),
            workers: default_workers(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl WatcherConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: WatcherConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = reqwest::Url::parse(&self.rpc_endpoint).map_err(|e| {
            anyhow::anyhow!(
                "rpc_endpoint {:?} is not a valid URL: {}",
                self.rpc_endpoint,
                e
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("rpc_endpoint must use http or https, got {}", url.scheme());
        }

        if self.workers == 0 {
            anyhow::bail!("workers must be at least 1");
        }
        if self.workers > 1_000 {
            tracing::warn!(
                "Large worker pool ({} workers) spawns a thread per worker",
                self.workers
            );
        }

        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be greater than 0");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

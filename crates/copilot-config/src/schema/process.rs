//! Local headless-server process settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Binary looked up on `PATH` when no explicit path is configured.
pub const DEFAULT_BINARY: &str = "copilot";

/// Supervised process configuration (used only in `local` mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    pub binary_path: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    /// Appended after the built-in `--headless --port <port>` arguments.
    pub extra_args: Vec<String>,
    /// Consecutive error exits tolerated before giving up (valid range: 1-20).
    pub max_restarts: u32,
    pub restart_backoff_secs: u64,
    pub probe_timeout_secs: u64,
    /// Pause between spawn and the first auth probe.
    pub startup_delay_ms: u64,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            host: "127.0.0.1".into(),
            port: 4321,
            extra_args: Vec::new(),
            max_restarts: 5,
            restart_backoff_secs: 5,
            probe_timeout_secs: 10,
            startup_delay_ms: 500,
        }
    }
}

impl ProcessConfig {
    pub fn binary(&self) -> PathBuf {
        self.binary_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BINARY))
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

//! Process control surface: launch, probe, wait, kill.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use copilot_config::ProcessConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::error::{BridgeError, CommunicationKind};

/// Path of the authentication/health probe on the headless server.
pub const AUTH_STATUS_PATH: &str = "/auth/status";

/// Environment variable the CLI reads its credential from.
pub const CLI_TOKEN_ENV: &str = "COPILOT_GITHUB_TOKEN";

/// Grace period for a killed child to be reaped.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait ManagedChild: Send {
    fn pid(&self) -> Option<u32>;

    /// Wait for exit. `None` means the process was terminated by a signal.
    async fn wait(&mut self) -> Result<Option<i32>, BridgeError>;

    /// Kill and reap within a bounded wait.
    async fn kill(&mut self);
}

#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn ManagedChild>, BridgeError>;

    /// Lightweight auth/health check. `Ok(false)` means reachable but not
    /// authenticated.
    async fn probe(&self) -> Result<bool, BridgeError>;
}

/// Launches the headless CLI server.
pub struct CliLauncher {
    binary: PathBuf,
    port: u16,
    extra_args: Vec<String>,
    personal_token: String,
    base_url: String,
    http: reqwest::Client,
}

impl CliLauncher {
    pub fn new(config: &ProcessConfig, personal_token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.probe_timeout_secs.max(1)))
            .build()
            .unwrap_or_default();
        Self {
            binary: config.binary(),
            port: config.port,
            extra_args: config.extra_args.clone(),
            personal_token: personal_token.into(),
            base_url: config.base_url(),
            http,
        }
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--headless".to_string(),
            "--port".to_string(),
            self.port.to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[async_trait]
impl ProcessLauncher for CliLauncher {
    async fn launch(&self) -> Result<Box<dyn ManagedChild>, BridgeError> {
        let mut child = tokio::process::Command::new(&self.binary)
            .args(self.args())
            .env(CLI_TOKEN_ENV, &self.personal_token)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BridgeError::ProcessSupervision(format!(
                    "failed to launch {}: {e}",
                    self.binary.display()
                ))
            })?;

        if let Some(stderr) = child.stderr.take() {
            let pid = child.id();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(pid, "cli: {line}");
                }
            });
        }

        Ok(Box::new(CliChild { child }))
    }

    async fn probe(&self) -> Result<bool, BridgeError> {
        let url = format!("{}{AUTH_STATUS_PATH}", self.base_url);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(BridgeError::communication(
                CommunicationKind::ProcessUnreachable,
                format!("auth probe returned HTTP {}", response.status().as_u16()),
            ));
        }
        let json: serde_json::Value = response.json().await?;
        Ok(json["isAuthenticated"].as_bool().unwrap_or(false))
    }
}

struct CliChild {
    child: tokio::process::Child,
}

#[async_trait]
impl ManagedChild for CliChild {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> Result<Option<i32>, BridgeError> {
        let status = self.child.wait().await.map_err(|e| {
            BridgeError::ProcessSupervision(format!("failed to wait for child: {e}"))
        })?;
        Ok(status.code())
    }

    async fn kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!(error = %e, "kill signal not delivered (already exited?)");
        }
        match tokio::time::timeout(REAP_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => debug!(code = ?status.code(), "child reaped"),
            Ok(Err(e)) => warn!(error = %e, "failed to reap child"),
            Err(_) => warn!("child did not exit within {REAP_TIMEOUT:?} after kill"),
        }
    }
}

//! Backend selection and generation settings.

use serde::{Deserialize, Serialize};

/// Hosted chat-completions endpoint used in `direct` mode.
pub const DEFAULT_CHAT_URL: &str = "https://api.githubcopilot.com/chat/completions";

pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Models offered to host UIs. Anything else is accepted with a warning.
pub const SUPPORTED_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4",
    "gpt-4-turbo",
    "gpt-3.5-turbo",
    "o3-mini",
    "o1",
    "o1-mini",
    "claude-3.5-sonnet",
    "claude-3.7-sonnet",
];

/// Where conversation turns are sent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// The hosted chat service, called directly.
    #[default]
    Direct,
    /// An HTTP bridge exposing the CLI over the network.
    Remote,
    /// A headless CLI server spawned and supervised by us.
    Local,
}

/// Backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub mode: BackendMode,
    pub model: String,
    pub chat_url: String,
    /// Base URL of the remote bridge (required in `remote` mode).
    pub remote_url: Option<String>,
    /// Upper bound for a single submit call (valid range: 1-600).
    pub request_timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::Direct,
            model: DEFAULT_MODEL.into(),
            chat_url: DEFAULT_CHAT_URL.into(),
            remote_url: None,
            request_timeout_secs: 30,
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

impl BackendConfig {
    pub fn is_supported_model(&self) -> bool {
        SUPPORTED_MODELS.contains(&self.model.as_str())
    }
}

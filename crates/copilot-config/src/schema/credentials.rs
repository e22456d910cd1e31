//! Credential configuration: the long-lived personal token and exchange knobs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Endpoint that trades a personal token for a short-lived service token.
pub const DEFAULT_TOKEN_URL: &str = "https://api.github.com/copilot_internal/v2/token";

/// Credential settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Personal token supplied by the operator. Empty means "read from env".
    pub personal_token: String,
    pub token_url: String,
    /// Service tokens are treated as stale this many seconds before expiry.
    pub refresh_margin_secs: u64,
    /// Lifetime assumed when the exchange response carries no expiry.
    pub fallback_token_ttl_secs: u64,
    /// Delay before the single retry of a transient exchange failure.
    pub exchange_retry_delay_ms: u64,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.personal_token.is_empty() {
            "<unset>"
        } else {
            "[REDACTED]"
        };
        f.debug_struct("CredentialsConfig")
            .field("personal_token", &token)
            .field("token_url", &self.token_url)
            .field("refresh_margin_secs", &self.refresh_margin_secs)
            .field("fallback_token_ttl_secs", &self.fallback_token_ttl_secs)
            .field("exchange_retry_delay_ms", &self.exchange_retry_delay_ms)
            .finish()
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            personal_token: String::new(),
            token_url: DEFAULT_TOKEN_URL.into(),
            refresh_margin_secs: 300,
            fallback_token_ttl_secs: 2 * 60 * 60,
            exchange_retry_delay_ms: 1000,
        }
    }
}

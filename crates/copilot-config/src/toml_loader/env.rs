//! Environment overrides for values operators prefer not to write to disk.

use crate::schema::BridgeConfig;
use tracing::debug;

/// Checked in order when the config carries no personal token.
pub const TOKEN_ENV_VARS: &[&str] = &["COPILOT_GITHUB_TOKEN", "GH_TOKEN", "GITHUB_TOKEN"];

/// Pick the personal token: the configured one wins, then the first
/// non-empty variable from [`TOKEN_ENV_VARS`] as reported by `lookup`.
pub fn resolve_personal_token(
    configured: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    let configured = configured.trim();
    if !configured.is_empty() {
        return Some(configured.to_string());
    }
    TOKEN_ENV_VARS.iter().find_map(|name| {
        let value = lookup(name)?;
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        debug!("using personal token from ${name}");
        Some(value.to_string())
    })
}

/// Fill an empty personal token from the process environment.
pub fn apply_env_overrides(config: &mut BridgeConfig) {
    if let Some(token) =
        resolve_personal_token(&config.credentials.personal_token, |k| std::env::var(k).ok())
    {
        config.credentials.personal_token = token;
    }
}

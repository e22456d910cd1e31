//! Bridge configuration system.
//!
//! Provides TOML-based configuration with environment overrides for the
//! personal token and full validation. All config sections use sensible
//! defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use copilot_config::{load_config, config_to_json};
//!
//! let config = load_config().expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    BackendConfig, BackendMode, BridgeConfig, ConversationConfig, CredentialsConfig,
    LoggingConfig, ProcessConfig, SUPPORTED_MODELS,
};

use copilot_common::ConfigError;
use std::path::Path;

/// Load config from the platform default path, apply environment
/// overrides, and validate strictly (including the personal token).
pub fn load_config() -> Result<BridgeConfig, ConfigError> {
    finish(toml_loader::load_default()?)
}

/// Same as [`load_config`] but from an explicit path.
pub fn load_config_from(path: &Path) -> Result<BridgeConfig, ConfigError> {
    finish(toml_loader::load_from_path(path)?)
}

fn finish(mut config: BridgeConfig) -> Result<BridgeConfig, ConfigError> {
    toml_loader::apply_env_overrides(&mut config);
    validation::validate_runtime(&config)?;
    Ok(config)
}

/// Serialize a config to pretty JSON with the personal token masked.
pub fn config_to_json(config: &BridgeConfig) -> String {
    let mut redacted = config.clone();
    if !redacted.credentials.personal_token.is_empty() {
        redacted.credentials.personal_token = "[REDACTED]".into();
    }
    serde_json::to_string_pretty(&redacted)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

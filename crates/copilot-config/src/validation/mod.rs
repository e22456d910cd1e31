//! Full configuration validation.
//!
//! Each section has its own validator; this orchestrator calls them all
//! and collects errors into a single `ConfigError`.

mod helpers;
mod sections;


use crate::schema::BridgeConfig;
use copilot_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &BridgeConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    sections::validate_credentials(&mut errors, config);
    sections::validate_backend(&mut errors, config);
    sections::validate_conversation(&mut errors, config);
    sections::validate_process(&mut errors, config);

    if !config.backend.is_supported_model() {
        tracing::warn!(
            model = %config.backend.model,
            "model is not in the supported list; sending it anyway"
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

/// Validate and additionally require a usable personal token.
pub fn validate_runtime(config: &BridgeConfig) -> Result<(), ConfigError> {
    validate(config)?;
    if config.credentials.personal_token.trim().is_empty() {
        return Err(ConfigError::MissingCredential(
            "no personal token configured; set credentials.personal_token or \
             COPILOT_GITHUB_TOKEN / GH_TOKEN / GITHUB_TOKEN"
                .into(),
        ));
    }
    Ok(())
}

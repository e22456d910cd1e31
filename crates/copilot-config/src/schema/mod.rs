//! Configuration schema types for the bridge.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! In practice a config file needs nothing but a personal token (or the
//! token in the environment) to get going.

mod backend;
mod conversation;
mod credentials;
mod process;
mod system;

pub use backend::*;
pub use conversation::*;
pub use credentials::*;
pub use process::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    pub credentials: CredentialsConfig,
    pub backend: BackendConfig,
    pub conversation: ConversationConfig,
    pub process: ProcessConfig,
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = BridgeConfig::default();
        assert_eq!(config.backend.mode, BackendMode::Direct);
        assert_eq!(config.backend.model, "gpt-4o");
        assert_eq!(config.backend.request_timeout_secs, 30);
        assert_eq!(config.credentials.refresh_margin_secs, 300);
        assert_eq!(config.process.max_restarts, 5);
        assert_eq!(config.conversation.turn_limit(), None);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: BridgeConfig = toml::from_str(
            r#"
[backend]
mode = "local"
model = "o1-mini"

[conversation]
max_turns = 20
"#,
        )
        .unwrap();
        assert_eq!(config.backend.mode, BackendMode::Local);
        assert_eq!(config.backend.model, "o1-mini");
        assert_eq!(config.backend.max_tokens, 1000);
        assert_eq!(config.conversation.turn_limit(), Some(20));
        assert_eq!(config.process.port, 4321);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let result: Result<BridgeConfig, _> = toml::from_str("[backend]\nmode = \"carrier-pigeon\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn process_binary_falls_back_to_path_lookup() {
        let mut process = ProcessConfig::default();
        assert_eq!(process.binary(), std::path::PathBuf::from("copilot"));
        process.binary_path = Some("/opt/copilot/bin/copilot".into());
        assert_eq!(
            process.binary(),
            std::path::PathBuf::from("/opt/copilot/bin/copilot")
        );
        assert_eq!(process.base_url(), "http://127.0.0.1:4321");
    }

    #[test]
    fn supported_model_check() {
        let mut backend = BackendConfig::default();
        assert!(backend.is_supported_model());
        backend.model = "gpt-17-ultra".into();
        assert!(!backend.is_supported_model());
    }

    #[test]
    fn logging_directive_scopes_workspace() {
        let logging = LoggingConfig {
            level: LogLevel::Debug,
        };
        assert_eq!(logging.directive(), "copilot=debug");
    }
}

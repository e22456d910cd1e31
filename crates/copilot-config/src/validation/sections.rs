//! Per-section validation: credentials, backend, conversation, process.

use crate::schema::{BackendMode, BridgeConfig};

use super::helpers::{validate_range, validate_range_f64};

pub(crate) fn validate_credentials(errors: &mut Vec<String>, config: &BridgeConfig) {
    let creds = &config.credentials;
    if !is_http_url(&creds.token_url) {
        errors.push(format!(
            "credentials.token_url = {:?} must be an http(s) URL",
            creds.token_url
        ));
    }
    validate_range(
        errors,
        "credentials.refresh_margin_secs",
        creds.refresh_margin_secs,
        0,
        3600,
    );
    validate_range(
        errors,
        "credentials.fallback_token_ttl_secs",
        creds.fallback_token_ttl_secs,
        60,
        86_400,
    );
    validate_range(
        errors,
        "credentials.exchange_retry_delay_ms",
        creds.exchange_retry_delay_ms,
        0,
        30_000,
    );
}

pub(crate) fn validate_backend(errors: &mut Vec<String>, config: &BridgeConfig) {
    let backend = &config.backend;
    if backend.model.trim().is_empty() {
        errors.push("backend.model must not be empty".into());
    }
    validate_range(
        errors,
        "backend.request_timeout_secs",
        backend.request_timeout_secs,
        1,
        600,
    );
    validate_range(
        errors,
        "backend.max_tokens",
        u64::from(backend.max_tokens),
        1,
        100_000,
    );
    validate_range_f64(errors, "backend.temperature", backend.temperature, 0.0, 2.0);

    match backend.mode {
        BackendMode::Direct => {
            if !is_http_url(&backend.chat_url) {
                errors.push(format!(
                    "backend.chat_url = {:?} must be an http(s) URL",
                    backend.chat_url
                ));
            }
        }
        BackendMode::Remote => match backend.remote_url.as_deref() {
            Some(url) if is_http_url(url) => {}
            Some(url) => errors.push(format!(
                "backend.remote_url = {url:?} must be an http(s) URL"
            )),
            None => errors.push("backend.remote_url is required when mode = \"remote\"".into()),
        },
        BackendMode::Local => {}
    }
}

pub(crate) fn validate_conversation(errors: &mut Vec<String>, config: &BridgeConfig) {
    validate_range(
        errors,
        "conversation.max_turns",
        u64::from(config.conversation.max_turns),
        0,
        10_000,
    );
}

pub(crate) fn validate_process(errors: &mut Vec<String>, config: &BridgeConfig) {
    if config.backend.mode != BackendMode::Local {
        return;
    }
    let process = &config.process;
    validate_range(
        errors,
        "process.max_restarts",
        u64::from(process.max_restarts),
        1,
        20,
    );
    validate_range(
        errors,
        "process.restart_backoff_secs",
        process.restart_backoff_secs,
        0,
        300,
    );
    validate_range(
        errors,
        "process.probe_timeout_secs",
        process.probe_timeout_secs,
        1,
        120,
    );
    validate_range(
        errors,
        "process.startup_delay_ms",
        process.startup_delay_ms,
        0,
        60_000,
    );
    if process.port == 0 {
        errors.push("process.port must be a fixed, non-zero port".into());
    }
    if process.host.trim().is_empty() {
        errors.push("process.host must not be empty".into());
    }
    if let Some(ref path) = process.binary_path {
        if !path.exists() {
            errors.push(format!(
                "process.binary_path = {} does not exist",
                path.display()
            ));
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

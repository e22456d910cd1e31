//! Stable error taxonomy shared by every layer of the bridge.

use std::fmt;

/// Why a request never produced a usable answer from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunicationKind {
    Timeout,
    Network,
    ProcessUnreachable,
    InvalidResponse,
    EndpointNotFound,
}

impl fmt::Display for CommunicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommunicationKind::Timeout => "timeout",
            CommunicationKind::Network => "network",
            CommunicationKind::ProcessUnreachable => "process unreachable",
            CommunicationKind::InvalidResponse => "invalid response",
            CommunicationKind::EndpointNotFound => "endpoint not found",
        };
        f.write_str(s)
    }
}

/// Machine-readable category for host adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Communication,
    RateLimit,
    Api,
    ProcessSupervision,
}

/// Every failure the bridge reports. `Clone` so one exchange result can be
/// handed to all coalesced waiters.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("communication error ({kind}): {message}")]
    Communication {
        kind: CommunicationKind,
        message: String,
    },

    #[error("API error{}: {message}", status_suffix(.status))]
    Api {
        /// `None` when the request was rejected before it was sent.
        status: Option<u16>,
        message: String,
    },

    #[error("process supervision error: {0}")]
    ProcessSupervision(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

impl BridgeError {
    pub fn communication(kind: CommunicationKind, message: impl Into<String>) -> Self {
        Self::Communication {
            kind,
            message: message.into(),
        }
    }

    pub fn api(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BridgeError::Authentication(_) => ErrorCategory::Authentication,
            BridgeError::Communication { .. } => ErrorCategory::Communication,
            BridgeError::Api { status: Some(429), .. } => ErrorCategory::RateLimit,
            BridgeError::Api { .. } => ErrorCategory::Api,
            BridgeError::ProcessSupervision(_) => ErrorCategory::ProcessSupervision,
        }
    }

    /// Short message suitable for an end user. Never includes backend detail.
    pub fn user_message(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Authentication => "authentication failed",
            ErrorCategory::Communication => "could not reach the service",
            ErrorCategory::RateLimit | ErrorCategory::Api => "the service rejected the request",
            ErrorCategory::ProcessSupervision => "the assistant backend is unavailable",
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.category() == ErrorCategory::RateLimit
    }

    /// Network blips and timeouts. Unreachable processes and bad payloads are
    /// not expected to fix themselves within a retry delay.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BridgeError::Communication {
                kind: CommunicationKind::Timeout | CommunicationKind::Network,
                ..
            }
        )
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            CommunicationKind::Timeout
        } else if err.is_decode() {
            CommunicationKind::InvalidResponse
        } else {
            CommunicationKind::Network
        };
        // Query strings may carry credentials on some endpoints.
        BridgeError::communication(kind, err.without_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_its_own_category() {
        let err = BridgeError::api(Some(429), "slow down");
        assert_eq!(err.category(), ErrorCategory::RateLimit);
        assert!(err.is_rate_limited());
        assert_eq!(err.user_message(), "the service rejected the request");
    }

    #[test]
    fn user_messages_per_category() {
        assert_eq!(
            BridgeError::Authentication("revoked".into()).user_message(),
            "authentication failed"
        );
        assert_eq!(
            BridgeError::communication(CommunicationKind::Timeout, "30s").user_message(),
            "could not reach the service"
        );
        assert_eq!(
            BridgeError::ProcessSupervision("gave up".into()).user_message(),
            "the assistant backend is unavailable"
        );
    }

    #[test]
    fn display_includes_status_only_when_known() {
        let sent = BridgeError::api(Some(400), "bad model");
        assert_eq!(sent.to_string(), "API error (HTTP 400): bad model");

        let local = BridgeError::api(None, "empty message");
        assert_eq!(local.to_string(), "API error: empty message");
    }

    #[test]
    fn only_timeouts_and_network_are_transient() {
        assert!(BridgeError::communication(CommunicationKind::Timeout, "").is_transient());
        assert!(BridgeError::communication(CommunicationKind::Network, "").is_transient());
        assert!(
            !BridgeError::communication(CommunicationKind::ProcessUnreachable, "").is_transient()
        );
        assert!(!BridgeError::Authentication("x".into()).is_transient());
        assert!(!BridgeError::api(Some(500), "x").is_transient());
    }
}

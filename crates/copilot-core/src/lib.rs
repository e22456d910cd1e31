//! Session, credential and process-supervision core of the Copilot bridge.
//!
//! Provides:
//! - A service-token cache with single-flight refresh from a personal token
//! - A chat transport with bounded timeouts and one auth-retry
//! - Per-conversation, in-memory history with ordered turns
//! - Supervision of a local headless CLI server with bounded restarts
//!
//! History lives only in memory; restarting the process clears every
//! conversation.

pub mod auth;
pub mod bridge;
pub mod error;
pub mod session;
pub mod supervisor;
pub mod token_tracker;
pub mod transport;

#[cfg(test)]
mod testing;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use copilot_common::ConversationId;

pub use auth::{CredentialExchanger, GithubTokenExchange, ServiceToken, TokenCache, TokenExchange};
pub use bridge::CopilotBridge;
pub use error::{BridgeError, CommunicationKind, ErrorCategory};
pub use session::{ConversationHistory, ConversationSession};
pub use supervisor::{ProcessSupervisor, SupervisorHandle, SupervisorState};
pub use token_tracker::TokenTracker;
pub use transport::{BackendTransport, ChatBackend, GenerationSettings, HttpChatBackend};

/// The surface a host adapter talks to.
#[async_trait]
pub trait ConversationAgent: Send + Sync {
    /// Submit one user message and return the assistant's reply.
    async fn process(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<String, BridgeError>;

    /// One exchange plus one lightweight call; never touches history.
    async fn test_connection(&self) -> Result<bool, BridgeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a conversation. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Successful result of one backend call.
#[derive(Debug, Clone)]
pub struct BackendReply {
    pub content: String,
    pub usage: TokenUsage,
    /// Model reported by the backend, when it says.
    pub model: Option<String>,
    pub latency: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

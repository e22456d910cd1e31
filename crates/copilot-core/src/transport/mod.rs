//! Backend transport: one bounded call per submit, with a single
//! token refresh when the backend rejects the service token.

mod http;
mod local;
mod request;

pub use http::{HttpChatBackend, BRIDGE_CHAT_PATH};
pub use local::LocalProcessBackend;
pub use request::{
    classify_status, error_detail, parse_completion, ChatMessage, ChatRequest, Completion,
    CLAUDE_MODELS, REASONING_MODELS,
};

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use copilot_config::BackendConfig;
use tracing::{debug, warn};

use crate::auth::{CredentialExchanger, ServiceToken};
use crate::error::{BridgeError, CommunicationKind};
use crate::{BackendReply, ConversationTurn};

/// Something that can answer a chat-completions request.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, request: &ChatRequest, token: &str) -> Result<BackendReply, BridgeError>;
}

/// Knobs that can change at runtime without rebuilding the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl GenerationSettings {
    pub fn from_config(backend: &BackendConfig) -> Self {
        Self {
            model: backend.model.clone(),
            max_tokens: backend.max_tokens,
            temperature: backend.temperature,
        }
    }
}

pub struct BackendTransport {
    credentials: Arc<CredentialExchanger>,
    backend: Arc<dyn ChatBackend>,
    timeout: Duration,
    settings: RwLock<GenerationSettings>,
    system_prompt: Option<String>,
}

impl BackendTransport {
    pub fn new(
        credentials: Arc<CredentialExchanger>,
        backend: Arc<dyn ChatBackend>,
        timeout: Duration,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            credentials,
            backend,
            timeout,
            settings: RwLock::new(settings),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn settings(&self) -> GenerationSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_settings(&self, settings: GenerationSettings) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    pub fn credentials(&self) -> &CredentialExchanger {
        &self.credentials
    }

    /// Send `history` to the backend as `model`.
    ///
    /// An authentication rejection invalidates the token that was used and
    /// retries exactly once with a freshly resolved one. Every other error
    /// is returned as-is: a chat POST is not idempotent.
    pub async fn submit(
        &self,
        history: &[ConversationTurn],
        model: &str,
    ) -> Result<BackendReply, BridgeError> {
        let settings = self.settings();
        let request = ChatRequest::new(
            model,
            self.system_prompt.as_deref(),
            history,
            settings.max_tokens,
            settings.temperature,
        );

        let token = self.credentials.resolve_token().await?;
        match self.send_once(&request, &token).await {
            Err(BridgeError::Authentication(reason)) => {
                warn!(%reason, "backend rejected service token, refreshing once");
                self.credentials.invalidate(&token);
                let fresh = self.credentials.resolve_token().await?;
                self.send_once(&request, &fresh).await
            }
            other => other,
        }
    }

    async fn send_once(
        &self,
        request: &ChatRequest,
        token: &ServiceToken,
    ) -> Result<BackendReply, BridgeError> {
        match tokio::time::timeout(self.timeout, self.backend.send(request, &token.secret)).await {
            Ok(Ok(reply)) => {
                debug!(
                    model = %request.model,
                    latency_ms = reply.latency.as_millis() as u64,
                    input_tokens = reply.usage.input_tokens,
                    output_tokens = reply.usage.output_tokens,
                    "chat reply received"
                );
                Ok(reply)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BridgeError::communication(
                CommunicationKind::Timeout,
                format!("no response within {:?}", self.timeout),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenCache;
    use crate::testing::{FakeBackend, FakeExchange};

    fn settings() -> GenerationSettings {
        GenerationSettings {
            model: "gpt-4o".into(),
            max_tokens: 100,
            temperature: 0.5,
        }
    }

    fn transport(
        exchange: Arc<FakeExchange>,
        backend: Arc<FakeBackend>,
        timeout: Duration,
    ) -> BackendTransport {
        let credentials = Arc::new(
            CredentialExchanger::new("ghp_personal", exchange, TokenCache::new(Duration::ZERO))
                .with_retry_delay(Duration::ZERO),
        );
        BackendTransport::new(credentials, backend, timeout, settings())
    }

    fn hello() -> Vec<ConversationTurn> {
        vec![ConversationTurn::user("hello")]
    }

    #[tokio::test]
    async fn returns_reply_with_usage() {
        let exchange = Arc::new(FakeExchange::always("tid=1"));
        let backend = Arc::new(FakeBackend::replies(["hi"]));
        let transport = transport(exchange, Arc::clone(&backend), Duration::from_secs(5));

        let reply = transport.submit(&hello(), "gpt-4o").await.unwrap();
        assert_eq!(reply.content, "hi");
        assert_eq!(backend.tokens_seen(), vec!["tid=1".to_string()]);
    }

    #[tokio::test]
    async fn timeout_surfaces_communication_error() {
        let exchange = Arc::new(FakeExchange::always("tid=1"));
        let backend = Arc::new(FakeBackend::replies(["late"]).with_delay(Duration::from_secs(5)));
        let transport = transport(exchange, backend, Duration::from_millis(20));

        let err = transport.submit(&hello(), "gpt-4o").await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Communication {
                kind: CommunicationKind::Timeout,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn auth_rejection_refreshes_once_and_retries() {
        let exchange = Arc::new(FakeExchange::sequence(["tid=stale", "tid=fresh"]));
        let backend = Arc::new(FakeBackend::scripted(vec![
            Err(BridgeError::Authentication("expired".into())),
            Ok("hi".into()),
        ]));
        let transport = transport(Arc::clone(&exchange), Arc::clone(&backend), Duration::from_secs(5));

        let reply = transport.submit(&hello(), "gpt-4o").await.unwrap();
        assert_eq!(reply.content, "hi");
        assert_eq!(exchange.calls(), 2);
        assert_eq!(
            backend.tokens_seen(),
            vec!["tid=stale".to_string(), "tid=fresh".to_string()]
        );
    }

    #[tokio::test]
    async fn second_auth_rejection_surfaces_authentication_error() {
        let exchange = Arc::new(FakeExchange::sequence(["tid=a", "tid=b", "tid=c"]));
        let backend = Arc::new(FakeBackend::scripted(vec![
            Err(BridgeError::Authentication("nope".into())),
            Err(BridgeError::Authentication("still nope".into())),
        ]));
        let transport = transport(Arc::clone(&exchange), Arc::clone(&backend), Duration::from_secs(5));

        let err = transport.submit(&hello(), "gpt-4o").await.unwrap_err();
        assert!(matches!(err, BridgeError::Authentication(_)));
        assert_eq!(exchange.calls(), 2);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn api_errors_are_not_retried() {
        let exchange = Arc::new(FakeExchange::always("tid=1"));
        let backend = Arc::new(FakeBackend::scripted(vec![Err(BridgeError::api(
            Some(400),
            "model not supported",
        ))]));
        let transport = transport(Arc::clone(&exchange), Arc::clone(&backend), Duration::from_secs(5));

        let err = transport.submit(&hello(), "gpt-4o").await.unwrap_err();
        assert!(matches!(err, BridgeError::Api { status: Some(400), ref message } if message == "model not supported"));
        assert_eq!(backend.calls(), 1);
        assert_eq!(exchange.calls(), 1);
    }

    #[tokio::test]
    async fn settings_update_changes_next_request() {
        let exchange = Arc::new(FakeExchange::always("tid=1"));
        let backend = Arc::new(FakeBackend::replies(["a", "b"]));
        let transport = transport(exchange, Arc::clone(&backend), Duration::from_secs(5));

        transport.update_settings(GenerationSettings {
            model: "o1-mini".into(),
            max_tokens: 42,
            temperature: 0.1,
        });
        assert_eq!(transport.settings().max_tokens, 42);

        transport.submit(&hello(), "o1-mini").await.unwrap();
        let requests = backend.requests();
        assert_eq!(requests[0].model, "o1-mini");
        assert_eq!(requests[0].max_tokens, 42);
    }

    #[tokio::test]
    async fn system_prompt_is_sent_but_not_part_of_history() {
        let exchange = Arc::new(FakeExchange::always("tid=1"));
        let backend = Arc::new(FakeBackend::replies(["ok"]));
        let transport = transport(exchange, Arc::clone(&backend), Duration::from_secs(5))
            .with_system_prompt(Some("be brief".into()));

        let history = hello();
        transport.submit(&history, "gpt-4o").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(backend.requests()[0].messages.len(), 2);
    }
}

//! The facade host adapters talk to.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use copilot_common::{BridgeEvent, ConversationId, EventBus};
use copilot_config::{BackendMode, BridgeConfig};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::auth::{CredentialExchanger, GithubTokenExchange, TokenCache};
use crate::error::{BridgeError, CommunicationKind};
use crate::session::ConversationSession;
use crate::supervisor::{
    CliLauncher, ProcessSupervisor, SupervisorHandle, SupervisorSettings, SupervisorState,
};
use crate::token_tracker::TokenTracker;
use crate::transport::{
    BackendTransport, ChatBackend, GenerationSettings, HttpChatBackend, LocalProcessBackend,
};
use crate::{ConversationAgent, ConversationTurn};

/// Message sent by [`CopilotBridge::test_connection`].
const PROBE_MESSAGE: &str = "Hello";

pub struct CopilotBridge {
    session: ConversationSession,
    transport: Arc<BackendTransport>,
    supervisor: Option<SupervisorHandle>,
    events: Arc<EventBus>,
    startup_timeout: Duration,
}

impl CopilotBridge {
    /// Assemble a bridge from pre-built parts.
    pub fn new(
        transport: Arc<BackendTransport>,
        turn_limit: Option<usize>,
        supervisor: Option<SupervisorHandle>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            session: ConversationSession::new(Arc::clone(&transport), turn_limit),
            transport,
            supervisor,
            events,
            startup_timeout: Duration::from_secs(30),
        }
    }

    /// How long calls wait for a local server that is still starting.
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Wire the whole stack from configuration. In `local` mode this spawns
    /// the process supervisor, so it must run inside a tokio runtime.
    pub fn from_config(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let events = Arc::new(EventBus::default());
        let credentials_config = &config.credentials;
        let request_timeout = Duration::from_secs(config.backend.request_timeout_secs);

        let exchange = Arc::new(GithubTokenExchange::new(
            &credentials_config.token_url,
            request_timeout,
        )?);
        let credentials = Arc::new(
            CredentialExchanger::new(
                credentials_config.personal_token.clone(),
                exchange,
                TokenCache::new(Duration::from_secs(credentials_config.refresh_margin_secs)),
            )
            .with_fallback_ttl(Duration::from_secs(
                credentials_config.fallback_token_ttl_secs,
            ))
            .with_retry_delay(Duration::from_millis(
                credentials_config.exchange_retry_delay_ms,
            ))
            .with_events(Arc::clone(&events)),
        );

        let mut supervisor = None;
        let backend: Arc<dyn ChatBackend> = match config.backend.mode {
            BackendMode::Direct => Arc::new(
                HttpChatBackend::direct(config.backend.chat_url.clone())
                    .with_timeout(request_timeout),
            ),
            BackendMode::Remote => {
                let url = config
                    .backend
                    .remote_url
                    .as_deref()
                    .filter(|u| !u.trim().is_empty())
                    .ok_or_else(|| {
                        BridgeError::communication(
                            CommunicationKind::EndpointNotFound,
                            "remote mode requires backend.remote_url",
                        )
                    })?;
                Arc::new(HttpChatBackend::bridge(url).with_timeout(request_timeout))
            }
            BackendMode::Local => {
                let launcher = Arc::new(CliLauncher::new(
                    &config.process,
                    credentials_config.personal_token.clone(),
                ));
                let handle = ProcessSupervisor::new(
                    launcher,
                    SupervisorSettings::from_config(&config.process),
                    Arc::clone(&events),
                )
                .spawn();
                supervisor = Some(handle.clone());
                Arc::new(LocalProcessBackend::new(
                    HttpChatBackend::bridge(&config.process.base_url())
                        .with_timeout(request_timeout),
                    handle,
                ))
            }
        };

        info!(
            mode = ?config.backend.mode,
            model = %config.backend.model,
            "bridge configured"
        );

        let transport = Arc::new(
            BackendTransport::new(
                credentials,
                backend,
                request_timeout,
                GenerationSettings::from_config(&config.backend),
            )
            .with_system_prompt(config.conversation.system_prompt.clone()),
        );

        let startup_timeout = Duration::from_millis(config.process.startup_delay_ms)
            + Duration::from_secs(config.process.probe_timeout_secs)
            + request_timeout;

        Ok(Self::new(
            transport,
            config.conversation.turn_limit(),
            supervisor,
            events,
        )
        .with_startup_timeout(startup_timeout))
    }

    pub async fn process(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<String, BridgeError> {
        self.session
            .process_when_ready(conversation_id, text, self.ensure_backend_ready())
            .await
    }

    /// One exchange plus one minimal chat call. History is not touched.
    pub async fn test_connection(&self) -> Result<bool, BridgeError> {
        self.ensure_backend_ready().await?;
        let model = self.transport.settings().model;
        let reply = self
            .transport
            .submit(&[ConversationTurn::user(PROBE_MESSAGE)], &model)
            .await?;
        info!(model = %model, latency_ms = reply.latency.as_millis() as u64, "connection test passed");
        Ok(true)
    }

    /// Swap generation settings in place. History and the token cache
    /// are kept.
    pub fn update_settings(&self, settings: GenerationSettings) {
        if !copilot_config::SUPPORTED_MODELS.contains(&settings.model.as_str()) {
            warn!(model = %settings.model, "model is not in the supported list");
        }
        info!(model = %settings.model, "generation settings updated");
        self.transport.update_settings(settings);
    }

    pub fn settings(&self) -> GenerationSettings {
        self.transport.settings()
    }

    pub fn reset(&self, conversation_id: &ConversationId) -> bool {
        self.session.reset(conversation_id)
    }

    pub fn clear(&self) {
        self.session.clear();
    }

    pub async fn history(&self, conversation_id: &ConversationId) -> Vec<ConversationTurn> {
        self.session.history(conversation_id).await
    }

    pub fn conversation_count(&self) -> usize {
        self.session.conversation_count()
    }

    pub fn usage(&self) -> TokenTracker {
        self.session.usage()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// `None` unless running in local mode.
    pub fn supervisor_state(&self) -> Option<SupervisorState> {
        self.supervisor.as_ref().map(SupervisorHandle::state)
    }

    /// Stop the supervised process, if any. Conversations stay in memory
    /// until the bridge is dropped.
    pub async fn shutdown(&self) {
        if let Some(supervisor) = &self.supervisor {
            supervisor.shutdown().await;
        }
    }

    async fn ensure_backend_ready(&self) -> Result<(), BridgeError> {
        match &self.supervisor {
            Some(supervisor) => supervisor.wait_until_running(self.startup_timeout).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ConversationAgent for CopilotBridge {
    async fn process(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<String, BridgeError> {
        CopilotBridge::process(self, conversation_id, text).await
    }

    async fn test_connection(&self) -> Result<bool, BridgeError> {
        CopilotBridge::test_connection(self).await
    }
}

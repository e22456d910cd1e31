use async_trait::async_trait;

use super::http::HttpChatBackend;
use super::request::ChatRequest;
use super::ChatBackend;
use crate::error::{BridgeError, CommunicationKind};
use crate::supervisor::{SupervisorHandle, SupervisorState};
use crate::BackendReply;

/// Chat backend served by the supervised local CLI server. Calls are only
/// attempted while the supervisor reports `Running`.
pub struct LocalProcessBackend {
    http: HttpChatBackend,
    supervisor: SupervisorHandle,
}

impl LocalProcessBackend {
    pub fn new(http: HttpChatBackend, supervisor: SupervisorHandle) -> Self {
        Self { http, supervisor }
    }
}

#[async_trait]
impl ChatBackend for LocalProcessBackend {
    async fn send(&self, request: &ChatRequest, token: &str) -> Result<BackendReply, BridgeError> {
        match self.supervisor.state() {
            SupervisorState::Running => {}
            SupervisorState::Failed { reason } => {
                return Err(BridgeError::ProcessSupervision(reason));
            }
            other => {
                return Err(BridgeError::communication(
                    CommunicationKind::ProcessUnreachable,
                    format!("local server is {}", other.name()),
                ));
            }
        }

        self.http.send(request, token).await.map_err(|e| match e {
            BridgeError::Communication {
                kind: CommunicationKind::Network,
                message,
            } => BridgeError::communication(CommunicationKind::ProcessUnreachable, message),
            other => other,
        })
    }
}

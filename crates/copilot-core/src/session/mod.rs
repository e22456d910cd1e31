//! Conversation orchestration over an in-memory store.
//!
//! Each conversation id owns its own history behind an async mutex, so
//! turns for one id are submitted strictly in arrival order while other
//! ids proceed independently. Nothing is persisted.

mod history;

pub use history::ConversationHistory;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use copilot_common::ConversationId;
use tracing::{debug, warn};

use crate::error::BridgeError;
use crate::token_tracker::TokenTracker;
use crate::transport::BackendTransport;
use crate::ConversationTurn;

type SharedHistory = Arc<tokio::sync::Mutex<ConversationHistory>>;

pub struct ConversationSession {
    transport: Arc<BackendTransport>,
    conversations: Mutex<HashMap<ConversationId, SharedHistory>>,
    turn_limit: Option<usize>,
    tracker: Mutex<TokenTracker>,
}

impl ConversationSession {
    pub fn new(transport: Arc<BackendTransport>, turn_limit: Option<usize>) -> Self {
        Self {
            transport,
            conversations: Mutex::new(HashMap::new()),
            turn_limit,
            tracker: Mutex::new(TokenTracker::new()),
        }
    }

    /// Append `text` as a user turn, submit the history, and append the
    /// reply. On error the user turn stays and no reply is recorded.
    pub async fn process(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<String, BridgeError> {
        self.process_when_ready(conversation_id, text, async { Ok(()) })
            .await
    }

    /// Like [`process`](Self::process), but awaits `ready` once this turn
    /// holds the conversation's slot. Turns queued behind it keep their
    /// order however long `ready` takes. If `ready` fails, history is left
    /// untouched.
    pub async fn process_when_ready<F>(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        ready: F,
    ) -> Result<String, BridgeError>
    where
        F: Future<Output = Result<(), BridgeError>>,
    {
        if text.trim().is_empty() {
            return Err(BridgeError::api(None, "message is empty"));
        }

        let entry = self.entry(conversation_id);
        let mut history = entry.lock().await;
        ready.await?;
        history.push(ConversationTurn::user(text));

        let model = self.transport.settings().model;
        debug!(
            conversation_id = %conversation_id,
            turns = history.len(),
            model = %model,
            "submitting turn"
        );

        let result = self.transport.submit(history.turns(), &model).await;
        match result {
            Ok(reply) => {
                self.tracker
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .record(&model, &reply.usage);
                history.push(ConversationTurn::assistant(reply.content.clone()));
                Ok(reply.content)
            }
            Err(e) => {
                warn!(
                    conversation_id = %conversation_id,
                    category = ?e.category(),
                    error = %e,
                    "turn failed"
                );
                Err(e)
            }
        }
    }

    /// Forget one conversation. Returns whether it existed.
    pub fn reset(&self, conversation_id: &ConversationId) -> bool {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(conversation_id)
            .is_some()
    }

    /// Forget every conversation.
    pub fn clear(&self) {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Snapshot of one conversation. Waits for an in-flight turn on that id.
    pub async fn history(&self, conversation_id: &ConversationId) -> Vec<ConversationTurn> {
        let entry = self
            .conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(conversation_id)
            .cloned();
        match entry {
            Some(entry) => entry.lock().await.snapshot(),
            None => Vec::new(),
        }
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn usage(&self) -> TokenTracker {
        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn entry(&self, conversation_id: &ConversationId) -> SharedHistory {
        let mut conversations = self
            .conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            conversations
                .entry(conversation_id.clone())
                .or_insert_with(|| {
                    debug!(conversation_id = %conversation_id, "new conversation");
                    Arc::new(tokio::sync::Mutex::new(ConversationHistory::new(
                        self.turn_limit,
                    )))
                }),
        )
    }
}

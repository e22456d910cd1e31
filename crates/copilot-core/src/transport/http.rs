//! HTTP chat backend shared by all three backend modes.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use copilot_common::new_request_id;
use tracing::debug;

use super::request::{classify_status, parse_completion, ChatRequest};
use super::ChatBackend;
use crate::error::BridgeError;
use crate::BackendReply;

pub const EDITOR_VERSION: &str = "vscode/1.95.0";
pub const EDITOR_PLUGIN_VERSION: &str = "copilot-chat/0.22.4";
pub const CHAT_USER_AGENT: &str = "GitHubCopilotChat/0.22.4";
pub const INTEGRATION_ID: &str = "vscode-chat";

/// Path appended to a bridge base URL in remote and local mode.
pub const BRIDGE_CHAT_PATH: &str = "/v1/chat/completions";

#[derive(Debug, Clone)]
enum Flavor {
    /// Hosted service; needs editor identification headers.
    Hosted { machine_id: String, session_id: String },
    Bridge,
}

/// Sends chat-completions requests over HTTP.
pub struct HttpChatBackend {
    http: reqwest::Client,
    url: String,
    flavor: Flavor,
}

impl HttpChatBackend {
    /// The hosted chat endpoint.
    pub fn direct(chat_url: impl Into<String>) -> Self {
        let session_id = format!(
            "{}{}",
            uuid::Uuid::new_v4(),
            chrono::Utc::now().timestamp_millis()
        );
        Self {
            http: reqwest::Client::new(),
            url: chat_url.into(),
            flavor: Flavor::Hosted {
                machine_id: uuid::Uuid::new_v4().to_string(),
                session_id,
            },
        }
    }

    /// An HTTP bridge (remote or locally supervised) at `base_url`.
    pub fn bridge(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: format!("{}{}", base_url.trim_end_matches('/'), BRIDGE_CHAT_PATH),
            flavor: Flavor::Bridge,
        }
    }

    /// Builder: bound each request at the HTTP client level too.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let Ok(client) = reqwest::Client::builder().timeout(timeout).build() {
            self.http = client;
        }
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn send(&self, request: &ChatRequest, token: &str) -> Result<BackendReply, BridgeError> {
        let body = request.to_body();
        let started = Instant::now();

        debug!(model = %request.model, url = %self.url, "chat request");

        let mut builder = self
            .http
            .post(&self.url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json")
            .header("x-request-id", new_request_id());

        if let Flavor::Hosted {
            machine_id,
            session_id,
        } = &self.flavor
        {
            builder = builder
                .header("vscode-machineid", machine_id)
                .header("vscode-sessionid", session_id)
                .header("openai-organization", "github-copilot")
                .header("openai-intent", "conversation-panel")
                .header("Copilot-Integration-Id", INTEGRATION_ID)
                .header("editor-version", EDITOR_VERSION)
                .header("editor-plugin-version", EDITOR_PLUGIN_VERSION)
                .header("User-Agent", CHAT_USER_AGENT);
        }

        let response = builder.json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "chat request failed");
            return Err(classify_status(status.as_u16(), &text));
        }

        let text = response.text().await?;
        let completion = parse_completion(&text)?;

        Ok(BackendReply {
            content: completion.content,
            usage: completion.usage,
            model: completion.model,
            latency: started.elapsed(),
        })
    }
}

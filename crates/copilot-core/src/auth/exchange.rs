//! The credential exchange call: personal token in, service token out.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use crate::error::{BridgeError, CommunicationKind};
use crate::transport::error_detail;

pub const EXCHANGE_USER_AGENT: &str = "GitHubCopilotChat/0.22.4";

/// Raw result of one exchange. `expires_at` is absent when the service
/// did not report one.
#[derive(Debug, Clone)]
pub struct ExchangedToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self, personal_token: &str) -> Result<ExchangedToken, BridgeError>;
}

/// Calls the hosted token endpoint.
pub struct GithubTokenExchange {
    http: reqwest::Client,
    token_url: String,
}

impl GithubTokenExchange {
    pub fn new(token_url: impl Into<String>, timeout: Duration) -> Result<Self, BridgeError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BridgeError::from)?;
        Ok(Self {
            http,
            token_url: token_url.into(),
        })
    }
}

#[async_trait]
impl TokenExchange for GithubTokenExchange {
    async fn exchange(&self, personal_token: &str) -> Result<ExchangedToken, BridgeError> {
        debug!(url = %self.token_url, "exchanging personal token");

        let response = self
            .http
            .get(&self.token_url)
            .header("Authorization", format!("token {personal_token}"))
            .header("Accept", "application/json")
            .header("User-Agent", EXCHANGE_USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(BridgeError::Authentication(format!(
                "personal token rejected (HTTP {})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let (detail, _) = error_detail(&text);
            return Err(BridgeError::api(
                Some(status.as_u16()),
                format!("failed to get service token: {detail}"),
            ));
        }

        let text = response.text().await?;
        parse_exchange_body(&text)
    }
}

pub(crate) fn parse_exchange_body(text: &str) -> Result<ExchangedToken, BridgeError> {
    let json: serde_json::Value = serde_json::from_str(text).map_err(|e| {
        BridgeError::communication(
            CommunicationKind::InvalidResponse,
            format!("token exchange returned invalid JSON: {e}"),
        )
    })?;

    let token = json["token"]
        .as_str()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| BridgeError::api(Some(200), "token exchange response has no token"))?
        .to_string();

    let expires_at = json["expires_at"]
        .as_i64()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    Ok(ExchangedToken { token, expires_at })
}

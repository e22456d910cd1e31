//! Chat-completions request shaping and response/error parsing.

use tracing::info;

use crate::error::{BridgeError, CommunicationKind};
use crate::{ConversationTurn, TokenUsage};

/// Models that take `max_completion_tokens` and reject `temperature`.
pub const REASONING_MODELS: &[&str] = &["o1", "o1-mini", "o3-mini"];

/// Models whose temperature must stay within `[0, 1]`.
pub const CLAUDE_MODELS: &[&str] = &["claude-3.5-sonnet", "claude-3.7-sonnet"];

const UNKNOWN_ERROR: &str = "Unknown error";

/// Wire message. `role` is `system` only for the leading system prompt.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// One outgoing chat-completions call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl ChatRequest {
    /// `system_prompt` is sent first and never appears in history.
    pub fn new(
        model: impl Into<String>,
        system_prompt: Option<&str>,
        history: &[ConversationTurn],
        max_tokens: u32,
        temperature: f64,
    ) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(prompt) = system_prompt.filter(|p| !p.trim().is_empty()) {
            messages.push(ChatMessage {
                role: "system",
                content: prompt.to_string(),
            });
        }
        messages.extend(history.iter().map(|turn| ChatMessage {
            role: turn.role.as_str(),
            content: turn.content.clone(),
        }));

        Self {
            model: model.into(),
            messages,
            max_tokens,
            temperature,
        }
    }

    pub fn to_body(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "messages": self.messages,
            "model": self.model,
            "stream": false,
        });

        let model = self.model.as_str();
        if REASONING_MODELS.contains(&model) {
            body["max_completion_tokens"] = self.max_tokens.into();
        } else if CLAUDE_MODELS.contains(&model) {
            let clamped = self.temperature.clamp(0.0, 1.0);
            if clamped != self.temperature {
                info!(
                    model,
                    requested = self.temperature,
                    clamped,
                    "temperature clamped for model"
                );
            }
            body["max_tokens"] = self.max_tokens.into();
            body["temperature"] = clamped.into();
        } else {
            body["max_tokens"] = self.max_tokens.into();
            body["temperature"] = self.temperature.into();
        }

        body
    }
}

/// Parsed 2xx response.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub usage: TokenUsage,
    pub model: Option<String>,
}

pub fn parse_completion(text: &str) -> Result<Completion, BridgeError> {
    let json: serde_json::Value = serde_json::from_str(text).map_err(|e| {
        BridgeError::communication(
            CommunicationKind::InvalidResponse,
            format!("response is not valid JSON: {e}"),
        )
    })?;

    let content = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| {
            BridgeError::communication(
                CommunicationKind::InvalidResponse,
                "response has no choices[0].message.content",
            )
        })?
        .to_string();

    let usage = TokenUsage {
        input_tokens: json["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
        output_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0),
    };

    Ok(Completion {
        content,
        usage,
        model: json["model"].as_str().map(str::to_string),
    })
}

/// Pull `error.message` and `error.code` out of an error body.
pub fn error_detail(body: &str) -> (String, Option<String>) {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return (UNKNOWN_ERROR.to_string(), None);
    };
    let message = json["error"]["message"]
        .as_str()
        .unwrap_or(UNKNOWN_ERROR)
        .to_string();
    let code = match &json["error"]["code"] {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    (message, code)
}

fn describe(body: &str, fallback: &str) -> String {
    let (mut message, code) = error_detail(body);
    if message == UNKNOWN_ERROR {
        message = fallback.to_string();
    }
    match code {
        Some(code) => format!("{message} (code: {code})"),
        None => message,
    }
}

/// Map a non-2xx status and body to the error taxonomy.
pub fn classify_status(status: u16, body: &str) -> BridgeError {
    match status {
        401 | 403 => BridgeError::Authentication(format!(
            "service token rejected (HTTP {status})"
        )),
        404 => BridgeError::communication(
            CommunicationKind::EndpointNotFound,
            format!("API endpoint not found (HTTP {status})"),
        ),
        400 => BridgeError::api(
            Some(status),
            describe(body, "Bad Request - invalid request format or parameters"),
        ),
        _ => BridgeError::api(
            Some(status),
            describe(body, "HTTP error - unable to parse response details"),
        ),
    }
}

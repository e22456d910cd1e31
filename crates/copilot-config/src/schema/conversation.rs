use serde::{Deserialize, Serialize};

/// Conversation history settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConversationConfig {
    /// Maximum turns kept per conversation; oldest are dropped first.
    /// `0` keeps everything.
    pub max_turns: u32,
    /// Prepended to every submit, never stored in history.
    pub system_prompt: Option<String>,
}

impl ConversationConfig {
    pub fn turn_limit(&self) -> Option<usize> {
        (self.max_turns > 0).then_some(self.max_turns as usize)
    }
}

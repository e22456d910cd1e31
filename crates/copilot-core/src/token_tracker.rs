//! Token usage tracking across conversations, per model.

use std::collections::HashMap;

use crate::TokenUsage;

/// Tracks cumulative token usage per model.
#[derive(Debug, Clone)]
pub struct TokenTracker {
    /// Total usage across all models.
    total: TokenUsage,
    /// Usage broken down by model name.
    by_model: HashMap<String, TokenUsage>,
    /// Number of successful backend calls.
    call_count: u64,
}

impl TokenTracker {
    pub fn new() -> Self {
        Self {
            total: TokenUsage::default(),
            by_model: HashMap::new(),
            call_count: 0,
        }
    }

    /// Record token usage from a backend call.
    pub fn record(&mut self, model: &str, usage: &TokenUsage) {
        self.total.input_tokens += usage.input_tokens;
        self.total.output_tokens += usage.output_tokens;
        self.call_count += 1;

        let entry = self.by_model.entry(model.to_string()).or_default();
        entry.input_tokens += usage.input_tokens;
        entry.output_tokens += usage.output_tokens;
    }

    pub fn total(&self) -> &TokenUsage {
        &self.total
    }

    pub fn for_model(&self, model: &str) -> Option<&TokenUsage> {
        self.by_model.get(model)
    }

    pub fn total_tokens(&self) -> u64 {
        self.total.total_tokens()
    }

    pub fn call_count(&self) -> u64 {
        self.call_count
    }

    pub fn reset(&mut self) {
        self.total = TokenUsage::default();
        self.by_model.clear();
        self.call_count = 0;
    }
}

impl Default for TokenTracker {
    fn default() -> Self {
        Self::new()
    }
}

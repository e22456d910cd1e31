use std::collections::VecDeque;

use crate::ConversationTurn;

/// Ordered turns of one conversation, optionally bounded. When full, the
/// oldest turn is dropped first.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    limit: Option<usize>,
}

impl ConversationHistory {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            turns: VecDeque::new(),
            limit: limit.filter(|l| *l > 0),
        }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push_back(turn);
        if let Some(limit) = self.limit {
            while self.turns.len() > limit {
                self.turns.pop_front();
            }
        }
    }

    /// Contiguous view for building a request.
    pub fn turns(&mut self) -> &[ConversationTurn] {
        self.turns.make_contiguous()
    }

    pub fn snapshot(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

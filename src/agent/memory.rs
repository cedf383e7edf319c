//! Bounded conversation memory: the last `k` completed turns.

use crate::types::{ChatMessage, ConversationTurn};
use std::collections::VecDeque;

/// Sliding window of recent turns with FIFO eviction.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl ConversationMemory {
    /// Create an empty window. A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a completed turn, evicting the oldest one when full.
    pub fn append(&mut self, input: impl Into<String>, output: impl Into<String>) {
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(ConversationTurn::new(input, output));
    }

    /// Copy of the window, oldest first.
    pub fn snapshot(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    /// The window as alternating user / assistant messages.
    pub fn as_messages(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .flat_map(|t| {
                [
                    ChatMessage::user(t.input.clone()),
                    ChatMessage::assistant(t.output.clone()),
                ]
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatRole;

    #[test]
    fn keeps_last_k_turns_fifo_for_every_k() {
        for k in 1..=6 {
            let mut memory = ConversationMemory::new(k);
            for i in 0..=k {
                memory.append(format!("q{}", i), format!("a{}", i));
                assert!(memory.len() <= k);
            }
            let snapshot = memory.snapshot();
            assert_eq!(snapshot.len(), k);
            let expected: Vec<ConversationTurn> = (1..=k)
                .map(|i| ConversationTurn::new(format!("q{}", i), format!("a{}", i)))
                .collect();
            assert_eq!(snapshot, expected, "window of {}", k);
        }
    }

    #[test]
    fn snapshot_is_detached_from_storage() {
        let mut memory = ConversationMemory::new(3);
        memory.append("q", "a");
        let mut snapshot = memory.snapshot();
        snapshot.clear();
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn zero_capacity_still_holds_one_turn() {
        let mut memory = ConversationMemory::new(0);
        memory.append("q1", "a1");
        memory.append("q2", "a2");
        assert_eq!(memory.capacity(), 1);
        assert_eq!(memory.snapshot(), vec![ConversationTurn::new("q2", "a2")]);
    }

    #[test]
    fn messages_alternate_user_and_assistant() {
        let mut memory = ConversationMemory::new(3);
        memory.append("q1", "a1");
        memory.append("q2", "a2");
        let roles: Vec<ChatRole> = memory.as_messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::User, ChatRole::Assistant, ChatRole::User, ChatRole::Assistant]
        );
    }
}

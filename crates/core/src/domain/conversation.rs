use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, text: text.into() }
    }
}

/// Ordered conversation turns, bounded to `limit` entries with the oldest dropped first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    limit: usize,
}

impl ConversationHistory {
    pub fn new(limit: usize) -> Self {
        Self { turns: VecDeque::new(), limit: limit.max(1) }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.limit {
            self.turns.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{ConversationHistory, ConversationTurn, Role};

    #[test]
    fn clear_empties_history_regardless_of_length() {
        for turns in [0usize, 1, 7, 64] {
            let mut history = ConversationHistory::new(100);
            for index in 0..turns {
                history.push(ConversationTurn::user(format!("message {index}")));
            }

            history.clear();
            assert!(history.is_empty(), "history with {turns} turns should be empty after clear");
        }
    }

    #[test]
    fn oldest_turns_are_dropped_past_the_limit() {
        let mut history = ConversationHistory::new(3);
        history.push(ConversationTurn::user("one"));
        history.push(ConversationTurn::assistant("two"));
        history.push(ConversationTurn::user("three"));
        history.push(ConversationTurn::assistant("four"));

        let texts = history.turns().into_iter().map(|turn| turn.text).collect::<Vec<_>>();
        assert_eq!(texts, vec!["two", "three", "four"]);
        assert_eq!(history.turns().last().map(|turn| turn.role), Some(Role::Assistant));
    }

    #[test]
    fn zero_limit_still_keeps_the_latest_turn() {
        let mut history = ConversationHistory::new(0);
        history.push(ConversationTurn::user("first"));
        history.push(ConversationTurn::user("only"));

        assert_eq!(history.len(), 1);
        assert_eq!(history.turns()[0].text, "only");
    }
}

//! The visible conversation and how it is projected onto model turns.

use crate::api_types::{Message, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    /// Synthesized notices (friction logs, sync confirmations).
    System,
    /// Failure reports shown in place of an assistant reply.
    SystemError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub text: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(role: ChatRole, text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: sentinel_core::generate_id(),
            role,
            text: text.into(),
            timestamp,
        }
    }

    /// Model-facing form. Error lines and empty placeholders are not sent.
    pub fn to_model_turn(&self) -> Option<Message> {
        if self.text.trim().is_empty() {
            return None;
        }
        match self.role {
            ChatRole::User => Some(Message::user(self.text.clone())),
            ChatRole::Assistant => Some(Message::assistant(self.text.clone())),
            ChatRole::System => Some(Message::user(format!("[System] {}", self.text))),
            ChatRole::SystemError => None,
        }
    }
}

/// The trailing `window` messages, projected to model turns. The result
/// always opens on a user turn; assistant turns cut loose by the window are
/// dropped.
pub fn context_window(history: &[ChatMessage], window: usize) -> Vec<Message> {
    let start = history.len().saturating_sub(window);
    history[start..]
        .iter()
        .filter_map(ChatMessage::to_model_turn)
        .skip_while(|m| m.role != Role::User)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_keeps_tail_and_folds_system() {
        let mut history: Vec<ChatMessage> = (0..8)
            .map(|i| ChatMessage::new(ChatRole::User, format!("m{}", i), i))
            .collect();
        history.push(ChatMessage::new(ChatRole::System, "SYSTEM LOG: friction", 9));
        history.push(ChatMessage::new(ChatRole::SystemError, "network down", 10));

        let turns = context_window(&history, 6);
        // m4..m7, the system notice; the error line is dropped.
        assert_eq!(turns.len(), 5);
        assert_eq!(turns[0].content, "m4");
        assert_eq!(turns[4].role, Role::User);
        assert_eq!(turns[4].content, "[System] SYSTEM LOG: friction");
    }

    #[test]
    fn test_empty_placeholder_skipped() {
        let history = vec![
            ChatMessage::new(ChatRole::User, "hello", 1),
            ChatMessage::new(ChatRole::Assistant, "", 2),
        ];
        assert_eq!(context_window(&history, 6).len(), 1);
    }

    #[test]
    fn test_window_never_opens_on_assistant() {
        let mut history = Vec::new();
        for i in 0..3 {
            history.push(ChatMessage::new(ChatRole::User, format!("u{}", i), i));
            history.push(ChatMessage::new(ChatRole::Assistant, format!("a{}", i), i));
        }
        history.push(ChatMessage::new(ChatRole::User, "u3", 9));

        let turns = context_window(&history, 6);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "u1");
        assert_eq!(turns.len(), 5);
        assert_eq!(turns[4].content, "u3");
    }

    #[test]
    fn test_window_of_only_assistant_turns_is_empty() {
        let history = vec![ChatMessage::new(ChatRole::Assistant, "welcome back", 1)];
        assert!(context_window(&history, 6).is_empty());
    }
}

//! Conversation history
//!
//! Append-only record of the dialogue, alternating user and assistant turns.
//! The orchestrator is the single writer; generation always works from a
//! snapshot taken when the turn starts, so appends made later never mutate
//! an in-flight prompt.

/// Speaker of a conversation turn
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name used by chat completion APIs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One turn of the conversation
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// Append-only conversation history
#[derive(Debug, Default)]
pub struct ConversationState {
    turns: Vec<ConversationTurn>,
}

impl ConversationState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user turn
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(ConversationTurn {
            role: Role::User,
            content: content.into(),
        });
    }

    /// Append an assistant turn
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(ConversationTurn {
            role: Role::Assistant,
            content: content.into(),
        });
    }

    /// Clone the history as it stands right now
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConversationTurn> {
        self.turns.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

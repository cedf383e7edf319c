//! Shared types used across the MoveGPT runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Agent state machine
// ---------------------------------------------------------------------------

/// Phases a chat agent moves through during one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    /// Idle, waiting for the next user message.
    AwaitingInput,
    /// Waiting on the reasoning engine.
    Deliberating,
    /// Running a tool the engine asked for.
    Invoking,
    /// Final answer received, committing it to memory.
    Responding,
}

impl fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingInput => write!(f, "awaiting_input"),
            Self::Deliberating => write!(f, "deliberating"),
            Self::Invoking => write!(f, "invoking"),
            Self::Responding => write!(f, "responding"),
        }
    }
}

impl Default for AgentPhase {
    fn default() -> Self {
        Self::AwaitingInput
    }
}

// ---------------------------------------------------------------------------
// Inference types
// ---------------------------------------------------------------------------

/// A chat message sent to the reasoning engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// Token usage from an inference call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// ---------------------------------------------------------------------------
// Turns
// ---------------------------------------------------------------------------

/// One tool round-trip inside a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: String,
    pub input: String,
    pub output: String,
    pub success: bool,
}

/// A completed user turn: one input, one final answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub input: String,
    pub output: String,
}

impl ConversationTurn {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Everything the agent did to answer one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub answer: String,
    pub iterations: u32,
    pub invocations: Vec<ToolInvocation>,
    pub completed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Identity of one conversation: `(user_id, convo_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub user_id: String,
    pub convo_id: String,
}

impl SessionKey {
    pub fn new(user_id: impl Into<String>, convo_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            convo_id: convo_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.convo_id)
    }
}

/// Truncate a string for log output.
pub fn preview(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

//! Reasoning engine boundary.
//!
//! The engine picks tools and writes final answers. The agent only sees it
//! through [`ReasoningEngine::complete`], whose reply is always one of the
//! three [`EngineReply`] shapes.

pub mod openai;
pub mod protocol;

pub use openai::OpenAiEngine;

use crate::error::AgentError;
use crate::types::ChatMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One tool round-trip already made in the current turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScratchStep {
    pub tool: String,
    pub input: String,
    pub observation: String,
}

/// Everything the engine needs for one deliberation step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineContext {
    /// Persona, tool list and reply-format instructions.
    pub system_prompt: String,
    /// Rendered tool descriptions, in registry order.
    pub tool_descriptions: Vec<String>,
    /// Previous turns, oldest first.
    pub history: Vec<ChatMessage>,
    /// The user's message for this turn.
    pub input: String,
    /// Tool calls made so far in this turn.
    pub scratchpad: Vec<ScratchStep>,
}

/// What the engine decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineReply {
    /// Run `name` with `input` and report back.
    ToolCall { name: String, input: String },
    /// The answer for the user.
    Final { text: String },
    /// Neither of the above.
    Malformed { raw: String },
}

/// External text-completion service that chooses tools and composes answers.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Run one deliberation step.
    ///
    /// Transport failures must come back as [`AgentError::UpstreamUnavailable`].
    async fn complete(&self, ctx: &EngineContext) -> Result<EngineReply, AgentError>;
}

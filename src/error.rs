//! Error taxonomy for a chat turn.

/// Errors surfaced by the tool registry, the chat agent and the session layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// Malformed tool specification or settings; fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The reasoning engine replied with something that is neither a tool call nor a final answer.
    #[error("Reasoning engine protocol error: {0}")]
    ReasoningProtocol(String),

    /// The engine asked for a tool that is not in the registry.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// A tool ran and failed.
    #[error("Tool '{tool}' failed: {cause}")]
    ToolExecution { tool: String, cause: String },

    /// The deliberation loop used up its round-trips without a final answer.
    #[error("No final answer after {iterations} reasoning iterations")]
    IterationLimitExceeded { iterations: u32 },

    /// Network failure or timeout talking to the reasoning engine.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Another turn is already running for this conversation.
    #[error("A turn is already in progress for {user_id}/{convo_id}")]
    ConcurrentTurn { user_id: String, convo_id: String },
}

impl AgentError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::ReasoningProtocol(_) => "reasoning_protocol_error",
            Self::UnknownTool(_) => "unknown_tool",
            Self::ToolExecution { .. } => "tool_execution_error",
            Self::IterationLimitExceeded { .. } => "iteration_limit_exceeded",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::ConcurrentTurn { .. } => "concurrent_turn",
        }
    }

    /// Errors the deliberation loop feeds back to the engine instead of failing the turn.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnknownTool(_) | Self::ToolExecution { .. })
    }
}

//! Chat agent: one bounded Think → Act → Observe loop per user message.
//!
//! Each turn:
//! 1. Builds the engine context (tools, memory window, input, scratchpad)
//! 2. Asks the reasoning engine for a tool call or a final answer
//! 3. Runs the requested tool and feeds the result (or failure) back
//! 4. Stops on a final answer, or fails once `max_iterations` engine
//!    round-trips are used up
//! 5. Commits `(input, answer)` to memory

use crate::agent::context::{build_engine_context, sanitize_observation};
use crate::agent::memory::ConversationMemory;
use crate::agent::system_prompt::build_system_prompt;
use crate::config::MoveGptConfig;
use crate::engine::{EngineContext, EngineReply, ReasoningEngine, ScratchStep};
use crate::error::AgentError;
use crate::tools::ToolRegistry;
use crate::types::*;
use chrono::Utc;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-agent limits.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub name: String,
    pub max_iterations: u32,
    pub memory_window: usize,
    pub engine_timeout: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: "MoveGPT".into(),
            max_iterations: 3,
            memory_window: 3,
            engine_timeout: Duration::from_secs(60),
        }
    }
}

impl AgentSettings {
    pub fn from_config(config: &MoveGptConfig) -> Self {
        Self {
            name: config.name.clone(),
            max_iterations: config.max_iterations,
            memory_window: config.memory_window,
            engine_timeout: config.engine_timeout(),
        }
    }
}

/// Completed turns of one conversation, readable while a turn is running.
pub type SharedTranscript = Arc<RwLock<Vec<ConversationTurn>>>;

/// Conversational agent bound to a shared tool registry.
///
/// Not safe for two concurrent turns; callers serialise access.
pub struct ChatAgent {
    registry: Arc<ToolRegistry>,
    engine: Arc<dyn ReasoningEngine>,
    system_prompt: String,
    memory: ConversationMemory,
    transcript: SharedTranscript,
    max_iterations: u32,
    engine_timeout: Duration,
    phase: AgentPhase,
}

impl ChatAgent {
    pub fn new(
        registry: Arc<ToolRegistry>,
        engine: Arc<dyn ReasoningEngine>,
        settings: &AgentSettings,
    ) -> Self {
        let system_prompt = build_system_prompt(&settings.name, &registry);
        Self {
            registry,
            engine,
            system_prompt,
            memory: ConversationMemory::new(settings.memory_window),
            transcript: Arc::new(RwLock::new(Vec::new())),
            max_iterations: settings.max_iterations.max(1),
            engine_timeout: settings.engine_timeout,
            phase: AgentPhase::AwaitingInput,
        }
    }

    /// Answer one user message.
    pub async fn chat(&mut self, input: &str) -> Result<String, AgentError> {
        self.run_turn(input).await.map(|outcome| outcome.answer)
    }

    /// Answer one user message and report the tool calls made on the way.
    ///
    /// A failed turn leaves memory untouched.
    pub async fn run_turn(&mut self, input: &str) -> Result<TurnOutcome, AgentError> {
        let result = self.deliberate(input).await;
        if let Ok(ref outcome) = result {
            self.memory.append(input, outcome.answer.clone());
            let mut transcript = match self.transcript.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            transcript.push(ConversationTurn::new(input, outcome.answer.clone()));
        }
        self.set_phase(AgentPhase::AwaitingInput);
        result
    }

    async fn deliberate(&mut self, input: &str) -> Result<TurnOutcome, AgentError> {
        let mut scratchpad: Vec<ScratchStep> = Vec::new();
        let mut invocations: Vec<ToolInvocation> = Vec::new();

        for iteration in 1..=self.max_iterations {
            self.set_phase(AgentPhase::Deliberating);
            let ctx = build_engine_context(
                &self.system_prompt,
                &self.registry,
                &self.memory,
                input,
                &scratchpad,
            );

            match self.ask_engine(&ctx).await? {
                EngineReply::Final { text } => {
                    self.set_phase(AgentPhase::Responding);
                    info!("[Iteration {}] Final answer: {}", iteration, preview(&text));
                    return Ok(TurnOutcome {
                        answer: text,
                        iterations: iteration,
                        invocations,
                        completed_at: Utc::now(),
                    });
                }
                EngineReply::Malformed { raw } => {
                    return Err(AgentError::ReasoningProtocol(format!(
                        "unparseable engine reply: {}",
                        preview(&raw)
                    )));
                }
                EngineReply::ToolCall { name, input: tool_input } => {
                    if iteration == self.max_iterations {
                        warn!(
                            "[Iteration {}] Engine asked for '{}' with no iterations left",
                            iteration, name
                        );
                        break;
                    }

                    self.set_phase(AgentPhase::Invoking);
                    info!("[Iteration {}] Tool: {}({})", iteration, name, preview(&tool_input));

                    let (observation, success) = match self.invoke_tool(&name, &tool_input).await {
                        Ok(output) => {
                            info!("[Iteration {}] Tool result: {} chars", iteration, output.len());
                            (output, true)
                        }
                        Err(e) if e.is_recoverable() => {
                            warn!("[Iteration {}] Tool error: {}", iteration, e);
                            (self.describe_failure(&e), false)
                        }
                        Err(e) => return Err(e),
                    };

                    invocations.push(ToolInvocation {
                        tool: name.clone(),
                        input: tool_input.clone(),
                        output: observation.clone(),
                        success,
                    });
                    scratchpad.push(ScratchStep {
                        tool: name,
                        input: tool_input,
                        observation: sanitize_observation(&observation),
                    });
                }
            }
        }

        Err(AgentError::IterationLimitExceeded {
            iterations: self.max_iterations,
        })
    }

    async fn ask_engine(&self, ctx: &EngineContext) -> Result<EngineReply, AgentError> {
        match tokio::time::timeout(self.engine_timeout, self.engine.complete(ctx)).await {
            Ok(reply) => reply,
            Err(_) => Err(AgentError::UpstreamUnavailable(format!(
                "reasoning engine timed out after {}s",
                self.engine_timeout.as_secs_f64()
            ))),
        }
    }

    async fn invoke_tool(&self, name: &str, input: &str) -> Result<String, AgentError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;
        tool.invoke(input).await
    }

    /// Observation text for a recoverable failure.
    fn describe_failure(&self, err: &AgentError) -> String {
        match err {
            AgentError::UnknownTool(_) => format!(
                "{}. Valid tools are: {}.",
                err,
                self.registry.names().join(", ")
            ),
            _ => err.to_string(),
        }
    }

    fn set_phase(&mut self, phase: AgentPhase) {
        if self.phase != phase {
            debug!("Agent phase: {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Every completed turn, oldest first (not limited to the memory window).
    ///
    /// The handle outlives any borrow of the agent.
    pub fn transcript_handle(&self) -> SharedTranscript {
        Arc::clone(&self.transcript)
    }
}

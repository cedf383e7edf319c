//! Session store: one live `ChatAgent` per `(user_id, convo_id)`.
//!
//! Agents are created on first contact and kept until the conversation is
//! ended or sits idle past the configured TTL. Turns on the same key are
//! serialised; a second turn arriving while one is in flight is rejected
//! with `AgentError::ConcurrentTurn`. Transcript reads never wait on a
//! running turn.

use crate::agent::{AgentSettings, ChatAgent, SharedTranscript};
use crate::engine::ReasoningEngine;
use crate::error::AgentError;
use crate::state::Database;
use crate::tools::ToolRegistry;
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Shared handle to the turn log.
pub type TurnLog = Arc<Mutex<Database>>;

/// An agent plus its bookkeeping, guarded together.
pub struct AgentSlot {
    pub agent: ChatAgent,
    last_active: Instant,
}

impl AgentSlot {
    fn new(agent: ChatAgent) -> Self {
        Self {
            agent,
            last_active: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }
}

/// One conversation: the turn lock, plus its transcript readable without that lock.
pub struct Session {
    pub slot: Mutex<AgentSlot>,
    transcript: SharedTranscript,
}

impl Session {
    fn new(agent: ChatAgent) -> Self {
        Self {
            transcript: agent.transcript_handle(),
            slot: Mutex::new(AgentSlot::new(agent)),
        }
    }

    /// Completed turns so far, without taking the turn lock.
    pub fn transcript(&self) -> Vec<ConversationTurn> {
        match self.transcript.read() {
            Ok(turns) => turns.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

pub type SharedSession = Arc<Session>;

/// Keyed agent store. Cheap to clone.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionKey, SharedSession>>>,
    registry: Arc<ToolRegistry>,
    engine: Arc<dyn ReasoningEngine>,
    settings: AgentSettings,
    turn_log: Option<TurnLog>,
}

impl SessionStore {
    pub fn new(
        registry: Arc<ToolRegistry>,
        engine: Arc<dyn ReasoningEngine>,
        settings: AgentSettings,
        turn_log: Option<TurnLog>,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            registry,
            engine,
            settings,
            turn_log,
        }
    }

    /// Return the agent for this key, creating it on first use.
    pub async fn get_or_create_agent(&self, user_id: &str, convo_id: &str) -> SharedSession {
        let key = SessionKey::new(user_id, convo_id);

        if let Some(session) = self.sessions.read().await.get(&key) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        // Another task may have created it between the two locks.
        let session = sessions.entry(key.clone()).or_insert_with(|| {
            info!(session = %key, "Starting conversation");
            let agent = ChatAgent::new(
                Arc::clone(&self.registry),
                Arc::clone(&self.engine),
                &self.settings,
            );
            Arc::new(Session::new(agent))
        });
        Arc::clone(session)
    }

    /// Look up an existing agent without creating one.
    pub async fn get_agent(&self, user_id: &str, convo_id: &str) -> Option<SharedSession> {
        let key = SessionKey::new(user_id, convo_id);
        self.sessions.read().await.get(&key).cloned()
    }

    /// Drop the agent for this key. Returns whether one existed.
    pub async fn end_conversation(&self, user_id: &str, convo_id: &str) -> bool {
        let key = SessionKey::new(user_id, convo_id);
        let removed = self.sessions.write().await.remove(&key).is_some();
        if removed {
            info!(session = %key, "Conversation ended");
        }
        removed
    }

    /// Run one turn for this key.
    pub async fn chat(
        &self,
        user_id: &str,
        convo_id: &str,
        input: &str,
    ) -> Result<TurnOutcome, AgentError> {
        let key = SessionKey::new(user_id, convo_id);
        let session = self.get_or_create_agent(user_id, convo_id).await;

        let mut guard = session.slot.try_lock().map_err(|_| {
            warn!(session = %key, "Turn rejected: another turn is in flight");
            AgentError::ConcurrentTurn {
                user_id: user_id.to_string(),
                convo_id: convo_id.to_string(),
            }
        })?;

        guard.touch();
        let result = guard.agent.run_turn(input).await;
        guard.touch();
        drop(guard);

        if let Ok(ref outcome) = result {
            self.log_turn(&key, input, outcome).await;
        }
        result
    }

    async fn log_turn(&self, key: &SessionKey, input: &str, outcome: &TurnOutcome) {
        let Some(ref log) = self.turn_log else {
            return;
        };
        match log.lock().await.record_turn(key, input, outcome) {
            Ok(id) => debug!(session = %key, turn = %id, "Turn logged"),
            Err(e) => warn!(session = %key, "Failed to log turn: {}", e),
        }
    }

    /// Render the full transcript of a conversation, or `None` if unknown.
    pub async fn transcript(&self, user_id: &str, convo_id: &str) -> Option<String> {
        let session = self.get_agent(user_id, convo_id).await?;
        Some(render_transcript(&session.transcript()))
    }

    /// Remove agents idle longer than `ttl`. Busy agents are kept.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|key, session| match session.slot.try_lock() {
            Ok(guard) if guard.idle_for() > ttl => {
                debug!(session = %key, "Evicting idle conversation");
                false
            }
            _ => true,
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("Evicted {} idle conversation(s)", evicted);
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }
}

/// `User: ...` / `Agent: ...` lines, one pair per completed turn.
pub fn render_transcript(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|t| format!("User: {}\nAgent: {}\n", t.input, t.output))
        .collect()
}

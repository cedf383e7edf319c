//! Test doubles shared by the unit tests.

use crate::engine::{EngineContext, EngineReply, ReasoningEngine};
use crate::error::AgentError;
use crate::tools::{build_registry, Capability, FnCapability, ToolRegistry, ToolSpec};
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Engine that replays a fixed script and records every context it saw.
pub struct ScriptedEngine {
    script: Mutex<VecDeque<Result<EngineReply, AgentError>>>,
    repeat: Option<EngineReply>,
    seen: Mutex<Vec<EngineContext>>,
}

impl ScriptedEngine {
    /// Reply with each entry once; an exhausted script is a protocol error.
    pub fn new(script: Vec<Result<EngineReply, AgentError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            repeat: None,
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Reply with the same answer forever.
    pub fn always(reply: EngineReply) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(reply),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn contexts(&self) -> Vec<EngineContext> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    async fn complete(&self, ctx: &EngineContext) -> Result<EngineReply, AgentError> {
        self.seen.lock().unwrap().push(ctx.clone());
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match &self.repeat {
            Some(reply) => Ok(reply.clone()),
            None => Err(AgentError::ReasoningProtocol("script exhausted".into())),
        }
    }
}

/// Engine that never answers in time.
pub struct SlowEngine;

#[async_trait]
impl ReasoningEngine for SlowEngine {
    async fn complete(&self, _ctx: &EngineContext) -> Result<EngineReply, AgentError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(EngineReply::Final {
            text: "too late".into(),
        })
    }
}

/// Registry of constant tools: `Ok(output)` answers, `Err(msg)` fails.
pub fn registry_of(tools: &[(&str, Result<&'static str, &'static str>)]) -> Arc<ToolRegistry> {
    let specs = tools
        .iter()
        .map(|(name, result)| {
            let result = *result;
            let capability: Arc<dyn Capability> = Arc::new(FnCapability::new(move |_: &str| {
                result.map(str::to_string).map_err(|e| anyhow!(e))
            }));
            ToolSpec::new(*name, capability, "testing", "anything")
        })
        .collect();
    Arc::new(build_registry(specs).unwrap())
}

//! Reasoning engine backed by an OpenAI-compatible chat-completions API.

use super::protocol::{parse_reply, render_messages};
use super::{EngineContext, EngineReply, ReasoningEngine};
use crate::config::MoveGptConfig;
use crate::error::AgentError;
use crate::types::{preview, ChatRole, TokenUsage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Chat-completions client speaking the JSON action protocol.
#[derive(Debug, Clone)]
pub struct OpenAiEngine {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    http: reqwest::Client,
}

// -- OpenAI-compatible request/response types --------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<MessagePayload<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct MessagePayload<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Pricing per 1M tokens (prompt, completion) in USD.
const MODEL_PRICING: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4o", 2.50, 10.00),
    ("gpt-3.5-turbo", 0.50, 1.50),
];

fn role_name(role: ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    }
}

impl OpenAiEngine {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature: 0.0,
            max_tokens: 1024,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &MoveGptConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            ..Self::new(&config.llm_api_url, &config.effective_api_key(), &config.model)
        }
    }

    /// Send the rendered context and return the raw completion text.
    async fn completion_text(&self, ctx: &EngineContext) -> Result<String, AgentError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let messages = render_messages(ctx);

        let request = ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| MessagePayload {
                    role: role_name(m.role),
                    content: &m.content,
                })
                .collect(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!("Inference request to model: {} ({} messages)", self.model, messages.len());

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                AgentError::UpstreamUnavailable(format!("inference request failed: {}", e))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::UpstreamUnavailable(format!(
                "inference failed ({}): {}",
                status,
                preview(&body)
            )));
        }

        let body: ChatResponse = resp.json().await.map_err(|e| {
            AgentError::ReasoningProtocol(format!("unreadable inference response: {}", e))
        })?;

        if let Some(u) = body.usage {
            let usage = TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            };
            debug!(
                "Token usage: {} total, ~${:.5}",
                usage.total_tokens,
                Self::estimate_cost(&self.model, &usage)
            );
        }

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AgentError::ReasoningProtocol("completion has no content".into()))
    }

    /// Estimate the USD cost of a token usage for a given model.
    pub fn estimate_cost(model: &str, usage: &TokenUsage) -> f64 {
        let (prompt_rate, completion_rate) = MODEL_PRICING
            .iter()
            .find(|(name, _, _)| model.contains(name))
            .map(|(_, p, c)| (*p, *c))
            .unwrap_or((0.50, 1.50));

        let prompt_cost = (usage.prompt_tokens as f64 / 1_000_000.0) * prompt_rate;
        let completion_cost = (usage.completion_tokens as f64 / 1_000_000.0) * completion_rate;
        prompt_cost + completion_cost
    }
}

#[async_trait]
impl ReasoningEngine for OpenAiEngine {
    async fn complete(&self, ctx: &EngineContext) -> Result<EngineReply, AgentError> {
        let text = self.completion_text(ctx).await?;
        debug!("Engine reply: {}", preview(&text));
        Ok(parse_reply(&text))
    }
}

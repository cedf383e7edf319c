//! Question-answering services: the Move Agent and the GitHub chat agent.
//!
//! Both speak the same tiny protocol: `POST {"question": ...}` and read
//! back `{"answer": ...}`.

use super::traits::Capability;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct QuestionRequest<'a> {
    question: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnswerResponse {
    answer: String,
}

async fn ask(http: &reqwest::Client, url: &str, question: &str) -> Result<String> {
    let resp = http
        .post(url)
        .json(&QuestionRequest { question })
        .send()
        .await
        .with_context(|| format!("Request to {} failed", url))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("Question service failed ({}): {}", status, body);
    }

    let body: AnswerResponse = resp
        .json()
        .await
        .context("Failed to parse answer response")?;
    Ok(body.answer)
}

/// Retrieval-backed Move / Aptos assistant.
#[derive(Debug, Clone)]
pub struct MoveAgent {
    endpoint: String,
    http: reqwest::Client,
}

impl MoveAgent {
    pub fn new(base_url: &str) -> Self {
        Self::with_http(base_url, reqwest::Client::new())
    }

    pub fn with_http(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            endpoint: format!("{}/generate-response", base_url.trim_end_matches('/')),
            http,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Capability for MoveAgent {
    async fn invoke(&self, input: &str) -> Result<String> {
        if input.is_empty() {
            bail!("A question is required");
        }
        debug!("Move agent question: {} chars", input.len());
        ask(&self.http, &self.endpoint, input).await
    }
}

/// Chat agent over the indexed GitHub Move corpus.
///
/// With no endpoint configured the question is handed back unchanged, so the
/// engine can pass it on to the Move Agent.
#[derive(Debug, Clone)]
pub struct GithubAgent {
    endpoint: Option<String>,
    http: reqwest::Client,
}

impl GithubAgent {
    pub fn new(endpoint: Option<String>) -> Self {
        Self::with_http(endpoint, reqwest::Client::new())
    }

    pub fn with_http(endpoint: Option<String>, http: reqwest::Client) -> Self {
        Self { endpoint, http }
    }
}

#[async_trait]
impl Capability for GithubAgent {
    async fn invoke(&self, input: &str) -> Result<String> {
        match &self.endpoint {
            Some(url) => ask(&self.http, url, input).await,
            None => Ok(input.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_agent_endpoint_joins_cleanly() {
        assert_eq!(
            MoveAgent::new("http://localhost:3000/").endpoint(),
            "http://localhost:3000/generate-response"
        );
        assert_eq!(
            MoveAgent::new("http://localhost:3000").endpoint(),
            "http://localhost:3000/generate-response"
        );
    }

    #[tokio::test]
    async fn github_agent_echoes_without_endpoint() {
        let agent = GithubAgent::new(None);
        assert_eq!(
            agent.invoke("write a module").await.unwrap(),
            "write a module"
        );
    }

    #[tokio::test]
    async fn move_agent_rejects_empty_question() {
        let agent = MoveAgent::new("http://127.0.0.1:9");
        assert!(agent.invoke("").await.is_err());
    }
}

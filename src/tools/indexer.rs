//! Aptos indexer GraphQL client (token ownership).

use super::traits::Capability;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

const CURRENT_TOKENS_QUERY: &str = r#"
query CurrentTokens($owner_address: String, $offset: Int) {
  current_token_ownerships(
    order_by: {last_transaction_version: desc}
    offset: $offset
    where: {owner_address: {_eq: $owner_address}}
  ) {
    amount
    collection_name
    creator_address
    name
    owner_address
  }
}"#;

/// GraphQL client for the Aptos indexer.
#[derive(Debug, Clone)]
pub struct IndexerClient {
    url: String,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

impl IndexerClient {
    pub fn with_http(url: &str, http: reqwest::Client) -> Self {
        Self {
            url: url.to_string(),
            http,
        }
    }

    /// Run a query and return its `data` object.
    pub async fn execute(&self, query: &str, variables: Value) -> Result<Value> {
        let resp = self
            .http
            .post(&self.url)
            .json(&GraphQlRequest { query, variables })
            .send()
            .await
            .context("Indexer request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Indexer query failed ({}): {}", status, body);
        }

        let body: GraphQlResponse = resp.json().await.context("Failed to parse indexer response")?;
        into_data(body)
    }

    /// Tokens currently owned by an address.
    pub async fn user_nfts(&self, owner: &str) -> Result<Value> {
        let owner = owner.trim();
        if owner.is_empty() {
            bail!("An owner address is required");
        }
        debug!("Indexer NFTs: {}", owner);
        self.execute(
            CURRENT_TOKENS_QUERY,
            json!({ "owner_address": owner, "offset": 0 }),
        )
        .await
    }
}

fn into_data(body: GraphQlResponse) -> Result<Value> {
    if !body.errors.is_empty() {
        let messages: Vec<&str> = body.errors.iter().map(|e| e.message.as_str()).collect();
        bail!("Indexer returned errors: {}", messages.join("; "));
    }
    body.data
        .ok_or_else(|| anyhow::anyhow!("Indexer response has no data"))
}

/// "Account NFT Balance": tokens owned by the given address.
pub struct AccountNfts {
    client: IndexerClient,
}

impl AccountNfts {
    pub fn new(client: IndexerClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Capability for AccountNfts {
    async fn invoke(&self, input: &str) -> Result<String> {
        let data = self.client.user_nfts(input).await?;
        Ok(data.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graphql_errors_are_surfaced() {
        let body: GraphQlResponse = serde_json::from_value(json!({
            "errors": [{ "message": "field not found" }, { "message": "bad offset" }]
        }))
        .unwrap();
        let err = into_data(body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Indexer returned errors: field not found; bad offset"
        );
    }

    #[test]
    fn data_is_returned_when_present() {
        let body: GraphQlResponse = serde_json::from_value(json!({
            "data": { "current_token_ownerships": [] }
        }))
        .unwrap();
        assert_eq!(
            into_data(body).unwrap(),
            json!({ "current_token_ownerships": [] })
        );
    }

    #[test]
    fn missing_data_is_an_error() {
        let body: GraphQlResponse = serde_json::from_value(json!({})).unwrap();
        assert!(into_data(body).is_err());
    }
}

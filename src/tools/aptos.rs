//! Aptos fullnode REST client and the account tools built on it.

use super::traits::Capability;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Octas per APT.
pub const APT_SCALE: f64 = 100_000_000.0;

const APT_COIN_STORE: &str = "0x1::coin::CoinStore<0x1::aptos_coin::AptosCoin>";

/// Aptos fullnode REST API client.
#[derive(Debug, Clone)]
pub struct AptosClient {
    base_url: String,
    http: reqwest::Client,
}

// -- Response types -----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CoinStoreResource {
    data: CoinStoreData,
}

#[derive(Debug, Deserialize)]
struct CoinStoreData {
    coin: CoinValue,
}

#[derive(Debug, Deserialize)]
struct CoinValue {
    value: String,
}

/// A compact view of one entry-function transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub address: String,
    pub module: String,
    pub function: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub type_arguments: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub arguments: Vec<Value>,
}

/// `address::module::function` split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionId {
    pub address: String,
    pub module: String,
    pub function: String,
}

impl AptosClient {
    pub fn with_http(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn account_url(&self, address: &str, path: &str) -> String {
        format!("{}/accounts/{}/{}", self.base_url, address, path)
    }

    /// APT balance of an account, in whole APT.
    pub async fn account_balance(&self, address: &str) -> Result<f64> {
        let address = require_address(address)?;
        debug!("Aptos balance: {}", address);

        let resp = self
            .http
            .get(self.account_url(address, &format!("resource/{}", APT_COIN_STORE)))
            .send()
            .await
            .context("Aptos balance request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Aptos balance lookup failed ({}): {}", status, body);
        }

        let resource: CoinStoreResource = resp
            .json()
            .await
            .context("Failed to parse coin store resource")?;
        let octas: u64 = resource
            .data
            .coin
            .value
            .parse()
            .context("Coin value is not an integer")?;
        Ok(octas as f64 / APT_SCALE)
    }

    /// Entry-function transactions sent by an account, oldest first.
    pub async fn account_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TransactionSummary>> {
        let address = require_address(address)?;
        debug!("Aptos transactions: {}", address);

        let resp = self
            .http
            .get(self.account_url(address, "transactions"))
            .send()
            .await
            .context("Aptos transactions request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Aptos transactions lookup failed ({}): {}", status, body);
        }

        let txs: Vec<Value> = resp
            .json()
            .await
            .context("Failed to parse transactions response")?;
        summarize_transactions(&txs, limit)
    }

    /// Exposed functions of every module published under an account.
    ///
    /// A non-success status yields an empty list.
    pub async fn account_modules(&self, address: &str) -> Result<Vec<Vec<String>>> {
        let address = require_address(address)?;
        debug!("Aptos modules: {}", address);

        let resp = self
            .http
            .get(self.account_url(address, "modules"))
            .send()
            .await
            .context("Aptos modules request failed")?;

        if !resp.status().is_success() {
            return Ok(Vec::new());
        }

        let modules: Vec<Value> = resp
            .json()
            .await
            .context("Failed to parse modules response")?;
        Ok(module_signatures(&modules))
    }
}

/// Accept `0x` followed by 1 to 64 hex digits; anything else never reaches a URL.
fn require_address(input: &str) -> Result<&str> {
    let address = input.trim();
    if address.is_empty() {
        bail!("An account address is required");
    }
    let valid = match address.strip_prefix("0x") {
        Some(hex) => (1..=64).contains(&hex.len()) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    };
    if !valid {
        bail!("Invalid account address: {}", address);
    }
    Ok(address)
}

/// Split `0x1::coin::transfer` into address, module and function.
pub fn split_function(id: &str) -> Result<FunctionId> {
    let parts: Vec<&str> = id.split("::").collect();
    match parts.as_slice() {
        [address, module, function]
            if !address.is_empty() && !module.is_empty() && !function.is_empty() =>
        {
            Ok(FunctionId {
                address: address.to_string(),
                module: module.to_string(),
                function: function.to_string(),
            })
        }
        _ => bail!("Malformed function id: {}", id),
    }
}

/// Keep the first `limit` entry-function transactions.
///
/// Transactions without a `payload.function` (scripts, genesis, block
/// metadata) are skipped.
pub fn summarize_transactions(txs: &[Value], limit: usize) -> Result<Vec<TransactionSummary>> {
    let mut out = Vec::new();
    for tx in txs {
        if out.len() >= limit {
            break;
        }
        let payload = &tx["payload"];
        let Some(function) = payload["function"].as_str() else {
            continue;
        };
        let id = split_function(function)?;
        out.push(TransactionSummary {
            address: id.address,
            module: id.module,
            function: id.function,
            type_arguments: array_or_empty(&payload["type_arguments"]),
            arguments: array_or_empty(&payload["arguments"]),
        });
    }
    Ok(out)
}

fn array_or_empty(value: &Value) -> Vec<Value> {
    value.as_array().cloned().unwrap_or_default()
}

/// Render a function as `module::function::(param, param)`.
pub fn format_function(module: &str, function: &str, params: &[String]) -> String {
    format!("{}::{}::({})", module, function, params.join(", "))
}

/// Exposed-function signatures, one list per module.
pub fn module_signatures(modules: &[Value]) -> Vec<Vec<String>> {
    modules
        .iter()
        .map(|module| {
            let abi = &module["abi"];
            let module_name = abi["name"].as_str().unwrap_or_default();
            abi["exposed_functions"]
                .as_array()
                .map(|functions| {
                    functions
                        .iter()
                        .map(|func| {
                            let params: Vec<String> = func["params"]
                                .as_array()
                                .map(|ps| {
                                    ps.iter()
                                        .filter_map(|p| p.as_str().map(str::to_string))
                                        .collect()
                                })
                                .unwrap_or_default();
                            format_function(
                                module_name,
                                func["name"].as_str().unwrap_or_default(),
                                &params,
                            )
                        })
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect()
}

/// Render an APT amount without trailing zeros.
pub fn format_apt(amount: f64) -> String {
    let text = format!("{:.8}", amount);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    text.to_string()
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// "Account Balance": APT balance of the given address.
pub struct AccountBalance {
    client: AptosClient,
}

impl AccountBalance {
    pub fn new(client: AptosClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Capability for AccountBalance {
    async fn invoke(&self, input: &str) -> Result<String> {
        let balance = self.client.account_balance(input).await?;
        Ok(format_apt(balance))
    }
}

/// "Account Transactions": recent entry-function calls of the given address.
pub struct AccountTransactions {
    client: AptosClient,
    limit: usize,
}

impl AccountTransactions {
    pub fn new(client: AptosClient, limit: usize) -> Self {
        Self { client, limit }
    }
}

#[async_trait]
impl Capability for AccountTransactions {
    async fn invoke(&self, input: &str) -> Result<String> {
        let txs = self.client.account_transactions(input, self.limit).await?;
        Ok(serde_json::to_string(&txs)?)
    }
}

/// "Account Modules": exposed function signatures of the given address.
pub struct AccountModules {
    client: AptosClient,
}

impl AccountModules {
    pub fn new(client: AptosClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Capability for AccountModules {
    async fn invoke(&self, input: &str) -> Result<String> {
        let modules = self.client.account_modules(input).await?;
        Ok(serde_json::to_string(&modules)?)
    }
}

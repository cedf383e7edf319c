pub mod aptos;
pub mod assistant;
pub mod indexer;
pub mod traits;

pub use traits::{Capability, FnCapability};

use crate::config::{MoveGptConfig, ToolEntry};
use crate::error::AgentError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Timeout applied to a tool when its spec does not set one.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Render the description the reasoning engine selects tools by.
///
/// The engine's tool choice depends on this exact shape.
pub fn format_tool_description(name: &str, usage: &str, input: &str) -> String {
    format!("{}: useful when {} input: {}", name, usage, input)
}

// ---------------------------------------------------------------------------
// Tool
// ---------------------------------------------------------------------------

/// Declarative specification of one tool.
#[derive(Clone)]
pub struct ToolSpec {
    pub name: String,
    pub capability: Arc<dyn Capability>,
    pub usage: String,
    pub input: String,
    pub timeout: Duration,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        capability: Arc<dyn Capability>,
        usage: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            capability,
            usage: usage.into(),
            input: input.into(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A named, described capability the reasoning engine can call.
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    capability: Arc<dyn Capability>,
    timeout: Duration,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Tool {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Invoke the capability under the tool's timeout.
    ///
    /// Failures and timeouts come back as [`AgentError::ToolExecution`].
    pub async fn invoke(&self, input: &str) -> Result<String, AgentError> {
        debug!(tool = %self.name, "Invoking tool");
        match tokio::time::timeout(self.timeout, self.capability.invoke(input.trim())).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(AgentError::ToolExecution {
                tool: self.name.clone(),
                cause: format!("{:#}", e),
            }),
            Err(_) => Err(AgentError::ToolExecution {
                tool: self.name.clone(),
                cause: format!("timed out after {}s", self.timeout.as_secs_f64()),
            }),
        }
    }
}

/// Build a single tool from its specification.
pub fn build_tool(spec: ToolSpec) -> Result<Tool, AgentError> {
    let name = spec.name.trim();
    if name.is_empty() {
        return Err(AgentError::Configuration("tool name must not be empty".into()));
    }
    Ok(Tool {
        description: format_tool_description(name, spec.usage.trim(), spec.input.trim()),
        name: name.to_string(),
        capability: spec.capability,
        timeout: spec.timeout,
    })
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable, ordered set of tools with unique names.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
}

/// Build a registry; any bad spec or duplicate name fails the whole build.
pub fn build_registry(specs: Vec<ToolSpec>) -> Result<ToolRegistry, AgentError> {
    let mut tools = Vec::with_capacity(specs.len());
    let mut index = HashMap::with_capacity(specs.len());

    for spec in specs {
        let tool = build_tool(spec)?;
        if index.contains_key(tool.name()) {
            return Err(AgentError::Configuration(format!(
                "duplicate tool name: {}",
                tool.name()
            )));
        }
        index.insert(tool.name().to_string(), tools.len());
        tools.push(tool);
    }

    Ok(ToolRegistry { tools, index })
}

impl ToolRegistry {
    /// Exact, case-sensitive lookup.
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tool> {
        self.tools.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Descriptions in registration order.
    pub fn descriptions(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.description.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Capability catalog
// ---------------------------------------------------------------------------

/// Capabilities addressable by the `function` key of a config tool entry.
#[derive(Default, Clone)]
pub struct CapabilityCatalog {
    entries: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in Aptos / Move capabilities wired to the configured endpoints.
    pub fn builtin(config: &MoveGptConfig) -> Self {
        let http = reqwest::Client::new();
        let node = aptos::AptosClient::with_http(&config.aptos_node_url, http.clone());
        let indexer = indexer::IndexerClient::with_http(&config.aptos_indexer_url, http.clone());

        let github_url = Some(config.github_agent_url.trim())
            .filter(|u| !u.is_empty())
            .map(str::to_string);

        Self::new()
            .with("account_balance", aptos::AccountBalance::new(node.clone()))
            .with(
                "account_transactions",
                aptos::AccountTransactions::new(node.clone(), config.transactions_limit),
            )
            .with("account_modules", aptos::AccountModules::new(node))
            .with("account_nfts", indexer::AccountNfts::new(indexer))
            .with(
                "move_agent",
                assistant::MoveAgent::with_http(&config.move_agent_url, http.clone()),
            )
            .with("github_agent", assistant::GithubAgent::with_http(github_url, http))
    }

    pub fn with(mut self, key: &str, capability: impl Capability + 'static) -> Self {
        self.register(key, Arc::new(capability));
        self
    }

    pub fn register(&mut self, key: &str, capability: Arc<dyn Capability>) {
        self.entries.insert(key.to_string(), capability);
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Turn config entries into tool specs. An unknown `function` key is a
    /// configuration error.
    pub fn resolve(
        &self,
        entries: &[ToolEntry],
        timeout: Duration,
    ) -> Result<Vec<ToolSpec>, AgentError> {
        entries
            .iter()
            .map(|entry| {
                let capability = self.entries.get(&entry.function).cloned().ok_or_else(|| {
                    AgentError::Configuration(format!(
                        "tool '{}' refers to unknown function '{}' (known: {})",
                        entry.name,
                        entry.function,
                        self.keys().join(", ")
                    ))
                })?;
                Ok(ToolSpec::new(&entry.name, capability, &entry.usage, &entry.input)
                    .with_timeout(timeout))
            })
            .collect()
    }
}

/// Build the registry described by the config against the built-in catalog.
pub fn registry_from_config(config: &MoveGptConfig) -> Result<ToolRegistry, AgentError> {
    let catalog = CapabilityCatalog::builtin(config);
    build_registry(catalog.resolve(&config.tools, config.tool_timeout())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    fn constant(output: &'static str) -> Arc<dyn Capability> {
        Arc::new(FnCapability::new(move |_: &str| Ok(output.to_string())))
    }

    fn spec(name: &str, output: &'static str) -> ToolSpec {
        ToolSpec::new(name, constant(output), "find things", "a thing")
    }

    #[test]
    fn description_follows_template() {
        let tool = build_tool(ToolSpec::new(
            "Account Balance",
            constant("1"),
            "find account balance",
            "account to find balance of",
        ))
        .unwrap();
        assert_eq!(
            tool.description(),
            "Account Balance: useful when find account balance input: account to find balance of"
        );
    }

    #[test]
    fn empty_name_is_a_configuration_error() {
        let err = build_tool(spec("   ", "x")).unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }

    #[tokio::test]
    async fn every_name_round_trips_to_its_tool() {
        let registry = build_registry(vec![
            spec("Account Balance", "12.5"),
            spec("Move Agent", "Move is..."),
            spec("account balance", "lowercase"),
        ])
        .unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.names(),
            vec!["Account Balance", "Move Agent", "account balance"]
        );
        for name in ["Account Balance", "Move Agent", "account balance"] {
            assert_eq!(registry.get(name).unwrap().name(), name);
        }
        assert_eq!(
            registry.get("Move Agent").unwrap().invoke("q").await.unwrap(),
            "Move is..."
        );
        assert!(registry.get("move agent").is_none());
    }

    #[test]
    fn duplicate_names_fail_the_whole_build() {
        let err = build_registry(vec![
            spec("Account Balance", "1"),
            spec("Move Agent", "2"),
            spec("Account Balance", "3"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            AgentError::Configuration("duplicate tool name: Account Balance".into())
        );
    }

    #[tokio::test]
    async fn failing_capability_becomes_tool_execution_error() {
        let failing: Arc<dyn Capability> =
            Arc::new(FnCapability::new(|_: &str| bail!("node returned 500")));
        let tool = build_tool(ToolSpec::new("Account Balance", failing, "u", "i")).unwrap();
        let err = tool.invoke("0x1").await.unwrap_err();
        assert_eq!(
            err,
            AgentError::ToolExecution {
                tool: "Account Balance".into(),
                cause: "node returned 500".into()
            }
        );
    }

    struct Slow;

    #[async_trait::async_trait]
    impl Capability for Slow {
        async fn invoke(&self, _input: &str) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    #[tokio::test]
    async fn slow_capability_times_out() {
        let tool = build_tool(
            ToolSpec::new("Slow", Arc::new(Slow), "u", "i").with_timeout(Duration::from_millis(20)),
        )
        .unwrap();
        match tool.invoke("x").await {
            Err(AgentError::ToolExecution { tool, cause }) => {
                assert_eq!(tool, "Slow");
                assert!(cause.contains("timed out"));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn input_is_trimmed_before_invocation() {
        let echo: Arc<dyn Capability> =
            Arc::new(FnCapability::new(|input: &str| Ok(input.to_string())));
        let tool = build_tool(ToolSpec::new("Echo", echo, "u", "i")).unwrap();
        assert_eq!(tool.invoke("  0xabc \n").await.unwrap(), "0xabc");
    }

    #[test]
    fn unknown_function_key_is_rejected() {
        let catalog = CapabilityCatalog::new()
            .with("move_agent", FnCapability::new(|_: &str| Ok(String::new())));
        let entries = vec![ToolEntry::new("Balance", "account_balance", "u", "i")];
        let err = catalog.resolve(&entries, DEFAULT_TOOL_TIMEOUT).err().unwrap();
        assert!(matches!(err, AgentError::Configuration(msg) if msg.contains("account_balance")));
    }

    #[test]
    fn default_config_resolves_against_builtin_catalog() {
        let registry = registry_from_config(&MoveGptConfig::default()).unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "Account Balance",
                "Account Transactions",
                "Move Agent",
                "Github Chat Agent"
            ]
        );
    }
}

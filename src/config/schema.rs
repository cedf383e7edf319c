//! Configuration schema for movegpt.toml.

use crate::error::AgentError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveGptConfig {
    /// Assistant name used in the system prompt.
    pub name: String,

    /// OpenAI-compatible API base URL.
    pub llm_api_url: String,

    /// API key for the reasoning engine. Falls back to `OPENAI_API_KEY`.
    pub llm_api_key: String,

    /// Chat model.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f64,

    /// Maximum completion tokens per engine call.
    pub max_tokens: u32,

    /// Maximum reasoning-engine round-trips per turn.
    pub max_iterations: u32,

    /// Number of past turns kept as conversation memory.
    pub memory_window: usize,

    /// Timeout for one reasoning-engine call, in seconds.
    pub engine_timeout_secs: u64,

    /// Timeout for one tool invocation, in seconds.
    pub tool_timeout_secs: u64,

    /// Aptos fullnode REST API.
    pub aptos_node_url: String,

    /// Aptos indexer GraphQL endpoint.
    pub aptos_indexer_url: String,

    /// Move Agent service (retrieval-backed Q&A).
    pub move_agent_url: String,

    /// GitHub corpus chat service. Empty echoes the question back.
    pub github_agent_url: String,

    /// How many recent transactions the transactions tool returns.
    pub transactions_limit: usize,

    /// HTTP listen address.
    pub listen_addr: String,

    /// Drop sessions idle for longer than this. 0 disables eviction.
    pub session_ttl_secs: u64,

    /// How often the idle-session sweeper runs.
    pub session_sweep_secs: u64,

    /// SQLite turn log. Empty disables it.
    pub db_path: String,

    /// Log level (debug, info, warn, error).
    pub log_level: String,

    /// Tools exposed to the reasoning engine.
    pub tools: Vec<ToolEntry>,
}

/// Declarative tool specification as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolEntry {
    /// Unique tool name shown to the engine.
    pub name: String,
    /// Capability key, e.g. `account_balance`.
    pub function: String,
    /// When the tool is useful ("find account balance").
    #[serde(rename = "use")]
    pub usage: String,
    /// What the tool expects as input.
    pub input: String,
}

impl ToolEntry {
    pub fn new(name: &str, function: &str, usage: &str, input: &str) -> Self {
        Self {
            name: name.into(),
            function: function.into(),
            usage: usage.into(),
            input: input.into(),
        }
    }
}

/// The four tools the MoveGPT server ships with.
pub fn default_tools() -> Vec<ToolEntry> {
    vec![
        ToolEntry::new(
            "Account Balance",
            "account_balance",
            "find account balance",
            "account to find balance of",
        ),
        ToolEntry::new(
            "Account Transactions",
            "account_transactions",
            "find account transactions",
            "account to find transactions of",
        ),
        ToolEntry::new(
            "Move Agent",
            "move_agent",
            "to give information about writing move code or the aptos blockchain \
             when unsure what agent to use use this one",
            "question user has about move or the aptos blockchain",
        ),
        ToolEntry::new(
            "Github Chat Agent",
            "github_agent",
            "to chat with github chat agent about generating move code, \
             Feed output into Move Agent to refine the code",
            "question about how to create move code",
        ),
    ]
}

impl Default for MoveGptConfig {
    fn default() -> Self {
        Self {
            name: "MoveGPT".into(),
            llm_api_url: "https://api.openai.com".into(),
            llm_api_key: String::new(),
            model: "gpt-3.5-turbo".into(),
            temperature: 0.0,
            max_tokens: 1024,
            max_iterations: 3,
            memory_window: 3,
            engine_timeout_secs: 60,
            tool_timeout_secs: 30,
            aptos_node_url: "https://fullnode.mainnet.aptoslabs.com/v1".into(),
            aptos_indexer_url: "https://indexer.mainnet.aptoslabs.com/v1/graphql".into(),
            move_agent_url: "http://localhost:3000/".into(),
            github_agent_url: String::new(),
            transactions_limit: 2,
            listen_addr: "127.0.0.1:5000".into(),
            session_ttl_secs: 0,
            session_sweep_secs: 60,
            db_path: "~/.movegpt/turns.db".into(),
            log_level: "info".into(),
            tools: default_tools(),
        }
    }
}

impl MoveGptConfig {
    /// Resolve a path that may contain `~` to an absolute path.
    pub fn resolve_path(&self, path: &str) -> String {
        shellexpand::tilde(path).into_owned()
    }

    /// Resolved turn-log path, or `None` when the log is disabled.
    pub fn resolved_db_path(&self) -> Option<String> {
        if self.db_path.trim().is_empty() {
            None
        } else {
            Some(self.resolve_path(&self.db_path))
        }
    }

    /// API key from the file, or from `OPENAI_API_KEY` when the file leaves it empty.
    pub fn effective_api_key(&self) -> String {
        if self.llm_api_key.is_empty() {
            std::env::var("OPENAI_API_KEY").unwrap_or_default()
        } else {
            self.llm_api_key.clone()
        }
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Idle-session TTL, `None` when eviction is off.
    pub fn session_ttl(&self) -> Option<Duration> {
        (self.session_ttl_secs > 0).then(|| Duration::from_secs(self.session_ttl_secs))
    }

    /// Reject settings the agent cannot run with.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.max_iterations == 0 {
            return Err(AgentError::Configuration(
                "max_iterations must be at least 1".into(),
            ));
        }
        if self.memory_window == 0 {
            return Err(AgentError::Configuration(
                "memory_window must be at least 1".into(),
            ));
        }
        if self.engine_timeout_secs == 0 || self.tool_timeout_secs == 0 {
            return Err(AgentError::Configuration(
                "timeouts must be greater than zero".into(),
            ));
        }
        if self.tools.is_empty() {
            return Err(AgentError::Configuration("no tools configured".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_agent() {
        let cfg = MoveGptConfig::default();
        assert_eq!(cfg.max_iterations, 3);
        assert_eq!(cfg.memory_window, 3);
        assert_eq!(cfg.tools.len(), 4);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let cfg = MoveGptConfig {
            max_iterations: 0,
            ..MoveGptConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(AgentError::Configuration(_))));
    }

    #[test]
    fn zero_memory_window_is_rejected() {
        let cfg = MoveGptConfig {
            memory_window: 0,
            ..MoveGptConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(AgentError::Configuration(_))));
    }

    #[test]
    fn empty_db_path_disables_turn_log() {
        let cfg = MoveGptConfig {
            db_path: "  ".into(),
            ..MoveGptConfig::default()
        };
        assert!(cfg.resolved_db_path().is_none());
    }

    #[test]
    fn tool_entries_use_the_use_key() {
        let cfg: MoveGptConfig = toml::from_str(
            r#"
            model = "gpt-4o-mini"

            [[tools]]
            name = "Account Balance"
            function = "account_balance"
            use = "find account balance"
            input = "account to find balance of"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.model, "gpt-4o-mini");
        assert_eq!(cfg.tools.len(), 1);
        assert_eq!(cfg.tools[0].usage, "find account balance");
        assert_eq!(cfg.max_iterations, 3);
    }
}

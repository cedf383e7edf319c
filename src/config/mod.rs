pub mod schema;

pub use schema::{default_tools, MoveGptConfig, ToolEntry};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Config file name inside the home directory.
pub const CONFIG_FILE: &str = "movegpt.toml";

/// Default home directory (~/.movegpt).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".movegpt"))
        .unwrap_or_else(|| PathBuf::from(".movegpt"))
}

/// Load config from the given path, or return defaults.
pub fn load_config(path: &Path) -> Result<MoveGptConfig> {
    if path.exists() {
        let contents =
            std::fs::read_to_string(path).context("Failed to read movegpt config file")?;
        let config: MoveGptConfig =
            toml::from_str(&contents).context("Failed to parse movegpt config (TOML)")?;
        Ok(config)
    } else {
        Ok(MoveGptConfig::default())
    }
}

/// Save config to the given path (TOML format).
pub fn save_config(config: &MoveGptConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents).context("Failed to write config file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("movegpt-missing-{}.toml", ulid::Ulid::new()));
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.name, "MoveGPT");
    }

    #[test]
    fn save_then_load_keeps_tool_list() {
        let dir = std::env::temp_dir().join(format!("movegpt-cfg-{}", ulid::Ulid::new()));
        let path = dir.join(CONFIG_FILE);
        let cfg = MoveGptConfig {
            model: "gpt-4o".into(),
            ..MoveGptConfig::default()
        };
        save_config(&cfg, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.model, "gpt-4o");
        assert_eq!(loaded.tools, cfg.tools);
        let _ = std::fs::remove_dir_all(dir);
    }
}

//! First-run interactive setup wizard.
//!
//! Steps:
//! 1. Display banner
//! 2. Collect reasoning engine endpoint, key and model
//! 3. Collect Aptos node and indexer endpoints
//! 4. Collect assistant service endpoints
//! 5. Write movegpt.toml

use crate::config::{self, MoveGptConfig, CONFIG_FILE};
use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// ASCII banner displayed during setup.
const BANNER: &str = r#"
  __  __                  ____ ____ _____
 |  \/  | _____   _____  / ___|  _ \_   _|
 | |\/| |/ _ \ \ / / _ \| |  _| |_) || |
 | |  | | (_) \ V /  __/| |_| |  __/ | |
 |_|  |_|\___/ \_/ \___| \____|_|    |_|

        Aptos & Move chat assistant
"#;

/// Run the interactive setup wizard on stdin.
pub fn run_setup_wizard(home_dir: &Path) -> Result<MoveGptConfig> {
    println!("{}", BANNER);
    println!("Welcome to MoveGPT setup.\n");

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let config = collect_config(&mut reader, home_dir)?;

    println!("\n[4/4] Writing configuration...");
    std::fs::create_dir_all(home_dir)?;
    config::save_config(&config, &home_dir.join(CONFIG_FILE))?;
    println!("  Written: {}", CONFIG_FILE);

    println!("\nSetup complete! Run `movegpt chat` or `movegpt serve` to start.\n");
    Ok(config)
}

/// Ask for every setting; blank answers keep the defaults.
fn collect_config(reader: &mut impl BufRead, home_dir: &Path) -> Result<MoveGptConfig> {
    let defaults = MoveGptConfig::default();

    println!("[1/4] Reasoning engine");
    let llm_api_url = prompt_with_default(reader, "  API URL", &defaults.llm_api_url)?;
    let llm_api_key = prompt(reader, "  API key (or press Enter to use OPENAI_API_KEY)")?;
    let model = prompt_with_default(reader, "  Model", &defaults.model)?;

    println!("\n[2/4] Aptos");
    let aptos_node_url = prompt_with_default(reader, "  Fullnode URL", &defaults.aptos_node_url)?;
    let aptos_indexer_url =
        prompt_with_default(reader, "  Indexer URL", &defaults.aptos_indexer_url)?;

    println!("\n[3/4] Assistants");
    let move_agent_url = prompt_with_default(reader, "  Move Agent URL", &defaults.move_agent_url)?;
    let github_agent_url = prompt(reader, "  GitHub Chat Agent URL (or press Enter to skip)")?;

    Ok(MoveGptConfig {
        llm_api_url,
        llm_api_key,
        model,
        aptos_node_url,
        aptos_indexer_url,
        move_agent_url,
        github_agent_url,
        db_path: home_dir.join("turns.db").to_string_lossy().into_owned(),
        ..defaults
    })
}

/// Prompt the user for input with a label.
fn prompt(reader: &mut impl BufRead, label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut input = String::new();
    reader.read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Prompt with a default value.
fn prompt_with_default(reader: &mut impl BufRead, label: &str, default: &str) -> Result<String> {
    print!("{} [{}]: ", label, default);
    io::stdout().flush()?;
    let mut input = String::new();
    reader.read_line(&mut input)?;
    let trimmed = input.trim();
    if trimmed.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn blank_answers_keep_defaults() {
        let mut input = Cursor::new("\nsk-test\n\n\n\n\n\n");
        let cfg = collect_config(&mut input, Path::new("/tmp/movegpt-home")).unwrap();
        let defaults = MoveGptConfig::default();
        assert_eq!(cfg.llm_api_key, "sk-test");
        assert_eq!(cfg.model, defaults.model);
        assert_eq!(cfg.aptos_node_url, defaults.aptos_node_url);
        assert!(cfg.github_agent_url.is_empty());
        assert!(cfg.db_path.ends_with("turns.db"));
        assert_eq!(cfg.tools.len(), 4);
    }

    #[test]
    fn answers_override_defaults() {
        let mut input = Cursor::new(
            "http://llm.local\n\ngpt-4o\nhttp://node.local/v1\n\n\
             http://move.local/\nhttp://gh.local/ask\n",
        );
        let cfg = collect_config(&mut input, Path::new("/tmp/movegpt-home")).unwrap();
        assert_eq!(cfg.llm_api_url, "http://llm.local");
        assert_eq!(cfg.llm_api_key, "");
        assert_eq!(cfg.model, "gpt-4o");
        assert_eq!(cfg.aptos_node_url, "http://node.local/v1");
        assert_eq!(cfg.move_agent_url, "http://move.local/");
        assert_eq!(cfg.github_agent_url, "http://gh.local/ask");
    }
}

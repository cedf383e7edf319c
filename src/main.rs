//! MoveGPT: Aptos & Move chat assistant.
//!
//! Usage:
//!   movegpt serve            Start the HTTP server
//!   movegpt chat             Chat in the terminal
//!   movegpt setup            Run the setup wizard
//!   movegpt tools            List the configured tools
//!   movegpt history          Show logged turns of a conversation

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use movegpt::agent::AgentSettings;
use movegpt::config::{self, MoveGptConfig, CONFIG_FILE};
use movegpt::engine::openai::OpenAiEngine;
use movegpt::server;
use movegpt::session::{SessionStore, TurnLog};
use movegpt::state::Database;
use movegpt::tools::registry_from_config;
use movegpt::types::*;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "movegpt")]
#[command(version)]
#[command(about = "Tool-routing chat assistant for Aptos and Move")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the movegpt home directory (default: ~/.movegpt).
    #[arg(long)]
    home: Option<String>,

    /// Log level (debug, info, warn, error). Overrides the config file.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Listen address, e.g. 0.0.0.0:5000.
        #[arg(long)]
        addr: Option<String>,
    },

    /// Chat with the assistant in the terminal.
    Chat,

    /// Run the first-time setup wizard.
    Setup,

    /// List the tools the assistant can use.
    Tools,

    /// Show logged turns of one conversation.
    History {
        #[arg(long)]
        user: String,

        #[arg(long)]
        convo: String,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Resolve home directory
    let home_dir = match &cli.home {
        Some(home) => PathBuf::from(shellexpand::tilde(home).into_owned()),
        None => config::default_home_dir(),
    };
    let config = config::load_config(&home_dir.join(CONFIG_FILE))?;

    // Initialize logging
    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Setup => cmd_setup(&home_dir),
        Commands::Serve { addr } => cmd_serve(config, addr).await,
        Commands::Chat => cmd_chat(config).await,
        Commands::Tools => cmd_tools(&config),
        Commands::History { user, convo } => cmd_history(&config, &user, &convo),
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

fn cmd_setup(home_dir: &Path) -> Result<()> {
    movegpt::setup::run_setup_wizard(home_dir)?;
    Ok(())
}

async fn cmd_serve(mut config: MoveGptConfig, addr: Option<String>) -> Result<()> {
    if let Some(addr) = addr {
        config.listen_addr = addr;
    }
    let store = bootstrap(&config)?;

    println!(
        "{} Serving '{}' on {} (model: {}, tools: {})",
        ">>>".green().bold(),
        config.name,
        config.listen_addr,
        config.model,
        store.registry().len(),
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n{} Shutting down gracefully...", "<<<".red().bold());
        }
        signal_cancel.cancel();
    });

    server::serve(&config, store, cancel).await
}

async fn cmd_chat(config: MoveGptConfig) -> Result<()> {
    let store = bootstrap(&config)?;
    let user_id = std::env::var("USER").unwrap_or_else(|_| "local".into());
    let convo_id = ulid::Ulid::new().to_string();
    info!(user = %user_id, convo = %convo_id, "Terminal conversation started");

    println!("Welcome to the CLI. Type 'quit' to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "User:".cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.eq_ignore_ascii_case("quit") {
            break;
        }
        if input.is_empty() {
            continue;
        }

        match store.chat(&user_id, &convo_id, input).await {
            Ok(outcome) => println!("{} {}", "Agent:".green().bold(), outcome.answer),
            Err(e) => println!("{} {}", "Error:".red().bold(), e),
        }
    }

    store.end_conversation(&user_id, &convo_id).await;
    Ok(())
}

fn cmd_tools(config: &MoveGptConfig) -> Result<()> {
    let registry = registry_from_config(config)?;

    println!();
    println!("{}", "=== Tools ===".bold());
    println!();
    for tool in registry.iter() {
        println!("  {}", tool.name().bold());
        println!("    {}", tool.description().dimmed());
    }
    println!();
    Ok(())
}

fn cmd_history(config: &MoveGptConfig, user: &str, convo: &str) -> Result<()> {
    let Some(db_path) = config.resolved_db_path() else {
        eprintln!(
            "{} The turn log is disabled (db_path is empty).",
            "Error:".red().bold()
        );
        std::process::exit(1);
    };
    let db = Database::open(Path::new(&db_path))
        .with_context(|| format!("Failed to open turn log at {}", db_path))?;

    let key = SessionKey::new(user, convo);
    let turns = db.turns_for(&key)?;
    if turns.is_empty() {
        println!("No logged turns for {}.", key);
        return Ok(());
    }

    println!();
    println!("{}", format!("=== {} ===", key).bold());
    for turn in turns {
        println!();
        println!(
            "  {} {}",
            turn.created_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            format!("({} iteration(s))", turn.iterations).dimmed(),
        );
        println!("  {} {}", "User:".cyan().bold(), turn.input);
        for call in &turn.invocations {
            let marker = if call.success {
                "->".green()
            } else {
                "x>".red()
            };
            println!("    {} {}({})", marker, call.tool, preview(&call.input));
        }
        println!("  {} {}", "Agent:".green().bold(), turn.output);
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build the session store: tools, reasoning engine and optional turn log.
fn bootstrap(config: &MoveGptConfig) -> Result<SessionStore> {
    config.validate()?;
    if config.effective_api_key().is_empty() {
        warn!("No LLM API key configured (set llm_api_key or OPENAI_API_KEY)");
    }

    let registry = Arc::new(registry_from_config(config)?);
    let engine = Arc::new(OpenAiEngine::from_config(config));

    let turn_log: Option<TurnLog> = match config.resolved_db_path() {
        Some(path) => {
            let db = Database::open(Path::new(&path))
                .with_context(|| format!("Failed to open turn log at {}", path))?;
            Some(Arc::new(Mutex::new(db)))
        }
        None => None,
    };

    Ok(SessionStore::new(
        registry,
        engine,
        AgentSettings::from_config(config),
        turn_log,
    ))
}

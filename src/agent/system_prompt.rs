//! System prompt builder.
//!
//! Layers (in order):
//! 1. Persona (MoveGPT, Move / Aptos expert)
//! 2. Move language reminders
//! 3. Tool list
//! 4. Reply-format instructions

use crate::engine::protocol::FORMAT_INSTRUCTIONS;
use crate::tools::ToolRegistry;
use tracing::debug;

const MOVE_NOTES: &str = r#"
# Move Notes

- A module is declared as `module address::name { ... }` and functions as
  `public fun name(params): ret { ... }`.
- Structs are declared as `struct Name has key, store { field: type }`.
- Test-only functions are annotated with `#[test]` and use `assert!(condition, code)`.
- Import what you use: `use std::signer;`, `use std::vector;`, `use std::string;`,
  `use aptos_framework::coin;`, `use aptos_framework::account;`.
- Builtin type names such as `vector`, `signer` and `address` are lowercase.
"#;

/// Build the complete system prompt for a chat agent.
pub fn build_system_prompt(name: &str, registry: &ToolRegistry) -> String {
    let mut prompt = String::with_capacity(4096);

    // Layer 1: Persona
    prompt.push_str(&format!(
        "You are {name}, an assistant that knows the Move programming language, \
         the Aptos blockchain and the aptos_framework modules.\n\
         You can look up on-chain account data and consult specialised agents through tools.\n\
         When you output Move code, include the `use` statements it needs.\n"
    ));

    // Layer 2: Move notes
    prompt.push_str(MOVE_NOTES);

    // Layer 3: Tools
    prompt.push_str("\n# Tools\n\n");
    prompt.push_str(&format!("{name} can ask the user to use tools to look up information:\n\n"));
    for description in registry.descriptions() {
        prompt.push_str(&format!("> {}\n", description));
    }

    // Layer 4: Format
    prompt.push_str(FORMAT_INSTRUCTIONS);

    debug!("System prompt: {} chars", prompt.len());
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{build_registry, FnCapability, ToolSpec};
    use std::sync::Arc;

    #[test]
    fn lists_every_tool_description() {
        let registry = build_registry(vec![
            ToolSpec::new(
                "Account Balance",
                Arc::new(FnCapability::new(|_: &str| Ok("1".into()))),
                "find account balance",
                "account to find balance of",
            ),
            ToolSpec::new(
                "Move Agent",
                Arc::new(FnCapability::new(|_: &str| Ok("2".into()))),
                "to give information about move",
                "question",
            ),
        ])
        .unwrap();

        let prompt = build_system_prompt("MoveGPT", &registry);
        assert!(prompt.starts_with("You are MoveGPT"));
        assert!(prompt.contains(
            "> Account Balance: useful when find account balance \
             input: account to find balance of\n"
        ));
        assert!(prompt.contains(
            "> Move Agent: useful when to give information about move input: question\n"
        ));
        assert!(prompt.contains("\"action\": \"Final Answer\""));
    }
}

//! MoveGPT: tool-routing chat assistant for the Aptos blockchain and the
//! Move language.
//!
//! A reasoning engine picks one of a small set of named tools per step,
//! the agent runs it and feeds the result back, and the final answer is
//! remembered in a bounded per-conversation window.

pub mod agent;
pub mod config;
pub mod engine;
pub mod error;
pub mod server;
pub mod session;
pub mod setup;
pub mod state;
pub mod tools;
pub mod types;

#[cfg(test)]
mod testing;

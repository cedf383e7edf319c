pub mod chat;
pub mod context;
pub mod memory;
pub mod system_prompt;

pub use chat::{AgentSettings, ChatAgent, SharedTranscript};
pub use memory::ConversationMemory;

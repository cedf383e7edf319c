//! Conversational ReAct text protocol.
//!
//! The engine answers with one JSON object:
//! `{"action": "<tool name | Final Answer>", "action_input": "<text>"}`.
//! Tool results go back as a user message prefixed with `TOOL RESPONSE`.

use super::{EngineContext, EngineReply};
use crate::types::ChatMessage;
use serde_json::Value;

/// Action name that marks a final answer.
pub const FINAL_ANSWER_ACTION: &str = "Final Answer";

/// Reply-format instructions appended to the system prompt.
pub const FORMAT_INSTRUCTIONS: &str = r#"
# Response Format

When responding to me, please output a response in one of two formats:

**Option 1:**
Use this if you want the human to use a tool.
Markdown code snippet formatted in the following schema:

```json
{
    "action": string, \ The action to take. Must be one of the tool names listed above
    "action_input": string \ The input to the action
}
```

**Option #2:**
Use this if you want to respond directly to the human.
Markdown code snippet formatted in the following schema:

```json
{
    "action": "Final Answer",
    "action_input": string \ You should put what you want to return to use here
}
```
"#;

const OBSERVATION_SUFFIX: &str = "\n\nOkay, so what is the response to my last comment? \
    If using information obtained from the tools you must mention it explicitly \
    without mentioning the tool names - I have forgotten all TOOL RESPONSES! \
    Remember to respond with a markdown code snippet of a json blob with a single action, \
    and NOTHING else.";

/// Canonical JSON for an action, as the assistant would have written it.
pub fn render_action(action: &str, input: &str) -> String {
    serde_json::json!({ "action": action, "action_input": input }).to_string()
}

/// User message that hands a tool result back to the engine.
pub fn render_observation(observation: &str) -> String {
    format!(
        "TOOL RESPONSE:\n---------------------\n{}{}",
        observation, OBSERVATION_SUFFIX
    )
}

/// Flatten a context into chat messages: system, history, input, scratchpad.
pub fn render_messages(ctx: &EngineContext) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2 + ctx.history.len() + ctx.scratchpad.len() * 2);
    messages.push(ChatMessage::system(ctx.system_prompt.clone()));
    messages.extend(ctx.history.iter().cloned());
    messages.push(ChatMessage::user(ctx.input.clone()));
    for step in &ctx.scratchpad {
        messages.push(ChatMessage::assistant(render_action(&step.tool, &step.input)));
        messages.push(ChatMessage::user(render_observation(&step.observation)));
    }
    messages
}

/// Interpret the engine's text.
///
/// Accepts a bare JSON object or one wrapped in a markdown fence. Anything
/// without a string `action` and an `action_input` is malformed.
pub fn parse_reply(text: &str) -> EngineReply {
    let malformed = || EngineReply::Malformed {
        raw: text.to_string(),
    };

    let Some(json) = extract_json_object(text) else {
        return malformed();
    };
    let Ok(value) = serde_json::from_str::<Value>(json) else {
        return malformed();
    };

    let action = match value.get("action").and_then(Value::as_str).map(str::trim) {
        Some(a) if !a.is_empty() => a,
        _ => return malformed(),
    };
    let input = match value.get("action_input") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => return malformed(),
        Some(other) => other.to_string(),
    };

    if action.eq_ignore_ascii_case(FINAL_ANSWER_ACTION) {
        EngineReply::Final { text: input }
    } else {
        EngineReply::ToolCall {
            name: action.to_string(),
            input,
        }
    }
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

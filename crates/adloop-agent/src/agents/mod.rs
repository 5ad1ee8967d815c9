// ABOUTME: The four marketing agents (research, plan, execute, evaluate) and their shared plumbing.
// ABOUTME: Each agent wraps an AgentLoop and reads its structured answer from the last JSON value in the reply.

pub mod evaluation;
pub mod execute;
pub mod plan;
pub mod research;

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::llm::LlmClient;
use crate::runtime::{AgentError, DEFAULT_MAX_ITERATIONS};

pub use evaluation::EvaluationAgent;
pub use execute::ExecuteAgent;
pub use plan::{PlanAgent, PlanRequest};
pub use research::{ResearchAgent, ResearchReport};

/// Model settings every agent is built from.
#[derive(Clone)]
pub struct AgentSettings {
    pub client: Arc<dyn LlmClient>,
    pub model: String,
    pub max_iterations: usize,
}

impl AgentSettings {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Every top-level JSON object or array in `text`, in order of appearance.
fn json_values(text: &str) -> Vec<Value> {
    let mut values = Vec::new();
    let mut pos = 0;
    while let Some(offset) = text[pos..].find(['{', '[']) {
        let start = pos + offset;
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                pos = start + stream.byte_offset();
                values.push(value);
            }
            _ => pos = start + 1,
        }
    }
    values
}

static FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)```").unwrap());

/// The last JSON object or array in a model reply. Fenced ```json blocks win
/// over bare JSON when both are present.
pub fn extract_json(text: &str) -> Result<Value, AgentError> {
    let fenced = FENCE
        .captures_iter(text)
        .filter_map(|c| json_values(&c[1]).pop())
        .last();

    fenced
        .or_else(|| json_values(text).pop())
        .ok_or_else(|| AgentError::InvalidResponse(format!("no JSON found in reply: {}", preview(text))))
}

/// Extract and decode the last JSON value in a reply.
pub fn parse_output<T: DeserializeOwned>(text: &str) -> Result<T, AgentError> {
    let value = extract_json(text)?;
    serde_json::from_value(value.clone()).map_err(|e| {
        AgentError::InvalidResponse(format!("{} in {}", e, preview(&value.to_string())))
    })
}

/// If `value` is an object holding `key`, return that field, else the value itself.
/// Models wrap lists as `{"plans": [...]}` as often as they return bare arrays.
pub(crate) fn unwrap_field(value: Value, key: &str) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key(key) => map.remove(key).unwrap_or(Value::Null),
        other => other,
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 200;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(MAX).collect::<String>())
    }
}

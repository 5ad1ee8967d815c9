// ABOUTME: The Tool trait agents call through, its result type, and a name-keyed registry.
// ABOUTME: Tool failures the model can fix come back as error results; Err aborts the agent run.

pub mod meta;
pub mod web;

use std::collections::BTreeMap;
use std::sync::Arc;

use adloop_meta::ToolError;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::llm::ToolDefinition;

pub use meta::{MetaOp, MetaTool, meta_tools, read_only_meta_tools};
pub use web::{FetchPicturesTool, RandomUuidTool, WebSummaryTool, web_tools};

/// What a tool hands back to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }

    /// Pretty-printed JSON result.
    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(s) => Self::text(s),
            Err(e) => Self::error(format!("failed to serialize tool output: {}", e)),
        }
    }
}

/// Decode tool arguments, turning a mismatch into an error result the model can read.
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, params: Value) -> Result<T, ToolResult> {
    serde_json::from_value(params).map_err(|e| {
        let err = ToolError::new(format!("Invalid arguments for {}", tool)).details(e.to_string());
        ToolResult::error(err.to_json())
    })
}

/// A function the model can call.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the input object.
    fn schema(&self) -> Value;

    /// Run the tool. `Ok(ToolResult::error(..))` is shown to the model so it
    /// can correct itself; `Err` means the whole agent run cannot continue.
    async fn execute(&self, params: Value) -> Result<ToolResult, anyhow::Error>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.schema(),
        }
    }
}

/// Tools available to one agent, looked up by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn register_all(&mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) {
        for tool in tools {
            self.register(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names in sorted order.
    pub fn list(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }
}

impl FromIterator<Arc<dyn Tool>> for ToolRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Tool>>>(iter: I) -> Self {
        let mut registry = Self::new();
        registry.register_all(iter);
        registry
    }
}

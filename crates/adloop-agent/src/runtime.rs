// ABOUTME: The tool-use agent loop: ask the model, run the tools it requests, feed results back, repeat.
// ABOUTME: Ends on a turn without tool calls, or fails after max_iterations or a fatal tool error.

use std::sync::Arc;

use crate::llm::{ContentBlock, LlmClient, LlmError, Message, Request};
use crate::tools::{ToolRegistry, ToolResult};

pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Errors that can occur during agent execution.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("tool {tool} failed: {message}")]
    Tool { tool: String, message: String },

    #[error("agent did not finish within {0} iterations")]
    MaxIterations(usize),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// What a finished loop produced.
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Text of the final assistant turn.
    pub text: String,
    pub iterations: usize,
    pub tool_use_count: usize,
    pub messages: Vec<Message>,
}

/// A named agent: system prompt, model, and the tools it may call.
pub struct AgentLoop {
    name: String,
    client: Arc<dyn LlmClient>,
    model: String,
    system: String,
    tools: ToolRegistry,
    max_iterations: usize,
    max_tokens: Option<u32>,
}

impl AgentLoop {
    pub fn new(
        name: impl Into<String>,
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        system: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            model: model.into(),
            system: system.into(),
            tools: ToolRegistry::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_tokens: None,
        }
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.tools
    }

    fn request(&self, messages: &[Message]) -> Request {
        let mut req = Request::new(&self.model)
            .system(&self.system)
            .tools(self.tools.definitions());
        if let Some(max_tokens) = self.max_tokens {
            req = req.max_tokens(max_tokens);
        }
        req.messages = messages.to_vec();
        req
    }

    /// Run the loop on a task prompt until the model stops calling tools.
    pub async fn run(&self, task: &str) -> Result<AgentRun, AgentError> {
        let mut messages = vec![Message::user(task)];
        let mut tool_use_count = 0;

        for iteration in 1..=self.max_iterations {
            let response = self.client.create_message(&self.request(&messages)).await?;
            messages.push(Message::assistant(response.content.clone()));

            let calls: Vec<(String, String, serde_json::Value)> = response
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, name, input } => Some((id.clone(), name.clone(), input.clone())),
                    _ => None,
                })
                .collect();

            if calls.is_empty() {
                tracing::info!(
                    agent = %self.name,
                    iterations = iteration,
                    tool_calls = tool_use_count,
                    "agent finished"
                );
                return Ok(AgentRun {
                    text: response.text(),
                    iterations: iteration,
                    tool_use_count,
                    messages,
                });
            }

            let mut results = Vec::with_capacity(calls.len());
            for (id, name, input) in calls {
                tool_use_count += 1;
                let result = self.call_tool(&name, input).await?;
                results.push(ContentBlock::ToolResult {
                    tool_use_id: id,
                    content: result.content,
                    is_error: result.is_error,
                });
            }
            messages.push(Message::tool_results(results));
        }

        tracing::warn!(agent = %self.name, max = self.max_iterations, "agent hit the iteration limit");
        Err(AgentError::MaxIterations(self.max_iterations))
    }

    async fn call_tool(&self, name: &str, input: serde_json::Value) -> Result<ToolResult, AgentError> {
        let Some(tool) = self.tools.get(name) else {
            tracing::warn!(agent = %self.name, tool = name, "model requested an unknown tool");
            return Ok(ToolResult::error(format!(
                "Unknown tool '{}'. Available tools: {}",
                name,
                self.tools.list().join(", ")
            )));
        };

        tracing::debug!(agent = %self.name, tool = name, "calling tool");
        match tool.execute(input).await {
            Ok(result) => {
                if result.is_error {
                    tracing::debug!(agent = %self.name, tool = name, "tool returned an error result");
                }
                Ok(result)
            }
            Err(e) => {
                tracing::error!(agent = %self.name, tool = name, error = %e, "tool failed fatally");
                Err(AgentError::Tool {
                    tool: name.to_string(),
                    message: format!("{:#}", e),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedLlmClient, StubLlmClient};
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    #[async_trait]
    impl Tool for Counter {
        fn name(&self) -> &str {
            "count"
        }

        fn description(&self) -> &str {
            "Increment a counter"
        }

        fn schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _params: Value) -> Result<ToolResult, anyhow::Error> {
            let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(ToolResult::text(n.to_string()))
        }
    }

    struct Broken;

    #[async_trait]
    impl Tool for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _params: Value) -> Result<ToolResult, anyhow::Error> {
            Err(anyhow::anyhow!("token revoked"))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Counter(AtomicUsize::new(0))));
        registry.register(Arc::new(Broken));
        registry
    }

    #[tokio::test]
    async fn finishes_without_tools() {
        let agent = AgentLoop::new("test", Arc::new(StubLlmClient::done()), "m", "sys");
        let run = agent.run("hello").await.unwrap();
        assert_eq!(run.text, "Done.");
        assert_eq!(run.iterations, 1);
        assert_eq!(run.tool_use_count, 0);
        assert_eq!(run.messages.len(), 2);
    }

    #[tokio::test]
    async fn runs_tools_and_feeds_results_back() {
        let client = Arc::new(
            ScriptedLlmClient::new()
                .tool_call("count", json!({}))
                .tool_call("count", json!({}))
                .text("counted twice"),
        );
        let agent = AgentLoop::new("test", client.clone(), "m", "sys").tools(registry());
        let run = agent.run("count please").await.unwrap();

        assert_eq!(run.text, "counted twice");
        assert_eq!(run.iterations, 3);
        assert_eq!(run.tool_use_count, 2);

        // The third request carries both tool results.
        let requests = client.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].system.as_deref(), Some("sys"));
        assert_eq!(requests[0].tools.len(), 2);
        let last = requests[2].messages.last().unwrap();
        match &last.content[0] {
            ContentBlock::ToolResult { content, is_error, .. } => {
                assert_eq!(content, "2");
                assert!(!is_error);
            }
            other => panic!("expected tool result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_model() {
        let client = Arc::new(
            ScriptedLlmClient::new()
                .tool_call("teleport", json!({}))
                .text("ok"),
        );
        let agent = AgentLoop::new("test", client.clone(), "m", "sys").tools(registry());
        agent.run("go").await.unwrap();

        let requests = client.requests();
        match &requests[1].messages.last().unwrap().content[0] {
            ContentBlock::ToolResult { content, is_error, .. } => {
                assert!(is_error);
                assert!(content.contains("Unknown tool 'teleport'"));
                assert!(content.contains("broken, count"));
            }
            other => panic!("expected tool result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn fatal_tool_error_aborts() {
        let client = Arc::new(ScriptedLlmClient::new().tool_call("broken", json!({})).text("never"));
        let agent = AgentLoop::new("test", client, "m", "sys").tools(registry());
        match agent.run("go").await {
            Err(AgentError::Tool { tool, message }) => {
                assert_eq!(tool, "broken");
                assert!(message.contains("token revoked"));
            }
            other => panic!("expected tool error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn stops_at_iteration_limit() {
        let client = Arc::new(
            ScriptedLlmClient::new()
                .tool_call("count", json!({}))
                .tool_call("count", json!({}))
                .tool_call("count", json!({})),
        );
        let agent = AgentLoop::new("test", client, "m", "sys")
            .tools(registry())
            .max_iterations(2);
        assert!(matches!(agent.run("go").await, Err(AgentError::MaxIterations(2))));
    }

    #[tokio::test]
    async fn llm_errors_propagate() {
        let client = Arc::new(ScriptedLlmClient::new());
        let agent = AgentLoop::new("test", client, "m", "sys");
        assert!(matches!(agent.run("go").await, Err(AgentError::Llm(_))));
    }
}

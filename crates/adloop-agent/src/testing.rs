// ABOUTME: Test utilities for adloop-agent: a fixed-text stub LLM and a scripted multi-turn LLM.
// ABOUTME: Used in tests to drive agents and workflows without real API calls.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{ContentBlock, LlmClient, LlmError, Request, Response, StopReason, Usage};

fn text_response(text: &str) -> Response {
    Response {
        id: "stub-msg-001".to_owned(),
        content: vec![ContentBlock::text(text)],
        stop_reason: StopReason::EndTurn,
        model: "stub-model".to_owned(),
        usage: Usage::default(),
    }
}

/// A stub LLM client that returns a pre-configured text response.
///
/// The response contains only a text block, so an agent loop sees no
/// tool-use requests and terminates after one turn.
#[derive(Debug, Clone)]
pub struct StubLlmClient {
    response_text: String,
}

impl StubLlmClient {
    pub fn new(response_text: &str) -> Self {
        Self {
            response_text: response_text.to_owned(),
        }
    }

    /// A stub that answers "Done."
    pub fn done() -> Self {
        Self::new("Done.")
    }
}

#[async_trait]
impl LlmClient for StubLlmClient {
    async fn create_message(&self, _req: &Request) -> Result<Response, LlmError> {
        Ok(text_response(&self.response_text))
    }

    fn provider_name(&self) -> &str {
        "stub"
    }
}

/// Replays a queue of responses in order and records every request.
///
/// Once the script runs out, further calls fail with a provider error so a
/// test notices an agent asking for more turns than expected.
#[derive(Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Response>>,
    requests: Mutex<Vec<Request>>,
    next_call: Mutex<usize>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, response: Response) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(response);
        }
        self
    }

    /// Queue a final text turn.
    pub fn text(self, text: &str) -> Self {
        self.respond(text_response(text))
    }

    /// Queue a turn that calls one tool.
    pub fn tool_call(self, name: &str, input: Value) -> Self {
        self.tool_calls(vec![(name, input)])
    }

    /// Queue a turn that calls several tools at once.
    pub fn tool_calls(self, calls: Vec<(&str, Value)>) -> Self {
        let content = calls
            .into_iter()
            .map(|(name, input)| {
                let id = {
                    let mut next = self.next_call.lock().unwrap_or_else(|e| e.into_inner());
                    *next += 1;
                    format!("call-{}", *next)
                };
                ContentBlock::ToolUse {
                    id,
                    name: name.to_string(),
                    input,
                }
            })
            .collect();
        self.respond(Response {
            id: "scripted".to_owned(),
            content,
            stop_reason: StopReason::ToolUse,
            model: "stub-model".to_owned(),
            usage: Usage::default(),
        })
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn create_message(&self, req: &Request) -> Result<Response, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(req.clone());
        }
        self.script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .ok_or_else(|| LlmError::ProviderError("scripted client has no responses left".to_string()))
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn stub_returns_configured_text() {
        let client = StubLlmClient::new("Hello, world!");
        let resp = client.create_message(&Request::new("test-model")).await.unwrap();
        assert_eq!(resp.text(), "Hello, world!");
        assert_eq!(resp.stop_reason, StopReason::EndTurn);
        assert!(!resp.has_tool_use());
    }

    #[tokio::test]
    async fn scripted_replays_in_order() {
        let client = ScriptedLlmClient::new()
            .tool_calls(vec![("a", json!({})), ("b", json!({"x": 1}))])
            .text("end");

        let first = client.create_message(&Request::new("m")).await.unwrap();
        assert_eq!(first.stop_reason, StopReason::ToolUse);
        let ids: Vec<&str> = first
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["call-1", "call-2"]);

        let second = client.create_message(&Request::new("m")).await.unwrap();
        assert_eq!(second.text(), "end");
        assert_eq!(client.remaining(), 0);
        assert!(client.create_message(&Request::new("m")).await.is_err());
        assert_eq!(client.requests().len(), 3);
    }
}

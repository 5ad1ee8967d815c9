// ABOUTME: OpenAI adapter implementing LlmClient over the Chat Completions API with function calling.
// ABOUTME: Tool results become role "tool" messages; tool calls carry JSON-encoded argument strings.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::llm::{ContentBlock, LlmClient, LlmError, Request, Response, Role, StopReason, Usage};
use crate::providers::{http_error, read_json};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI chat completions client.
pub struct OpenAIClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build the JSON request body for Chat Completions.
    pub fn build_request_body(req: &Request) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &req.system {
            messages.push(json!({"role": "system", "content": system}));
        }

        for msg in &req.messages {
            match msg.role {
                Role::User => {
                    let mut text = Vec::new();
                    for block in &msg.content {
                        match block {
                            ContentBlock::Text { text: t } => text.push(t.as_str()),
                            ContentBlock::ToolResult {
                                tool_use_id, content, ..
                            } => messages.push(json!({
                                "role": "tool",
                                "tool_call_id": tool_use_id,
                                "content": content,
                            })),
                            ContentBlock::ToolUse { .. } => {}
                        }
                    }
                    if !text.is_empty() {
                        messages.push(json!({"role": "user", "content": text.join("\n\n")}));
                    }
                }
                Role::Assistant => {
                    let mut text = Vec::new();
                    let mut calls = Vec::new();
                    for block in &msg.content {
                        match block {
                            ContentBlock::Text { text: t } => text.push(t.as_str()),
                            ContentBlock::ToolUse { id, name, input } => calls.push(json!({
                                "id": id,
                                "type": "function",
                                "function": {"name": name, "arguments": input.to_string()},
                            })),
                            ContentBlock::ToolResult { .. } => {}
                        }
                    }
                    let mut message = json!({
                        "role": "assistant",
                        "content": if text.is_empty() { Value::Null } else { json!(text.join("\n\n")) },
                    });
                    if !calls.is_empty() {
                        message["tool_calls"] = Value::Array(calls);
                    }
                    messages.push(message);
                }
            }
        }

        let mut body = json!({
            "model": req.model,
            "max_tokens": req.max_tokens,
            "messages": messages,
        });
        if !req.tools.is_empty() {
            body["tools"] = Value::Array(
                req.tools
                    .iter()
                    .map(|t| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.input_schema,
                            }
                        })
                    })
                    .collect(),
            );
        }
        body
    }

    /// Parse a Chat Completions response.
    pub fn parse_response(body: &Value) -> Result<Response, LlmError> {
        let choice = body
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| LlmError::InvalidResponse("missing choices in response".to_string()))?;
        let message = choice
            .get("message")
            .ok_or_else(|| LlmError::InvalidResponse("missing message in choice".to_string()))?;

        let mut blocks = Vec::new();
        if let Some(text) = message.get("content").and_then(|c| c.as_str())
            && !text.is_empty()
        {
            blocks.push(ContentBlock::text(text));
        }
        for call in message
            .get("tool_calls")
            .and_then(|t| t.as_array())
            .into_iter()
            .flatten()
        {
            let id = call.get("id").and_then(|i| i.as_str()).unwrap_or_default();
            let function = call.get("function").ok_or_else(|| {
                LlmError::InvalidResponse("tool call missing function".to_string())
            })?;
            let name = function.get("name").and_then(|n| n.as_str()).ok_or_else(|| {
                LlmError::InvalidResponse("tool call missing function name".to_string())
            })?;
            let arguments = function.get("arguments").and_then(|a| a.as_str()).unwrap_or("{}");
            let input: Value = serde_json::from_str(arguments).map_err(|e| {
                LlmError::InvalidResponse(format!("tool call arguments are not JSON: {}", e))
            })?;
            blocks.push(ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            });
        }

        let has_calls = blocks.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. }));
        let stop_reason = match choice.get("finish_reason").and_then(|f| f.as_str()) {
            Some("length") => StopReason::MaxTokens,
            _ if has_calls => StopReason::ToolUse,
            _ => StopReason::EndTurn,
        };

        let usage = body.get("usage");
        let tokens = |key: &str| {
            usage
                .and_then(|u| u.get(key))
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32
        };

        Ok(Response {
            id: body.get("id").and_then(|i| i.as_str()).unwrap_or_default().to_string(),
            content: blocks,
            stop_reason,
            model: body.get("model").and_then(|m| m.as_str()).unwrap_or_default().to_string(),
            usage: Usage {
                input_tokens: tokens("prompt_tokens"),
                output_tokens: tokens("completion_tokens"),
            },
        })
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn create_message(&self, req: &Request) -> Result<Response, LlmError> {
        let body = Self::build_request_body(req);
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;

        let response_body = read_json(response, "OPENAI_API_KEY").await?;
        Self::parse_response(&response_body)
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Message, ToolDefinition};

    #[test]
    fn system_message_comes_first() {
        let req = Request::new("gpt-4o")
            .system("You research products.")
            .message(Message::user("Research this."))
            .tools(vec![ToolDefinition {
                name: "web_summary".into(),
                description: "Summarize a page".into(),
                input_schema: json!({"type": "object", "properties": {"url": {"type": "string"}}}),
            }]);
        let body = OpenAIClient::build_request_body(&req);

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "web_summary");
        assert!(body["tools"][0]["function"].get("parameters").is_some());
    }

    #[test]
    fn tool_round_trip_messages() {
        let req = Request::new("gpt-4o")
            .message(Message::user("go"))
            .message(Message::assistant(vec![ContentBlock::ToolUse {
                id: "call_1".into(),
                name: "web_summary".into(),
                input: json!({"url": "https://x"}),
            }]))
            .message(Message::tool_results(vec![ContentBlock::ToolResult {
                tool_use_id: "call_1".into(),
                content: "Title: X".into(),
                is_error: false,
            }]));
        let body = OpenAIClient::build_request_body(&req);
        let messages = body["messages"].as_array().unwrap();

        assert_eq!(messages[1]["role"], "assistant");
        assert!(messages[1]["content"].is_null());
        assert_eq!(messages[1]["tool_calls"][0]["function"]["arguments"], r#"{"url":"https://x"}"#);
        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["tool_call_id"], "call_1");
    }

    #[test]
    fn parses_tool_calls() {
        let body = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_7",
                        "type": "function",
                        "function": {"name": "get_insights", "arguments": "{\"object_id\":\"c1\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 40, "completion_tokens": 9}
        });
        let resp = OpenAIClient::parse_response(&body).unwrap();
        assert_eq!(resp.stop_reason, StopReason::ToolUse);
        assert_eq!(resp.usage.output_tokens, 9);
        match &resp.content[0] {
            ContentBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "call_7");
                assert_eq!(name, "get_insights");
                assert_eq!(input["object_id"], "c1");
            }
            other => panic!("expected ToolUse, got {:?}", other),
        }
    }

    #[test]
    fn parses_text_and_length_stop() {
        let body = json!({
            "choices": [{"message": {"content": "partial"}, "finish_reason": "length"}]
        });
        let resp = OpenAIClient::parse_response(&body).unwrap();
        assert_eq!(resp.stop_reason, StopReason::MaxTokens);
        assert_eq!(resp.text(), "partial");
    }

    #[test]
    fn bad_arguments_are_invalid() {
        let body = json!({
            "choices": [{"message": {"tool_calls": [{"id": "c", "function": {"name": "x", "arguments": "{oops"}}]}}]
        });
        assert!(matches!(
            OpenAIClient::parse_response(&body),
            Err(LlmError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    #[cfg(feature = "live-test")]
    async fn openai_live_round_trip() {
        let client = OpenAIClient::new(std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY must be set"));
        let req = Request::new(crate::client::DEFAULT_OPENAI_MODEL)
            .system("Reply with a JSON object only.")
            .message(crate::llm::Message::user(r#"Reply with {"keywords": ["shoe"]}"#))
            .max_tokens(64);

        let result = client.create_message(&req).await;
        assert!(result.is_ok(), "live test failed: {:?}", result.err());
        assert!(result.unwrap().text().contains("keywords"));
    }
}

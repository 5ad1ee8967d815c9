// ABOUTME: Anthropic Claude adapter implementing LlmClient over the Messages API.
// ABOUTME: Content blocks map one-to-one; consecutive same-role messages are merged.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::llm::{ContentBlock, LlmClient, LlmError, Message, Request, Response, Role, StopReason, Usage};
use crate::providers::{http_error, read_json};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Anthropic Claude client.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
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

    /// Build the JSON request body for the Messages API.
    pub fn build_request_body(req: &Request) -> Value {
        let messages: Vec<Value> = coalesce_messages(&req.messages)
            .iter()
            .map(|m| {
                json!({
                    "role": match m.role { Role::User => "user", Role::Assistant => "assistant" },
                    "content": m.content.iter().map(block_to_json).collect::<Vec<_>>(),
                })
            })
            .collect();

        let mut body = json!({
            "model": req.model,
            "max_tokens": req.max_tokens,
            "messages": messages,
        });
        if let Some(system) = &req.system {
            body["system"] = json!(system);
        }
        if !req.tools.is_empty() {
            body["tools"] = Value::Array(
                req.tools
                    .iter()
                    .map(|t| {
                        json!({
                            "name": t.name,
                            "description": t.description,
                            "input_schema": t.input_schema,
                        })
                    })
                    .collect(),
            );
        }
        body
    }

    /// Parse a Messages API response.
    pub fn parse_response(body: &Value) -> Result<Response, LlmError> {
        let content = body
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| LlmError::InvalidResponse("missing content array in response".to_string()))?;

        let mut blocks = Vec::new();
        for block in content {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("text") => {
                    let text = block.get("text").and_then(|t| t.as_str()).unwrap_or("");
                    blocks.push(ContentBlock::text(text));
                }
                Some("tool_use") => {
                    let id = block.get("id").and_then(|i| i.as_str()).ok_or_else(|| {
                        LlmError::InvalidResponse("tool_use block missing id".to_string())
                    })?;
                    let name = block.get("name").and_then(|n| n.as_str()).ok_or_else(|| {
                        LlmError::InvalidResponse("tool_use block missing name".to_string())
                    })?;
                    blocks.push(ContentBlock::ToolUse {
                        id: id.to_string(),
                        name: name.to_string(),
                        input: block.get("input").cloned().unwrap_or(json!({})),
                    });
                }
                // Thinking and other block types carry nothing the loop needs.
                _ => {}
            }
        }

        let stop_reason = match body.get("stop_reason").and_then(|s| s.as_str()) {
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            Some("stop_sequence") => StopReason::StopSequence,
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
                input_tokens: tokens("input_tokens"),
                output_tokens: tokens("output_tokens"),
            },
        })
    }
}

fn block_to_json(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({"type": "text", "text": text}),
        ContentBlock::ToolUse { id, name, input } => {
            json!({"type": "tool_use", "id": id, "name": name, "input": input})
        }
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": content,
            "is_error": is_error,
        }),
    }
}

/// Merge consecutive messages with the same role.
/// The Messages API requires alternating user/assistant turns.
fn coalesce_messages(messages: &[Message]) -> Vec<Message> {
    let mut result: Vec<Message> = Vec::new();
    for msg in messages {
        if let Some(last) = result.last_mut()
            && last.role == msg.role
        {
            last.content.extend(msg.content.iter().cloned());
            continue;
        }
        result.push(msg.clone());
    }
    result
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn create_message(&self, req: &Request) -> Result<Response, LlmError> {
        let body = Self::build_request_body(req);
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;

        let response_body = read_json(response, "ANTHROPIC_API_KEY").await?;
        Self::parse_response(&response_body)
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}

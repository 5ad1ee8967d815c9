// ABOUTME: Google Gemini adapter implementing LlmClient over generateContent with function declarations.
// ABOUTME: Gemini has no call ids, so ids are synthesized and mapped back to function names for responses.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::llm::{ContentBlock, LlmClient, LlmError, Request, Response, Role, StopReason, Usage};
use crate::providers::{http_error, read_json};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini client.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
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

    /// Build the JSON request body for generateContent.
    pub fn build_request_body(req: &Request) -> Value {
        // functionResponse parts need the function name, which only the matching call knows.
        let mut call_names: HashMap<&str, &str> = HashMap::new();
        let mut contents: Vec<Value> = Vec::new();

        for msg in &req.messages {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            let mut parts = Vec::new();
            for block in &msg.content {
                match block {
                    ContentBlock::Text { text } => parts.push(json!({"text": text})),
                    ContentBlock::ToolUse { id, name, input } => {
                        call_names.insert(id.as_str(), name.as_str());
                        parts.push(json!({"functionCall": {"name": name, "args": input}}));
                    }
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    } => {
                        let name = call_names.get(tool_use_id.as_str()).copied().unwrap_or("unknown");
                        let key = if *is_error { "error" } else { "content" };
                        parts.push(json!({
                            "functionResponse": {"name": name, "response": {key: content}}
                        }));
                    }
                }
            }

            // Gemini requires alternating roles, so merge consecutive same-role turns.
            if let Some(last) = contents.last_mut()
                && last["role"] == role
                && let Some(existing) = last["parts"].as_array_mut()
            {
                existing.extend(parts);
                continue;
            }
            contents.push(json!({"role": role, "parts": parts}));
        }

        let mut body = json!({
            "contents": contents,
            "generation_config": {"max_output_tokens": req.max_tokens},
        });
        if let Some(system) = &req.system {
            body["system_instruction"] = json!({"parts": [{"text": system}]});
        }
        if !req.tools.is_empty() {
            let declarations: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    })
                })
                .collect();
            body["tools"] = json!([{"function_declarations": declarations}]);
        }
        body
    }

    /// Parse a generateContent response.
    pub fn parse_response(body: &Value) -> Result<Response, LlmError> {
        let candidate = body
            .get("candidates")
            .and_then(|c| c.as_array())
            .ok_or_else(|| LlmError::InvalidResponse("missing candidates array in response".to_string()))?
            .first()
            .ok_or_else(|| LlmError::InvalidResponse("empty candidates array".to_string()))?;

        let parts = candidate
            .pointer("/content/parts")
            .and_then(|p| p.as_array())
            .ok_or_else(|| LlmError::InvalidResponse("missing content parts in candidate".to_string()))?;

        let mut blocks = Vec::new();
        for (index, part) in parts.iter().enumerate() {
            if let Some(call) = part.get("functionCall") {
                let name = call.get("name").and_then(|n| n.as_str()).ok_or_else(|| {
                    LlmError::InvalidResponse("functionCall missing name".to_string())
                })?;
                blocks.push(ContentBlock::ToolUse {
                    id: format!("{}-{}", name, index),
                    name: name.to_string(),
                    input: call.get("args").cloned().unwrap_or(json!({})),
                });
            } else if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                blocks.push(ContentBlock::text(text));
            }
        }

        let has_calls = blocks.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. }));
        let stop_reason = match candidate.get("finishReason").and_then(|f| f.as_str()) {
            Some("MAX_TOKENS") => StopReason::MaxTokens,
            _ if has_calls => StopReason::ToolUse,
            _ => StopReason::EndTurn,
        };

        let usage = body.get("usageMetadata");
        let tokens = |key: &str| {
            usage
                .and_then(|u| u.get(key))
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32
        };

        Ok(Response {
            id: body.get("responseId").and_then(|i| i.as_str()).unwrap_or_default().to_string(),
            content: blocks,
            stop_reason,
            model: body.get("modelVersion").and_then(|m| m.as_str()).unwrap_or_default().to_string(),
            usage: Usage {
                input_tokens: tokens("promptTokenCount"),
                output_tokens: tokens("candidatesTokenCount"),
            },
        })
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn create_message(&self, req: &Request) -> Result<Response, LlmError> {
        let body = Self::build_request_body(req);
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, req.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;

        let response_body = read_json(response, "GEMINI_API_KEY").await?;
        Self::parse_response(&response_body)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Message, ToolDefinition};

    #[test]
    fn builds_request_body() {
        let req = Request::new("gemini-2.0-flash")
            .system("You evaluate ad performance.")
            .message(Message::user("Evaluate."))
            .tools(vec![ToolDefinition {
                name: "get_insights".into(),
                description: "Fetch insights".into(),
                input_schema: json!({"type": "object", "properties": {"object_id": {"type": "string"}}}),
            }]);
        let body = GeminiClient::build_request_body(&req);

        assert_eq!(body["system_instruction"]["parts"][0]["text"], "You evaluate ad performance.");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["tools"][0]["function_declarations"][0]["name"], "get_insights");
        assert_eq!(body["generation_config"]["max_output_tokens"], 4096);
    }

    #[test]
    fn function_response_uses_call_name() {
        let req = Request::new("gemini-2.0-flash")
            .message(Message::user("go"))
            .message(Message::assistant(vec![ContentBlock::ToolUse {
                id: "get_insights-0".into(),
                name: "get_insights".into(),
                input: json!({"object_id": "c1"}),
            }]))
            .message(Message::tool_results(vec![ContentBlock::ToolResult {
                tool_use_id: "get_insights-0".into(),
                content: "{\"data\": []}".into(),
                is_error: false,
            }]));
        let body = GeminiClient::build_request_body(&req);
        let contents = body["contents"].as_array().unwrap();

        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["functionCall"]["name"], "get_insights");
        let response = &contents[2]["parts"][0]["functionResponse"];
        assert_eq!(response["name"], "get_insights");
        assert_eq!(response["response"]["content"], "{\"data\": []}");
        assert!(body.get("system_instruction").is_none());
    }

    #[test]
    fn parses_function_call() {
        let body = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "Checking."},
                    {"functionCall": {"name": "random_uuid", "args": {}}}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 20, "candidatesTokenCount": 4}
        });
        let resp = GeminiClient::parse_response(&body).unwrap();
        assert_eq!(resp.stop_reason, StopReason::ToolUse);
        assert_eq!(resp.usage.input_tokens, 20);
        match &resp.content[1] {
            ContentBlock::ToolUse { id, name, .. } => {
                assert_eq!(name, "random_uuid");
                assert_eq!(id, "random_uuid-1");
            }
            other => panic!("expected ToolUse, got {:?}", other),
        }
    }

    #[test]
    fn parses_plain_text() {
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "done"}]}, "finishReason": "STOP"}]
        });
        let resp = GeminiClient::parse_response(&body).unwrap();
        assert_eq!(resp.stop_reason, StopReason::EndTurn);
        assert_eq!(resp.text(), "done");
    }

    #[test]
    fn empty_candidates_is_invalid() {
        assert!(GeminiClient::parse_response(&json!({"candidates": []})).is_err());
        assert!(GeminiClient::parse_response(&json!({})).is_err());
    }

    #[tokio::test]
    #[cfg(feature = "live-test")]
    async fn gemini_live_round_trip() {
        let client = GeminiClient::new(std::env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY must be set"));
        let req = Request::new(crate::client::DEFAULT_GEMINI_MODEL)
            .system("Reply with a JSON object only.")
            .message(crate::llm::Message::user(r#"Reply with {"keywords": ["shoe"]}"#))
            .max_tokens(64);

        let result = client.create_message(&req).await;
        assert!(result.is_ok(), "live test failed: {:?}", result.err());
        assert!(result.unwrap().text().contains("keywords"));
    }
}

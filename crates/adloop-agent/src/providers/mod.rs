// ABOUTME: LLM provider adapters: Anthropic Messages, OpenAI Chat Completions, Gemini generateContent.
// ABOUTME: Shares HTTP status mapping so every provider reports failures the same way.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use serde_json::Value;

use crate::llm::LlmError;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use openai::OpenAIClient;

/// Map HTTP failures to LlmError and decode the JSON body on success.
/// `key_var` names the env var to mention on 401.
pub(crate) async fn read_json(response: reqwest::Response, key_var: &str) -> Result<Value, LlmError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(LlmError::RateLimited);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(LlmError::ProviderError(format!("Unauthorized: check {}", key_var)));
    }

    if status == reqwest::StatusCode::PAYLOAD_TOO_LARGE {
        return Err(LlmError::ContextTooLarge);
    }

    if status.is_server_error() {
        return Err(LlmError::ProviderError(format!("Server error: {}", status)));
    }

    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        return Err(LlmError::ProviderError(format!(
            "API error {}: {}",
            status, error_body
        )));
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::InvalidResponse(format!("failed to parse JSON: {}", e)))
}

pub(crate) fn http_error(e: reqwest::Error) -> LlmError {
    LlmError::ProviderError(format!("HTTP request failed: {}", e))
}

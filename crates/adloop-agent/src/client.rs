// ABOUTME: Factory for LLM clients by provider name.
// ABOUTME: Resolves provider name + optional model into a configured (Arc<dyn LlmClient>, model) pair.

use std::env;
use std::sync::Arc;

use crate::llm::LlmClient;
use crate::providers::{AnthropicClient, GeminiClient, OpenAIClient};

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5-20250929";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Read an env var and return `Some(value)` only if it is non-empty after trimming.
fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|v| {
        let trimmed = v.trim().to_string();
        if trimmed.is_empty() { None } else { Some(trimmed) }
    })
}

fn api_key(var: &str) -> Result<String, anyhow::Error> {
    non_empty_env(var).ok_or_else(|| anyhow::anyhow!("{} environment variable not set", var))
}

/// Create an LLM client for the given provider name.
///
/// Returns a tuple of (client, resolved_model). The model is resolved from:
/// 1. The explicit `model` parameter (if Some)
/// 2. A provider-specific environment variable (e.g. GEMINI_MODEL)
/// 3. A default for that provider
pub fn create_llm_client(
    provider: &str,
    model: Option<&str>,
) -> Result<(Arc<dyn LlmClient>, String), anyhow::Error> {
    let resolve = |var: &str, default: &str| {
        model
            .map(String::from)
            .or_else(|| non_empty_env(var))
            .unwrap_or_else(|| default.to_string())
    };

    match provider.to_lowercase().as_str() {
        "anthropic" => {
            let mut client = AnthropicClient::new(api_key("ANTHROPIC_API_KEY")?);
            if let Some(base_url) = non_empty_env("ANTHROPIC_BASE_URL") {
                client = client.with_base_url(base_url);
            }
            Ok((Arc::new(client), resolve("ANTHROPIC_MODEL", DEFAULT_ANTHROPIC_MODEL)))
        }
        "openai" => {
            let mut client = OpenAIClient::new(api_key("OPENAI_API_KEY")?);
            if let Some(base_url) = non_empty_env("OPENAI_BASE_URL") {
                client = client.with_base_url(base_url);
            }
            Ok((Arc::new(client), resolve("OPENAI_MODEL", DEFAULT_OPENAI_MODEL)))
        }
        "gemini" => {
            let mut client = GeminiClient::new(api_key("GEMINI_API_KEY")?);
            if let Some(base_url) = non_empty_env("GEMINI_BASE_URL") {
                client = client.with_base_url(base_url);
            }
            Ok((Arc::new(client), resolve("GEMINI_MODEL", DEFAULT_GEMINI_MODEL)))
        }
        unknown => Err(anyhow::anyhow!("unsupported LLM provider: {}", unknown)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serialize all tests that read/write env vars.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_VARS: &[&str] = &[
        "ANTHROPIC_API_KEY",
        "ANTHROPIC_MODEL",
        "ANTHROPIC_BASE_URL",
        "OPENAI_API_KEY",
        "OPENAI_MODEL",
        "OPENAI_BASE_URL",
        "GEMINI_API_KEY",
        "GEMINI_MODEL",
        "GEMINI_BASE_URL",
    ];

    fn save_env() -> Vec<(&'static str, Option<String>)> {
        ENV_VARS.iter().map(|&k| (k, env::var(k).ok())).collect()
    }

    fn restore_env(snapshot: &[(&str, Option<String>)]) {
        for &(key, ref val) in snapshot {
            match val {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }
    }

    /// Arc<dyn LlmClient> doesn't impl Debug, so unwrap_err() is unavailable.
    fn expect_err(result: Result<(Arc<dyn LlmClient>, String), anyhow::Error>) -> String {
        match result {
            Err(e) => e.to_string(),
            Ok((_client, model)) => panic!("expected error, got Ok with model: {}", model),
        }
    }

    fn expect_ok(result: Result<(Arc<dyn LlmClient>, String), anyhow::Error>) -> (Arc<dyn LlmClient>, String) {
        match result {
            Ok(pair) => pair,
            Err(e) => panic!("expected Ok, got Err: {}", e),
        }
    }

    #[test]
    fn unknown_provider_returns_error() {
        let err = expect_err(create_llm_client("unknown", None));
        assert!(err.contains("unsupported LLM provider"), "got: {}", err);
    }

    #[test]
    fn missing_api_keys_are_named() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let saved = save_env();
        for var in ["ANTHROPIC_API_KEY", "OPENAI_API_KEY", "GEMINI_API_KEY"] {
            unsafe { env::remove_var(var) };
        }
        let errors = [
            expect_err(create_llm_client("anthropic", None)),
            expect_err(create_llm_client("openai", None)),
            expect_err(create_llm_client("gemini", None)),
        ];
        restore_env(&saved);

        assert!(errors[0].contains("ANTHROPIC_API_KEY"));
        assert!(errors[1].contains("OPENAI_API_KEY"));
        assert!(errors[2].contains("GEMINI_API_KEY"));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let saved = save_env();
        unsafe { env::set_var("GEMINI_API_KEY", "   ") };
        let err = expect_err(create_llm_client("gemini", None));
        restore_env(&saved);
        assert!(err.contains("GEMINI_API_KEY"));
    }

    #[test]
    fn model_resolution_order() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let saved = save_env();
        unsafe {
            env::set_var("GEMINI_API_KEY", "k");
            env::remove_var("GEMINI_MODEL");
        }
        let (client, default_model) = expect_ok(create_llm_client("gemini", None));

        unsafe { env::set_var("GEMINI_MODEL", "gemini-2.5-pro") };
        let (_, env_model) = expect_ok(create_llm_client("Gemini", None));
        let (_, explicit) = expect_ok(create_llm_client("gemini", Some("gemini-exp")));
        restore_env(&saved);

        assert_eq!(client.provider_name(), "gemini");
        assert_eq!(default_model, DEFAULT_GEMINI_MODEL);
        assert_eq!(env_model, "gemini-2.5-pro");
        assert_eq!(explicit, "gemini-exp");
    }

    #[test]
    fn anthropic_and_openai_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let saved = save_env();
        unsafe {
            env::set_var("ANTHROPIC_API_KEY", "a");
            env::set_var("OPENAI_API_KEY", "o");
            env::remove_var("ANTHROPIC_MODEL");
            env::remove_var("OPENAI_MODEL");
        }
        let (_, anthropic) = expect_ok(create_llm_client("anthropic", None));
        let (_, openai) = expect_ok(create_llm_client("openai", None));
        restore_env(&saved);

        assert_eq!(anthropic, DEFAULT_ANTHROPIC_MODEL);
        assert_eq!(openai, DEFAULT_OPENAI_MODEL);
    }
}

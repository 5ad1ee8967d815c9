// ABOUTME: Raw Graph API call for endpoints the typed wrappers do not cover.

use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;

use crate::client::{GraphClient, Params};
use crate::error::{GraphError, ToolError};
use crate::validate::require_arg;

const METHODS: [&str; 3] = ["GET", "POST", "DELETE"];

#[derive(Debug, Clone, Deserialize)]
pub struct GraphCall {
    /// Path relative to the versioned API root, e.g. `act_123/customaudiences`.
    pub endpoint: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Params>,
}

impl GraphClient {
    pub async fn call_graph(&self, args: &GraphCall) -> Result<Value, GraphError> {
        let endpoint = require_arg("endpoint", &args.endpoint)?.trim();
        if endpoint.contains("://") {
            return Err(ToolError::arg_invalid(
                "endpoint",
                "str",
                endpoint,
                "Use a path relative to the Graph API root, not a full URL",
            )
            .into());
        }
        let method = args.method.as_deref().map(str::trim).unwrap_or("GET").to_ascii_uppercase();
        let method = match method.as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "DELETE" => Method::DELETE,
            other => return Err(ToolError::invalid_enum_value("method", &METHODS, other).into()),
        };
        let mut params = args.params.clone().unwrap_or_default();
        // The client attaches its own token.
        params.remove("access_token");
        self.request(method, endpoint, params).await
    }
}

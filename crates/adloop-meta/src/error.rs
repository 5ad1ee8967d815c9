// ABOUTME: Errors for Graph API calls and the structured tool errors shown to agents.
// ABOUTME: ToolError serializes to {"error": {...}} so the LLM can read and correct its arguments.

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Graph error codes that mean the access token is no longer usable.
/// 190 invalid/expired token, 102 session, 4 app rate limit, 200 permission, 10 app permission.
pub const AUTH_ERROR_CODES: [i64; 5] = [190, 102, 4, 200, 10];

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("authentication required: no Meta access token is available")]
    AuthenticationRequired,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Graph API error (HTTP {status}, code {code:?}): {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        subcode: Option<i64>,
        message: String,
        body: Value,
    },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    InvalidArgument(ToolError),
}

impl GraphError {
    /// Whether the error means the cached token must be thrown away.
    pub fn is_auth_error(&self) -> bool {
        match self {
            GraphError::AuthenticationRequired => true,
            GraphError::Api { status, code, .. } => {
                *status == 401
                    || *status == 403
                    || code.is_some_and(|c| AUTH_ERROR_CODES.contains(&c))
            }
            _ => false,
        }
    }

    /// Render the error the way tools report it back to the agent.
    pub fn to_tool_error(&self) -> ToolError {
        match self {
            GraphError::AuthenticationRequired => ToolError::new("Authentication Required")
                .details("No valid Meta access token. Re-run authentication before calling Meta tools."),
            GraphError::InvalidArgument(err) => err.clone(),
            GraphError::Api {
                status,
                message,
                body,
                ..
            } => {
                let mut err = ToolError::new(format!("Graph API request failed with HTTP {}", status))
                    .details(message.clone());
                // Meta puts the human readable explanation in these two fields.
                if let Some(title) = body.pointer("/error/error_user_title").and_then(|v| v.as_str()) {
                    err = err.suggestions(format!(
                        "{}: {}",
                        title,
                        body.pointer("/error/error_user_msg")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                    ));
                }
                err
            }
            other => ToolError::api_call_error("Graph API request failed", other.to_string()),
        }
    }
}

/// An actionable error for an agent tool call.
#[derive(Debug, Clone, Error, PartialEq, Serialize)]
#[error("{message}")]
pub struct ToolError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<String>,
}

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
            example: None,
            suggestions: None,
        }
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn suggestions(mut self, suggestions: impl Into<String>) -> Self {
        self.suggestions = Some(suggestions.into());
        self
    }

    pub fn to_value(&self) -> Value {
        json!({ "error": self })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.to_value()).unwrap_or_else(|_| self.message.clone())
    }

    pub fn api_call_error(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self::new(message).details(details)
    }

    pub fn no_account_id() -> Self {
        Self::new("Account ID is required")
            .details("Account ID parameter cannot be empty")
            .example("Use account_id='act_1234567890' or account_id='1234567890'")
    }

    pub fn no_campaign_id() -> Self {
        Self::new("Campaign ID is required")
            .details("Campaign ID parameter cannot be empty")
            .example("Use campaign_id='1234567890'")
    }

    pub fn no_id() -> Self {
        Self::new("ID is required")
            .details("Should provide a valid 'campaign', 'ad set', 'ad' or 'account' ID")
    }

    pub fn arg_missing(arg: &str, ty: &str, details: impl Into<String>) -> Self {
        Self::new(format!("Argument {} with type {} is required", arg, ty)).details(details)
    }

    pub fn arg_invalid(arg: &str, ty: &str, value: impl std::fmt::Display, details: impl Into<String>) -> Self {
        Self::new(format!("Argument {} with type {}, invalid value: {}", arg, ty, value))
            .details(details)
    }

    pub fn invalid_enum_value(arg: &str, valid: &[&str], value: &str) -> Self {
        Self::new(format!("Enum argument {} with value '{}' is invalid", arg, value))
            .details(format!("Valid values for {} are: {}", arg, valid.join(", ")))
    }

    pub fn invalid_time_range(got: impl std::fmt::Display) -> Self {
        Self::new("Invalid time range argument")
            .details(format!(
                "Time range should be a preset name or an object with 'since' and 'until' keys in YYYY-MM-DD format. Got: {}",
                got
            ))
            .example(r#"{"since":"2023-01-01","until":"2023-01-31"}"#)
    }
}

impl From<ToolError> for GraphError {
    fn from(err: ToolError) -> Self {
        GraphError::InvalidArgument(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, code: Option<i64>) -> GraphError {
        GraphError::Api {
            status,
            code,
            subcode: None,
            message: "boom".to_string(),
            body: Value::Null,
        }
    }

    #[test]
    fn auth_errors_detected_by_status_and_code() {
        assert!(api_error(401, None).is_auth_error());
        assert!(api_error(403, None).is_auth_error());
        assert!(api_error(400, Some(190)).is_auth_error());
        assert!(api_error(400, Some(10)).is_auth_error());
        assert!(!api_error(400, Some(100)).is_auth_error());
        assert!(!api_error(500, None).is_auth_error());
        assert!(GraphError::AuthenticationRequired.is_auth_error());
    }

    #[test]
    fn tool_error_json_shape() {
        let value = ToolError::no_account_id().to_value();
        assert_eq!(value["error"]["message"], "Account ID is required");
        assert!(value["error"]["example"].as_str().unwrap().contains("act_"));
        assert!(value["error"].get("suggestions").is_none());
    }

    #[test]
    fn enum_error_lists_valid_values() {
        let err = ToolError::invalid_enum_value("status", &["ACTIVE", "PAUSED"], "RUNNING");
        assert_eq!(err.message, "Enum argument status with value 'RUNNING' is invalid");
        assert_eq!(
            err.details.as_deref(),
            Some("Valid values for status are: ACTIVE, PAUSED")
        );
    }

    #[test]
    fn api_error_surfaces_user_title() {
        let err = GraphError::Api {
            status: 400,
            code: Some(100),
            subcode: Some(1487),
            message: "Invalid parameter".to_string(),
            body: json!({"error": {
                "message": "Invalid parameter",
                "error_user_title": "Budget Too Low",
                "error_user_msg": "Raise the daily budget"
            }}),
        };
        let tool = err.to_tool_error();
        assert_eq!(tool.details.as_deref(), Some("Invalid parameter"));
        assert_eq!(
            tool.suggestions.as_deref(),
            Some("Budget Too Low: Raise the daily budget")
        );
    }
}

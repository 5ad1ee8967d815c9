// ABOUTME: Thin async client for the Meta Graph API over reqwest.
// ABOUTME: Encodes parameters Graph-style, attaches the access token, and parses the error envelope.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Method;
use serde_json::{Map, Value};

use crate::error::{GraphError, ToolError};

pub const DEFAULT_GRAPH_API_BASE: &str = "https://graph.facebook.com/v24.0";
const USER_AGENT: &str = "adloop/1.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Request parameters. Objects and arrays are JSON-encoded on the wire.
pub type Params = Map<String, Value>;

/// Where the client gets its access token, and who to tell when it stops working.
pub trait AccessTokenSource: Send + Sync {
    fn access_token(&self) -> Option<String>;

    /// Called when the API rejects the token so the next call re-authenticates.
    fn invalidate(&self);
}

/// A fixed token, e.g. from `META_ACCESS_TOKEN`. Invalidation empties it.
pub struct StaticToken(Mutex<Option<String>>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Mutex::new(Some(token.into())))
    }
}

impl AccessTokenSource for StaticToken {
    fn access_token(&self) -> Option<String> {
        self.0.lock().ok().and_then(|t| t.clone())
    }

    fn invalidate(&self) {
        if let Ok(mut token) = self.0.lock() {
            *token = None;
        }
    }
}

/// Graph API client. Cheap to clone; clones share the HTTP pool and token source.
#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn AccessTokenSource>,
}

impl GraphClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn AccessTokenSource>) -> Result<Self, GraphError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(&self, endpoint: &str, params: Params) -> Result<Value, GraphError> {
        self.request(Method::GET, endpoint, params).await
    }

    pub async fn post(&self, endpoint: &str, params: Params) -> Result<Value, GraphError> {
        self.request(Method::POST, endpoint, params).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Value, GraphError> {
        self.request(Method::DELETE, endpoint, Params::new()).await
    }

    /// Issue a request. GET and DELETE send parameters in the query string,
    /// POST sends them form-encoded.
    pub async fn request(&self, method: Method, endpoint: &str, params: Params) -> Result<Value, GraphError> {
        let token = self
            .tokens
            .access_token()
            .filter(|t| !t.trim().is_empty())
            .ok_or(GraphError::AuthenticationRequired)?;

        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        let mut pairs = encode_params(&params);
        pairs.push(("access_token".to_string(), token));

        let builder = self.http.request(method.clone(), &url);
        let builder = if method == Method::POST {
            builder.form(&pairs)
        } else {
            builder.query(&pairs)
        };

        tracing::debug!(%method, endpoint, "graph api request");
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                GraphError::InvalidResponse(format!("non-JSON body (HTTP {}): {}", status, e))
            })?
        };

        if !status.is_success() || body.get("error").is_some() {
            let err = parse_error(status.as_u16(), body);
            if err.is_auth_error() {
                tracing::warn!(endpoint, error = %err, "access token rejected, invalidating");
                self.tokens.invalidate();
            } else {
                tracing::warn!(endpoint, error = %err, "graph api request failed");
            }
            return Err(err);
        }

        Ok(body)
    }

    /// Fetch a public file, e.g. a product picture to upload. No token is sent.
    pub(crate) async fn download(&self, url: &str) -> Result<Vec<u8>, GraphError> {
        let failed = |reason: String| {
            GraphError::InvalidArgument(ToolError::api_call_error(format!("Failed to download {}", url), reason))
        };
        let response = self.http.get(url).send().await.map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status)));
        }
        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        tracing::debug!(url, bytes = bytes.len(), "downloaded file");
        Ok(bytes.to_vec())
    }
}

/// Flatten parameters into string pairs: strings as-is, scalars via Display,
/// objects and arrays as JSON text, nulls dropped.
pub fn encode_params(params: &Params) -> Vec<(String, String)> {
    params
        .iter()
        .filter_map(|(key, value)| {
            let encoded = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Array(_) | Value::Object(_) => value.to_string(),
            };
            Some((key.clone(), encoded))
        })
        .collect()
}

/// Build a GraphError from a failed response body.
pub fn parse_error(status: u16, body: Value) -> GraphError {
    let error = body.get("error");
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(String::from)
        .unwrap_or_else(|| format!("HTTP {} with no error message", status));
    let code = error.and_then(|e| e.get("code")).and_then(|c| c.as_i64());
    let subcode = error
        .and_then(|e| e.get("error_subcode"))
        .and_then(|c| c.as_i64());

    GraphError::Api {
        status,
        code,
        subcode,
        message,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::{Form, Query};
    use axum::routing::{get, post};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn encode_params_json_encodes_structures() {
        let mut params = Params::new();
        params.insert("fields".into(), json!("id,name"));
        params.insert("limit".into(), json!(10));
        params.insert("targeting".into(), json!({"geo_locations": {"countries": ["US"]}}));
        params.insert("special_ad_categories".into(), json!([]));
        params.insert("is_dynamic_creative".into(), json!(false));
        params.insert("after".into(), Value::Null);

        let pairs: HashMap<String, String> = encode_params(&params).into_iter().collect();
        assert_eq!(pairs.len(), 5);
        assert_eq!(pairs["fields"], "id,name");
        assert_eq!(pairs["limit"], "10");
        assert_eq!(pairs["targeting"], r#"{"geo_locations":{"countries":["US"]}}"#);
        assert_eq!(pairs["special_ad_categories"], "[]");
        assert_eq!(pairs["is_dynamic_creative"], "false");
    }

    #[test]
    fn parse_error_reads_graph_envelope() {
        let err = parse_error(
            400,
            json!({"error": {"message": "Invalid OAuth access token.", "type": "OAuthException", "code": 190, "error_subcode": 463}}),
        );
        match &err {
            GraphError::Api { status, code, subcode, message, .. } => {
                assert_eq!(*status, 400);
                assert_eq!(*code, Some(190));
                assert_eq!(*subcode, Some(463));
                assert_eq!(message, "Invalid OAuth access token.");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
        assert!(err.is_auth_error());
    }

    #[tokio::test]
    async fn blank_token_fails_without_request() {
        let client = GraphClient::new("http://127.0.0.1:9", Arc::new(StaticToken::new("  "))).unwrap();
        let err = client.get("me/adaccounts", Params::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::AuthenticationRequired));
    }

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn get_sends_token_and_params_in_query() {
        let app = Router::new().route(
            "/me/adaccounts",
            get(|Query(q): Query<HashMap<String, String>>| async move { axum::Json(json!({ "echo": q })) }),
        );
        let base = spawn(app).await;
        let client = GraphClient::new(base, Arc::new(StaticToken::new("tok"))).unwrap();

        let mut params = Params::new();
        params.insert("limit".into(), json!(5));
        let body = client.get("me/adaccounts", params).await.unwrap();

        assert_eq!(body["echo"]["access_token"], "tok");
        assert_eq!(body["echo"]["limit"], "5");
    }

    #[tokio::test]
    async fn post_sends_form_body() {
        let app = Router::new().route(
            "/act_1/campaigns",
            post(|Form(f): Form<HashMap<String, String>>| async move { axum::Json(json!({ "id": "c1", "form": f })) }),
        );
        let base = spawn(app).await;
        let client = GraphClient::new(base, Arc::new(StaticToken::new("tok"))).unwrap();

        let mut params = Params::new();
        params.insert("special_ad_categories".into(), json!(["HOUSING"]));
        let body = client.post("/act_1/campaigns", params).await.unwrap();

        assert_eq!(body["id"], "c1");
        assert_eq!(body["form"]["special_ad_categories"], r#"["HOUSING"]"#);
        assert_eq!(body["form"]["access_token"], "tok");
    }

    #[tokio::test]
    async fn auth_failure_invalidates_token() {
        let app = Router::new().route(
            "/me",
            get(|| async {
                (
                    axum::http::StatusCode::BAD_REQUEST,
                    axum::Json(json!({"error": {"message": "Session has expired", "code": 190}})),
                )
            }),
        );
        let base = spawn(app).await;
        let tokens = Arc::new(StaticToken::new("tok"));
        let client = GraphClient::new(base, tokens.clone()).unwrap();

        let err = client.get("me", Params::new()).await.unwrap_err();
        assert!(err.is_auth_error());
        assert_eq!(tokens.access_token(), None);

        let err = client.get("me", Params::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::AuthenticationRequired));
    }
}

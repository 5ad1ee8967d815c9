// ABOUTME: Local axum server that receives the OAuth redirect and hands the code to the waiting manager.
// ABOUTME: Scans for a free port from 8080 and shuts down on delivery, timeout, or drop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use askama::Template;
use askama_derive_axum::IntoResponse as AskamaIntoResponse;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;

use super::OAuthError;

pub const DEFAULT_CALLBACK_PORT: u16 = 8080;
pub const PORT_ATTEMPTS: u16 = 10;
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(180);

type CodeResult = Result<String, OAuthError>;

/// What `/token` reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallbackStatus {
    pub received: bool,
    pub error: Option<String>,
}

struct CallbackState {
    sender: Mutex<Option<oneshot::Sender<CodeResult>>>,
    expected_state: Option<String>,
    status: Mutex<CallbackStatus>,
}

impl CallbackState {
    /// Hand the result to the waiter. Only the first delivery counts.
    fn deliver(&self, result: CodeResult) {
        if let Ok(mut status) = self.status.lock() {
            status.received = result.is_ok();
            status.error = result.as_ref().err().map(|e| e.to_string());
        }
        let sender = self.sender.lock().ok().and_then(|mut s| s.take());
        if let Some(tx) = sender {
            let _ = tx.send(result);
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Template, AskamaIntoResponse)]
#[template(path = "callback_success.html")]
struct SuccessTemplate {
    state: Option<String>,
}

#[derive(Template, AskamaIntoResponse)]
#[template(path = "callback_error.html")]
struct ErrorTemplate {
    error: String,
    description: Option<String>,
}

fn error_page(state: &CallbackState, error: String, description: Option<String>) -> Response {
    tracing::warn!(%error, "oauth callback failed");
    state.deliver(Err(OAuthError::Denied(error.clone())));
    (StatusCode::BAD_REQUEST, ErrorTemplate { error, description }).into_response()
}

/// GET /callback - Receive the authorization redirect.
async fn callback(State(state): State<Arc<CallbackState>>, Query(query): Query<CallbackQuery>) -> Response {
    if let Some(error) = query.error {
        return error_page(&state, error, query.error_description);
    }
    if let Some(expected) = &state.expected_state
        && query.state.as_deref() != Some(expected.as_str())
    {
        return error_page(
            &state,
            "State mismatch".to_string(),
            Some("The callback did not come from the request adloop started.".to_string()),
        );
    }
    match query.code.filter(|c| !c.is_empty()) {
        Some(code) => {
            tracing::info!("received oauth authorization code");
            state.deliver(Ok(code));
            SuccessTemplate { state: query.state }.into_response()
        }
        None => error_page(&state, "No authorization code received".to_string(), None),
    }
}

/// GET /token - Report whether a code has arrived.
async fn token_status(State(state): State<Arc<CallbackState>>) -> Json<CallbackStatus> {
    Json(state.status.lock().map(|s| s.clone()).unwrap_or_default())
}

/// Build the callback router. Returns the router and the receiver that gets the code.
pub fn router(expected_state: Option<String>) -> (Router, oneshot::Receiver<CodeResult>) {
    let (tx, rx) = oneshot::channel();
    let state = Arc::new(CallbackState {
        sender: Mutex::new(Some(tx)),
        expected_state,
        status: Mutex::new(CallbackStatus::default()),
    });
    let app = Router::new()
        .route("/callback", get(callback))
        .route("/token", get(token_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    (app, rx)
}

/// A running callback server.
pub struct CallbackServer {
    port: u16,
    receiver: oneshot::Receiver<CodeResult>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl CallbackServer {
    /// Bind the first free port in `first_port..first_port + PORT_ATTEMPTS` and start serving.
    /// A `first_port` of 0 lets the OS choose.
    pub async fn start(first_port: u16, expected_state: Option<String>) -> Result<Self, OAuthError> {
        let last = first_port.saturating_add(PORT_ATTEMPTS - 1);
        let mut bound = None;
        for port in first_port..=last {
            match TcpListener::bind(("127.0.0.1", port)).await {
                Ok(listener) => {
                    bound = Some(listener);
                    break;
                }
                Err(e) => tracing::debug!(port, error = %e, "callback port busy"),
            }
        }
        let listener = bound.ok_or(OAuthError::NoFreePort { first: first_port, last })?;
        let port = listener.local_addr()?.port();

        let (app, receiver) = router(expected_state);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "oauth callback server failed");
            }
        });
        tracing::info!(port, "oauth callback server listening");

        Ok(Self {
            port,
            receiver,
            shutdown: Some(shutdown_tx),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.port)
    }

    /// Wait for the redirect, then stop the server.
    pub async fn wait_for_code(mut self, timeout: Duration) -> Result<String, OAuthError> {
        let outcome = tokio::time::timeout(timeout, &mut self.receiver).await;
        self.stop();
        match outcome {
            Err(_) => Err(OAuthError::Timeout(timeout)),
            Ok(Err(_)) => Err(OAuthError::CallbackClosed),
            Ok(Ok(result)) => result,
        }
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::Request;
    use tower::ServiceExt;

    async fn body_text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn callback_delivers_code() {
        let (app, rx) = router(Some("s1".to_string()));
        let resp = app
            .clone()
            .oneshot(Request::get("/callback?code=abc&state=s1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("Authorization complete"));
        assert_eq!(rx.await.unwrap().unwrap(), "abc");

        let resp = app
            .oneshot(Request::get("/token").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(status["received"], true);
    }

    #[tokio::test]
    async fn denied_callback_reports_error() {
        let (app, rx) = router(None);
        let resp = app
            .oneshot(
                Request::get("/callback?error=access_denied&error_description=User+denied")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let html = body_text(resp).await;
        assert!(html.contains("access_denied"));
        assert!(html.contains("User denied"));
        assert!(matches!(rx.await.unwrap(), Err(OAuthError::Denied(_))));
    }

    #[tokio::test]
    async fn state_mismatch_is_rejected() {
        let (app, rx) = router(Some("expected".to_string()));
        let resp = app
            .oneshot(Request::get("/callback?code=abc&state=other").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(rx.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn server_receives_code_over_http() {
        let server = CallbackServer::start(0, None).await.unwrap();
        let url = format!("http://127.0.0.1:{}/callback?code=xyz", server.port());
        let fetch = tokio::spawn(async move { reqwest::get(url).await.unwrap().status() });

        let code = server.wait_for_code(Duration::from_secs(5)).await.unwrap();
        assert_eq!(code, "xyz");
        assert_eq!(fetch.await.unwrap(), reqwest::StatusCode::OK);
    }

    #[tokio::test]
    async fn wait_times_out() {
        let server = CallbackServer::start(0, None).await.unwrap();
        let err = server.wait_for_code(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, OAuthError::Timeout(_)));
    }
}

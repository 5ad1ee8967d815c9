// ABOUTME: Meta Marketing (Graph) API access for adloop.
// ABOUTME: Provides the HTTP client, argument validation, Ads endpoint wrappers, and the OAuth flow.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod oauth;
pub mod validate;

pub use client::{AccessTokenSource, DEFAULT_GRAPH_API_BASE, GraphClient, Params, StaticToken};
pub use error::{GraphError, ToolError};
pub use oauth::{OAuthConfig, OAuthError, OAuthManager, OAuthToken, TokenCache};
pub use validate::{EnumValidator, valid_account_id};

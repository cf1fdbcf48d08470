//! API client for communicating with the Planventure REST API.
//!
//! `ApiClient` sends every request with the session's bearer token and
//! classifies the response (see [`ApiError::classify`]). A 401 means the
//! credential is no longer valid anywhere: the client logs the session out
//! and sends the active view to the login route before returning
//! [`ApiError::Unauthorized`].
//!
//! Requests are sent once. There is no retry, timeout or cancellation.
//! Each request remembers the token it carried; if the session no longer
//! holds that token when the answer arrives (a sibling request forced a
//! logout, or the user signed out or in again), a success or 401 is
//! reported as [`ApiError::Unauthorized`] without touching the new session.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{header, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::ApiError;
use crate::auth::SessionManager;
use crate::config::Config;
use crate::models::{AuthPayload, LoginRequest, RegisterRequest, UserProfile};
use crate::routing::{Navigator, LOGIN_ROUTE};

// ============================================================================
// Endpoints
// ============================================================================

const LOGIN_PATH: &str = "/login";
const REGISTER_PATH: &str = "/auth/register";
const VERIFY_EMAIL_PATH: &str = "/auth/verify-email";
const RESEND_VERIFICATION_PATH: &str = "/auth/resend-verification";
const CURRENT_USER_PATH: &str = "/me";
const HEALTH_PATH: &str = "/health";

/// API client for Planventure.
/// Clone is cheap - reqwest::Client and the collaborators are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<SessionManager>,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    /// Create a client for the configured API.
    ///
    /// `session` supplies the bearer token and is logged out on a 401;
    /// `navigator` receives the redirect to the login route.
    pub fn new(
        config: &Config,
        session: Arc<SessionManager>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session,
            navigator,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Headers sent with every request: JSON content type, and the bearer
    /// token when the session holds one (an empty authorization otherwise).
    pub fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        build_headers(self.session.access_token().as_deref())
    }

    // ===== Verbs =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(Method::GET, path, None::<&()>).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(Method::DELETE, path, None::<&()>).await
    }

    async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let sent_token = self.session.access_token();
        let mut request = self
            .client
            .request(method.clone(), &url)
            .headers(build_headers(sent_token.as_deref())?);
        if let Some(body) = body {
            let bytes = serde_json::to_vec(body)
                .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
            request = request.body(bytes);
        }

        debug!(%method, url = %url, "Sending request");
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%method, url = %url, status = status.as_u16(), "Received response");

        let value = self.handle_response(sent_token.as_deref(), status, &text)?;
        serde_json::from_value(value).map_err(|e| {
            ApiError::InvalidResponse(format!("Unexpected response shape from {}: {}", path, e))
        })
    }

    /// Classify a response to a request sent with `sent_token`, applying
    /// the forced logout on 401.
    fn handle_response(
        &self,
        sent_token: Option<&str>,
        status: StatusCode,
        body: &str,
    ) -> Result<Value, ApiError> {
        let result = ApiError::classify(status, body);
        let stale = sent_token.is_some() && self.session.access_token().as_deref() != sent_token;
        if stale {
            return match result {
                Ok(_) | Err(ApiError::Unauthorized) => {
                    debug!(status = status.as_u16(), "Discarding response for an ended session");
                    Err(ApiError::Unauthorized)
                }
                Err(e) => Err(e),
            };
        }
        if let Err(ApiError::Unauthorized) = result {
            self.force_logout();
        }
        result
    }

    fn force_logout(&self) {
        warn!("Credential rejected by server, ending session");
        self.session.logout();
        self.navigator.navigate(LOGIN_ROUTE);
    }

    // ===== Authentication =====

    /// Exchange username and password for a server auth payload.
    /// The payload is returned as-is for [`SessionManager::login`].
    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthPayload, ApiError> {
        self.post(LOGIN_PATH, credentials).await
    }

    /// Register a new account. The server normally answers with a message
    /// and the user record but no credential until the email is verified.
    pub async fn register(&self, fields: &RegisterRequest) -> Result<AuthPayload, ApiError> {
        self.post(REGISTER_PATH, fields).await
    }

    /// Confirm an email address; a successful answer carries credentials.
    pub async fn verify_email(&self, token: &str) -> Result<AuthPayload, ApiError> {
        self.post(VERIFY_EMAIL_PATH, &json!({ "token": token })).await
    }

    pub async fn resend_verification(&self, email: &str) -> Result<Value, ApiError> {
        self.post(RESEND_VERIFICATION_PATH, &json!({ "email": email }))
            .await
    }

    pub async fn current_user(&self) -> Result<UserProfile, ApiError> {
        self.get(CURRENT_USER_PATH).await
    }

    pub async fn health(&self) -> Result<Value, ApiError> {
        self.get(HEALTH_PATH).await
    }
}

fn build_headers(token: Option<&str>) -> Result<header::HeaderMap, ApiError> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    let authorization = match token {
        Some(token) => {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidRequest("Access token is not a valid header value".to_string()))?;
            value.set_sensitive(true);
            value
        }
        None => header::HeaderValue::from_static(""),
    };
    headers.insert(header::AUTHORIZATION, authorization);
    Ok(headers)
}

//! Authentication payloads for the Planventure API.
//!
//! These mirror what the server sends from `/login`, `/auth/register` and
//! `/auth/verify-email`. Every field is optional: the server has used both
//! a legacy `token` and the current `access_token` name for the access
//! credential, and registration responses carry no credential at all until
//! the email address is verified.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Body returned by the authentication endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthPayload {
    /// Legacy name for the access credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// A malformed user record decodes as `None`; it never rejects the
    /// payload.
    #[serde(
        default,
        deserialize_with = "lenient_user",
        skip_serializing_if = "Option::is_none"
    )]
    pub user: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AuthPayload {
    /// The access credential, preferring `access_token` over the legacy
    /// `token` field. Empty strings are treated as absent.
    pub fn access_credential(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.token.as_deref().filter(|t| !t.is_empty()))
    }

    pub fn refresh_credential(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

fn lenient_user<'de, D>(deserializer: D) -> Result<Option<UserProfile>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match serde_json::from_value(value) {
        Ok(user) => Some(user),
        Err(e) => {
            warn!(error = %e, "Ignoring malformed user record in auth payload");
            None
        }
    }))
}

/// Profile of the signed-in user, cached for display only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub last_login: Option<String>,
    /// Fields this client does not know about, kept so the cached record
    /// round-trips unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    /// Name to show in the UI: username, then email, then a placeholder.
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.email.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or("(unknown user)")
    }

    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login.as_deref().and_then(parse_timestamp)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }
}

/// Parse a server timestamp. The API emits ISO 8601 both with an offset
/// and as naive UTC, depending on the column.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    s.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc())
}

/// Body for `POST /login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Body for `POST /auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

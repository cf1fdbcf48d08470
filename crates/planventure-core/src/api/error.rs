use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Message used when a failed response carries no `error`/`message` field
const DEFAULT_FAILURE_MESSAGE: &str = "Request failed";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Session expired. Please login again.")]
    Unauthorized,

    #[error("Access denied. You do not have permission to perform this action.")]
    Forbidden,

    #[error("The requested resource was not found.")]
    NotFound,

    #[error("Too many requests. Please try again later.")]
    RateLimited,

    #[error("Server error. Please try again later.")]
    ServerError { status: u16 },

    #[error("{message}")]
    Validation { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Discriminant of [`ApiError`], for callers that branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimited,
    ServerError,
    Validation,
    Network,
    InvalidRequest,
    InvalidResponse,
}

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Unauthorized => ErrorKind::Unauthorized,
            ApiError::Forbidden => ErrorKind::Forbidden,
            ApiError::NotFound => ErrorKind::NotFound,
            ApiError::RateLimited => ErrorKind::RateLimited,
            ApiError::ServerError { .. } => ErrorKind::ServerError,
            ApiError::Validation { .. } => ErrorKind::Validation,
            ApiError::Network(_) => ErrorKind::Network,
            ApiError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ApiError::InvalidResponse(_) => ErrorKind::InvalidResponse,
        }
    }

    /// Human-readable message for display.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Classify a raw response.
    ///
    /// Status codes with a fixed meaning (401, 403, 404, 429, 5xx) are
    /// decided before the body is looked at. Anything else is parsed as
    /// JSON: a success status yields the parsed value (an empty body is
    /// `null`), a failure status yields `Validation` with the body's
    /// `error` or `message` field.
    pub fn classify(status: StatusCode, body: &str) -> Result<Value, ApiError> {
        match status.as_u16() {
            401 => return Err(ApiError::Unauthorized),
            403 => return Err(ApiError::Forbidden),
            404 => return Err(ApiError::NotFound),
            429 => return Err(ApiError::RateLimited),
            code @ 500..=999 => return Err(ApiError::ServerError { status: code }),
            _ => {}
        }

        let parsed = if body.trim().is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_str::<Value>(body)
        };

        if status.is_success() {
            return parsed.map_err(|e| {
                ApiError::InvalidResponse(format!(
                    "Status {}: {} ({})",
                    status,
                    e,
                    Self::truncate_body(body)
                ))
            });
        }

        let message = parsed
            .ok()
            .as_ref()
            .and_then(failure_message)
            .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
        Err(ApiError::Validation {
            status: status.as_u16(),
            message,
        })
    }
}

fn failure_message(body: &Value) -> Option<String> {
    ["error", "message"].iter().find_map(|field| {
        body.get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

/// Maximum length for error response bodies carried in messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// `status()` value for failures where the request was sent but no response
/// came back.
pub const STATUS_NETWORK: i32 = 0;

/// `status()` value for failures where the request never left the client.
pub const STATUS_CLIENT: i32 = -1;

/// Normalized failure shape for every outbound request.
///
/// The three variants preserve the transport taxonomy callers branch on:
/// a response with an error status, a request that got no response, and a
/// request that was never sent. `status()` collapses them to the numeric
/// code UI code switches over (0 for network, -1 for client faults).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Request was sent but no response arrived (timeout, offline).
    #[error("Network error - check your connection")]
    Network,

    /// Response arrived carrying an error status.
    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        field_errors: Option<HashMap<String, Vec<String>>>,
    },

    /// Request never left the client (builder or configuration fault).
    #[error("{0}")]
    Client(String),
}

/// Error envelope the Questbook backend returns on failure responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    errors: Option<HashMap<String, Vec<String>>>,
}

impl ApiError {
    /// Truncate a response body to avoid carrying excessive data in messages
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    /// Build the normalized error for an error-status response, preferring
    /// the server's message and validation map when the body carries them.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
        let (message, field_errors) = match parsed {
            Some(envelope) => (envelope.message, envelope.errors),
            None => (None, None),
        };
        let message = message.unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("Request failed with status {}", status.as_u16())
            } else {
                Self::truncate_body(body)
            }
        });
        ApiError::Status {
            status: status.as_u16(),
            message,
            field_errors,
        }
    }

    /// Error for an operation attempted without a stored credential.
    pub fn unauthenticated() -> Self {
        ApiError::Status {
            status: 401,
            message: "Not authenticated".to_string(),
            field_errors: None,
        }
    }

    pub fn status(&self) -> i32 {
        match self {
            ApiError::Network => STATUS_NETWORK,
            ApiError::Client(_) => STATUS_CLIENT,
            ApiError::Status { status, .. } => i32::from(*status),
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn field_errors(&self) -> Option<&HashMap<String, Vec<String>>> {
        match self {
            ApiError::Status { field_errors, .. } => field_errors.as_ref(),
            _ => None,
        }
    }

    /// 401/403 indicate the session itself is invalid, not a transient fault.
    pub fn is_auth_error(&self) -> bool {
        matches!(self.status(), 401 | 403)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            ApiError::Network
        } else if err.is_builder() || err.is_redirect() || err.is_decode() || err.is_body() {
            ApiError::Client(err.to_string())
        } else {
            // Sent but failed mid-flight (reset, truncated response)
            ApiError::Network
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn from_status_prefers_server_message() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, r#"{"message": "Session expired"}"#);
        assert_eq!(err.status(), 401);
        assert_eq!(err.message(), "Session expired");
        assert!(err.is_auth_error());
    }

    #[test]
    fn from_status_surfaces_validation_map() {
        let body = r#"{"message": "Validation failed", "errors": {"email": ["already taken"]}}"#;
        let err = ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert_eq!(err.status(), 422);
        let field_errors = err.field_errors().expect("Missing field errors");
        assert_eq!(field_errors["email"], vec!["already taken".to_string()]);
        assert!(!err.is_auth_error());
    }

    #[test]
    fn from_status_falls_back_to_generic_message_on_empty_body() {
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(err.status(), 500);
        assert_eq!(err.message(), "Request failed with status 500");
    }

    #[test]
    fn from_status_carries_non_json_body_verbatim() {
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream unavailable");
        assert_eq!(err.status(), 502);
        assert_eq!(err.message(), "upstream unavailable");
    }

    #[test]
    fn from_status_truncates_oversized_bodies() {
        let body = "x".repeat(2000);
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, &body);
        assert!(err.message().len() < body.len());
        assert!(err.message().contains("truncated"));
    }

    #[test]
    fn forbidden_counts_as_auth_error() {
        let err = ApiError::from_status(StatusCode::FORBIDDEN, "");
        assert!(err.is_auth_error());
    }

    #[test]
    fn network_and_client_statuses_are_sentinel_values() {
        assert_eq!(ApiError::Network.status(), STATUS_NETWORK);
        assert_eq!(ApiError::Client("bad base url".to_string()).status(), STATUS_CLIENT);
        assert!(!ApiError::Network.is_auth_error());
    }
}

//! Error taxonomy for the gateway.
//!
//! [`GatewayError`] is the single error type that crosses crate boundaries.
//! Each variant maps to one HTTP status and serializes into the JSON envelope
//! `{"error":{"code":<status>,"message":<string>}}` that every non-passthrough
//! response uses on failure.

use http::StatusCode;
use serde_json::json;
use thiserror::Error;

/// Result alias using [`GatewayError`].
pub type GatewayResult<T> = Result<T, GatewayError>;

/// The gateway error taxonomy.
///
/// Middleware failures short-circuit the chain and render the envelope
/// directly; they never retry. `Upstream` carries the status observed from the
/// search cluster when one exists, `502` otherwise (`504` for timeouts).
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed body, missing required field, or an unparseable header whose
    /// absence is material.
    #[error("bad request: {message}")]
    BadRequest {
        /// Human-readable message.
        message: String,
    },

    /// Missing or invalid credentials.
    #[error("unauthenticated: {message}")]
    Unauthenticated {
        /// Human-readable message.
        message: String,
    },

    /// Authenticated but lacking the required ACL, operation, index access,
    /// or holding an expired token.
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Human-readable message.
        message: String,
    },

    /// The addressed principal or document does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable message.
        message: String,
    },

    /// Concurrent modification of the same principal.
    #[error("conflict: {message}")]
    Conflict {
        /// Human-readable message.
        message: String,
    },

    /// The search backend returned a non-2xx status or timed out.
    #[error("upstream error: {message}")]
    Upstream {
        /// Human-readable message.
        message: String,
        /// Status observed from the upstream, when there was a response.
        status: Option<u16>,
    },

    /// Missing context value, marshalling failure, or invariant breach.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable message.
        message: String,
    },
}

impl GatewayError {
    /// Creates a [`GatewayError::BadRequest`].
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into() }
    }

    /// Creates a [`GatewayError::Unauthenticated`].
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated { message: message.into() }
    }

    /// Creates a [`GatewayError::Unauthorized`].
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    /// Creates a [`GatewayError::NotFound`].
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    /// Creates a [`GatewayError::Conflict`].
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    /// Creates a [`GatewayError::Upstream`] with no observed status.
    #[must_use]
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream { message: message.into(), status: None }
    }

    /// Creates a [`GatewayError::Upstream`] carrying the status observed from
    /// the search cluster.
    #[must_use]
    pub fn upstream_with_status(message: impl Into<String>, status: u16) -> Self {
        Self::Upstream { message: message.into(), status: Some(status) }
    }

    /// Creates a [`GatewayError::Upstream`] representing a timed-out call.
    #[must_use]
    pub fn upstream_timeout(message: impl Into<String>) -> Self {
        Self::Upstream { message: message.into(), status: Some(504) }
    }

    /// Creates a [`GatewayError::Internal`].
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Returns the message without the variant prefix.
    ///
    /// This is what goes into the JSON envelope; the prefixed [`std::fmt::Display`]
    /// form is for logs.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message }
            | Self::Unauthenticated { message }
            | Self::Unauthorized { message }
            | Self::NotFound { message }
            | Self::Conflict { message }
            | Self::Upstream { message, .. }
            | Self::Internal { message } => message,
        }
    }

    /// Returns the HTTP status this error renders as.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Self::Unauthorized { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Upstream { status, .. } => status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .filter(StatusCode::is_server_error)
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Serializes this error into the JSON envelope body.
    #[must_use]
    pub fn envelope(&self) -> serde_json::Value {
        json!({
            "error": {
                "code": self.status_code().as_u16(),
                "message": self.message(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayError::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(GatewayError::unauthenticated("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(GatewayError::unauthorized("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(GatewayError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(GatewayError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(GatewayError::upstream("x").status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(GatewayError::internal("x").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_upstream_timeout_is_gateway_timeout() {
        let err = GatewayError::upstream_timeout("deadline exceeded");
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_upstream_client_status_renders_as_bad_gateway() {
        // A 4xx from the cluster is still a gateway-level failure to the caller.
        let err = GatewayError::upstream_with_status("bad query", 400);
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_envelope_shape() {
        let err = GatewayError::not_found(r#"user with "username"="bob" not found"#);
        let envelope = err.envelope();
        assert_eq!(envelope["error"]["code"], 404);
        assert_eq!(
            envelope["error"]["message"],
            r#"user with "username"="bob" not found"#
        );
    }

    #[test]
    fn test_message_strips_prefix() {
        let err = GatewayError::unauthorized("no 'delete' op access");
        assert_eq!(err.message(), "no 'delete' op access");
        assert!(err.to_string().starts_with("unauthorized:"));
    }
}

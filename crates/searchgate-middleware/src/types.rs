//! HTTP request and response types used throughout the chain.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use searchgate_core::GatewayError;

/// The buffered HTTP request type flowing through the chain.
pub type Request = http::Request<Full<Bytes>>;

/// The buffered HTTP response type flowing back through the chain.
pub type Response = http::Response<Full<Bytes>>;

/// Builders for the JSON bodies the gateway emits.
pub trait ResponseExt {
    /// Renders a [`GatewayError`] as its JSON envelope.
    fn from_error(err: &GatewayError) -> Response;

    /// Builds a JSON response from a serializable value.
    fn json<T: serde::Serialize>(status: StatusCode, body: &T) -> Response;

    /// Builds a `{"code":…,"message":…}` acknowledgement body.
    fn message(status: StatusCode, message: &str) -> Response;

    /// Builds a response from raw JSON bytes, passed through verbatim.
    fn raw_json(status: StatusCode, body: Bytes) -> Response;
}

impl ResponseExt for Response {
    fn from_error(err: &GatewayError) -> Response {
        Self::json(err.status_code(), &err.envelope())
    }

    fn json<T: serde::Serialize>(status: StatusCode, body: &T) -> Response {
        let bytes = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
        http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(bytes)))
            .expect("static response parts are valid")
    }

    fn message(status: StatusCode, message: &str) -> Response {
        Self::json(
            status,
            &serde_json::json!({ "code": status.as_u16(), "message": message }),
        )
    }

    fn raw_json(status: StatusCode, body: Bytes) -> Response {
        http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Full::new(body))
            .expect("static response parts are valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_response() {
        let err = GatewayError::unauthenticated("invalid credentials");
        let response = Response::from_error(&err);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_message_response() {
        let response = Response::message(StatusCode::OK, "deleted");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_raw_json_passthrough() {
        let body = Bytes::from_static(b"{\"took\":7}");
        let response = Response::raw_json(StatusCode::OK, body);
        assert_eq!(response.status(), StatusCode::OK);
    }
}

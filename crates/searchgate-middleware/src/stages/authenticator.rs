//! Principal resolution from HTTP Basic credentials.
//!
//! Resolution order for a presented `username:secret` pair:
//!
//! 1. a stored user with that username whose password equals the secret;
//! 2. an unexpired permission token whose credential id equals the username
//!    and whose secret matches;
//! 3. otherwise 401 `invalid credentials`.
//!
//! Usernames are unique across both principal kinds, so a single store lookup
//! covers both branches. The stage performs exactly one lookup per request.

use base64::Engine as _;
use chrono::Utc;
use searchgate_core::{GatewayError, Principal, RequestEnvelope};
use tracing::debug;

use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};

/// Read access to the principal store, as the authenticator needs it.
pub trait PrincipalSource: Send + Sync + 'static {
    /// Looks up a principal by username (user name or token credential id).
    fn principal<'a>(
        &'a self,
        username: &'a str,
    ) -> BoxFuture<'a, Result<Option<Principal>, GatewayError>>;
}

/// Second stage of every chain; see the module docs.
pub struct Authenticator {
    source: std::sync::Arc<dyn PrincipalSource>,
}

impl Authenticator {
    /// Creates an authenticator over the given principal source.
    #[must_use]
    pub fn new(source: std::sync::Arc<dyn PrincipalSource>) -> Self {
        Self { source }
    }

    async fn resolve(&self, username: &str, secret: &str) -> Result<Principal, GatewayError> {
        let invalid = || GatewayError::unauthenticated("invalid credentials");

        let principal = self
            .source
            .principal(username)
            .await?
            .ok_or_else(invalid)?;

        match &principal {
            Principal::User(user) if user.password == secret => Ok(principal),
            Principal::Token(token) if token.secret == secret => {
                if token.is_expired(Utc::now()) {
                    debug!(token = %token.username, "rejected expired permission token");
                    return Err(invalid());
                }
                Ok(principal)
            }
            _ => Err(invalid()),
        }
    }
}

impl Middleware for Authenticator {
    fn name(&self) -> &'static str {
        "authenticator"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestEnvelope,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let Some((username, secret)) = basic_credentials(&request) else {
                return Response::from_error(&GatewayError::unauthenticated(
                    "basic auth credentials required",
                ));
            };

            match self.resolve(&username, &secret).await {
                Ok(principal) => {
                    ctx.set_principal(principal);
                    next.run(ctx, request).await
                }
                Err(err) => Response::from_error(&err),
            }
        })
    }
}

/// Decodes `Authorization: Basic` into a `(username, secret)` pair.
fn basic_credentials(request: &Request) -> Option<(String, String)> {
    let header = request
        .headers()
        .get(http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;

    let encoded = header.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    let (username, secret) = decoded.split_once(':')?;
    Some((username.to_string(), secret.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;
    use searchgate_core::{PermissionToken, User};
    use std::collections::HashMap;
    use std::sync::Arc;

    struct MapSource(HashMap<String, Principal>);

    impl PrincipalSource for MapSource {
        fn principal<'a>(
            &'a self,
            username: &'a str,
        ) -> BoxFuture<'a, Result<Option<Principal>, GatewayError>> {
            let found = self.0.get(username).cloned();
            Box::pin(async move { Ok(found) })
        }
    }

    fn authenticator(principals: Vec<Principal>) -> Authenticator {
        let map = principals
            .into_iter()
            .map(|p| (p.username().to_string(), p))
            .collect();
        Authenticator::new(Arc::new(MapSource(map)))
    }

    fn request_with_basic(username: &str, secret: &str) -> Request {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!("{username}:{secret}"));
        http::Request::builder()
            .uri("/_user")
            .header(http::header::AUTHORIZATION, format!("Basic {encoded}"))
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn ok() -> Next<'static> {
        Next::handler(|_ctx, _req| {
            Box::pin(async {
                http::Response::builder()
                    .status(StatusCode::OK)
                    .body(Full::new(Bytes::new()))
                    .unwrap()
            })
        })
    }

    #[tokio::test]
    async fn test_resolves_user() {
        let auth = authenticator(vec![Principal::User(User::new("alice", "pw"))]);
        let mut ctx = RequestEnvelope::new();

        let response = auth
            .process(&mut ctx, request_with_basic("alice", "pw"), ok())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.principal().unwrap().username(), "alice");
    }

    #[tokio::test]
    async fn test_wrong_password_is_401() {
        let auth = authenticator(vec![Principal::User(User::new("alice", "pw"))]);
        let mut ctx = RequestEnvelope::new();

        let response = auth
            .process(&mut ctx, request_with_basic("alice", "nope"), ok())
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(ctx.principal().is_none());
    }

    #[tokio::test]
    async fn test_unknown_user_is_401() {
        let auth = authenticator(vec![]);
        let mut ctx = RequestEnvelope::new();

        let response = auth
            .process(&mut ctx, request_with_basic("foo", "bar"), ok())
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_header_is_401() {
        let auth = authenticator(vec![]);
        let mut ctx = RequestEnvelope::new();
        let request: Request = http::Request::builder()
            .uri("/_user")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = auth.process(&mut ctx, request, ok()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_resolves_token_by_credential_id() {
        let token = PermissionToken::issue("alice");
        let id = token.username.clone();
        let secret = token.secret.clone();
        let auth = authenticator(vec![Principal::Token(token)]);
        let mut ctx = RequestEnvelope::new();

        let response = auth
            .process(&mut ctx, request_with_basic(&id, &secret), ok())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.principal().unwrap().username(), id);
    }

    #[tokio::test]
    async fn test_expired_token_is_401() {
        let mut token = PermissionToken::issue("alice").with_ttl_seconds(60);
        token.created_at = Utc::now() - chrono::Duration::seconds(120);
        let id = token.username.clone();
        let secret = token.secret.clone();
        let auth = authenticator(vec![Principal::Token(token)]);
        let mut ctx = RequestEnvelope::new();

        let response = auth
            .process(&mut ctx, request_with_basic(&id, &secret), ok())
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_basic_credentials_decoding() {
        let request = request_with_basic("alice", "p:w");
        // Secrets may themselves contain colons; only the first splits.
        assert_eq!(
            basic_credentials(&request),
            Some(("alice".to_string(), "p:w".to_string()))
        );
    }
}

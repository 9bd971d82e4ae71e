//! Capability enforcement.
//!
//! Reads the principal, operation, category and requested indices published
//! by earlier stages and checks them in a fixed order, short-circuiting with
//! 403 and a specific message on the first failure:
//!
//! 1. the route's ACL category is in the principal's `acls`;
//! 2. the classified operation is in the principal's `ops`;
//! 3. every requested index matches at least one of the principal's patterns
//!    (skipped for routes with no index scope);
//! 4. permission tokens only: the token has not expired.
//!
//! Admin users bypass checks 1–3 but never 4 — tokens are never admins.
//! A missing envelope value is a chain-assembly bug and renders as 500.

use chrono::Utc;
use searchgate_core::{GatewayError, Principal, RequestEnvelope};

use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};

/// Third stage of every chain; see the module docs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authorizer;

impl Authorizer {
    /// Creates the authorizer stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn check(&self, ctx: &RequestEnvelope) -> Result<(), GatewayError> {
        let principal = ctx.require_principal()?;
        let operation = ctx.require_operation()?;
        let category = ctx.require_category()?;

        if !principal.is_admin() {
            if !principal.has_acl(category) {
                return Err(GatewayError::unauthorized(format!(
                    r#"user with "username"="{}" does not have '{category}' acl access"#,
                    principal.username(),
                )));
            }

            if !principal.has_op(operation) {
                return Err(GatewayError::unauthorized(format!(
                    r#"user with "username"="{}" does not have '{operation}' op access"#,
                    principal.username(),
                )));
            }

            for index in ctx.indices() {
                if !principal.can_access_index(index) {
                    return Err(GatewayError::unauthorized(format!(
                        r#"user with "username"="{}" does not have access to index "{index}""#,
                        principal.username(),
                    )));
                }
            }
        }

        if let Principal::Token(token) = principal {
            if token.is_expired(Utc::now()) {
                return Err(GatewayError::unauthorized(format!(
                    r#"permission with "username"="{}" has expired"#,
                    token.username,
                )));
            }
        }

        Ok(())
    }
}

impl Middleware for Authorizer {
    fn name(&self) -> &'static str {
        "authorizer"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestEnvelope,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            match self.check(ctx) {
                Ok(()) => next.run(ctx, request).await,
                Err(err) => Response::from_error(&err),
            }
        })
    }
}

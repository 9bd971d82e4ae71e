//! The request envelope.
//!
//! [`RequestEnvelope`] is the typed, request-scoped bag threaded through the
//! middleware chain. It is created when routing resolves a request, mutated
//! only by middleware publishing typed values, and dropped when the response
//! has been written.
//!
//! Slots follow a strict write order: the classifier publishes the operation,
//! category and requested indices; the authenticator publishes the principal.
//! Later stages read through the `require_*` accessors — a missing required
//! value is a bug in chain assembly and surfaces as an internal error, never
//! as a silent continue.

use std::net::SocketAddr;
use std::time::Instant;

use uuid::Uuid;

use crate::acl::AclCategory;
use crate::error::GatewayError;
use crate::operation::Operation;
use crate::principal::Principal;

/// Unique identifier for a request, used for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a fresh, time-ordered id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Typed request-scoped state threaded through the middleware chain.
#[derive(Debug)]
pub struct RequestEnvelope {
    /// Unique identifier for this request.
    request_id: RequestId,

    /// When this request started processing.
    started_at: Instant,

    /// Peer address of the client connection, when known.
    peer_addr: Option<SocketAddr>,

    /// Named path captures from routing.
    params: Vec<(String, String)>,

    /// Operation derived from the HTTP method. Published by the classifier.
    operation: Option<Operation>,

    /// ACL category of the owning plugin. Published by the classifier.
    category: Option<AclCategory>,

    /// Indices named in the request path. Published by the classifier.
    indices: Vec<String>,

    /// The authenticated principal. Published by the authenticator.
    principal: Option<Principal>,
}

impl RequestEnvelope {
    /// Creates an empty envelope with a fresh request id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: RequestId::new(),
            started_at: Instant::now(),
            peer_addr: None,
            params: Vec::new(),
            operation: None,
            category: None,
            indices: Vec::new(),
            principal: None,
        }
    }

    /// Sets the peer address.
    #[must_use]
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Sets the named path captures.
    #[must_use]
    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    /// Returns the request id.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the peer address, when known.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Returns the elapsed time since the request started processing.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Returns a named path capture.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Publishes the classified operation. Classifier only.
    pub fn set_operation(&mut self, operation: Operation) {
        self.operation = Some(operation);
    }

    /// Returns the classified operation, if published.
    #[must_use]
    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    /// Returns the classified operation or an internal error.
    pub fn require_operation(&self) -> Result<Operation, GatewayError> {
        self.operation
            .ok_or_else(|| GatewayError::internal("operation missing from request context"))
    }

    /// Publishes the ACL category. Classifier only.
    pub fn set_category(&mut self, category: AclCategory) {
        self.category = Some(category);
    }

    /// Returns the ACL category, if published.
    #[must_use]
    pub fn category(&self) -> Option<AclCategory> {
        self.category
    }

    /// Returns the ACL category or an internal error.
    pub fn require_category(&self) -> Result<AclCategory, GatewayError> {
        self.category
            .ok_or_else(|| GatewayError::internal("acl category missing from request context"))
    }

    /// Publishes the indices named in the request path. Classifier only.
    pub fn set_indices(&mut self, indices: Vec<String>) {
        self.indices = indices;
    }

    /// Returns the indices named in the request path. Empty for
    /// category-level endpoints with no index scope.
    #[must_use]
    pub fn indices(&self) -> &[String] {
        &self.indices
    }

    /// Publishes the authenticated principal. Authenticator only.
    pub fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }

    /// Returns the authenticated principal, if published.
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Returns the authenticated principal or an internal error.
    pub fn require_principal(&self) -> Result<&Principal, GatewayError> {
        self.principal
            .as_ref()
            .ok_or_else(|| GatewayError::internal("principal missing from request context"))
    }
}

impl Default for RequestEnvelope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::User;

    #[test]
    fn test_empty_envelope_requires_fail() {
        let envelope = RequestEnvelope::new();
        assert!(envelope.require_operation().is_err());
        assert!(envelope.require_category().is_err());
        assert!(envelope.require_principal().is_err());
        assert!(envelope.indices().is_empty());
    }

    #[test]
    fn test_published_values_are_readable() {
        let mut envelope = RequestEnvelope::new();
        envelope.set_operation(Operation::Write);
        envelope.set_category(AclCategory::Search);
        envelope.set_indices(vec!["logs".to_string()]);
        envelope.set_principal(Principal::User(User::new("alice", "pw")));

        assert_eq!(envelope.require_operation().unwrap(), Operation::Write);
        assert_eq!(envelope.require_category().unwrap(), AclCategory::Search);
        assert_eq!(envelope.indices(), ["logs".to_string()]);
        assert_eq!(envelope.require_principal().unwrap().username(), "alice");
    }

    #[test]
    fn test_missing_required_value_is_internal() {
        let envelope = RequestEnvelope::new();
        let err = envelope.require_principal().unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_params() {
        let envelope = RequestEnvelope::new().with_params(vec![
            ("username".to_string(), "bob".to_string()),
            ("index".to_string(), "logs".to_string()),
        ]);
        assert_eq!(envelope.param("username"), Some("bob"));
        assert_eq!(envelope.param("index"), Some("logs"));
        assert_eq!(envelope.param("missing"), None);
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }
}

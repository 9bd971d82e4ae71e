//! The principal model.
//!
//! A [`Principal`] is an authenticated identity: either a stored [`User`] or a
//! time-limited [`PermissionToken`]. Both carry the same capability sets —
//! ACLs, operations, categories, index patterns — and both live in the
//! `principals` index keyed by their `username`, which is unique across both
//! kinds.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::acl::{validate_categories, AclCategory, Category};
use crate::error::GatewayError;
use crate::operation::Operation;
use crate::pattern;

/// A stored user principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique name; doubles as the document id in the principals index.
    pub username: String,
    /// Credential compared against the HTTP Basic secret.
    pub password: String,
    /// Admins bypass ACL, operation and index checks.
    #[serde(default)]
    pub is_admin: bool,
    /// ACL categories this user may access.
    pub acls: Vec<AclCategory>,
    /// Operations this user may perform. Never empty.
    pub ops: Vec<Operation>,
    /// Fine-grained categories; each must be reachable from `acls`.
    pub categories: Vec<Category>,
    /// Ordered index glob patterns; any match grants access.
    pub indices: Vec<String>,
    /// Optional contact address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a user with the default capability set: read-only access to
    /// search and its own account, all indices.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            is_admin: false,
            acls: vec![AclCategory::User, AclCategory::Search],
            ops: vec![Operation::Read],
            categories: vec![Category::User, Category::Search, Category::Docs],
            indices: vec!["*".to_string()],
            email: None,
            created_at: Utc::now(),
        }
    }

    /// Creates an admin user holding every capability.
    #[must_use]
    pub fn admin(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            is_admin: true,
            acls: vec![
                AclCategory::User,
                AclCategory::Permission,
                AclCategory::Analytics,
                AclCategory::Search,
                AclCategory::Reindex,
                AclCategory::Cluster,
            ],
            ops: vec![Operation::Read, Operation::Write, Operation::Delete],
            categories: vec![
                Category::Docs,
                Category::Search,
                Category::Cat,
                Category::Clusters,
                Category::User,
                Category::Permission,
                Category::Analytics,
                Category::Reindex,
            ],
            indices: vec!["*".to_string()],
            email: None,
            created_at: Utc::now(),
        }
    }

    /// Replaces the ACL set.
    #[must_use]
    pub fn with_acls(mut self, acls: Vec<AclCategory>) -> Self {
        self.acls = acls;
        self
    }

    /// Replaces the operation set.
    #[must_use]
    pub fn with_ops(mut self, ops: Vec<Operation>) -> Self {
        self.ops = ops;
        self
    }

    /// Replaces the category set.
    #[must_use]
    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    /// Replaces the index pattern list.
    #[must_use]
    pub fn with_indices(mut self, indices: Vec<String>) -> Self {
        self.indices = indices;
        self
    }

    /// Sets the contact address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Checks the construction invariants: non-empty ops and category
    /// reachability.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.ops.is_empty() {
            return Err(GatewayError::bad_request("user \"ops\" must not be empty"));
        }
        validate_categories(&self.categories, &self.acls)
    }
}

/// A time-limited permission token.
///
/// The token's `username` is a generated credential id, distinct from the
/// owning user's name, and doubles as the document id. A `ttl_seconds` of
/// zero disables expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionToken {
    /// Generated credential id; doubles as the document id.
    pub username: String,
    /// The user this token was issued for.
    pub owner: String,
    /// Credential compared against the HTTP Basic secret.
    pub secret: String,
    /// ACL categories this token may access.
    pub acls: Vec<AclCategory>,
    /// Operations this token may perform. Never empty.
    pub ops: Vec<Operation>,
    /// Fine-grained categories; each must be reachable from `acls`.
    pub categories: Vec<Category>,
    /// Ordered index glob patterns; any match grants access.
    pub indices: Vec<String>,
    /// Lifetime in seconds from `created_at`; zero means no expiry.
    pub ttl_seconds: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl PermissionToken {
    /// Issues a new token for `owner` with generated credentials and a
    /// read-only search capability set.
    #[must_use]
    pub fn issue(owner: impl Into<String>) -> Self {
        Self {
            username: format!("tok_{}", Uuid::new_v4().simple()),
            owner: owner.into(),
            secret: Uuid::new_v4().simple().to_string(),
            acls: vec![AclCategory::Search],
            ops: vec![Operation::Read],
            categories: vec![Category::Search, Category::Docs],
            indices: vec!["*".to_string()],
            ttl_seconds: 0,
            created_at: Utc::now(),
        }
    }

    /// Replaces the ACL set.
    #[must_use]
    pub fn with_acls(mut self, acls: Vec<AclCategory>) -> Self {
        self.acls = acls;
        self
    }

    /// Replaces the operation set.
    #[must_use]
    pub fn with_ops(mut self, ops: Vec<Operation>) -> Self {
        self.ops = ops;
        self
    }

    /// Replaces the category set.
    #[must_use]
    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    /// Replaces the index pattern list.
    #[must_use]
    pub fn with_indices(mut self, indices: Vec<String>) -> Self {
        self.indices = indices;
        self
    }

    /// Sets the token lifetime in seconds. Zero disables expiry.
    #[must_use]
    pub fn with_ttl_seconds(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Returns whether the token has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.ttl_seconds <= 0 {
            return false;
        }
        self.created_at + Duration::seconds(self.ttl_seconds) <= now
    }

    /// Checks the construction invariants: non-empty ops and category
    /// reachability.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.ops.is_empty() {
            return Err(GatewayError::bad_request("permission \"ops\" must not be empty"));
        }
        validate_categories(&self.categories, &self.acls)
    }
}

/// An authenticated identity: a user or a permission token.
///
/// Serialized internally tagged so both kinds share the principals index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Principal {
    /// A stored user.
    User(User),
    /// A permission token.
    Token(PermissionToken),
}

impl Principal {
    /// The unique name; doubles as the document id.
    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::User(u) => &u.username,
            Self::Token(t) => &t.username,
        }
    }

    /// Whether this principal bypasses ACL, operation and index checks.
    /// Tokens are never admins.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        match self {
            Self::User(u) => u.is_admin,
            Self::Token(_) => false,
        }
    }

    /// The ACL categories this principal holds.
    #[must_use]
    pub fn acls(&self) -> &[AclCategory] {
        match self {
            Self::User(u) => &u.acls,
            Self::Token(t) => &t.acls,
        }
    }

    /// The operations this principal may perform.
    #[must_use]
    pub fn ops(&self) -> &[Operation] {
        match self {
            Self::User(u) => &u.ops,
            Self::Token(t) => &t.ops,
        }
    }

    /// The fine-grained categories this principal is scoped to.
    #[must_use]
    pub fn categories(&self) -> &[Category] {
        match self {
            Self::User(u) => &u.categories,
            Self::Token(t) => &t.categories,
        }
    }

    /// The index glob patterns this principal may touch.
    #[must_use]
    pub fn indices(&self) -> &[String] {
        match self {
            Self::User(u) => &u.indices,
            Self::Token(t) => &t.indices,
        }
    }

    /// Returns whether this principal holds the given ACL category.
    #[must_use]
    pub fn has_acl(&self, acl: AclCategory) -> bool {
        self.acls().contains(&acl)
    }

    /// Returns whether this principal may perform the given operation.
    #[must_use]
    pub fn has_op(&self, op: Operation) -> bool {
        self.ops().contains(&op)
    }

    /// Returns whether any of this principal's patterns matches the index.
    #[must_use]
    pub fn can_access_index(&self, index: &str) -> bool {
        pattern::any_matches(self.indices(), index)
    }

    /// Returns the token if this principal is one.
    #[must_use]
    pub fn as_token(&self) -> Option<&PermissionToken> {
        match self {
            Self::User(_) => None,
            Self::Token(t) => Some(t),
        }
    }
}

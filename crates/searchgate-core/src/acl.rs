//! ACL categories and resource categories.
//!
//! Authorization in searchgate runs on two levels of granularity. Every route
//! belongs to one coarse [`AclCategory`], fixed when its plugin registers.
//! Principals additionally carry a set of finer [`Category`] scopes; each
//! category is reachable from exactly one ACL category, and a principal may
//! only hold categories admitted by its ACLs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GatewayError;

/// Coarse-grained resource class used by the authorizer.
///
/// Each plugin declares the category its routes belong to; the classifier
/// stage stamps it onto the request envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclCategory {
    /// Principal (user) management routes.
    User,
    /// Permission-token management routes.
    Permission,
    /// Analytics read APIs.
    Analytics,
    /// Search and document passthrough routes.
    Search,
    /// Reindexing routes.
    Reindex,
    /// Cluster-level passthrough routes.
    Cluster,
}

impl AclCategory {
    /// Returns the lowercase name used in capability sets and messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Permission => "permission",
            Self::Analytics => "analytics",
            Self::Search => "search",
            Self::Reindex => "reindex",
            Self::Cluster => "cluster",
        }
    }
}

impl fmt::Display for AclCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained resource class a principal may be scoped to.
///
/// Categories refine ACL categories: a principal holding the `search` ACL may
/// be narrowed to, say, `docs` only. The [`Category::acl`] mapping is fixed
/// and total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Document CRUD endpoints.
    Docs,
    /// Search endpoints.
    Search,
    /// `_cat` introspection endpoints.
    Cat,
    /// Cluster state endpoints.
    Clusters,
    /// User management endpoints.
    User,
    /// Permission-token management endpoints.
    Permission,
    /// Analytics endpoints.
    Analytics,
    /// Reindex endpoints.
    Reindex,
}

impl Category {
    /// Returns the ACL category this category is reachable from.
    #[must_use]
    pub const fn acl(self) -> AclCategory {
        match self {
            Self::Docs | Self::Search => AclCategory::Search,
            Self::Cat | Self::Clusters => AclCategory::Cluster,
            Self::User => AclCategory::User,
            Self::Permission => AclCategory::Permission,
            Self::Analytics => AclCategory::Analytics,
            Self::Reindex => AclCategory::Reindex,
        }
    }

    /// Returns the lowercase name used in capability sets and messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Docs => "docs",
            Self::Search => "search",
            Self::Cat => "cat",
            Self::Clusters => "clusters",
            Self::User => "user",
            Self::Permission => "permission",
            Self::Analytics => "analytics",
            Self::Reindex => "reindex",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validates that every category is admitted by the given ACL set.
///
/// This is the rule enforced when a principal's `categories` are created or
/// patched: each category must map (via [`Category::acl`]) to an ACL the
/// principal holds. The first violation produces a [`GatewayError::BadRequest`]
/// naming the offending category.
pub fn validate_categories(
    categories: &[Category],
    acls: &[AclCategory],
) -> Result<(), GatewayError> {
    for category in categories {
        let required = category.acl();
        if !acls.contains(&required) {
            return Err(GatewayError::bad_request(format!(
                "category '{category}' requires the '{required}' acl"
            )));
        }
    }
    Ok(())
}

//! Operation classification.
//!
//! Every request is classified into exactly one [`Operation`] from its HTTP
//! method. The mapping is total: unknown methods classify as [`Operation::Read`]
//! so that exotic verbs can never bypass the authorizer.

use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The logical operation a request performs against a resource.
///
/// Derived deterministically from the HTTP method by the classifier stage;
/// checked against a principal's `ops` set by the authorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Read access (GET and any unrecognized method).
    Read,
    /// Write access (POST, PUT, PATCH).
    Write,
    /// Delete access (DELETE).
    Delete,
}

impl Operation {
    /// Classifies an HTTP method into an operation.
    ///
    /// The mapping is total and deterministic:
    ///
    /// | Method                | Operation |
    /// |-----------------------|-----------|
    /// | GET                   | Read      |
    /// | POST, PUT, PATCH      | Write     |
    /// | DELETE                | Delete    |
    /// | anything else         | Read      |
    #[must_use]
    pub fn from_method(method: &Method) -> Self {
        match *method {
            Method::GET => Self::Read,
            Method::POST | Method::PUT | Method::PATCH => Self::Write,
            Method::DELETE => Self::Delete,
            _ => Self::Read,
        }
    }

    /// Returns the lowercase name used in capability sets and messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

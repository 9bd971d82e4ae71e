//! Core middleware stages.
//!
//! These three stages open every route chain, in this order:
//!
//! 1. [`Classifier`] — publishes operation, ACL category and requested indices
//! 2. [`Authenticator`] — resolves Basic credentials to a principal
//! 3. [`Authorizer`] — enforces the principal's capability sets

pub mod authenticator;
pub mod authorizer;
pub mod classifier;

pub use authenticator::{Authenticator, PrincipalSource};
pub use authorizer::Authorizer;
pub use classifier::Classifier;

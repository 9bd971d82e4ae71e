//! # searchgate-middleware
//!
//! The request-pipeline protocol of the gateway.
//!
//! Every route's effective handler is a composition
//!
//! ```text
//! classifier → authenticator → authorizer → plugin middleware… → route handler
//! ```
//!
//! built right-to-left so the outermost stage runs first. Stages implement
//! [`Middleware`] and receive a mutable [`searchgate_core::RequestEnvelope`],
//! the buffered request, and a [`Next`] they must consume exactly once —
//! either by running it or by short-circuiting with their own response.
//!
//! The three core stages live in [`stages`]:
//!
//! - [`stages::Classifier`] publishes the operation, ACL category and
//!   requested indices. It must be first in every chain.
//! - [`stages::Authenticator`] resolves HTTP Basic credentials to a principal.
//! - [`stages::Authorizer`] enforces the principal's capability sets.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod middleware;
pub mod stages;
pub mod types;

pub use chain::{Chain, FnHandler, RouteHandler};
pub use middleware::{BoxFuture, Middleware, Next};
pub use types::{Request, Response, ResponseExt};

//! # searchgate-core
//!
//! Core types shared by every searchgate crate.
//!
//! This crate defines the vocabulary of the gateway:
//!
//! - [`Operation`] and [`AclCategory`] — the two axes on which every request
//!   is classified before authorization.
//! - [`Category`] — the finer-grained resource classes a principal may be
//!   scoped to, each reachable from exactly one ACL category.
//! - [`Principal`] — an authenticated identity, either a stored [`User`] or a
//!   time-limited [`PermissionToken`], with its capability sets.
//! - [`RequestEnvelope`] — the typed, request-scoped bag that middleware
//!   stages publish into and later stages consume from.
//! - [`GatewayError`] — the error taxonomy with its HTTP status mapping and
//!   JSON envelope.
//!
//! None of these types perform I/O; stores and transports live in the crates
//! that consume them.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod acl;
pub mod envelope;
pub mod error;
pub mod operation;
pub mod pattern;
pub mod principal;

pub use acl::{AclCategory, Category};
pub use envelope::{RequestEnvelope, RequestId};
pub use error::{GatewayError, GatewayResult};
pub use operation::Operation;
pub use principal::{PermissionToken, Principal, User};

//! # searchgate-router
//!
//! Path matching for the gateway: maps `(method, path)` to a registered route
//! name plus named captures (`{username}`, `{index}`).
//!
//! Matching is most-specific-wins: static segments beat captures, so
//! `/_user/me` matches before `/_user/{username}`. A path match with no
//! matching method is distinguishable from no match at all, so the gateway
//! can answer 405 instead of 404.
//!
//! ## Example
//!
//! ```
//! use searchgate_router::Router;
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.route(Method::GET, "/_user/{username}", "users.get");
//! router.route(Method::GET, "/{index}/_search", "search.query");
//!
//! let m = router.match_route(&Method::GET, "/_user/bob").unwrap();
//! assert_eq!(m.name, "users.get");
//! assert_eq!(m.params.get("username"), Some("bob"));
//! ```

#![forbid(unsafe_code)]

mod params;
mod router;

pub use params::Params;
pub use router::{RouteMatch, Router};

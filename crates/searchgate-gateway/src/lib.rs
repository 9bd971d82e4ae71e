//! # searchgate-gateway
//!
//! The gateway binary crate: configuration, the upstream search-cluster
//! client, the principal store, the plugin registry, the built-in plugins
//! (users, permissions, search) and the HTTP server loop.
//!
//! Assembly happens in `main`: plugins are constructed explicitly, registered
//! in config order, initialized in that order, and the [`gateway::Gateway`]
//! composes each route's middleware chain from them.

#![forbid(unsafe_code)]

pub mod backend;
pub mod config;
pub mod gateway;
pub mod plugins;
pub mod principals;
pub mod registry;
pub mod server;

pub use backend::{EsBackend, SearchBackend, UpstreamResponse};
pub use config::GatewayConfig;
pub use gateway::Gateway;
pub use principals::{EsPrincipalStore, PrincipalStore};
pub use registry::{Plugin, PluginRegistry, Route};
pub use server::GatewayServer;

/// Crate version, reported by `--version` and the startup log line.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

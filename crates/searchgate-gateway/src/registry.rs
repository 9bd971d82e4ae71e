//! The plugin registry.
//!
//! A plugin is a capability bundle: a name, an ACL category, an init hook, a
//! route list and an optional middleware list. Plugins are constructed
//! explicitly in `main`, registered in config order, and initialized in that
//! order — the first init failure is fatal to startup.

use std::sync::Arc;

use http::Method;
use tracing::info;

use searchgate_core::{AclCategory, GatewayResult};
use searchgate_middleware::{Middleware, RouteHandler};

/// One HTTP route contributed by a plugin.
pub struct Route {
    /// HTTP method.
    pub method: Method,
    /// Path pattern with `{name}` captures.
    pub path: String,
    /// Route name, unique within the plugin.
    pub name: String,
    /// The terminal handler.
    pub handler: Arc<dyn RouteHandler>,
}

impl Route {
    /// Creates a route.
    #[must_use]
    pub fn new(
        method: Method,
        path: impl Into<String>,
        name: impl Into<String>,
        handler: Arc<dyn RouteHandler>,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            name: name.into(),
            handler,
        }
    }
}

/// A capability bundle contributed to the gateway.
pub trait Plugin: Send + Sync + 'static {
    /// The plugin name; prefixes its route names.
    fn name(&self) -> &'static str;

    /// The ACL category every route of this plugin belongs to.
    fn category(&self) -> AclCategory;

    /// Startup hook; a failure aborts the process.
    fn init(&self) -> GatewayResult<()> {
        Ok(())
    }

    /// The routes this plugin serves.
    fn routes(&self) -> Vec<Route>;

    /// Middleware run between the core stages and this plugin's handlers.
    fn middleware(&self) -> Vec<Arc<dyn Middleware>> {
        Vec::new()
    }
}

/// Ordered collection of plugins.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a plugin; registration order is initialization order.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// Initializes every plugin in registration order.
    ///
    /// Stops at the first failure, which the caller must treat as fatal.
    pub fn init_all(&self) -> GatewayResult<()> {
        for plugin in &self.plugins {
            plugin.init()?;
            info!(plugin = plugin.name(), "plugin initialized");
        }
        Ok(())
    }

    /// Iterates the plugins in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins.iter()
    }

    /// Returns the number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns true when no plugins are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

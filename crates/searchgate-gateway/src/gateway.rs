//! Request dispatch.
//!
//! The [`Gateway`] is assembled once at startup from the plugin registry:
//! each plugin gets one middleware chain — classifier (with the plugin's
//! category), authenticator, authorizer, then the plugin's own middleware —
//! shared by all of its routes. Dispatch matches the router, builds a fresh
//! envelope, and runs the chain.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use http::StatusCode;
use tracing::{info, info_span, Instrument};

use searchgate_core::{GatewayError, RequestEnvelope};
use searchgate_middleware::stages::{Authenticator, Authorizer, Classifier, PrincipalSource};
use searchgate_middleware::{Chain, Middleware, Request, Response, ResponseExt, RouteHandler};
use searchgate_router::Router;

use crate::registry::PluginRegistry;

struct RouteEntry {
    chain: Chain,
    handler: Arc<dyn RouteHandler>,
}

/// The assembled gateway: router plus per-route chains.
pub struct Gateway {
    router: Router,
    routes: HashMap<String, RouteEntry>,
}

impl Gateway {
    /// Composes the gateway from registered plugins.
    ///
    /// Composition is pure: the same registry and principal source always
    /// yield the same chains.
    #[must_use]
    pub fn new(registry: &PluginRegistry, principals: Arc<dyn PrincipalSource>) -> Self {
        let authenticator: Arc<dyn Middleware> = Arc::new(Authenticator::new(principals));
        let authorizer: Arc<dyn Middleware> = Arc::new(Authorizer::new());

        let mut router = Router::new();
        let mut routes = HashMap::new();

        for plugin in registry.iter() {
            let mut stages: Vec<Arc<dyn Middleware>> = vec![
                Arc::new(Classifier::new(plugin.category())),
                authenticator.clone(),
                authorizer.clone(),
            ];
            stages.extend(plugin.middleware());
            let chain = Chain::new(stages);

            for route in plugin.routes() {
                let name = format!("{}.{}", plugin.name(), route.name);
                router.route(route.method, &route.path, name.clone());
                routes.insert(
                    name,
                    RouteEntry {
                        chain: chain.clone(),
                        handler: route.handler,
                    },
                );
            }
        }

        Self { router, routes }
    }

    /// Routes and runs one request to completion.
    pub async fn dispatch(&self, request: Request, peer_addr: Option<SocketAddr>) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let Some(route_match) = self.router.match_route(&method, &path) else {
            if self.router.path_exists(&path) {
                return Response::json(
                    StatusCode::METHOD_NOT_ALLOWED,
                    &serde_json::json!({
                        "error": { "code": 405, "message": format!("method {method} not allowed") }
                    }),
                );
            }
            return Response::from_error(&GatewayError::not_found(format!(
                "no route for {path}"
            )));
        };

        let entry = self
            .routes
            .get(route_match.name)
            .expect("router names map to registered routes");

        let mut envelope = RequestEnvelope::new().with_params(route_match.params.into_pairs());
        if let Some(peer_addr) = peer_addr {
            envelope = envelope.with_peer_addr(peer_addr);
        }

        let span = info_span!(
            "request",
            request_id = %envelope.request_id(),
            method = %method,
            path = %path,
        );

        async {
            let response = entry
                .chain
                .run(&mut envelope, request, entry.handler.clone())
                .await;
            info!(
                status = %response.status(),
                duration_ms = %envelope.elapsed().as_millis(),
                "request completed"
            );
            response
        }
        .instrument(span)
        .await
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

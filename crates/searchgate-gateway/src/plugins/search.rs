//! The search plugin: passthrough to the upstream cluster.
//!
//! Search routes forward the request verbatim (minus credentials and
//! hop-by-hop headers) and relay the upstream response byte-identically. The
//! analytics [`Recorder`] rides as plugin middleware, so annotated search
//! traffic is teed into the analytics queue without touching the handler.

use std::sync::Arc;

use http::Method;
use http_body_util::{BodyExt, Full};

use searchgate_analytics::Recorder;
use searchgate_core::{AclCategory, RequestEnvelope};
use searchgate_middleware::{
    BoxFuture, FnHandler, Middleware, Request, Response, ResponseExt, RouteHandler,
};

use crate::backend::{filter_upstream_headers, is_hop_by_hop, SearchBackend};
use crate::registry::{Plugin, Route};

/// Search passthrough plugin.
pub struct SearchPlugin {
    backend: Arc<dyn SearchBackend>,
    recorder: Recorder,
}

impl SearchPlugin {
    /// Creates the plugin over the given backend, teeing through `recorder`.
    #[must_use]
    pub fn new(backend: Arc<dyn SearchBackend>, recorder: Recorder) -> Self {
        Self { backend, recorder }
    }
}

impl Plugin for SearchPlugin {
    fn name(&self) -> &'static str {
        "search"
    }

    fn category(&self) -> AclCategory {
        AclCategory::Search
    }

    fn routes(&self) -> Vec<Route> {
        let proxy = proxy(self.backend.clone());
        vec![
            Route::new(Method::GET, "/{index}/_search", "query", proxy.clone()),
            Route::new(Method::POST, "/{index}/_search", "query_post", proxy.clone()),
            Route::new(Method::GET, "/_msearch", "msearch", proxy.clone()),
            Route::new(Method::POST, "/_msearch", "msearch_post", proxy.clone()),
            Route::new(Method::GET, "/{index}/_msearch", "index_msearch", proxy.clone()),
            Route::new(Method::POST, "/{index}/_msearch", "index_msearch_post", proxy),
        ]
    }

    fn middleware(&self) -> Vec<Arc<dyn Middleware>> {
        vec![Arc::new(self.recorder.clone())]
    }
}

/// Builds the passthrough handler.
fn proxy(backend: Arc<dyn SearchBackend>) -> Arc<dyn RouteHandler> {
    Arc::new(FnHandler(move |_ctx: &mut RequestEnvelope, req: Request| {
        let backend = backend.clone();
        Box::pin(async move {
            let method = req.method().clone();
            let path_and_query = req
                .uri()
                .path_and_query()
                .map(ToString::to_string)
                .unwrap_or_else(|| "/".to_string());
            let headers = filter_upstream_headers(req.headers());

            let body = match req.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(never) => match never {},
            };

            match backend.forward(method, path_and_query, headers, body).await {
                Ok(upstream) => {
                    let mut builder = http::Response::builder().status(upstream.status);
                    for (name, value) in &upstream.headers {
                        if !is_hop_by_hop(name.as_str()) {
                            builder = builder.header(name, value);
                        }
                    }
                    builder
                        .body(Full::new(upstream.body))
                        .unwrap_or_else(|e| {
                            Response::from_error(&searchgate_core::GatewayError::internal(
                                format!("failed to assemble upstream response: {e}"),
                            ))
                        })
                }
                Err(err) => Response::from_error(&err),
            }
        }) as BoxFuture<'static, Response>
    }))
}

//! Chain composition.
//!
//! A [`Chain`] is the ordered list of middleware stages a route's requests
//! flow through before its handler. Composition is pure: the same stages and
//! handler always produce the same effective callable, built right-to-left so
//! the first stage in the list runs first.

use std::sync::Arc;

use searchgate_core::RequestEnvelope;

use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};

/// A route's terminal handler.
///
/// Handlers extract what they need from the envelope synchronously (cloning
/// owned values into the returned future), so the future itself does not
/// borrow the envelope.
pub trait RouteHandler: Send + Sync + 'static {
    /// Handles the request.
    fn call(&self, ctx: &mut RequestEnvelope, request: Request) -> BoxFuture<'static, Response>;
}

/// A function-based [`RouteHandler`].
pub struct FnHandler<F>(pub F);

impl<F> RouteHandler for FnHandler<F>
where
    F: Fn(&mut RequestEnvelope, Request) -> BoxFuture<'static, Response> + Send + Sync + 'static,
{
    fn call(&self, ctx: &mut RequestEnvelope, request: Request) -> BoxFuture<'static, Response> {
        (self.0)(ctx, request)
    }
}

/// An ordered middleware chain shared by every route of one plugin.
#[derive(Clone)]
pub struct Chain {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    /// Builds a chain from global stages followed by plugin stages.
    #[must_use]
    pub fn new(stages: Vec<Arc<dyn Middleware>>) -> Self {
        Self { stages }
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs the request through every stage and into the handler.
    pub async fn run(
        &self,
        ctx: &mut RequestEnvelope,
        request: Request,
        handler: Arc<dyn RouteHandler>,
    ) -> Response {
        let mut next = Next::handler(move |ctx, req| handler.call(ctx, req));
        for stage in self.stages.iter().rev() {
            next = Next::stage(stage.as_ref(), next);
        }
        next.run(ctx, request).await
    }
}

//! The middleware trait and chain linkage.
//!
//! A [`Middleware`] receives the mutable request envelope, the buffered
//! request, and a [`Next`] representing the rest of the chain. `Next` is
//! consumed by value, so a stage can run downstream at most once; returning
//! without running it short-circuits the chain with the stage's own response.

use std::future::Future;
use std::pin::Pin;

use searchgate_core::RequestEnvelope;

use crate::types::{Request, Response};

/// A boxed future, the return type of all chain stages.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One stage of the request chain.
pub trait Middleware: Send + Sync + 'static {
    /// The stage name, used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request.
    ///
    /// Implementations either run `next` exactly once (possibly after
    /// publishing values into `ctx`) or short-circuit by returning a response
    /// without running it.
    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestEnvelope,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// The remainder of the chain after the current stage.
///
/// Consumed by value so it can run at most once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Stage {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Handler(Box<dyn FnOnce(&mut RequestEnvelope, Request) -> BoxFuture<'static, Response> + Send + 'a>),
}

impl<'a> Next<'a> {
    /// Links a stage in front of the rest of the chain.
    pub(crate) fn stage(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Stage {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates the terminal link invoking the route handler.
    pub fn handler<F>(f: F) -> Self
    where
        F: FnOnce(&mut RequestEnvelope, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        Self {
            inner: NextInner::Handler(Box::new(f)),
        }
    }

    /// Runs the rest of the chain.
    pub async fn run(self, ctx: &mut RequestEnvelope, request: Request) -> Response {
        match self.inner {
            NextInner::Stage { middleware, next } => middleware.process(ctx, request, *next).await,
            NextInner::Handler(handler) => handler(ctx, request).await,
        }
    }
}

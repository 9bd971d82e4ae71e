//! Request classification.
//!
//! The classifier is the single source of truth for what a verb and path
//! mean. It must be the first stage in every chain: it derives the
//! [`Operation`] from the HTTP method, stamps the [`AclCategory`] the owning
//! plugin declared at registration, and publishes the indices named in the
//! path. It never reads the request body.

use searchgate_core::{AclCategory, Operation, RequestEnvelope};

use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};

/// First stage of every chain; see the module docs.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    category: AclCategory,
}

impl Classifier {
    /// Creates a classifier for routes owned by a plugin of the given
    /// category.
    #[must_use]
    pub fn new(category: AclCategory) -> Self {
        Self { category }
    }
}

impl Middleware for Classifier {
    fn name(&self) -> &'static str {
        "classifier"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestEnvelope,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            ctx.set_operation(Operation::from_method(request.method()));
            ctx.set_category(self.category);

            // An `{index}` capture may name several indices separated by
            // commas, as in `/a,b/_search`.
            if let Some(raw) = ctx.param("index") {
                let indices: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
                ctx.set_indices(indices);
            }

            next.run(ctx, request).await
        })
    }
}

//! The principal store.
//!
//! Principals — users and permission tokens — live as documents in one index
//! of the upstream cluster, keyed by username. The store itself is thin;
//! patch *semantics* (non-empty ops, category reachability) are validated by
//! the handlers before any write reaches it.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};

use searchgate_core::{GatewayError, GatewayResult, Principal};
use searchgate_middleware::stages::PrincipalSource;
use searchgate_middleware::BoxFuture;

use crate::backend::SearchBackend;

/// Persistence for principals.
pub trait PrincipalStore: Send + Sync + 'static {
    /// Fetches a principal by username.
    fn get<'a>(&'a self, username: &'a str) -> BoxFuture<'a, GatewayResult<Option<Principal>>>;

    /// Creates a principal; [`GatewayError::Conflict`] when the username is
    /// taken.
    fn create<'a>(&'a self, principal: &'a Principal) -> BoxFuture<'a, GatewayResult<()>>;

    /// Merges patch fields into a stored principal and returns the result.
    fn patch<'a>(
        &'a self,
        username: &'a str,
        patch: Map<String, Value>,
    ) -> BoxFuture<'a, GatewayResult<Principal>>;

    /// Deletes a principal; returns whether it existed.
    fn delete<'a>(&'a self, username: &'a str) -> BoxFuture<'a, GatewayResult<bool>>;
}

/// [`PrincipalStore`] over a [`SearchBackend`] index.
pub struct EsPrincipalStore {
    backend: Arc<dyn SearchBackend>,
    index: String,
}

impl EsPrincipalStore {
    /// Creates a store over `index` on the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn SearchBackend>, index: impl Into<String>) -> Self {
        Self {
            backend,
            index: index.into(),
        }
    }

    fn decode(&self, username: &str, raw: &Bytes) -> GatewayResult<Principal> {
        serde_json::from_slice(raw).map_err(|e| {
            GatewayError::internal(format!(
                r#"stored principal "{username}" is not decodable: {e}"#
            ))
        })
    }
}

impl PrincipalStore for EsPrincipalStore {
    fn get<'a>(&'a self, username: &'a str) -> BoxFuture<'a, GatewayResult<Option<Principal>>> {
        Box::pin(async move {
            match self.backend.get_doc(&self.index, username).await? {
                Some(raw) => Ok(Some(self.decode(username, &raw)?)),
                None => Ok(None),
            }
        })
    }

    fn create<'a>(&'a self, principal: &'a Principal) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async move {
            let raw = serde_json::to_vec(principal)
                .map_err(|e| GatewayError::internal(format!("failed to encode principal: {e}")))?;
            self.backend
                .put_doc(&self.index, principal.username(), Bytes::from(raw), true)
                .await
        })
    }

    fn patch<'a>(
        &'a self,
        username: &'a str,
        patch: Map<String, Value>,
    ) -> BoxFuture<'a, GatewayResult<Principal>> {
        Box::pin(async move {
            let Some(raw) = self.backend.get_doc(&self.index, username).await? else {
                return Err(GatewayError::not_found(format!(
                    r#"principal with "username"="{username}" not found"#
                )));
            };

            let mut stored: Value = serde_json::from_slice(&raw).map_err(|e| {
                GatewayError::internal(format!(r#"stored principal "{username}" unreadable: {e}"#))
            })?;
            let Some(object) = stored.as_object_mut() else {
                return Err(GatewayError::internal(format!(
                    r#"stored principal "{username}" is not an object"#
                )));
            };
            for (key, value) in patch {
                object.insert(key, value);
            }

            let patched: Principal = serde_json::from_value(stored).map_err(|e| {
                GatewayError::bad_request(format!("patch produces an invalid principal: {e}"))
            })?;

            let raw = serde_json::to_vec(&patched)
                .map_err(|e| GatewayError::internal(format!("failed to encode principal: {e}")))?;
            self.backend
                .put_doc(&self.index, username, Bytes::from(raw), false)
                .await?;

            Ok(patched)
        })
    }

    fn delete<'a>(&'a self, username: &'a str) -> BoxFuture<'a, GatewayResult<bool>> {
        Box::pin(async move { self.backend.delete_doc(&self.index, username).await })
    }
}

impl PrincipalSource for EsPrincipalStore {
    fn principal<'a>(
        &'a self,
        username: &'a str,
    ) -> BoxFuture<'a, Result<Option<Principal>, GatewayError>> {
        PrincipalStore::get(self, username)
    }
}

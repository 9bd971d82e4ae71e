//! Built-in plugins: users, permissions, search.

use bytes::Bytes;
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

use searchgate_core::{GatewayError, GatewayResult};
use searchgate_middleware::Request;

pub mod permissions;
pub mod search;
pub mod users;

pub use permissions::PermissionsPlugin;
pub use search::SearchPlugin;
pub use users::UsersPlugin;

/// Collects a buffered request body.
pub(crate) async fn body_bytes(request: Request) -> Bytes {
    match request.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    }
}

/// Parses a JSON request body, mapping failures to 400.
pub(crate) fn parse_json<T: DeserializeOwned>(bytes: &Bytes) -> GatewayResult<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| GatewayError::bad_request(format!("can't parse request body: {e}")))
}

//! The permissions plugin: token management over `/_permission`.
//!
//! Same surface shape as the users plugin. Creation generates the credential
//! id and secret; the response is the only place the secret is ever
//! returned. Routes without a `{username}` act on the authenticated
//! principal, which for this plugin must be a token.

use std::sync::Arc;

use http::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};

use searchgate_core::{
    acl::validate_categories, AclCategory, Category, GatewayError, GatewayResult, Operation,
    PermissionToken, Principal, RequestEnvelope,
};
use searchgate_middleware::{BoxFuture, FnHandler, Response, ResponseExt, RouteHandler};

use crate::plugins::users::{authenticated_username, named_username};
use crate::plugins::{body_bytes, parse_json};
use crate::principals::PrincipalStore;
use crate::registry::{Plugin, Route};

/// Permission-token management plugin.
pub struct PermissionsPlugin {
    store: Arc<dyn PrincipalStore>,
}

impl PermissionsPlugin {
    /// Creates the plugin over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn PrincipalStore>) -> Self {
        Self { store }
    }
}

impl Plugin for PermissionsPlugin {
    fn name(&self) -> &'static str {
        "permissions"
    }

    fn category(&self) -> AclCategory {
        AclCategory::Permission
    }

    fn routes(&self) -> Vec<Route> {
        vec![
            Route::new(Method::GET, "/_permission", "get_self", get_self()),
            Route::new(
                Method::GET,
                "/_permission/{username}",
                "get",
                get_named(self.store.clone()),
            ),
            Route::new(Method::POST, "/_permission", "create", create(self.store.clone())),
            Route::new(
                Method::PATCH,
                "/_permission",
                "patch_self",
                patch(self.store.clone(), true),
            ),
            Route::new(
                Method::PATCH,
                "/_permission/{username}",
                "patch",
                patch(self.store.clone(), false),
            ),
            Route::new(
                Method::DELETE,
                "/_permission",
                "delete_self",
                delete(self.store.clone(), true),
            ),
            Route::new(
                Method::DELETE,
                "/_permission/{username}",
                "delete",
                delete(self.store.clone(), false),
            ),
        ]
    }
}

/// Creation body for `POST /_permission`; everything is optional.
#[derive(Debug, Default, Deserialize)]
struct CreatePermissionBody {
    owner: Option<String>,
    acls: Option<Vec<AclCategory>>,
    ops: Option<Vec<Operation>>,
    categories: Option<Vec<Category>>,
    indices: Option<Vec<String>>,
    ttl_seconds: Option<i64>,
}

/// Patch body for `PATCH /_permission/{username}`.
#[derive(Debug, Deserialize)]
struct PermissionPatch {
    acls: Option<Vec<AclCategory>>,
    ops: Option<Vec<Operation>>,
    categories: Option<Vec<Category>>,
    indices: Option<Vec<String>>,
    ttl_seconds: Option<i64>,
}

impl PermissionPatch {
    fn into_map(self) -> GatewayResult<Map<String, Value>> {
        if matches!(&self.ops, Some(ops) if ops.is_empty()) {
            return Err(GatewayError::bad_request(
                "permission \"ops\" must not be empty",
            ));
        }

        let mut map = Map::new();
        if let Some(acls) = self.acls {
            map.insert("acls".to_string(), serde_json::to_value(acls).expect("enum encodes"));
        }
        if let Some(ops) = self.ops {
            map.insert("ops".to_string(), serde_json::to_value(ops).expect("enum encodes"));
        }
        if let Some(categories) = self.categories {
            map.insert(
                "categories".to_string(),
                serde_json::to_value(categories).expect("enum encodes"),
            );
        }
        if let Some(indices) = self.indices {
            map.insert("indices".to_string(), indices.into());
        }
        if let Some(ttl_seconds) = self.ttl_seconds {
            map.insert("ttl_seconds".to_string(), ttl_seconds.into());
        }
        Ok(map)
    }
}

fn not_found(username: &str) -> GatewayError {
    GatewayError::not_found(format!(
        r#"permission with "username"="{username}" not found"#
    ))
}

fn get_self() -> Arc<dyn RouteHandler> {
    Arc::new(FnHandler(|ctx: &mut RequestEnvelope, _req| {
        let principal = ctx.require_principal().cloned();
        Box::pin(async move {
            match principal {
                Ok(Principal::Token(token)) => Response::json(StatusCode::OK, &token),
                Ok(Principal::User(user)) => {
                    Response::from_error(&not_found(&user.username))
                }
                Err(err) => Response::from_error(&err),
            }
        }) as BoxFuture<'static, Response>
    }))
}

fn get_named(store: Arc<dyn PrincipalStore>) -> Arc<dyn RouteHandler> {
    Arc::new(FnHandler(move |ctx: &mut RequestEnvelope, _req| {
        let store = store.clone();
        let username = named_username(ctx);
        Box::pin(async move {
            let username = match username {
                Ok(u) => u,
                Err(err) => return Response::from_error(&err),
            };
            match store.get(&username).await {
                Ok(Some(Principal::Token(token))) => Response::json(StatusCode::OK, &token),
                Ok(_) => Response::from_error(&not_found(&username)),
                Err(err) => Response::from_error(&err),
            }
        }) as BoxFuture<'static, Response>
    }))
}

fn create(store: Arc<dyn PrincipalStore>) -> Arc<dyn RouteHandler> {
    Arc::new(FnHandler(move |ctx: &mut RequestEnvelope, req| {
        let store = store.clone();
        let caller = authenticated_username(ctx);
        Box::pin(async move {
            let caller = match caller {
                Ok(c) => c,
                Err(err) => return Response::from_error(&err),
            };
            let bytes = body_bytes(req).await;
            match issue_token(&caller, &bytes) {
                Ok(token) => match store.create(&Principal::Token(token.clone())).await {
                    Ok(()) => Response::json(StatusCode::CREATED, &token),
                    Err(err) => Response::from_error(&err),
                },
                Err(err) => Response::from_error(&err),
            }
        }) as BoxFuture<'static, Response>
    }))
}

fn issue_token(caller: &str, bytes: &bytes::Bytes) -> GatewayResult<PermissionToken> {
    let body: CreatePermissionBody = if bytes.is_empty() {
        CreatePermissionBody::default()
    } else {
        parse_json(bytes)?
    };

    let mut token = PermissionToken::issue(body.owner.unwrap_or_else(|| caller.to_string()));
    if let Some(acls) = body.acls {
        token.acls = acls;
    }
    if let Some(ops) = body.ops {
        token.ops = ops;
    }
    if let Some(categories) = body.categories {
        token.categories = categories;
    }
    if let Some(indices) = body.indices {
        token.indices = indices;
    }
    if let Some(ttl_seconds) = body.ttl_seconds {
        token.ttl_seconds = ttl_seconds;
    }

    token.validate()?;
    Ok(token)
}

fn patch(store: Arc<dyn PrincipalStore>, self_route: bool) -> Arc<dyn RouteHandler> {
    Arc::new(FnHandler(move |ctx: &mut RequestEnvelope, req| {
        let store = store.clone();
        let username = if self_route {
            authenticated_username(ctx)
        } else {
            named_username(ctx)
        };
        Box::pin(async move {
            let username = match username {
                Ok(u) => u,
                Err(err) => return Response::from_error(&err),
            };
            let bytes = body_bytes(req).await;
            match apply_patch(store.as_ref(), &username, &bytes).await {
                Ok(principal) => Response::json(StatusCode::OK, &principal),
                Err(err) => Response::from_error(&err),
            }
        }) as BoxFuture<'static, Response>
    }))
}

async fn apply_patch(
    store: &dyn PrincipalStore,
    username: &str,
    bytes: &bytes::Bytes,
) -> GatewayResult<Principal> {
    let patch: PermissionPatch = parse_json(bytes)?;

    if let Some(categories) = &patch.categories {
        match &patch.acls {
            Some(acls) => validate_categories(categories, acls)?,
            None => {
                let stored = store
                    .get(username)
                    .await?
                    .ok_or_else(|| not_found(username))?;
                validate_categories(categories, stored.acls())?;
            }
        }
    }

    store.patch(username, patch.into_map()?).await
}

fn delete(store: Arc<dyn PrincipalStore>, self_route: bool) -> Arc<dyn RouteHandler> {
    Arc::new(FnHandler(move |ctx: &mut RequestEnvelope, _req| {
        let store = store.clone();
        let username = if self_route {
            authenticated_username(ctx)
        } else {
            named_username(ctx)
        };
        Box::pin(async move {
            let username = match username {
                Ok(u) => u,
                Err(err) => return Response::from_error(&err),
            };
            match store.delete(&username).await {
                Ok(true) => Response::message(
                    StatusCode::OK,
                    &format!(r#"permission with "username"="{username}" deleted"#),
                ),
                Ok(false) => Response::from_error(&not_found(&username)),
                Err(err) => Response::from_error(&err),
            }
        }) as BoxFuture<'static, Response>
    }))
}

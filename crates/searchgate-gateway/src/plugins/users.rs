//! The users plugin: principal management over `/_user`.
//!
//! Routes without a `{username}` act on the authenticated principal. Patch
//! semantics are validated here, before anything reaches the store: `ops`
//! must stay non-empty, and patching `categories` without also patching
//! `acls` re-validates the new categories against the ACLs the stored
//! principal already holds.

use std::sync::Arc;

use http::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};

use searchgate_core::{
    acl::validate_categories, AclCategory, Category, GatewayError, GatewayResult, Operation,
    Principal, RequestEnvelope, User,
};
use searchgate_middleware::{BoxFuture, FnHandler, Response, ResponseExt, RouteHandler};

use crate::plugins::{body_bytes, parse_json};
use crate::principals::PrincipalStore;
use crate::registry::{Plugin, Route};

/// Principal management plugin.
pub struct UsersPlugin {
    store: Arc<dyn PrincipalStore>,
}

impl UsersPlugin {
    /// Creates the plugin over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn PrincipalStore>) -> Self {
        Self { store }
    }
}

impl Plugin for UsersPlugin {
    fn name(&self) -> &'static str {
        "users"
    }

    fn category(&self) -> AclCategory {
        AclCategory::User
    }

    fn routes(&self) -> Vec<Route> {
        vec![
            Route::new(Method::GET, "/_user", "get_self", get_self()),
            Route::new(Method::GET, "/_user/{username}", "get", get_named(self.store.clone())),
            Route::new(Method::POST, "/_user", "create", create(self.store.clone())),
            Route::new(Method::PATCH, "/_user", "patch_self", patch(self.store.clone(), true)),
            Route::new(
                Method::PATCH,
                "/_user/{username}",
                "patch",
                patch(self.store.clone(), false),
            ),
            Route::new(Method::DELETE, "/_user", "delete_self", delete(self.store.clone(), true)),
            Route::new(
                Method::DELETE,
                "/_user/{username}",
                "delete",
                delete(self.store.clone(), false),
            ),
        ]
    }
}

/// Creation body for `POST /_user`.
#[derive(Debug, Deserialize)]
struct CreateUserBody {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    is_admin: Option<bool>,
    acls: Option<Vec<AclCategory>>,
    ops: Option<Vec<Operation>>,
    categories: Option<Vec<Category>>,
    indices: Option<Vec<String>>,
    email: Option<String>,
}

/// Patch body for `PATCH /_user[/{username}]`; absent fields stay untouched.
#[derive(Debug, Deserialize)]
struct UserPatch {
    password: Option<String>,
    is_admin: Option<bool>,
    acls: Option<Vec<AclCategory>>,
    ops: Option<Vec<Operation>>,
    categories: Option<Vec<Category>>,
    indices: Option<Vec<String>>,
    email: Option<String>,
}

impl UserPatch {
    /// Converts the present fields into a merge map, checking the invariants
    /// that can be checked without the stored principal.
    fn into_map(self) -> GatewayResult<Map<String, Value>> {
        if matches!(&self.ops, Some(ops) if ops.is_empty()) {
            return Err(GatewayError::bad_request("user \"ops\" must not be empty"));
        }

        let mut map = Map::new();
        if let Some(password) = self.password {
            map.insert("password".to_string(), password.into());
        }
        if let Some(is_admin) = self.is_admin {
            map.insert("is_admin".to_string(), is_admin.into());
        }
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
        if let Some(email) = self.email {
            map.insert("email".to_string(), email.into());
        }
        Ok(map)
    }
}

fn get_self() -> Arc<dyn RouteHandler> {
    Arc::new(FnHandler(|ctx: &mut RequestEnvelope, _req| {
        let principal = ctx.require_principal().cloned();
        Box::pin(async move {
            match principal {
                Ok(Principal::User(user)) => Response::json(StatusCode::OK, &user),
                Ok(Principal::Token(token)) => Response::from_error(&GatewayError::not_found(
                    format!(r#"user with "username"="{}" not found"#, token.username),
                )),
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
                Ok(Some(Principal::User(user))) => Response::json(StatusCode::OK, &user),
                Ok(_) => Response::from_error(&GatewayError::not_found(format!(
                    r#"user with "username"="{username}" not found"#
                ))),
                Err(err) => Response::from_error(&err),
            }
        }) as BoxFuture<'static, Response>
    }))
}

fn create(store: Arc<dyn PrincipalStore>) -> Arc<dyn RouteHandler> {
    Arc::new(FnHandler(move |_ctx: &mut RequestEnvelope, req| {
        let store = store.clone();
        Box::pin(async move {
            let bytes = body_bytes(req).await;
            match build_user(&bytes) {
                Ok(user) => match store.create(&Principal::User(user.clone())).await {
                    Ok(()) => Response::json(StatusCode::CREATED, &user),
                    Err(err) => Response::from_error(&err),
                },
                Err(err) => Response::from_error(&err),
            }
        }) as BoxFuture<'static, Response>
    }))
}

fn build_user(bytes: &bytes::Bytes) -> GatewayResult<User> {
    let body: CreateUserBody = parse_json(bytes)?;
    if body.username.is_empty() {
        return Err(GatewayError::bad_request(
            r#"can't create a user without a "username""#,
        ));
    }
    if body.password.is_empty() {
        return Err(GatewayError::bad_request(r#"user "password" shouldn't be empty"#));
    }

    let mut user = User::new(body.username, body.password);
    if let Some(is_admin) = body.is_admin {
        user.is_admin = is_admin;
    }
    if let Some(acls) = body.acls {
        user.acls = acls;
    }
    if let Some(ops) = body.ops {
        user.ops = ops;
    }
    if let Some(categories) = body.categories {
        user.categories = categories;
    }
    if let Some(indices) = body.indices {
        user.indices = indices;
    }
    user.email = body.email;

    user.validate()?;
    Ok(user)
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

/// Validates patch semantics against the stored principal, then merges.
async fn apply_patch(
    store: &dyn PrincipalStore,
    username: &str,
    bytes: &bytes::Bytes,
) -> GatewayResult<Principal> {
    let patch: UserPatch = parse_json(bytes)?;

    // Category reachability: new categories validate against the patched
    // ACLs when both change together, and against the stored ACLs when only
    // the categories change.
    if let Some(categories) = &patch.categories {
        match &patch.acls {
            Some(acls) => validate_categories(categories, acls)?,
            None => {
                let stored = store.get(username).await?.ok_or_else(|| {
                    GatewayError::not_found(format!(
                        r#"user with "username"="{username}" not found"#
                    ))
                })?;
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
                    &format!(r#"user with "username"="{username}" deleted"#),
                ),
                Ok(false) => Response::from_error(&GatewayError::not_found(format!(
                    r#"user with "username"="{username}" not found"#
                ))),
                Err(err) => Response::from_error(&err),
            }
        }) as BoxFuture<'static, Response>
    }))
}

pub(crate) fn authenticated_username(ctx: &RequestEnvelope) -> GatewayResult<String> {
    Ok(ctx.require_principal()?.username().to_string())
}

pub(crate) fn named_username(ctx: &RequestEnvelope) -> GatewayResult<String> {
    ctx.param("username")
        .map(String::from)
        .ok_or_else(|| GatewayError::bad_request(r#"a "username" path segment is required"#))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_user_requires_username_and_password() {
        let err = build_user(&bytes::Bytes::from_static(b"{}")).unwrap_err();
        assert!(err.message().contains("username"));

        let err =
            build_user(&bytes::Bytes::from_static(br#"{"username":"a"}"#)).unwrap_err();
        assert!(err.message().contains("password"));
    }

    #[test]
    fn test_build_user_applies_overrides() {
        let body = br#"{
            "username": "carol",
            "password": "pw",
            "ops": ["read"],
            "acls": ["search"],
            "categories": ["docs"],
            "indices": ["mine-*"],
            "email": "carol@example.com"
        }"#;
        let user = build_user(&bytes::Bytes::from_static(body)).unwrap();
        assert_eq!(user.username, "carol");
        assert_eq!(user.ops, vec![Operation::Read]);
        assert_eq!(user.acls, vec![AclCategory::Search]);
        assert_eq!(user.indices, vec!["mine-*".to_string()]);
        assert_eq!(user.email.as_deref(), Some("carol@example.com"));
    }

    #[test]
    fn test_build_user_rejects_unreachable_categories() {
        let body = br#"{"username":"c","password":"pw","acls":["search"],"categories":["user"]}"#;
        let err = build_user(&bytes::Bytes::from_static(body)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_patch_rejects_empty_ops() {
        let patch: UserPatch = serde_json::from_str(r#"{"ops":[]}"#).unwrap();
        assert!(patch.into_map().is_err());
    }

    #[test]
    fn test_patch_map_contains_only_present_fields() {
        let patch: UserPatch =
            serde_json::from_str(r#"{"email":"x@example.com","indices":["a"]}"#).unwrap();
        let map = patch.into_map().unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("email"));
        assert!(map.contains_key("indices"));
        assert!(!map.contains_key("password"));
    }
}

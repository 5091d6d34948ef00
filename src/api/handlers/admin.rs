//! User administration handlers.
//!
//! All routes here sit under `/admin` and reach handlers only for callers the
//! pipeline already verified as admins. Every mutation emits a security event
//! with the acting admin as the actor and the target subject in the detail.

use crate::{
    api::{handlers::valid_subject, RequestIdentity},
    gate::{
        audit::{AuditContext, SecurityEvent},
        directory::{normalize_subject, DirectoryError, IdentityRecord},
        policy::Role,
        Pipeline, MIN_PASSWORD_LEN,
    },
};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateUserRequest {
    username: String,
    password: String,
    roles: Option<Vec<Role>>,
    must_change_password: Option<bool>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserResponse {
    username: String,
    roles: Vec<Role>,
    enabled: bool,
    locked: bool,
    must_change_password: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SetRolesRequest {
    roles: Vec<Role>,
}

#[utoipa::path(
    post,
    path= "/admin/users",
    request_body = CreateUserRequest,
    responses (
        (status = 201, description = "User created", body = [UserResponse], content_type = "application/json"),
        (status = 400, description = "Invalid username or password"),
        (status = 409, description = "User with the specified username already exists"),
    ),
    tag= "admin"
)]
// axum handler for user creation, payload skipped to keep passwords out of spans
#[instrument(skip(pipeline, identity, context, payload))]
pub async fn create_user(
    Extension(pipeline): Extension<Arc<Pipeline>>,
    Extension(identity): Extension<RequestIdentity>,
    Extension(context): Extension<AuditContext>,
    payload: Option<Json<CreateUserRequest>>,
) -> impl IntoResponse {
    let Some(admin) = identity.0 else {
        return (
            StatusCode::UNAUTHORIZED,
            "authentication required".to_string(),
        )
            .into_response();
    };

    let Some(Json(create)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let username = normalize_subject(&create.username);
    if !valid_subject(&username) {
        return (StatusCode::BAD_REQUEST, "Invalid username".to_string()).into_response();
    }

    if create.password.len() < MIN_PASSWORD_LEN {
        return (StatusCode::BAD_REQUEST, "Password too short".to_string()).into_response();
    }

    let credential = match pipeline.passwords().hash(&create.password) {
        Ok(credential) => credential,
        Err(err) => {
            error!("Error hashing password: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error creating user".to_string(),
            )
                .into_response();
        }
    };

    let roles = create.roles.unwrap_or_else(|| vec![Role::User]);
    let must_change_password = create.must_change_password.unwrap_or(false);
    let record = IdentityRecord::new(&username, credential, roles.clone())
        .with_must_rotate(must_change_password);

    match pipeline.directory().create(record) {
        Ok(()) => {
            pipeline.audit().security_event(
                SecurityEvent::UserCreation,
                Some(&admin.subject),
                &context,
                json!({ "subject": username, "roles": roles }),
            );
            (
                StatusCode::CREATED,
                Json(UserResponse {
                    username,
                    roles,
                    enabled: true,
                    locked: false,
                    must_change_password,
                }),
            )
                .into_response()
        }
        Err(DirectoryError::AlreadyExists) => {
            (StatusCode::CONFLICT, "User already exists".to_string()).into_response()
        }
        Err(err) => {
            error!("Error creating user: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error creating user".to_string(),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path= "/admin/users/{username}",
    params(
        ("username" = String, Path, description = "Subject to delete")
    ),
    responses (
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found"),
    ),
    tag= "admin"
)]
// axum handler for user deletion
#[instrument(skip(pipeline, identity, context))]
pub async fn delete_user(
    Extension(pipeline): Extension<Arc<Pipeline>>,
    Extension(identity): Extension<RequestIdentity>,
    Extension(context): Extension<AuditContext>,
    Path(username): Path<String>,
) -> impl IntoResponse {
    let Some(admin) = identity.0 else {
        return (
            StatusCode::UNAUTHORIZED,
            "authentication required".to_string(),
        )
            .into_response();
    };

    let username = normalize_subject(&username);
    match pipeline.directory().delete(&username) {
        Ok(()) => {
            // Drop any leftover failure counters for the removed subject.
            pipeline.guard().unlock(&username);
            pipeline.audit().security_event(
                SecurityEvent::UserDeletion,
                Some(&admin.subject),
                &context,
                json!({ "subject": username }),
            );
            StatusCode::NO_CONTENT.into_response()
        }
        Err(_) => (StatusCode::NOT_FOUND, "User not found".to_string()).into_response(),
    }
}

#[utoipa::path(
    post,
    path= "/admin/users/{username}/unlock",
    params(
        ("username" = String, Path, description = "Subject to unlock")
    ),
    responses (
        (status = 204, description = "User unlocked"),
        (status = 404, description = "User not found"),
    ),
    tag= "admin"
)]
// axum handler for account unlock
#[instrument(skip(pipeline, identity, context))]
pub async fn unlock_user(
    Extension(pipeline): Extension<Arc<Pipeline>>,
    Extension(identity): Extension<RequestIdentity>,
    Extension(context): Extension<AuditContext>,
    Path(username): Path<String>,
) -> impl IntoResponse {
    let Some(admin) = identity.0 else {
        return (
            StatusCode::UNAUTHORIZED,
            "authentication required".to_string(),
        )
            .into_response();
    };

    let username = normalize_subject(&username);
    match pipeline.directory().set_locked(&username, false) {
        Ok(()) => {
            // Both the persisted flag and the in-memory counter must clear.
            pipeline.guard().unlock(&username);
            pipeline.audit().security_event(
                SecurityEvent::ConfigurationChange,
                Some(&admin.subject),
                &context,
                json!({ "action": "unlock", "subject": username }),
            );
            StatusCode::NO_CONTENT.into_response()
        }
        Err(_) => (StatusCode::NOT_FOUND, "User not found".to_string()).into_response(),
    }
}

#[utoipa::path(
    post,
    path= "/admin/users/{username}/roles",
    params(
        ("username" = String, Path, description = "Subject whose roles change")
    ),
    request_body = SetRolesRequest,
    responses (
        (status = 204, description = "Roles replaced"),
        (status = 400, description = "Empty role list"),
        (status = 404, description = "User not found"),
    ),
    tag= "admin"
)]
// axum handler for role assignment
#[instrument(skip(pipeline, identity, context, payload))]
pub async fn set_roles(
    Extension(pipeline): Extension<Arc<Pipeline>>,
    Extension(identity): Extension<RequestIdentity>,
    Extension(context): Extension<AuditContext>,
    Path(username): Path<String>,
    payload: Option<Json<SetRolesRequest>>,
) -> impl IntoResponse {
    let Some(admin) = identity.0 else {
        return (
            StatusCode::UNAUTHORIZED,
            "authentication required".to_string(),
        )
            .into_response();
    };

    let Some(Json(body)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    if body.roles.is_empty() {
        return (StatusCode::BAD_REQUEST, "Roles must not be empty".to_string()).into_response();
    }

    let username = normalize_subject(&username);
    match pipeline.directory().set_roles(&username, body.roles.clone()) {
        Ok(()) => {
            pipeline.audit().security_event(
                SecurityEvent::PrivilegeEscalation,
                Some(&admin.subject),
                &context,
                json!({ "subject": username, "roles": body.roles }),
            );
            StatusCode::NO_CONTENT.into_response()
        }
        Err(_) => (StatusCode::NOT_FOUND, "User not found".to_string()).into_response(),
    }
}

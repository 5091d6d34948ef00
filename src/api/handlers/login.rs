use crate::{
    api::rejection_response,
    gate::{audit::AuditContext, Pipeline},
};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    token: String,
    token_type: String,
    expires_in: i64,
    must_change_password: bool,
}

#[utoipa::path(
    post,
    path= "/auth/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Credentials accepted, token issued", body = [LoginResponse], content_type = "application/json"),
        (status = 401, description = "Unknown subject or wrong password"),
        (status = 403, description = "Account disabled or locked"),
    ),
    tag= "auth"
)]
// axum handler for login, payload skipped to keep credentials out of spans
#[instrument(skip(pipeline, context, payload))]
pub async fn login(
    Extension(pipeline): Extension<Arc<Pipeline>>,
    Extension(context): Extension<AuditContext>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(login)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match pipeline.authenticate(&login.username, &login.password, &context) {
        Ok(grant) => Json(LoginResponse {
            token: grant.token,
            token_type: "Bearer".to_string(),
            expires_in: grant.expires_in,
            must_change_password: grant.must_change_password,
        })
        .into_response(),
        Err(rejection) => rejection_response(&rejection),
    }
}

use crate::{
    api::{rejection_response, RequestIdentity},
    gate::{audit::AuditContext, Pipeline},
};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PasswordChangeRequest {
    old_password: String,
    new_password: String,
}

#[utoipa::path(
    post,
    path= "/auth/password",
    request_body = PasswordChangeRequest,
    responses (
        (status = 204, description = "Credential rotated"),
        (status = 400, description = "New password too short"),
        (status = 403, description = "Current password mismatch"),
    ),
    tag= "auth"
)]
// axum handler for credential rotation, payload skipped to keep passwords out of spans
#[instrument(skip(pipeline, identity, context, payload))]
pub async fn change_password(
    Extension(pipeline): Extension<Arc<Pipeline>>,
    Extension(identity): Extension<RequestIdentity>,
    Extension(context): Extension<AuditContext>,
    payload: Option<Json<PasswordChangeRequest>>,
) -> impl IntoResponse {
    let Some(identity) = identity.0 else {
        return (
            StatusCode::UNAUTHORIZED,
            "authentication required".to_string(),
        )
            .into_response();
    };

    let Some(Json(change)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match pipeline.rotate_credential(
        &identity.subject,
        &change.old_password,
        &change.new_password,
        &context,
    ) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(rejection) => rejection_response(&rejection),
    }
}

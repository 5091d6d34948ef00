use crate::{api::RequestIdentity, gate::policy::Role};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct WhoamiResponse {
    subject: String,
    roles: Vec<Role>,
    must_change_password: bool,
}

#[utoipa::path(
    get,
    path= "/auth/whoami",
    responses (
        (status = 200, description = "Identity of the presented token", body = [WhoamiResponse], content_type = "application/json"),
        (status = 401, description = "Missing or invalid token"),
    ),
    tag= "auth"
)]
// axum handler for whoami
pub async fn whoami(Extension(identity): Extension<RequestIdentity>) -> impl IntoResponse {
    let Some(identity) = identity.0 else {
        return (
            StatusCode::UNAUTHORIZED,
            "authentication required".to_string(),
        )
            .into_response();
    };

    Json(WhoamiResponse {
        subject: identity.subject,
        roles: identity.roles,
        must_change_password: identity.must_rotate,
    })
    .into_response()
}

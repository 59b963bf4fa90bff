use axum::{http::StatusCode, routing::put, Json};

use crate::{
    auth::Session,
    errors::ServerResult,
    schemas::{NameSchema, PasswordSchema, ValidatedJson},
    serialized::{ToSerialized, User},
    Router,
};

#[utoipa::path(
    put,
    path = "/v1/profile/name",
    tag = "profile",
    request_body = NameSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
async fn update_name(
    session: Session,
    ValidatedJson(body): ValidatedJson<NameSchema>,
) -> ServerResult<Json<User>> {
    let user = session.store().update_name(&body.name).await?;

    Ok(Json(user.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/profile/password",
    tag = "profile",
    request_body = PasswordSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204),
        (status = 422, description = "New passwords do not match")
    )
)]
async fn change_password(
    session: Session,
    ValidatedJson(body): ValidatedJson<PasswordSchema>,
) -> ServerResult<StatusCode> {
    session
        .store()
        .change_password(
            &body.current_password,
            &body.new_password,
            &body.confirm_password,
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router {
    Router::new()
        .route("/profile/name", put(update_name))
        .route("/profile/password", put(change_password))
}

use axum::{
    extract::Path,
    routing::{get, patch},
    Json,
};
use uuid::Uuid;

use crate::{
    auth::Session,
    errors::ServerResult,
    schemas::{AmountSchema, ValidatedJson},
    serialized::{ToSerialized, TokenRequest, TokenRequestsPage},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/token-requests",
    tag = "token-requests",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = TokenRequestsPage)
    )
)]
async fn list_requests(session: Session) -> ServerResult<Json<TokenRequestsPage>> {
    let user = session.user()?;
    let minimum_request = session.settings().minimum_request().await?;

    let requests: Vec<_> = session
        .store()
        .snapshot()
        .token_requests
        .into_iter()
        .filter(|r| r.user_id == user.id)
        .collect();

    Ok(Json(TokenRequestsPage {
        requests: requests.to_serialized(),
        minimum_request,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/token-requests",
    tag = "token-requests",
    request_body = AmountSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = TokenRequest),
        (status = 422, description = "The amount is below the minimum request")
    )
)]
async fn create_request(
    session: Session,
    ValidatedJson(body): ValidatedJson<AmountSchema>,
) -> ServerResult<Json<TokenRequest>> {
    let minimum = session.settings().minimum_request().await?;
    let request = session.store().request_token(body.amount, minimum).await?;

    Ok(Json(request.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/token-requests/{id}",
    tag = "token-requests",
    request_body = AmountSchema,
    params(
        ("id" = Uuid, Path, description = "Id of the token request")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = TokenRequestsPage)
    )
)]
async fn update_request(
    session: Session,
    Path(request_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<AmountSchema>,
) -> ServerResult<Json<TokenRequestsPage>> {
    session
        .store()
        .update_token_request(request_id, body.amount)
        .await?;

    list_requests(session).await
}

pub fn router() -> Router {
    Router::new()
        .route("/token-requests", get(list_requests).post(create_request))
        .route("/token-requests/:id", patch(update_request))
}

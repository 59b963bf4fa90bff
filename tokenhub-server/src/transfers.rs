use axum::{routing::get, Json};
use log::warn;

use crate::{
    auth::Session,
    errors::ServerResult,
    schemas::{TransferSchema, ValidatedJson},
    serialized::{ToSerialized, TransferPage},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/transfers",
    tag = "transfers",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = TransferPage)
    )
)]
async fn transfers(session: Session) -> ServerResult<Json<TransferPage>> {
    let user = session.refreshed_user().await?;
    let limits = session.settings().transfer_limits().await?;

    if let Err(e) = session.store().refresh_transfers().await {
        warn!("Showing cached transfers, refreshing failed: {}", e);
    }

    let state = session.store().snapshot();

    Ok(Json(TransferPage {
        balance: user.api_tokens,
        limits: limits.to_serialized(),
        max_transfer: limits.max_transfer(user.api_tokens),
        transfers: state.token_transfers.to_serialized(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/transfers",
    tag = "transfers",
    request_body = TransferSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = TransferPage),
        (status = 422, description = "The transfer breaks a limit or was refused by the backend"),
        (status = 404, description = "The recipient doesn't exist")
    )
)]
async fn send_tokens(
    session: Session,
    ValidatedJson(body): ValidatedJson<TransferSchema>,
) -> ServerResult<Json<TransferPage>> {
    let limits = session.settings().transfer_limits().await?;

    session
        .store()
        .transfer_tokens(&body.recipient_email, body.amount, &limits)
        .await?;

    transfers(session).await
}

pub fn router() -> Router {
    Router::new().route("/transfers", get(transfers).post(send_tokens))
}

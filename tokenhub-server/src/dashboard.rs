use axum::{extract::State, routing::get, Json};
use chrono::Utc;
use log::warn;
use tokenhub_core::expiry::{expiry_date, group_by_day};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    serialized::{Dashboard, ToSerialized},
    Router,
};

/// How many requests and transfers the dashboard shows
const RECENT_LIMIT: usize = 6;

#[utoipa::path(
    get,
    path = "/v1/dashboard",
    tag = "pages",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Dashboard)
    )
)]
async fn dashboard(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Dashboard>> {
    let user = session.refreshed_user().await?;
    let now = Utc::now();

    let expiration_days = session.settings().expiration_days().await?;

    let expiries = session.store().token_expiries().await.unwrap_or_else(|e| {
        warn!("Failed to load token expiries of {}: {}", user.email, e);
        vec![]
    });

    let state = session.store().snapshot();

    // Admins hold every request, only the user's own are shown here
    let recent_requests: Vec<_> = state
        .token_requests
        .into_iter()
        .filter(|r| r.user_id == user.id)
        .take(RECENT_LIMIT)
        .collect();

    let recent_transfers: Vec<_> = state
        .token_transfers
        .into_iter()
        .filter(|t| t.involves(user.id))
        .take(RECENT_LIMIT)
        .collect();

    Ok(Json(Dashboard {
        user: user.to_serialized(),
        expiry_date: expiry_date(now, expiration_days),
        expiries: group_by_day(&expiries, now, &context.config.time_zone).to_serialized(),
        recent_requests: recent_requests.to_serialized(),
        recent_transfers: recent_transfers.to_serialized(),
    }))
}

pub fn router() -> Router {
    Router::new().route("/dashboard", get(dashboard))
}

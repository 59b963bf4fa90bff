use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tokenhub_core::{
    listing::{export_csv, paginate, RequestFilter, StatusFilter},
    Capabilities, TokenRequest as CoreTokenRequest,
};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{AmountSchema, ValidatedJson},
    serialized::{RequestListing, ToSerialized},
    Router,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListingQuery {
    /// `all`, `pending`, `approved`, or `rejected`
    status: Option<String>,
    /// First day to include, as `YYYY-MM-DD`
    start: Option<NaiveDate>,
    /// Last day to include, as `YYYY-MM-DD`
    end: Option<NaiveDate>,
    /// Part of the requester's email
    search: Option<String>,
    /// Page number, starting at 1
    page: Option<usize>,
}

impl ListingQuery {
    fn filter(&self) -> ServerResult<RequestFilter> {
        let status: StatusFilter = self
            .status
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(ServerError::BadRequest)?;

        Ok(RequestFilter {
            status,
            start: self.start,
            end: self.end,
            search: self.search.clone(),
        })
    }
}

/// Fetches every request fresh and applies the filters of `query`
async fn filtered_requests(
    session: &Session,
    context: &ServerContext,
    query: &ListingQuery,
) -> ServerResult<Vec<CoreTokenRequest>> {
    session.require(Capabilities::can_view_all_requests)?;

    let filter = query.filter()?;
    let requests = session.store().refresh_requests().await?;

    Ok(filter.apply(&requests, &context.config.time_zone))
}

#[utoipa::path(
    get,
    path = "/v1/admin/requests",
    tag = "admin",
    params(ListingQuery),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = RequestListing),
        (status = 403, description = "Only admins can list every request")
    )
)]
async fn list_all_requests(
    session: Session,
    State(context): State<ServerContext>,
    Query(query): Query<ListingQuery>,
) -> ServerResult<Json<RequestListing>> {
    let requests = filtered_requests(&session, &context, &query).await?;
    let page = paginate(
        &requests,
        query.page.unwrap_or(1),
        context.config.items_per_page,
    );

    Ok(Json(page.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/admin/requests/export",
    tag = "admin",
    params(ListingQuery),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Every filtered request as CSV", content_type = "text/csv", body = String)
    )
)]
async fn export_requests(
    session: Session,
    State(context): State<ServerContext>,
    Query(query): Query<ListingQuery>,
) -> ServerResult<impl IntoResponse> {
    let requests = filtered_requests(&session, &context, &query).await?;
    let document = export_csv(&requests, &context.config.time_zone)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"token-requests.csv\"",
            ),
        ],
        document,
    ))
}

#[utoipa::path(
    post,
    path = "/v1/admin/requests/{id}/approve",
    tag = "admin",
    request_body = AmountSchema,
    params(
        ("id" = Uuid, Path, description = "Id of the token request")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204),
        (status = 422, description = "The request is no longer pending")
    )
)]
async fn approve_request(
    session: Session,
    Path(request_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<AmountSchema>,
) -> ServerResult<StatusCode> {
    session
        .store()
        .approve_token_request(request_id, body.amount)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/admin/requests/{id}/reject",
    tag = "admin",
    params(
        ("id" = Uuid, Path, description = "Id of the token request")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204)
    )
)]
async fn reject_request(session: Session, Path(request_id): Path<Uuid>) -> ServerResult<StatusCode> {
    session.store().reject_token_request(request_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    patch,
    path = "/v1/admin/requests/{id}",
    tag = "admin",
    request_body = AmountSchema,
    params(
        ("id" = Uuid, Path, description = "Id of the token request")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204)
    )
)]
async fn update_amount(
    session: Session,
    Path(request_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<AmountSchema>,
) -> ServerResult<StatusCode> {
    session.require(Capabilities::can_review_requests)?;

    session
        .store()
        .update_token_request(request_id, body.amount)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router {
    Router::new()
        .route("/admin/requests", get(list_all_requests))
        .route("/admin/requests/export", get(export_requests))
        .route("/admin/requests/:id", patch(update_amount))
        .route("/admin/requests/:id/approve", post(approve_request))
        .route("/admin/requests/:id/reject", post(reject_request))
}

use axum::{
    extract::Path,
    routing::{get, post, put},
    Json,
};
use tokenhub_core::{Capabilities, SettingKey};

use crate::{
    auth::Session,
    errors::{ServerError, ServerResult},
    schemas::{SettingDraftSchema, ValidatedJson},
    serialized::{Setting, ToSerialized},
    Router,
};

fn parse_key(key: &str) -> ServerResult<SettingKey> {
    key.parse().map_err(|_| ServerError::NotFound {
        resource: "setting",
        identifier: "key",
    })
}

async fn setting(session: &Session, key: SettingKey) -> ServerResult<Setting> {
    let value = session.settings().get(key).await?;
    let draft = session.settings().draft(key);

    Ok((key, value, draft).to_serialized())
}

#[utoipa::path(
    get,
    path = "/v1/admin/settings",
    tag = "settings",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Setting>)
    )
)]
async fn list_settings(session: Session) -> ServerResult<Json<Vec<Setting>>> {
    session.require(Capabilities::can_edit_settings)?;

    let mut settings = vec![];

    for key in SettingKey::all() {
        settings.push(setting(&session, key).await?);
    }

    Ok(Json(settings))
}

#[utoipa::path(
    post,
    path = "/v1/admin/settings/reload",
    tag = "settings",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Setting>)
    )
)]
async fn reload_settings(session: Session) -> ServerResult<Json<Vec<Setting>>> {
    session.require(Capabilities::can_edit_settings)?;
    session.settings().load().await?;

    list_settings(session).await
}

#[utoipa::path(
    put,
    path = "/v1/admin/settings/{key}",
    tag = "settings",
    request_body = SettingDraftSchema,
    params(
        ("key" = String, Path, description = "Key of the setting, like `minimum_balance`")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Setting)
    )
)]
async fn edit_setting(
    session: Session,
    Path(key): Path<String>,
    ValidatedJson(body): ValidatedJson<SettingDraftSchema>,
) -> ServerResult<Json<Setting>> {
    session.require(Capabilities::can_edit_settings)?;

    let key = parse_key(&key)?;
    session.settings().edit(key, body.value);

    Ok(Json(setting(&session, key).await?))
}

#[utoipa::path(
    post,
    path = "/v1/admin/settings/{key}/commit",
    tag = "settings",
    params(
        ("key" = String, Path, description = "Key of the setting, like `minimum_balance`")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Setting)
    )
)]
async fn commit_setting(session: Session, Path(key): Path<String>) -> ServerResult<Json<Setting>> {
    session.require(Capabilities::can_edit_settings)?;

    let key = parse_key(&key)?;
    session.settings().commit(key).await?;

    Ok(Json(setting(&session, key).await?))
}

pub fn router() -> Router {
    Router::new()
        .route("/admin/settings", get(list_settings))
        .route("/admin/settings/reload", post(reload_settings))
        .route("/admin/settings/:key", put(edit_setting))
        .route("/admin/settings/:key/commit", post(commit_setting))
}

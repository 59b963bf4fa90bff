use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    routing::{get, post},
    Json,
};
use log::{info, warn};
use tokenhub_core::{Capabilities, User as CoreUser};
use tokenhub_store::{DomainStore, SettingsProjection, SignupOutcome};

use crate::{
    context::{ServerContext, SessionEntry},
    errors::{ServerError, ServerResult},
    schemas::{LoginSchema, SignupSchema, ValidatedJson},
    serialized::{LoginResult, SignupResult, ToSerialized, User},
    Router,
};

/// The signed-in client a request was made by
pub struct Session {
    token: String,
    entry: Arc<SessionEntry>,
}

impl Session {
    pub fn store(&self) -> &DomainStore {
        &self.entry.client.store
    }

    pub fn settings(&self) -> &SettingsProjection {
        &self.entry.client.settings
    }

    pub fn capabilities(&self) -> Option<Capabilities> {
        self.store().capabilities()
    }

    /// The signed-in user as last confirmed by the backend
    pub fn user(&self) -> ServerResult<CoreUser> {
        self.store().user().ok_or(ServerError::NotAuthenticated)
    }

    /// Fetches the profile again, falling back to the cached user if that fails
    pub async fn refreshed_user(&self) -> ServerResult<CoreUser> {
        match self.store().refresh_profile().await {
            Ok(user) => Ok(user),
            Err(e) => {
                warn!("Using the cached profile, refreshing failed: {}", e);
                self.user()
            }
        }
    }

    /// Resolves the capabilities, refusing the request unless `allowed` passes
    pub fn require(&self, allowed: impl Fn(&Capabilities) -> bool) -> ServerResult<Capabilities> {
        let capabilities = self.capabilities().ok_or(ServerError::NotAuthenticated)?;

        if !allowed(&capabilities) {
            return Err(ServerError::Forbidden);
        }

        Ok(capabilities)
    }

    pub fn last_path(&self) -> Option<String> {
        self.entry.last_path.lock().clone()
    }

    /// Records a successfully visited path
    pub fn visit(&self, path: &str) {
        *self.entry.last_path.lock() = Some(path.to_string());
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        context: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization"))?;

        let parts: Vec<_> = token.split_ascii_whitespace().collect();

        if parts.first() != Some(&"Bearer") {
            return Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer"));
        }

        let token = parts.last().copied().unwrap_or_default();

        let entry = context
            .session(token)
            .ok_or((StatusCode::UNAUTHORIZED, "Session does not exist"))?;

        Ok(Self {
            token: token.to_string(),
            entry,
        })
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "auth",
    request_body = LoginSchema,
    responses(
        (status = 200, body = LoginResult),
        (status = 400, description = "Invalid login credentials")
    )
)]
async fn login(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<LoginSchema>,
) -> ServerResult<Json<LoginResult>> {
    let client = context.hub.session();
    let user = client.store.login(&body.email, &body.password).await?;

    let token = context.register(client);

    Ok(Json(LoginResult {
        token,
        user: user.to_serialized(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    tag = "auth",
    request_body = SignupSchema,
    responses(
        (status = 200, body = SignupResult)
    )
)]
async fn signup(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<SignupSchema>,
) -> ServerResult<Json<SignupResult>> {
    let client = context.hub.session();
    let outcome = client
        .store
        .signup(&body.email, &body.password, &body.name)
        .await?;

    let result = match outcome {
        SignupOutcome::SignedIn(user) => SignupResult {
            token: Some(context.register(client)),
            user: Some(user.to_serialized()),
            confirmation_required: false,
        },
        SignupOutcome::ConfirmationRequired => SignupResult {
            token: None,
            user: None,
            confirmation_required: true,
        },
    };

    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204)
    )
)]
async fn logout(session: Session, State(context): State<ServerContext>) -> StatusCode {
    session.store().logout().await;
    context.forget(&session.token);

    info!("Session ended");
    StatusCode::NO_CONTENT
}

#[utoipa::path(
    get,
    path = "/v1/auth/user",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
async fn user(session: Session) -> ServerResult<Json<User>> {
    Ok(Json(session.refreshed_user().await?.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/signup", post(signup))
        .route("/auth/logout", post(logout))
        .route("/auth/user", get(user))
}

use async_trait::async_trait;
use chrono::Utc;
use log::warn;
use parking_lot::RwLock;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokenhub_core::{
    PrimaryKey, RequestScope, RequestStatus, SettingRow, TokenExpiry, TokenRequest,
    TokenTransfer, Tokens, User,
};
use url::Url;

use super::{
    AuthSession, BoxedGateway, Gateway, GatewayError, GatewayFactory, NewTokenRequest,
    ProfileUpdate, Result, SignUp,
};

/// Makes PostgREST answer with a single object instead of an array
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
/// PostgREST's code for a single object request that matched no rows
const NO_ROWS_CODE: &str = "PGRST116";

/// Where and how to reach the hosted backend
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: Url,
    pub anon_key: String,
}

impl SupabaseConfig {
    pub fn new(url: &str, anon_key: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| GatewayError::Network(format!("{url}: {e}")))?;

        Ok(Self {
            url,
            anon_key: anon_key.to_string(),
        })
    }
}

/// A gateway to a hosted supabase project
pub struct SupabaseGateway {
    client: Client,
    config: SupabaseConfig,
    /// The access token of the signed in session, if any
    access_token: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: PrimaryKey,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

/// Signing up answers with a session, or only the user when confirmation is required
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(AuthUser),
}

/// The error shapes of both PostgREST and GoTrue
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    code: Option<Value>,
}

impl ErrorBody {
    fn message(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.error_description.clone())
            .or_else(|| self.error.clone())
    }

    fn is_no_rows(&self) -> bool {
        self.code.as_ref().and_then(Value::as_str) == Some(NO_ROWS_CODE)
    }
}

impl SupabaseGateway {
    pub fn new(config: SupabaseConfig, client: Client) -> Self {
        Self {
            client,
            config,
            access_token: RwLock::new(None),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.as_str().trim_end_matches('/'), path)
    }

    fn rest(&self, table: &str) -> String {
        self.endpoint(&format!("rest/v1/{table}"))
    }

    fn rpc(&self, procedure: &str) -> String {
        self.endpoint(&format!("rest/v1/rpc/{procedure}"))
    }

    fn auth(&self, path: &str) -> String {
        self.endpoint(&format!("auth/v1/{path}"))
    }

    /// Starts a request carrying the project key and the session token, if signed in
    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let bearer = self
            .access_token
            .read()
            .clone()
            .unwrap_or_else(|| self.config.anon_key.clone());

        self.client
            .request(method, url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
    }

    fn single(builder: RequestBuilder) -> RequestBuilder {
        builder.header(header::ACCEPT, SINGLE_OBJECT)
    }

    fn returning(builder: RequestBuilder) -> RequestBuilder {
        builder.header("Prefer", "return=representation")
    }

    async fn fetch<T: DeserializeOwned>(
        builder: RequestBuilder,
        resource: &'static str,
        identifier: &'static str,
    ) -> Result<T> {
        let response = Self::send(builder, resource, identifier).await?;

        response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))
    }

    async fn execute(
        builder: RequestBuilder,
        resource: &'static str,
        identifier: &'static str,
    ) -> Result<()> {
        Self::send(builder, resource, identifier).await.map(|_| ())
    }

    async fn send(
        builder: RequestBuilder,
        resource: &'static str,
        identifier: &'static str,
    ) -> Result<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_unsuccessful_request(response, status, resource, identifier).await);
        }

        Ok(response)
    }

    fn store_session(&self, access_token: &str) {
        *self.access_token.write() = Some(access_token.to_string());
    }
}

#[async_trait]
impl Gateway for SupabaseGateway {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let builder = self
            .request(Method::POST, self.auth("token"))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));

        let response: TokenResponse = Self::fetch(builder, "user", "email").await?;
        self.store_session(&response.access_token);

        Ok(AuthSession {
            user_id: response.user.id,
            access_token: response.access_token,
        })
    }

    async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<SignUp> {
        let builder = self.request(Method::POST, self.auth("signup")).json(&json!({
            "email": email,
            "password": password,
            "data": { "name": name },
        }));

        let response: SignUpResponse = Self::fetch(builder, "user", "email").await?;

        match response {
            SignUpResponse::Session(session) => {
                self.store_session(&session.access_token);

                Ok(SignUp::Session(AuthSession {
                    user_id: session.user.id,
                    access_token: session.access_token,
                }))
            }
            SignUpResponse::User(user) => Ok(SignUp::ConfirmationRequired { user_id: user.id }),
        }
    }

    async fn sign_out(&self) -> Result<()> {
        let builder = self.request(Method::POST, self.auth("logout"));
        let result = Self::execute(builder, "session", "token").await;

        // The local session is gone either way
        *self.access_token.write() = None;

        result
    }

    async fn update_password(&self, new_password: &str) -> Result<()> {
        let builder = self
            .request(Method::PUT, self.auth("user"))
            .json(&json!({ "password": new_password }));

        Self::execute(builder, "user", "id").await
    }

    async fn get_profile(&self, user_id: PrimaryKey) -> Result<User> {
        let builder = self
            .request(Method::GET, self.rest("profiles"))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{user_id}"))]);

        Self::fetch(Self::single(builder), "profile", "id").await
    }

    async fn update_profile(&self, user_id: PrimaryKey, update: ProfileUpdate) -> Result<User> {
        let builder = self
            .request(Method::PATCH, self.rest("profiles"))
            .query(&[("id", format!("eq.{user_id}"))])
            .json(&update);

        Self::fetch(Self::single(Self::returning(builder)), "profile", "id").await
    }

    async fn list_token_requests(&self, scope: RequestScope) -> Result<Vec<TokenRequest>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
        ];

        if let RequestScope::User(user_id) = scope {
            query.push(("user_id", format!("eq.{user_id}")));
        }

        let builder = self
            .request(Method::GET, self.rest("token_requests"))
            .query(&query);

        Self::fetch(builder, "token_request", "user_id").await
    }

    async fn get_token_request(&self, request_id: PrimaryKey) -> Result<TokenRequest> {
        let builder = self
            .request(Method::GET, self.rest("token_requests"))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{request_id}"))]);

        Self::fetch(Self::single(builder), "token_request", "id").await
    }

    async fn insert_token_request(&self, new_request: NewTokenRequest) -> Result<TokenRequest> {
        let builder = self
            .request(Method::POST, self.rest("token_requests"))
            .json(&new_request);

        Self::fetch(Self::single(Self::returning(builder)), "token_request", "id").await
    }

    async fn update_token_request_amount(&self, request_id: PrimaryKey, amount: Tokens) -> Result<()> {
        let builder = self
            .request(Method::PATCH, self.rest("token_requests"))
            .query(&[("id", format!("eq.{request_id}"))])
            .json(&json!({ "amount": amount }));

        Self::execute(builder, "token_request", "id").await
    }

    async fn set_token_request_status(&self, request_id: PrimaryKey, status: RequestStatus) -> Result<()> {
        let builder = self
            .request(Method::PATCH, self.rest("token_requests"))
            .query(&[("id", format!("eq.{request_id}"))])
            .json(&json!({ "status": status }));

        Self::execute(builder, "token_request", "id").await
    }

    async fn call_approve_token_request(&self, request_id: PrimaryKey, amount: Tokens) -> Result<()> {
        let builder = self
            .request(Method::POST, self.rpc("approve_token_request"))
            .json(&json!({ "request_id": request_id, "token_amount": amount }));

        Self::execute(builder, "token_request", "id").await
    }

    async fn call_transfer_tokens(&self, recipient_email: &str, amount: Tokens) -> Result<()> {
        let builder = self
            .request(Method::POST, self.rpc("transfer_tokens"))
            .json(&json!({ "recipient_email": recipient_email, "transfer_amount": amount }));

        Self::execute(builder, "profile", "email").await
    }

    async fn list_token_transfers(&self, user_id: PrimaryKey) -> Result<Vec<TokenTransfer>> {
        let builder = self
            .request(Method::GET, self.rest("token_transfers"))
            .query(&[
                ("select", "*".to_string()),
                (
                    "or",
                    format!("(sender_id.eq.{user_id},recipient_id.eq.{user_id})"),
                ),
                ("order", "created_at.desc".to_string()),
            ]);

        Self::fetch(builder, "token_transfer", "user_id").await
    }

    async fn list_token_expiries(&self, user_id: PrimaryKey) -> Result<Vec<TokenExpiry>> {
        let builder = self
            .request(Method::GET, self.rest("user_token_expired_breakdown"))
            .query(&[
                ("select", "amount,expires_at".to_string()),
                ("user_id", format!("eq.{user_id}")),
                ("expires_at", format!("gt.{}", Utc::now().to_rfc3339())),
                ("order", "expires_at.asc".to_string()),
            ]);

        Self::fetch(builder, "token_expiry", "user_id").await
    }

    async fn get_setting(&self, key: &str) -> Result<SettingRow> {
        let builder = self
            .request(Method::GET, self.rest("settings"))
            .query(&[
                ("select", "key,value,int_value".to_string()),
                ("key", format!("eq.{key}")),
            ]);

        Self::fetch(Self::single(builder), "setting", "key").await
    }

    async fn list_settings(&self) -> Result<Vec<SettingRow>> {
        let builder = self
            .request(Method::GET, self.rest("settings"))
            .query(&[("select", "key,value,int_value")]);

        Self::fetch(builder, "setting", "key").await
    }

    async fn update_setting(&self, key: &str, value: Value) -> Result<()> {
        let builder = self
            .request(Method::POST, self.rpc("update_setting"))
            .json(&json!({ "setting_key": key, "new_value": value }));

        Self::execute(builder, "setting", "key").await
    }
}

async fn handle_unsuccessful_request(
    response: Response,
    status: StatusCode,
    resource: &'static str,
    identifier: &'static str,
) -> GatewayError {
    let body = response.text().await.unwrap_or_default();
    classify_error(status, &body, resource, identifier)
}

/// Turns an error answer of the backend into a [GatewayError]
fn classify_error(
    status: StatusCode,
    body: &str,
    resource: &'static str,
    identifier: &'static str,
) -> GatewayError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message()
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

    if parsed.is_no_rows() {
        return GatewayError::NotFound {
            resource,
            identifier,
        };
    }

    match status {
        StatusCode::NOT_FOUND | StatusCode::NOT_ACCEPTABLE => GatewayError::NotFound {
            resource,
            identifier,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::NotAuthorized(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            GatewayError::Validation(message)
        }
        status => {
            warn!("Backend answered {} for {}: {}", status, resource, message);
            GatewayError::Network(format!("{status}: {message}"))
        }
    }
}

/// Connects every new session to the same supabase project
pub struct SupabaseFactory {
    config: SupabaseConfig,
    client: Client,
}

impl SupabaseFactory {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

impl GatewayFactory for SupabaseFactory {
    fn connect(&self) -> BoxedGateway {
        Arc::new(SupabaseGateway::new(self.config.clone(), self.client.clone()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn gateway() -> SupabaseGateway {
        let config = SupabaseConfig::new("https://example.supabase.co/", "anon").unwrap();
        SupabaseGateway::new(config, Client::new())
    }

    #[test]
    fn test_endpoints() {
        let gateway = gateway();

        assert_eq!(
            gateway.rest("profiles"),
            "https://example.supabase.co/rest/v1/profiles"
        );
        assert_eq!(
            gateway.rpc("transfer_tokens"),
            "https://example.supabase.co/rest/v1/rpc/transfer_tokens"
        );
        assert_eq!(gateway.auth("token"), "https://example.supabase.co/auth/v1/token");
    }

    #[test]
    fn test_error_classification() {
        let no_rows = r#"{"code":"PGRST116","message":"JSON object requested, multiple (or no) rows returned"}"#;
        assert!(classify_error(StatusCode::NOT_ACCEPTABLE, no_rows, "profile", "id").is_not_found());

        let insufficient = r#"{"code":"P0001","message":"Insufficient balance"}"#;
        assert_eq!(
            classify_error(StatusCode::BAD_REQUEST, insufficient, "profile", "email"),
            GatewayError::Validation("Insufficient balance".to_string())
        );

        let bad_login = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        assert_eq!(
            classify_error(StatusCode::BAD_REQUEST, bad_login, "user", "email"),
            GatewayError::Validation("Invalid login credentials".to_string())
        );

        let denied = r#"{"code":"42501","message":"permission denied for table settings"}"#;
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, denied, "setting", "key"),
            GatewayError::NotAuthorized(_)
        ));

        assert!(matches!(
            classify_error(StatusCode::BAD_GATEWAY, "<html>", "setting", "key"),
            GatewayError::Network(_)
        ));
    }

    #[test]
    fn test_sign_up_response_shapes() {
        let with_session = r#"{
            "access_token": "jwt",
            "token_type": "bearer",
            "user": { "id": "6b1f3f3e-9c55-4a0c-b1a6-3d2d8f2f0f6e" }
        }"#;
        assert!(matches!(
            serde_json::from_str::<SignUpResponse>(with_session).unwrap(),
            SignUpResponse::Session(_)
        ));

        let without_session = r#"{ "id": "6b1f3f3e-9c55-4a0c-b1a6-3d2d8f2f0f6e", "email": "a@example.com" }"#;
        assert!(matches!(
            serde_json::from_str::<SignUpResponse>(without_session).unwrap(),
            SignUpResponse::User(_)
        ));
    }
}

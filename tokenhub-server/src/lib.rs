mod admin;
mod auth;
mod context;
mod dashboard;
mod docs;
mod errors;
mod generator;
mod navigation;
mod profile;
mod requests;
mod schemas;
mod serialized;
mod settings;
mod transfers;

use std::net::{Ipv6Addr, SocketAddr};

use axum::routing::get;
use log::info;
use thiserror::Error;
use tokenhub_core::Config;
use tokenhub_store::{GatewayError, Tokenhub};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use context::ServerContext;
pub use navigation::{resolve, Resolution, Route};

pub type Router = axum::Router<ServerContext>;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("Failed to set up the backend: {0}")]
    Gateway(#[from] GatewayError),
    #[error("Failed to listen: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds every route of the server around `context`
pub fn app(context: ServerContext) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .merge(auth::router())
        .merge(navigation::router())
        .merge(dashboard::router())
        .merge(requests::router())
        .merge(transfers::router())
        .merge(profile::router())
        .merge(admin::router())
        .merge(settings::router())
        .merge(generator::router());

    Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context)
}

/// Starts the tokenhub server
pub async fn run_server(config: Config) -> Result<(), StartError> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, config.server_port).into();

    let hub = Tokenhub::from_config(&config)?;
    let context = ServerContext::new(hub, config);

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app(context).into_make_service()).await?;

    Ok(())
}

#[cfg(test)]
mod test {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tokenhub_core::AdminBootstrap;
    use tower::ServiceExt;

    use super::*;

    fn test_app() -> axum::Router {
        let config = Config {
            bootstrap_admin: Some(AdminBootstrap {
                email: "admin@example.com".to_string(),
                password: "password".to_string(),
                name: "Admin".to_string(),
            }),
            ..Default::default()
        };

        let hub = Tokenhub::from_config(&config).unwrap();
        app(ServerContext::new(hub, config))
    }

    async fn call(
        app: &axum::Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, String) {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let body = body.map_or_else(Body::empty, |b| Body::from(b.to_string()));
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn call_json(
        app: &axum::Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, text) = call(app, method, uri, token, body).await;
        let value = serde_json::from_str(&text).unwrap_or(Value::String(text));

        (status, value)
    }

    async fn login(app: &axum::Router, email: &str) -> String {
        let (status, body) = call_json(
            app,
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({ "email": email, "password": "password" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn signup(app: &axum::Router, email: &str) -> String {
        let (status, body) = call_json(
            app,
            Method::POST,
            "/v1/auth/signup",
            None,
            Some(json!({ "email": email, "password": "password", "name": "Ayu" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Has the user request `amount` tokens and the admin approve them
    async fn fund(app: &axum::Router, user: &str, admin: &str, amount: i64) {
        let (status, request) = call_json(
            app,
            Method::POST,
            "/v1/token-requests",
            Some(user),
            Some(json!({ "amount": 100 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{request}");

        let id = request["id"].as_str().unwrap();
        let (status, _) = call(
            app,
            Method::POST,
            &format!("/v1/admin/requests/{id}/approve"),
            Some(admin),
            Some(json!({ "amount": amount })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_admin_route_guard() {
        let app = test_app();

        let (_, anonymous) =
            call_json(&app, Method::GET, "/v1/navigate?path=/admin", None, None).await;
        assert_eq!(anonymous["path"], "/login");
        assert_eq!(anonymous["redirected"], true);

        let user = signup(&app, "ayu@example.com").await;
        let (_, member) =
            call_json(&app, Method::GET, "/v1/navigate?path=/admin", Some(&user), None).await;
        assert_eq!(member["path"], "/");

        let admin = login(&app, "admin@example.com").await;
        let (_, allowed) =
            call_json(&app, Method::GET, "/v1/navigate?path=/admin", Some(&admin), None).await;
        assert_eq!(allowed["path"], "/admin");
        assert_eq!(allowed["redirected"], false);

        // Unknown paths go back to the last visited page
        call(&app, Method::GET, "/v1/navigate?path=/transfer", Some(&user), None).await;
        let (_, unknown) =
            call_json(&app, Method::GET, "/v1/navigate?path=/missing", Some(&user), None).await;
        assert_eq!(unknown["path"], "/transfer");
    }

    #[tokio::test]
    async fn test_admin_endpoints_need_admin() {
        let app = test_app();
        let user = signup(&app, "ayu@example.com").await;

        let (status, _) = call(&app, Method::GET, "/v1/admin/requests", Some(&user), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(&app, Method::GET, "/v1/admin/requests", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_transfer_limits() {
        let app = test_app();
        let admin = login(&app, "admin@example.com").await;
        let user = signup(&app, "ayu@example.com").await;

        fund(&app, &user, &admin, 50).await;

        let (_, profile) = call_json(&app, Method::GET, "/v1/auth/user", Some(&user), None).await;
        assert_eq!(profile["apiTokens"], 50);

        let (status, message) = call(
            &app,
            Method::POST,
            "/v1/transfers",
            Some(&user),
            Some(json!({ "recipientEmail": "admin@example.com", "amount": 35 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(message, "You must maintain a minimum balance of 20 tokens");

        let (status, page) = call_json(
            &app,
            Method::POST,
            "/v1/transfers",
            Some(&user),
            Some(json!({ "recipientEmail": "admin@example.com", "amount": 25 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{page}");
        assert_eq!(page["balance"], 25);
        assert_eq!(page["transfers"].as_array().unwrap().len(), 1);
        assert_eq!(page["transfers"][0]["amount"], 25);
    }

    #[tokio::test]
    async fn test_rejected_requests_leave_pending_view() {
        let app = test_app();
        let admin = login(&app, "admin@example.com").await;
        let user = signup(&app, "ayu@example.com").await;

        let (_, request) = call_json(
            &app,
            Method::POST,
            "/v1/token-requests",
            Some(&user),
            Some(json!({ "amount": 100 })),
        )
        .await;
        let id = request["id"].as_str().unwrap();

        let (_, pending) = call_json(
            &app,
            Method::GET,
            "/v1/admin/requests?status=pending",
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(pending["totalItems"], 1);

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/v1/admin/requests/{id}/reject"),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, pending) = call_json(
            &app,
            Method::GET,
            "/v1/admin/requests?status=pending",
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(pending["totalItems"], 0);

        let (_, history) = call_json(
            &app,
            Method::GET,
            "/v1/admin/requests?status=rejected",
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(history["items"][0]["id"], id);

        let (_, profile) = call_json(&app, Method::GET, "/v1/auth/user", Some(&user), None).await;
        assert_eq!(profile["apiTokens"], 0);
    }

    #[tokio::test]
    async fn test_export() {
        let app = test_app();
        let admin = login(&app, "admin@example.com").await;
        let user = signup(&app, "ayu@example.com").await;

        call(
            &app,
            Method::POST,
            "/v1/token-requests",
            Some(&user),
            Some(json!({ "amount": 150 })),
        )
        .await;

        let (status, csv) = call(
            &app,
            Method::GET,
            "/v1/admin/requests/export?search=AYU",
            Some(&admin),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);

        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "User,Email,Amount,Status,Date");
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("ayu@example.com,150,pending"));
    }

    #[tokio::test]
    async fn test_settings_drafts() {
        let app = test_app();
        let admin = login(&app, "admin@example.com").await;
        let user = signup(&app, "ayu@example.com").await;

        let (status, setting) = call_json(
            &app,
            Method::PUT,
            "/v1/admin/settings/minimum_token_request",
            Some(&admin),
            Some(json!({ "value": 150 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{setting}");
        assert_eq!(setting["value"], 100);
        assert_eq!(setting["draft"], 150);

        let (status, setting) = call_json(
            &app,
            Method::POST,
            "/v1/admin/settings/minimum_token_request/commit",
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{setting}");
        assert_eq!(setting["value"], 150);

        let (status, message) = call(
            &app,
            Method::POST,
            "/v1/token-requests",
            Some(&user),
            Some(json!({ "amount": 120 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(message, "Minimum request amount is 150 tokens");

        let (status, _) = call(
            &app,
            Method::PUT,
            "/v1/admin/settings/minimum_token_request",
            Some(&user),
            Some(json!({ "value": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    async fn commit_setting(app: &axum::Router, admin: &str, key: &str, value: i64) -> StatusCode {
        call(
            app,
            Method::PUT,
            &format!("/v1/admin/settings/{key}"),
            Some(admin),
            Some(json!({ "value": value })),
        )
        .await;

        let (status, _) = call(
            app,
            Method::POST,
            &format!("/v1/admin/settings/{key}/commit"),
            Some(admin),
            None,
        )
        .await;

        status
    }

    #[tokio::test]
    async fn test_minimum_follows_committed_setting() {
        let app = test_app();
        let admin = login(&app, "admin@example.com").await;
        let user = signup(&app, "ayu@example.com").await;

        let (_, page) = call_json(&app, Method::GET, "/v1/token-requests", Some(&user), None).await;
        assert_eq!(page["minimumRequest"], 100);

        let status = commit_setting(&app, &admin, "minimum_token_request", 150).await;
        assert_eq!(status, StatusCode::OK);

        let (_, page) = call_json(&app, Method::GET, "/v1/token-requests", Some(&user), None).await;
        assert_eq!(page["minimumRequest"], 150);

        let (status, message) = call(
            &app,
            Method::POST,
            "/v1/token-requests",
            Some(&user),
            Some(json!({ "amount": 120 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(message, "Minimum request amount is 150 tokens");
    }

    #[tokio::test]
    async fn test_expiration_out_of_range_is_refused() {
        let app = test_app();
        let admin = login(&app, "admin@example.com").await;

        let status = commit_setting(&app, &admin, "token_expiration", 100_000_000).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, dashboard) =
            call_json(&app, Method::GET, "/v1/dashboard", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK, "{dashboard}");
        assert!(dashboard["expiryDate"].is_string());
    }
}

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    admin, auth, dashboard, generator, navigation, profile, requests,
    schemas::{
        AmountSchema, GenerateSchema, LoginSchema, NameSchema, PasswordSchema,
        SettingDraftSchema, SignupSchema, TransferSchema,
    },
    serialized::{
        Dashboard, DailyExpiry, GeneratedImage, LoginResult, Navigation, RequestListing,
        Service, Setting, SignupResult, TokenRequest, TokenRequestsPage, TokenTransfer,
        TransferLimits, TransferPage, User,
    },
    settings, transfers,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        auth::signup,
        auth::logout,
        auth::user,
        navigation::navigate,
        dashboard::dashboard,
        requests::list_requests,
        requests::create_request,
        requests::update_request,
        transfers::transfers,
        transfers::send_tokens,
        profile::update_name,
        profile::change_password,
        admin::list_all_requests,
        admin::export_requests,
        admin::approve_request,
        admin::reject_request,
        admin::update_amount,
        settings::list_settings,
        settings::reload_settings,
        settings::edit_setting,
        settings::commit_setting,
        generator::services,
        generator::generate,
    ),
    components(schemas(
        LoginSchema,
        SignupSchema,
        AmountSchema,
        TransferSchema,
        NameSchema,
        PasswordSchema,
        SettingDraftSchema,
        GenerateSchema,
        User,
        LoginResult,
        SignupResult,
        TokenRequest,
        TokenTransfer,
        DailyExpiry,
        TransferLimits,
        Dashboard,
        TokenRequestsPage,
        TransferPage,
        RequestListing,
        Setting,
        Navigation,
        GeneratedImage,
        Service,
    )),
    modifiers(&Security),
    info(
        description = "tokenhub-server exposes endpoints to manage token balances, requests, and transfers"
    )
)]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

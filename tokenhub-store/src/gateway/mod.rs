use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokenhub_core::{
    PrimaryKey, RequestScope, RequestStatus, SettingRow, TokenExpiry, TokenRequest,
    TokenTransfer, Tokens, User,
};

mod memory;
pub use memory::*;

mod supabase;
pub use supabase::*;

pub(crate) type Result<T> = std::result::Result<T, GatewayError>;
pub type BoxedGateway = Arc<dyn Gateway>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The backend could not be reached, or failed in an unexpected way
    #[error("Network error: {0}")]
    Network(String),
    /// The backend refused the input, the message comes from the backend
    #[error("{0}")]
    Validation(String),
    /// The session is missing or not allowed to do this
    #[error("Not authorized: {0}")]
    NotAuthorized(String),
    /// A resource on the backend doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    /// The backend answered with something that couldn't be read
    #[error("Unexpected response: {0}")]
    Parse(String),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// An authenticated session on the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: PrimaryKey,
    pub access_token: String,
}

/// The result of registering an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUp {
    /// The account can be used right away
    Session(AuthSession),
    /// The account exists, but the email has to be confirmed before signing in
    ConfirmationRequired { user_id: PrimaryKey },
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTokenRequest {
    pub user_id: PrimaryKey,
    pub user_email: String,
    pub amount: Tokens,
    pub status: RequestStatus,
}

/// Represents the hosted backend tokenhub delegates authentication, storage, and balance changes to.
/// Every call is a single round trip, nothing is retried.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;
    async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<SignUp>;
    async fn sign_out(&self) -> Result<()>;
    async fn update_password(&self, new_password: &str) -> Result<()>;

    async fn get_profile(&self, user_id: PrimaryKey) -> Result<User>;
    async fn update_profile(&self, user_id: PrimaryKey, update: ProfileUpdate) -> Result<User>;

    /// Lists requests, newest first
    async fn list_token_requests(&self, scope: RequestScope) -> Result<Vec<TokenRequest>>;
    async fn get_token_request(&self, request_id: PrimaryKey) -> Result<TokenRequest>;
    async fn insert_token_request(&self, new_request: NewTokenRequest) -> Result<TokenRequest>;
    async fn update_token_request_amount(&self, request_id: PrimaryKey, amount: Tokens) -> Result<()>;
    async fn set_token_request_status(&self, request_id: PrimaryKey, status: RequestStatus) -> Result<()>;

    /// Runs the `approve_token_request` procedure.
    /// Marks the request approved and credits the requester in one step.
    async fn call_approve_token_request(&self, request_id: PrimaryKey, amount: Tokens) -> Result<()>;
    /// Runs the `transfer_tokens` procedure.
    /// Debits the session user, credits the recipient, and records the transfer in one step.
    async fn call_transfer_tokens(&self, recipient_email: &str, amount: Tokens) -> Result<()>;

    /// Lists transfers sent or received by the user, newest first
    async fn list_token_transfers(&self, user_id: PrimaryKey) -> Result<Vec<TokenTransfer>>;
    /// Lists batches of the user's tokens that haven't expired yet, soonest first
    async fn list_token_expiries(&self, user_id: PrimaryKey) -> Result<Vec<TokenExpiry>>;

    async fn get_setting(&self, key: &str) -> Result<SettingRow>;
    async fn list_settings(&self) -> Result<Vec<SettingRow>>;
    /// Runs the `update_setting` procedure
    async fn update_setting(&self, key: &str, value: Value) -> Result<()>;
}

/// Creates a gateway for every new session, since a gateway carries its session's credentials
pub trait GatewayFactory: Send + Sync {
    fn connect(&self) -> BoxedGateway;
}

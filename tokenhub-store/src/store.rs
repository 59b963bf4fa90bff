use std::time::Duration;

use log::{info, warn};
use parking_lot::Mutex;
use thiserror::Error;
use tokenhub_core::{
    check_password_confirmation, check_positive, check_request_amount, Capabilities,
    PrimaryKey, RequestScope, RequestStatus, TokenExpiry, TokenRequest, TokenTransfer, Tokens,
    TransferLimits, User, ValidationError,
};
use tokio::time::Instant;

use crate::gateway::{BoxedGateway, GatewayError, NewTokenRequest, ProfileUpdate, SignUp};

type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("Signup failed: {0}")]
    SignupFailed(String),
    #[error("Failed to fetch profile: {0}")]
    ProfileFetchFailed(GatewayError),
    #[error("You need to be signed in to do that")]
    NotAuthenticated,
    #[error("You are not allowed to do that")]
    NotPermitted,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Failed to create token request: {0}")]
    RequestCreateFailed(GatewayError),
    #[error("Failed to update token request: {0}")]
    RequestUpdateFailed(GatewayError),
    #[error("Failed to approve token request: {0}")]
    ApprovalFailed(GatewayError),
    #[error("Failed to reject token request: {0}")]
    RejectionFailed(GatewayError),
    #[error("{0}")]
    TransferFailed(GatewayError),
    #[error("Failed to update profile: {0}")]
    ProfileUpdateFailed(GatewayError),
    #[error("Failed to update password: {0}")]
    PasswordUpdateFailed(GatewayError),
    #[error(transparent)]
    Remote(GatewayError),
}

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// How long to wait between checks for a new account's profile
    pub signup_poll_interval: Duration,
    /// How long a new account's profile may take to appear
    pub signup_poll_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            signup_poll_interval: Duration::from_millis(250),
            signup_poll_timeout: Duration::from_secs(5),
        }
    }
}

/// Everything known locally about the signed-in user
#[derive(Debug, Default, Clone)]
pub struct StoreState {
    pub user: Option<User>,
    pub capabilities: Option<Capabilities>,
    /// Every request for admins, the user's own otherwise
    pub token_requests: Vec<TokenRequest>,
    pub token_transfers: Vec<TokenTransfer>,
}

impl StoreState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupOutcome {
    SignedIn(User),
    /// The account has to be confirmed by email before it can sign in
    ConfirmationRequired,
}

/// Holds the signed-in user, their requests and transfers for one session.
/// The balance is only ever taken from the backend, never computed here.
pub struct DomainStore {
    gateway: BoxedGateway,
    options: StoreOptions,
    state: Mutex<StoreState>,
}

impl DomainStore {
    pub fn new(gateway: BoxedGateway, options: StoreOptions) -> Self {
        Self {
            gateway,
            options,
            state: Default::default(),
        }
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.lock().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.lock().user.clone()
    }

    pub fn capabilities(&self) -> Option<Capabilities> {
        self.state.lock().capabilities
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let session = self
            .gateway
            .sign_in(email, password)
            .await
            .map_err(|e| match e {
                GatewayError::Validation(message) | GatewayError::NotAuthorized(message) => {
                    StoreError::InvalidCredentials(message)
                }
                other => StoreError::Remote(other),
            })?;

        let user = self
            .gateway
            .get_profile(session.user_id)
            .await
            .map_err(StoreError::ProfileFetchFailed)?;

        info!("{} signed in", user.email);
        Ok(self.start_session(user).await)
    }

    pub async fn signup(&self, email: &str, password: &str, name: &str) -> Result<SignupOutcome> {
        let signup = self
            .gateway
            .sign_up(email, password, name)
            .await
            .map_err(|e| StoreError::SignupFailed(e.to_string()))?;

        let session = match signup {
            SignUp::Session(session) => session,
            SignUp::ConfirmationRequired { user_id } => {
                info!("Account {} awaits email confirmation", user_id);
                return Ok(SignupOutcome::ConfirmationRequired);
            }
        };

        let user = self.wait_for_profile(session.user_id).await?;

        info!("{} signed up", user.email);
        Ok(SignupOutcome::SignedIn(self.start_session(user).await))
    }

    /// Clears local state even if the backend fails to end the session
    pub async fn logout(&self) {
        if let Err(e) = self.gateway.sign_out().await {
            warn!("Sign out failed, clearing the session anyway: {}", e);
        }

        *self.state.lock() = StoreState::default();
    }

    pub async fn request_token(&self, amount: Tokens, minimum: Tokens) -> Result<TokenRequest> {
        let user = self.require_user()?;
        check_request_amount(amount, minimum)?;

        let request = self
            .gateway
            .insert_token_request(NewTokenRequest {
                user_id: user.id,
                user_email: user.email.clone(),
                amount,
                status: RequestStatus::Pending,
            })
            .await
            .map_err(StoreError::RequestCreateFailed)?;

        info!("{} requested {} tokens", user.email, amount);
        self.refresh_in_background(self.fetch_requests(RequestScope::User(user.id)))
            .await;

        Ok(request)
    }

    /// Changes the amount of a request.
    /// Requesters can only edit their own pending requests, the backend has the final say.
    pub async fn update_token_request(&self, request_id: PrimaryKey, amount: Tokens) -> Result<()> {
        let capabilities = self.require_capabilities()?;
        check_positive(amount)?;

        let cached = self
            .state
            .lock()
            .token_requests
            .iter()
            .find(|r| r.id == request_id)
            .cloned();

        if let Some(request) = cached {
            if !capabilities.can_edit_request(&request) {
                return Err(ValidationError::RequestNotPending.into());
            }
        }

        self.gateway
            .update_token_request_amount(request_id, amount)
            .await
            .map_err(StoreError::RequestUpdateFailed)?;

        self.refresh_in_background(self.refresh_requests()).await;
        Ok(())
    }

    pub async fn approve_token_request(&self, request_id: PrimaryKey, amount: Tokens) -> Result<()> {
        let capabilities = self.require_capabilities()?;

        if !capabilities.can_review_requests() {
            return Err(StoreError::NotPermitted);
        }

        check_positive(amount)?;

        let request = self
            .gateway
            .get_token_request(request_id)
            .await
            .map_err(StoreError::ApprovalFailed)?;

        self.gateway
            .call_approve_token_request(request_id, amount)
            .await
            .map_err(StoreError::ApprovalFailed)?;

        info!("Approved {} tokens for {}", amount, request.user_email);

        if request.user_id == capabilities.user_id() {
            self.refresh_in_background(self.refresh_profile()).await;
        }

        self.refresh_in_background(self.refresh_requests()).await;
        Ok(())
    }

    pub async fn reject_token_request(&self, request_id: PrimaryKey) -> Result<()> {
        let capabilities = self.require_capabilities()?;

        if !capabilities.can_review_requests() {
            return Err(StoreError::NotPermitted);
        }

        self.gateway
            .set_token_request_status(request_id, RequestStatus::Rejected)
            .await
            .map_err(StoreError::RejectionFailed)?;

        info!("Rejected token request {}", request_id);
        self.refresh_in_background(self.refresh_requests()).await;

        Ok(())
    }

    /// Sends tokens to another user.
    /// The amount is checked against `limits` and the cached balance before anything is sent.
    pub async fn transfer_tokens(
        &self,
        recipient_email: &str,
        amount: Tokens,
        limits: &TransferLimits,
    ) -> Result<()> {
        let user = self.require_user()?;
        let recipient_email = recipient_email.trim();

        if recipient_email.is_empty() {
            return Err(ValidationError::MissingRecipient.into());
        }

        limits.check(user.api_tokens, amount)?;

        self.gateway
            .call_transfer_tokens(recipient_email, amount)
            .await
            .map_err(StoreError::TransferFailed)?;

        info!("{} sent {} tokens to {}", user.email, amount, recipient_email);

        self.refresh_in_background(self.refresh_profile()).await;
        self.refresh_in_background(self.refresh_transfers()).await;

        Ok(())
    }

    /// Fetches every request for admins, or the user's own requests
    pub async fn refresh_requests(&self) -> Result<Vec<TokenRequest>> {
        let capabilities = self.require_capabilities()?;

        let scope = if capabilities.can_view_all_requests() {
            RequestScope::All
        } else {
            RequestScope::User(capabilities.user_id())
        };

        self.fetch_requests(scope).await
    }

    pub async fn refresh_transfers(&self) -> Result<Vec<TokenTransfer>> {
        let user_id = self.require_capabilities()?.user_id();

        let transfers = self
            .gateway
            .list_token_transfers(user_id)
            .await
            .map_err(StoreError::Remote)?;

        self.state.lock().token_transfers = transfers.clone();
        Ok(transfers)
    }

    /// Replaces the cached user with a fresh copy of the profile
    pub async fn refresh_profile(&self) -> Result<User> {
        let user_id = self.require_capabilities()?.user_id();

        let user = self
            .gateway
            .get_profile(user_id)
            .await
            .map_err(StoreError::ProfileFetchFailed)?;

        self.replace_user(user.clone());
        Ok(user)
    }

    pub async fn update_name(&self, name: &str) -> Result<User> {
        let user_id = self.require_capabilities()?.user_id();

        let user = self
            .gateway
            .update_profile(
                user_id,
                ProfileUpdate {
                    name: Some(name.trim().to_string()),
                },
            )
            .await
            .map_err(StoreError::ProfileUpdateFailed)?;

        self.replace_user(user.clone());
        Ok(user)
    }

    /// Changes the password after confirming the current one by signing in again
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<()> {
        let user = self.require_user()?;
        check_password_confirmation(new_password, confirmation)?;

        self.gateway
            .sign_in(&user.email, current_password)
            .await
            .map_err(|e| match e {
                GatewayError::Validation(_) | GatewayError::NotAuthorized(_) => {
                    StoreError::InvalidCredentials("Current password is incorrect".to_string())
                }
                other => StoreError::Remote(other),
            })?;

        self.gateway
            .update_password(new_password)
            .await
            .map_err(StoreError::PasswordUpdateFailed)?;

        info!("{} changed their password", user.email);
        Ok(())
    }

    /// The user's tokens that haven't expired yet, soonest first
    pub async fn token_expiries(&self) -> Result<Vec<TokenExpiry>> {
        let user_id = self.require_capabilities()?.user_id();

        self.gateway
            .list_token_expiries(user_id)
            .await
            .map_err(StoreError::Remote)
    }

    fn require_user(&self) -> Result<User> {
        self.user().ok_or(StoreError::NotAuthenticated)
    }

    fn require_capabilities(&self) -> Result<Capabilities> {
        self.capabilities().ok_or(StoreError::NotAuthenticated)
    }

    fn replace_user(&self, user: User) {
        let mut state = self.state.lock();

        if state.user.as_ref().is_some_and(|u| u.id == user.id) {
            state.user = Some(user);
        }
    }

    async fn fetch_requests(&self, scope: RequestScope) -> Result<Vec<TokenRequest>> {
        let requests = self
            .gateway
            .list_token_requests(scope)
            .await
            .map_err(StoreError::Remote)?;

        self.state.lock().token_requests = requests.clone();
        Ok(requests)
    }

    /// Runs a refresh that follows a successful change, failures are only logged
    async fn refresh_in_background<T>(&self, refresh: impl std::future::Future<Output = Result<T>>) {
        if let Err(e) = refresh.await {
            warn!("Refresh after a successful change failed: {}", e);
        }
    }

    /// Loads the lists a signed-in user sees and replaces the state in one step
    async fn start_session(&self, user: User) -> User {
        let capabilities = Capabilities::for_user(&user);

        let scope = if capabilities.can_view_all_requests() {
            RequestScope::All
        } else {
            RequestScope::User(user.id)
        };

        let token_requests = self
            .gateway
            .list_token_requests(scope)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to load token requests for {}: {}", user.email, e);
                vec![]
            });

        let token_transfers = self
            .gateway
            .list_token_transfers(user.id)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to load transfers for {}: {}", user.email, e);
                vec![]
            });

        *self.state.lock() = StoreState {
            user: Some(user.clone()),
            capabilities: Some(capabilities),
            token_requests,
            token_transfers,
        };

        user
    }

    /// Polls until the backend has created the profile of a new account
    async fn wait_for_profile(&self, user_id: PrimaryKey) -> Result<User> {
        let deadline = Instant::now() + self.options.signup_poll_timeout;

        loop {
            match self.gateway.get_profile(user_id).await {
                Ok(user) => return Ok(user),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(StoreError::ProfileFetchFailed(e)),
            }

            if Instant::now() >= deadline {
                warn!("Profile of {} never appeared", user_id);
                return Err(StoreError::SignupFailed(
                    "The account profile was not created in time".to_string(),
                ));
            }

            tokio::time::sleep(self.options.signup_poll_interval).await;
        }
    }
}

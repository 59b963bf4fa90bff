use std::{collections::HashMap, sync::Arc};

use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use parking_lot::{Mutex, MutexGuard};
use rand::rngs::OsRng;
use serde_json::Value;
use tokenhub_core::{
    expiry::expiry_date, PrimaryKey, RequestScope, RequestStatus, Role, SettingKey, SettingRow, Settings, TokenExpiry,
    TokenRequest, TokenTransfer, Tokens, User,
};
use uuid::Uuid;

use super::{
    AuthSession, BoxedGateway, Gateway, GatewayError, GatewayFactory, NewTokenRequest,
    ProfileUpdate, Result, SignUp,
};

/// An in-process backend with the same rules as the hosted one.
/// The balance procedures run under a single lock, so they are atomic.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

struct Inner {
    tables: Mutex<Tables>,
    argon: Argon2<'static>,
}

#[derive(Default)]
struct Tables {
    accounts: Vec<Account>,
    profiles: HashMap<PrimaryKey, User>,
    requests: Vec<TokenRequest>,
    transfers: Vec<TokenTransfer>,
    expiries: Vec<(PrimaryKey, TokenExpiry)>,
    settings: HashMap<String, SettingRow>,
    /// Every operation the backend served, in order
    journal: Vec<&'static str>,
}

struct Account {
    id: PrimaryKey,
    email: String,
    password: String,
}

impl MemoryBackend {
    /// Creates a backend with every setting at its default value
    pub fn new() -> Self {
        let backend = Self {
            inner: Arc::new(Inner {
                tables: Default::default(),
                argon: Argon2::default(),
            }),
        };

        {
            let mut tables = backend.inner.tables.lock();

            for key in SettingKey::all() {
                let value = key.default_value();
                tables.settings.insert(
                    key.key(),
                    SettingRow {
                        key: key.key(),
                        value: key.encode(value),
                        int_value: Some(value),
                    },
                );
            }
        }

        backend
    }

    /// Creates an account with a profile, like the signup trigger does
    pub fn create_account(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: Role,
        api_tokens: Tokens,
    ) -> Result<User> {
        let password = self.hash(password)?;
        let mut tables = self.inner.tables.lock();

        if tables.account_by_email(email).is_some() {
            return Err(GatewayError::Validation("User already registered".to_string()));
        }

        let welcome_expiry = if api_tokens > 0 {
            tables.expiry_of(api_tokens, Utc::now())?
        } else {
            None
        };

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            role,
            api_tokens,
        };

        tables.accounts.push(Account {
            id: user.id,
            email: email.to_string(),
            password,
        });
        tables.profiles.insert(user.id, user.clone());

        if let Some(expiry) = welcome_expiry {
            tables.expiries.push((user.id, expiry));
        }

        info!("Created {:?} account {}", role, email);
        Ok(user)
    }

    /// Sets a setting directly, bypassing authorization
    pub fn put_setting(&self, key: SettingKey, value: i64) {
        self.inner.tables.lock().put_setting(key, value);
    }

    /// The names of the operations served so far
    pub fn journal(&self) -> Vec<&'static str> {
        self.inner.tables.lock().journal.clone()
    }

    /// The current profile of a user, bypassing authorization
    pub fn profile(&self, user_id: PrimaryKey) -> Option<User> {
        self.inner.tables.lock().profiles.get(&user_id).cloned()
    }

    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        self.inner
            .argon
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| GatewayError::Network(format!("HashError: {e}")))
    }

    fn verify(&self, password: &str, stored: &str) -> bool {
        let Ok(stored) = PasswordHash::new(stored) else {
            return false;
        };

        self.inner
            .argon
            .verify_password(password.as_bytes(), &stored)
            .is_ok()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayFactory for MemoryBackend {
    fn connect(&self) -> BoxedGateway {
        Arc::new(MemoryGateway::new(self))
    }
}

impl Tables {
    fn account_by_email(&self, email: &str) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
    }

    fn settings(&self) -> Settings {
        let rows: Vec<_> = self.settings.values().cloned().collect();
        Settings::from_rows(&rows)
    }

    fn put_setting(&mut self, key: SettingKey, value: i64) {
        self.settings.insert(
            key.key(),
            SettingRow {
                key: key.key(),
                value: key.encode(value),
                int_value: Some(value),
            },
        );
    }

    /// When `amount` tokens granted at `now` expire, None if expiration is disabled
    fn expiry_of(&self, amount: Tokens, now: DateTime<Utc>) -> Result<Option<TokenExpiry>> {
        let days = self.settings().token_expiration_days();

        if days <= 0 {
            return Ok(None);
        }

        let expires_at = expiry_date(now, days).ok_or_else(|| {
            GatewayError::Validation(format!("Token expiration of {days} days is out of range"))
        })?;

        Ok(Some(TokenExpiry { amount, expires_at }))
    }

    fn profile_mut(&mut self, user_id: PrimaryKey) -> Result<&mut User> {
        self.profiles
            .get_mut(&user_id)
            .ok_or(GatewayError::NotFound {
                resource: "profile",
                identifier: "id",
            })
    }

    fn request_mut(&mut self, request_id: PrimaryKey) -> Result<&mut TokenRequest> {
        self.requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or(GatewayError::NotFound {
                resource: "token_request",
                identifier: "id",
            })
    }

    fn role_of(&self, user_id: PrimaryKey) -> Option<Role> {
        self.profiles.get(&user_id).map(|p| p.role)
    }
}

fn balance_overflow() -> GatewayError {
    GatewayError::Validation("Balance would exceed the largest supported amount".to_string())
}

/// Newest first, rows created in the same instant keep the latest one on top
fn newest_first<T>(
    rows: impl DoubleEndedIterator<Item = T>,
    created_at: impl Fn(&T) -> DateTime<Utc>,
) -> Vec<T> {
    let mut rows: Vec<T> = rows.rev().collect();
    rows.sort_by_key(|r| std::cmp::Reverse(created_at(r)));
    rows
}

/// A session on a [MemoryBackend]
pub struct MemoryGateway {
    backend: MemoryBackend,
    session: Mutex<Option<PrimaryKey>>,
}

impl MemoryGateway {
    pub fn new(backend: &MemoryBackend) -> Self {
        Self {
            backend: backend.clone(),
            session: Default::default(),
        }
    }

    /// Locks the tables, records the operation, and returns the session user
    fn open(&self, operation: &'static str) -> (MutexGuard<'_, Tables>, Option<PrimaryKey>) {
        let mut tables = self.backend.inner.tables.lock();
        tables.journal.push(operation);

        (tables, *self.session.lock())
    }

    fn require_session(session: Option<PrimaryKey>) -> Result<PrimaryKey> {
        session.ok_or_else(|| GatewayError::NotAuthorized("No active session".to_string()))
    }

    fn require_admin(tables: &Tables, session: Option<PrimaryKey>) -> Result<PrimaryKey> {
        let user_id = Self::require_session(session)?;

        match tables.role_of(user_id) {
            Some(Role::Admin) => Ok(user_id),
            _ => Err(GatewayError::NotAuthorized(
                "Only admins can do this".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let account = {
            let (tables, _) = self.open("sign_in");
            tables
                .account_by_email(email)
                .map(|a| (a.id, a.password.clone()))
        };

        let invalid = || GatewayError::Validation("Invalid login credentials".to_string());
        let (user_id, stored) = account.ok_or_else(invalid)?;

        if !self.backend.verify(password, &stored) {
            return Err(invalid());
        }

        *self.session.lock() = Some(user_id);

        Ok(AuthSession {
            user_id,
            access_token: user_id.to_string(),
        })
    }

    async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<SignUp> {
        let welcome = {
            let (tables, _) = self.open("sign_up");
            tables.settings().welcome_token()
        };

        let user = self
            .backend
            .create_account(email, password, name, Role::User, welcome)?;

        *self.session.lock() = Some(user.id);

        Ok(SignUp::Session(AuthSession {
            user_id: user.id,
            access_token: user.id.to_string(),
        }))
    }

    async fn sign_out(&self) -> Result<()> {
        let _ = self.open("sign_out");
        *self.session.lock() = None;

        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<()> {
        let password = self.backend.hash(new_password)?;
        let (mut tables, session) = self.open("update_password");
        let user_id = Self::require_session(session)?;

        let account = tables
            .accounts
            .iter_mut()
            .find(|a| a.id == user_id)
            .ok_or(GatewayError::NotFound {
                resource: "user",
                identifier: "id",
            })?;

        account.password = password;
        Ok(())
    }

    async fn get_profile(&self, user_id: PrimaryKey) -> Result<User> {
        let (mut tables, session) = self.open("get_profile");
        Self::require_session(session)?;

        tables.profile_mut(user_id).map(|p| p.clone())
    }

    async fn update_profile(&self, user_id: PrimaryKey, update: ProfileUpdate) -> Result<User> {
        let (mut tables, session) = self.open("update_profile");

        if Self::require_session(session)? != user_id {
            Self::require_admin(&tables, session)?;
        }

        let profile = tables.profile_mut(user_id)?;

        if let Some(name) = update.name {
            profile.name = name;
        }

        Ok(profile.clone())
    }

    async fn list_token_requests(&self, scope: RequestScope) -> Result<Vec<TokenRequest>> {
        let (tables, session) = self.open("list_token_requests");

        let rows: Vec<_> = match scope {
            RequestScope::All => {
                Self::require_admin(&tables, session)?;
                tables.requests.iter().cloned().collect()
            }
            RequestScope::User(user_id) => {
                if Self::require_session(session)? != user_id {
                    Self::require_admin(&tables, session)?;
                }

                tables
                    .requests
                    .iter()
                    .filter(|r| r.user_id == user_id)
                    .cloned()
                    .collect()
            }
        };

        Ok(newest_first(rows.into_iter(), |r| r.created_at))
    }

    async fn get_token_request(&self, request_id: PrimaryKey) -> Result<TokenRequest> {
        let (mut tables, session) = self.open("get_token_request");
        let user_id = Self::require_session(session)?;
        let is_admin = tables.role_of(user_id) == Some(Role::Admin);

        let request = tables.request_mut(request_id)?.clone();

        if !is_admin && request.user_id != user_id {
            return Err(GatewayError::NotFound {
                resource: "token_request",
                identifier: "id",
            });
        }

        Ok(request)
    }

    async fn insert_token_request(&self, new_request: NewTokenRequest) -> Result<TokenRequest> {
        let (mut tables, session) = self.open("insert_token_request");

        if Self::require_session(session)? != new_request.user_id {
            return Err(GatewayError::NotAuthorized(
                "Requests can only be made for yourself".to_string(),
            ));
        }

        if new_request.amount <= 0 {
            return Err(GatewayError::Validation(
                "Amount must be positive".to_string(),
            ));
        }

        let request = TokenRequest {
            id: Uuid::new_v4(),
            user_id: new_request.user_id,
            user_email: new_request.user_email,
            amount: new_request.amount,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };

        tables.requests.push(request.clone());
        Ok(request)
    }

    async fn update_token_request_amount(&self, request_id: PrimaryKey, amount: Tokens) -> Result<()> {
        let (mut tables, session) = self.open("update_token_request_amount");
        let user_id = Self::require_session(session)?;
        let is_admin = tables.role_of(user_id) == Some(Role::Admin);

        if amount <= 0 {
            return Err(GatewayError::Validation(
                "Amount must be positive".to_string(),
            ));
        }

        let request = tables.request_mut(request_id)?;

        if !is_admin {
            if request.user_id != user_id {
                return Err(GatewayError::NotAuthorized(
                    "Not the owner of this request".to_string(),
                ));
            }

            if !request.is_pending() {
                return Err(GatewayError::Validation(
                    "Only pending requests can be edited".to_string(),
                ));
            }
        }

        request.amount = amount;
        Ok(())
    }

    async fn set_token_request_status(&self, request_id: PrimaryKey, status: RequestStatus) -> Result<()> {
        let (mut tables, session) = self.open("set_token_request_status");
        Self::require_admin(&tables, session)?;

        let request = tables.request_mut(request_id)?;

        if !request.status.can_transition_to(status) {
            return Err(GatewayError::Validation(format!(
                "Request is already {}",
                request.status
            )));
        }

        request.status = status;
        Ok(())
    }

    async fn call_approve_token_request(&self, request_id: PrimaryKey, amount: Tokens) -> Result<()> {
        let (mut tables, session) = self.open("approve_token_request");
        Self::require_admin(&tables, session)?;

        if amount <= 0 {
            return Err(GatewayError::Validation(
                "Amount must be positive".to_string(),
            ));
        }

        let request = tables.request_mut(request_id)?;

        if !request.status.can_transition_to(RequestStatus::Approved) {
            return Err(GatewayError::Validation(format!(
                "Request is already {}",
                request.status
            )));
        }

        // Everything that can fail is checked before the first write
        let owner = request.user_id;
        let balance = tables
            .profile_mut(owner)?
            .api_tokens
            .checked_add(amount)
            .ok_or_else(balance_overflow)?;
        let expiry = tables.expiry_of(amount, Utc::now())?;

        let request = tables.request_mut(request_id)?;
        request.status = RequestStatus::Approved;
        request.amount = amount;

        tables.profile_mut(owner)?.api_tokens = balance;

        if let Some(expiry) = expiry {
            tables.expiries.push((owner, expiry));
        }

        Ok(())
    }

    async fn call_transfer_tokens(&self, recipient_email: &str, amount: Tokens) -> Result<()> {
        let (mut tables, session) = self.open("transfer_tokens");
        let sender_id = Self::require_session(session)?;
        let limits = tables.settings().transfer_limits();

        if amount <= 0 {
            return Err(GatewayError::Validation(
                "Transfer amount must be positive".to_string(),
            ));
        }

        if amount < limits.min_transfer {
            return Err(GatewayError::Validation(format!(
                "Minimum transfer amount is {} tokens",
                limits.min_transfer
            )));
        }

        let recipient_id = tables
            .account_by_email(recipient_email)
            .map(|a| a.id)
            .ok_or(GatewayError::NotFound {
                resource: "profile",
                identifier: "email",
            })?;

        if recipient_id == sender_id {
            return Err(GatewayError::Validation(
                "Cannot transfer tokens to yourself".to_string(),
            ));
        }

        let sender_balance = tables
            .profile_mut(sender_id)?
            .api_tokens
            .checked_sub(amount)
            .filter(|balance| *balance >= limits.min_balance)
            .ok_or_else(|| GatewayError::Validation("Insufficient balance".to_string()))?;

        let recipient_balance = tables
            .profile_mut(recipient_id)?
            .api_tokens
            .checked_add(amount)
            .ok_or_else(balance_overflow)?;

        let sender = tables.profile_mut(sender_id)?;
        sender.api_tokens = sender_balance;
        let sender_email = sender.email.clone();

        let recipient = tables.profile_mut(recipient_id)?;
        recipient.api_tokens = recipient_balance;
        let recipient_email = recipient.email.clone();

        tables.transfers.push(TokenTransfer {
            id: Uuid::new_v4(),
            sender_id,
            sender_email,
            recipient_id,
            recipient_email,
            amount,
            created_at: Utc::now(),
        });

        Ok(())
    }

    async fn list_token_transfers(&self, user_id: PrimaryKey) -> Result<Vec<TokenTransfer>> {
        let (tables, session) = self.open("list_token_transfers");

        if Self::require_session(session)? != user_id {
            Self::require_admin(&tables, session)?;
        }

        let rows: Vec<_> = tables
            .transfers
            .iter()
            .filter(|t| t.involves(user_id))
            .cloned()
            .collect();

        Ok(newest_first(rows.into_iter(), |t| t.created_at))
    }

    async fn list_token_expiries(&self, user_id: PrimaryKey) -> Result<Vec<TokenExpiry>> {
        let (tables, session) = self.open("list_token_expiries");

        if Self::require_session(session)? != user_id {
            Self::require_admin(&tables, session)?;
        }

        let now = Utc::now();
        let mut rows: Vec<_> = tables
            .expiries
            .iter()
            .filter(|(owner, e)| *owner == user_id && e.expires_at > now)
            .map(|(_, e)| e.clone())
            .collect();

        rows.sort_by_key(|e| e.expires_at);
        Ok(rows)
    }

    async fn get_setting(&self, key: &str) -> Result<SettingRow> {
        let (tables, _) = self.open("get_setting");

        tables
            .settings
            .get(key)
            .cloned()
            .ok_or(GatewayError::NotFound {
                resource: "setting",
                identifier: "key",
            })
    }

    async fn list_settings(&self) -> Result<Vec<SettingRow>> {
        let (tables, _) = self.open("list_settings");

        let mut rows: Vec<_> = tables.settings.values().cloned().collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));

        Ok(rows)
    }

    async fn update_setting(&self, key: &str, value: Value) -> Result<()> {
        let (mut tables, session) = self.open("update_setting");
        Self::require_admin(&tables, session)?;

        let setting: SettingKey = key.parse().map_err(GatewayError::Validation)?;

        let row = SettingRow {
            key: key.to_string(),
            value,
            int_value: None,
        };

        let number = setting
            .decode(&row)
            .ok_or_else(|| GatewayError::Validation(format!("Invalid value for {key}")))?;

        if number < 0 {
            return Err(GatewayError::Validation(format!(
                "{key} can't be negative"
            )));
        }

        if number > setting.maximum_value() {
            return Err(GatewayError::Validation(format!(
                "{key} can't be more than {}",
                setting.maximum_value()
            )));
        }

        tables.put_setting(setting, number);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    async fn signed_in(backend: &MemoryBackend, email: &str) -> MemoryGateway {
        let gateway = MemoryGateway::new(backend);
        gateway.sign_in(email, "password").await.unwrap();
        gateway
    }

    #[tokio::test]
    async fn test_sign_in_checks_password() {
        let backend = MemoryBackend::new();
        backend
            .create_account("a@example.com", "password", "A", Role::User, 0)
            .unwrap();

        let gateway = MemoryGateway::new(&backend);

        assert!(gateway.sign_in("a@example.com", "wrong").await.is_err());
        assert!(gateway.sign_in("b@example.com", "password").await.is_err());
        assert!(gateway.sign_in("A@example.com", "password").await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_up_grants_welcome_tokens() {
        let backend = MemoryBackend::new();
        backend.put_setting(SettingKey::WelcomeToken, 15);

        let gateway = MemoryGateway::new(&backend);
        let SignUp::Session(session) = gateway
            .sign_up("new@example.com", "password", "New")
            .await
            .unwrap()
        else {
            panic!("memory sign ups always start a session");
        };

        let profile = gateway.get_profile(session.user_id).await.unwrap();
        assert_eq!(profile.api_tokens, 15);
        assert_eq!(profile.role, Role::User);

        let expiries = gateway.list_token_expiries(session.user_id).await.unwrap();
        assert_eq!(expiries.len(), 1);
        assert_eq!(expiries[0].amount, 15);

        assert!(gateway
            .sign_up("new@example.com", "password", "Again")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_transfer_is_atomic() {
        let backend = MemoryBackend::new();
        let sender = backend
            .create_account("s@example.com", "password", "S", Role::User, 50)
            .unwrap();
        let recipient = backend
            .create_account("r@example.com", "password", "R", Role::User, 0)
            .unwrap();

        let gateway = signed_in(&backend, "s@example.com").await;

        // Would leave 15, below the default minimum balance of 20
        assert_eq!(
            gateway.call_transfer_tokens("r@example.com", 35).await,
            Err(GatewayError::Validation("Insufficient balance".to_string()))
        );
        assert_eq!(backend.profile(sender.id).unwrap().api_tokens, 50);

        assert!(gateway
            .call_transfer_tokens("nobody@example.com", 5)
            .await
            .unwrap_err()
            .is_not_found());

        gateway.call_transfer_tokens("r@example.com", 25).await.unwrap();

        assert_eq!(backend.profile(sender.id).unwrap().api_tokens, 25);
        assert_eq!(backend.profile(recipient.id).unwrap().api_tokens, 25);

        let transfers = gateway.list_token_transfers(sender.id).await.unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].amount, 25);
        assert_eq!(transfers[0].recipient_id, recipient.id);
    }

    #[tokio::test]
    async fn test_status_is_terminal() {
        let backend = MemoryBackend::new();
        backend
            .create_account("admin@example.com", "password", "Admin", Role::Admin, 0)
            .unwrap();
        let user = backend
            .create_account("u@example.com", "password", "U", Role::User, 0)
            .unwrap();

        let requester = signed_in(&backend, "u@example.com").await;
        let request = requester
            .insert_token_request(NewTokenRequest {
                user_id: user.id,
                user_email: user.email.clone(),
                amount: 100,
                status: RequestStatus::Pending,
            })
            .await
            .unwrap();

        let admin = signed_in(&backend, "admin@example.com").await;

        // Users can't review
        assert!(matches!(
            requester.call_approve_token_request(request.id, 100).await,
            Err(GatewayError::NotAuthorized(_))
        ));

        admin
            .set_token_request_status(request.id, RequestStatus::Rejected)
            .await
            .unwrap();

        assert!(admin
            .call_approve_token_request(request.id, 100)
            .await
            .is_err());
        assert!(requester
            .update_token_request_amount(request.id, 200)
            .await
            .is_err());
        assert_eq!(backend.profile(user.id).unwrap().api_tokens, 0);
    }

    async fn pending_request(backend: &MemoryBackend, user: &User) -> TokenRequest {
        signed_in(backend, &user.email)
            .await
            .insert_token_request(NewTokenRequest {
                user_id: user.id,
                user_email: user.email.clone(),
                amount: 100,
                status: RequestStatus::Pending,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_failed_approval_changes_nothing() {
        let backend = MemoryBackend::new();
        backend
            .create_account("admin@example.com", "password", "Admin", Role::Admin, 0)
            .unwrap();
        let rich = backend
            .create_account("rich@example.com", "password", "Rich", Role::User, i64::MAX - 10)
            .unwrap();
        let user = backend
            .create_account("u@example.com", "password", "U", Role::User, 0)
            .unwrap();

        let admin = signed_in(&backend, "admin@example.com").await;

        let request = pending_request(&backend, &rich).await;
        assert!(matches!(
            admin.call_approve_token_request(request.id, 100).await,
            Err(GatewayError::Validation(_))
        ));
        assert_eq!(backend.profile(rich.id).unwrap().api_tokens, i64::MAX - 10);

        // An expiration window past the representable dates
        backend.put_setting(SettingKey::TokenExpiration, 100_000_000);

        let request = pending_request(&backend, &user).await;
        assert!(matches!(
            admin.call_approve_token_request(request.id, 100).await,
            Err(GatewayError::Validation(_))
        ));

        let unchanged = admin.get_token_request(request.id).await.unwrap();
        assert_eq!(unchanged.status, RequestStatus::Pending);
        assert_eq!(backend.profile(user.id).unwrap().api_tokens, 0);
    }

    #[tokio::test]
    async fn test_transfer_cannot_overflow() {
        let backend = MemoryBackend::new();
        let sender = backend
            .create_account("s@example.com", "password", "S", Role::User, 100)
            .unwrap();
        backend
            .create_account("r@example.com", "password", "R", Role::User, i64::MAX)
            .unwrap();

        let gateway = signed_in(&backend, "s@example.com").await;

        assert!(matches!(
            gateway.call_transfer_tokens("r@example.com", 50).await,
            Err(GatewayError::Validation(_))
        ));
        assert_eq!(backend.profile(sender.id).unwrap().api_tokens, 100);
        assert!(gateway
            .list_token_transfers(sender.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_expiration_is_bounded() {
        let backend = MemoryBackend::new();
        backend
            .create_account("admin@example.com", "password", "Admin", Role::Admin, 0)
            .unwrap();

        let admin = signed_in(&backend, "admin@example.com").await;

        assert!(matches!(
            admin
                .update_setting("token_expiration", serde_json::json!({ "days": 100_000_000 }))
                .await,
            Err(GatewayError::Validation(_))
        ));

        admin
            .update_setting("token_expiration", serde_json::json!({ "days": 365 }))
            .await
            .unwrap();

        let row = admin.get_setting("token_expiration").await.unwrap();
        assert_eq!(SettingKey::TokenExpiration.decode(&row), Some(365));
    }

    #[tokio::test]
    async fn test_settings_require_admin() {
        let backend = MemoryBackend::new();
        backend
            .create_account("u@example.com", "password", "U", Role::User, 0)
            .unwrap();

        let gateway = signed_in(&backend, "u@example.com").await;

        assert!(matches!(
            gateway
                .update_setting("minimum_balance", serde_json::json!({ "amount": 0 }))
                .await,
            Err(GatewayError::NotAuthorized(_))
        ));
    }
}

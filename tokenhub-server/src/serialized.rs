//! All schemas that are exposed from endpoints are defined here
//! along with the ToSerialized impls

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokenhub_core::{
    expiry::DailyExpiry as CoreDailyExpiry, listing::Page as CorePage, SettingKey,
    TokenRequest as CoreTokenRequest, TokenTransfer as CoreTokenTransfer,
    TransferLimits as CoreTransferLimits, User as CoreUser,
};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: Uuid,
    email: String,
    name: String,
    role: String,
    api_tokens: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupResult {
    pub token: Option<String>,
    pub user: Option<User>,
    /// The account has to be confirmed by email before signing in
    pub confirmation_required: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    id: Uuid,
    user_id: Uuid,
    user_email: String,
    amount: i64,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    id: Uuid,
    sender_id: Uuid,
    sender_email: String,
    recipient_id: Uuid,
    recipient_email: String,
    amount: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyExpiry {
    day: NaiveDate,
    amount: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferLimits {
    min_transfer: i64,
    min_balance: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub user: User,
    /// When tokens granted now would expire
    pub expiry_date: Option<DateTime<Utc>>,
    pub expiries: Vec<DailyExpiry>,
    pub recent_requests: Vec<TokenRequest>,
    pub recent_transfers: Vec<TokenTransfer>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequestsPage {
    pub requests: Vec<TokenRequest>,
    pub minimum_request: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferPage {
    pub balance: i64,
    pub limits: TransferLimits,
    /// The most that can be sent right now
    pub max_transfer: i64,
    pub transfers: Vec<TokenTransfer>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestListing {
    items: Vec<TokenRequest>,
    current_page: usize,
    total_pages: usize,
    total_items: usize,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    /// The last value confirmed by the backend
    pub value: i64,
    /// The value typed but not yet committed, if any
    pub draft: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    pub path: String,
    pub redirected: bool,
    /// The page exists but has nothing on it yet
    pub placeholder: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub url: String,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<User> for CoreUser {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role.as_str().to_string(),
            api_tokens: self.api_tokens,
        }
    }
}

impl ToSerialized<TokenRequest> for CoreTokenRequest {
    fn to_serialized(&self) -> TokenRequest {
        TokenRequest {
            id: self.id,
            user_id: self.user_id,
            user_email: self.user_email.clone(),
            amount: self.amount,
            status: self.status.to_string(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<TokenTransfer> for CoreTokenTransfer {
    fn to_serialized(&self) -> TokenTransfer {
        TokenTransfer {
            id: self.id,
            sender_id: self.sender_id,
            sender_email: self.sender_email.clone(),
            recipient_id: self.recipient_id,
            recipient_email: self.recipient_email.clone(),
            amount: self.amount,
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<DailyExpiry> for CoreDailyExpiry {
    fn to_serialized(&self) -> DailyExpiry {
        DailyExpiry {
            day: self.day,
            amount: self.amount,
        }
    }
}

impl ToSerialized<TransferLimits> for CoreTransferLimits {
    fn to_serialized(&self) -> TransferLimits {
        TransferLimits {
            min_transfer: self.min_transfer,
            min_balance: self.min_balance,
        }
    }
}

impl ToSerialized<RequestListing> for CorePage<CoreTokenRequest> {
    fn to_serialized(&self) -> RequestListing {
        RequestListing {
            items: self.items.to_serialized(),
            current_page: self.current,
            total_pages: self.total_pages,
            total_items: self.total_items,
        }
    }
}

impl ToSerialized<Setting> for (SettingKey, i64, i64) {
    fn to_serialized(&self) -> Setting {
        let (key, value, draft) = self;

        Setting {
            key: key.key(),
            value: *value,
            draft: *draft,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub key: String,
    pub label: String,
    /// The page the service lives on
    pub path: String,
    pub fee: i64,
    pub available: bool,
}

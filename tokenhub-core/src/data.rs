use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The type used for ids of every row on the backend.
pub type PrimaryKey = Uuid;

/// A token balance or an amount of tokens.
pub type Tokens = i64;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

/// A tokenhub account, as stored in the `profiles` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: PrimaryKey,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    /// The balance last confirmed by the backend
    pub api_tokens: Tokens,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Approved and rejected requests never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns true if a request may move from this status to `next`
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved) | (Self::Pending, Self::Rejected)
        )
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("Unknown request status: {other}")),
        }
    }
}

/// A user's ask for more tokens, subject to admin approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub user_email: String,
    pub amount: Tokens,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

impl TokenRequest {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

/// A settled movement of tokens between two users.
/// Transfers are only ever created by the backend and are never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub id: PrimaryKey,
    pub sender_id: PrimaryKey,
    pub sender_email: String,
    pub recipient_id: PrimaryKey,
    pub recipient_email: String,
    pub amount: Tokens,
    pub created_at: DateTime<Utc>,
}

impl TokenTransfer {
    /// Returns true if the given user sent or received this transfer
    pub fn involves(&self, user_id: PrimaryKey) -> bool {
        self.sender_id == user_id || self.recipient_id == user_id
    }
}

/// A batch of tokens that expires at a given moment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenExpiry {
    pub amount: Tokens,
    pub expires_at: DateTime<Utc>,
}

/// A raw row of the `settings` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingRow {
    pub key: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub int_value: Option<i64>,
}

/// Which token requests to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestScope {
    /// Every request, only visible to admins
    All,
    /// Requests made by a single user
    User(PrimaryKey),
}

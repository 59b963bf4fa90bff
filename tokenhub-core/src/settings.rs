use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use serde_json::{json, Value};

use crate::{SettingRow, Tokens, TransferLimits};

/// A service that costs tokens to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceFee {
    PhotoProduct,
    FashionPhotography,
    AnimalPhotography,
    FoodPhotography,
    PhotoModification,
}

impl ServiceFee {
    /// Every service, in the order they are displayed
    pub const ALL: [ServiceFee; 5] = [
        Self::PhotoProduct,
        Self::FashionPhotography,
        Self::AnimalPhotography,
        Self::FoodPhotography,
        Self::PhotoModification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PhotoProduct => "photo_product",
            Self::FashionPhotography => "fashion_photography",
            Self::AnimalPhotography => "animal_photography",
            Self::FoodPhotography => "food_photography",
            Self::PhotoModification => "photo_modification",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PhotoProduct => "Photo Product",
            Self::FashionPhotography => "Fashion Photography",
            Self::AnimalPhotography => "Animal Photography",
            Self::FoodPhotography => "Food Photography",
            Self::PhotoModification => "Photo Modification",
        }
    }
}

/// A key of the `settings` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingKey {
    TokenExpiration,
    MinimumTokenRequest,
    MinimumBalance,
    MinimumTokenTransfer,
    WelcomeToken,
    ServiceFee(ServiceFee),
}

/// Longest expiration window an admin may configure, about a century
pub const MAX_TOKEN_EXPIRATION_DAYS: i64 = 36_500;

impl SettingKey {
    const SERVICE_FEE_PREFIX: &'static str = "service_fees_";

    /// Every known key
    pub fn all() -> Vec<SettingKey> {
        let mut keys = vec![
            Self::WelcomeToken,
            Self::TokenExpiration,
            Self::MinimumTokenRequest,
            Self::MinimumBalance,
            Self::MinimumTokenTransfer,
        ];

        keys.extend(ServiceFee::ALL.into_iter().map(Self::ServiceFee));
        keys
    }

    /// The key as stored on the backend
    pub fn key(&self) -> String {
        match self {
            Self::TokenExpiration => "token_expiration".to_string(),
            Self::MinimumTokenRequest => "minimum_token_request".to_string(),
            Self::MinimumBalance => "minimum_balance".to_string(),
            Self::MinimumTokenTransfer => "minimum_token_transfer".to_string(),
            Self::WelcomeToken => "welcome_token".to_string(),
            Self::ServiceFee(fee) => format!("{}{}", Self::SERVICE_FEE_PREFIX, fee.as_str()),
        }
    }

    /// The value used when the backend has no row for this key
    pub fn default_value(&self) -> i64 {
        match self {
            Self::TokenExpiration => 30,
            Self::MinimumTokenRequest => 100,
            Self::MinimumBalance => 20,
            Self::MinimumTokenTransfer => 1,
            Self::WelcomeToken => 0,
            Self::ServiceFee(_) => 0,
        }
    }

    /// The largest value accepted for this key
    pub fn maximum_value(&self) -> i64 {
        match self {
            Self::TokenExpiration => MAX_TOKEN_EXPIRATION_DAYS,
            _ => Tokens::MAX,
        }
    }

    /// Wraps a number into the json shape the backend stores for this key
    pub fn encode(&self, value: i64) -> Value {
        match self {
            Self::TokenExpiration => json!({ "days": value }),
            _ => json!({ "amount": value }),
        }
    }

    /// Reads the number out of a settings row.
    /// The generated `int_value` column wins over the json value.
    pub fn decode(&self, row: &SettingRow) -> Option<i64> {
        if let Some(value) = row.int_value {
            return Some(value);
        }

        let field = match self {
            Self::TokenExpiration => "days",
            _ => "amount",
        };

        row.value
            .get(field)
            .and_then(Value::as_i64)
            .or_else(|| row.value.as_i64())
    }
}

impl Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for SettingKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(service) = s.strip_prefix(Self::SERVICE_FEE_PREFIX) {
            return ServiceFee::ALL
                .into_iter()
                .find(|fee| fee.as_str() == service)
                .map(Self::ServiceFee)
                .ok_or_else(|| format!("Unknown service: {service}"));
        }

        match s {
            "token_expiration" => Ok(Self::TokenExpiration),
            "minimum_token_request" => Ok(Self::MinimumTokenRequest),
            "minimum_balance" => Ok(Self::MinimumBalance),
            "minimum_token_transfer" => Ok(Self::MinimumTokenTransfer),
            "welcome_token" => Ok(Self::WelcomeToken),
            other => Err(format!("Unknown setting: {other}")),
        }
    }
}

/// A typed snapshot of every setting
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<SettingKey, i64>,
}

impl Settings {
    /// Projects raw rows, ignoring unknown keys and falling back to defaults
    pub fn from_rows(rows: &[SettingRow]) -> Self {
        let mut settings = Self::default();

        for row in rows {
            let Ok(key) = row.key.parse::<SettingKey>() else {
                continue;
            };

            if let Some(value) = key.decode(row) {
                settings.set(key, value);
            }
        }

        settings
    }

    pub fn get(&self, key: SettingKey) -> i64 {
        self.values
            .get(&key)
            .copied()
            .unwrap_or_else(|| key.default_value())
    }

    pub fn set(&mut self, key: SettingKey, value: i64) {
        self.values.insert(key, value);
    }

    pub fn token_expiration_days(&self) -> i64 {
        self.get(SettingKey::TokenExpiration)
    }

    pub fn minimum_token_request(&self) -> Tokens {
        self.get(SettingKey::MinimumTokenRequest)
    }

    pub fn welcome_token(&self) -> Tokens {
        self.get(SettingKey::WelcomeToken)
    }

    pub fn service_fee(&self, service: ServiceFee) -> Tokens {
        self.get(SettingKey::ServiceFee(service))
    }

    pub fn transfer_limits(&self) -> TransferLimits {
        TransferLimits {
            min_transfer: self.get(SettingKey::MinimumTokenTransfer),
            min_balance: self.get(SettingKey::MinimumBalance),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn row(key: &str, value: Value, int_value: Option<i64>) -> SettingRow {
        SettingRow {
            key: key.to_string(),
            value,
            int_value,
        }
    }

    #[test]
    fn test_key_parsing() {
        for key in SettingKey::all() {
            assert_eq!(key.key().parse::<SettingKey>(), Ok(key));
        }

        assert_eq!(
            "service_fees_food_photography".parse::<SettingKey>(),
            Ok(SettingKey::ServiceFee(ServiceFee::FoodPhotography))
        );
        assert!("service_fees_video".parse::<SettingKey>().is_err());
        assert!("theme".parse::<SettingKey>().is_err());
    }

    #[test]
    fn test_projection_from_rows() {
        let settings = Settings::from_rows(&[
            row("token_expiration", json!({ "days": 60 }), None),
            row("minimum_balance", json!({ "amount": 10 }), Some(15)),
            row("service_fees_photo_product", json!({ "amount": 3 }), None),
            row("unrelated", json!(true), None),
        ]);

        assert_eq!(settings.token_expiration_days(), 60);
        // int_value takes precedence
        assert_eq!(settings.transfer_limits().min_balance, 15);
        assert_eq!(settings.service_fee(ServiceFee::PhotoProduct), 3);
        // absent keys use defaults
        assert_eq!(settings.minimum_token_request(), 100);
        assert_eq!(settings.transfer_limits().min_transfer, 1);
    }

    #[test]
    fn test_maximum_values() {
        assert_eq!(SettingKey::TokenExpiration.maximum_value(), 36_500);
        assert_eq!(SettingKey::MinimumBalance.maximum_value(), i64::MAX);
    }

    #[test]
    fn test_encoding_shapes() {
        assert_eq!(SettingKey::TokenExpiration.encode(7), json!({ "days": 7 }));
        assert_eq!(
            SettingKey::ServiceFee(ServiceFee::PhotoModification).encode(4),
            json!({ "amount": 4 })
        );
    }
}

use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};
use parking_lot::Mutex;
use thiserror::Error;
use tokenhub_core::{ServiceFee, SettingKey, SettingRow, Settings, Tokens, TransferLimits};

use crate::gateway::{BoxedGateway, GatewayError};

type Result<T> = std::result::Result<T, SettingsError>;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    LoadFailed(GatewayError),
    #[error("Failed to update {key}: {source}")]
    UpdateFailed { key: SettingKey, source: GatewayError },
    #[error("{key} can't be negative")]
    Negative { key: SettingKey },
    #[error("{key} can't be more than {maximum}")]
    TooLarge { key: SettingKey, maximum: i64 },
}

#[derive(Debug, Default)]
struct ProjectionState {
    confirmed: Settings,
    /// Keys whose confirmed value came from the backend
    known: BTreeSet<SettingKey>,
    /// Values typed by an admin that haven't been committed yet
    drafts: BTreeMap<SettingKey, i64>,
}

/// A read-through cache of the `settings` table with a draft per key
pub struct SettingsProjection {
    gateway: BoxedGateway,
    state: Mutex<ProjectionState>,
}

impl SettingsProjection {
    pub fn new(gateway: BoxedGateway) -> Self {
        Self {
            gateway,
            state: Default::default(),
        }
    }

    /// Reads every setting, dropping any drafts
    pub async fn load(&self) -> Result<Settings> {
        let rows = self
            .gateway
            .list_settings()
            .await
            .map_err(SettingsError::LoadFailed)?;

        let settings = Settings::from_rows(&rows);
        let known = rows
            .iter()
            .filter_map(|row| row.key.parse::<SettingKey>().ok())
            .collect();

        *self.state.lock() = ProjectionState {
            confirmed: settings.clone(),
            known,
            drafts: BTreeMap::new(),
        };

        Ok(settings)
    }

    /// The confirmed values, with defaults for keys that were never read
    pub fn settings(&self) -> Settings {
        self.state.lock().confirmed.clone()
    }

    /// Returns the confirmed value of a key, reading it from the backend the first time
    pub async fn get(&self, key: SettingKey) -> Result<i64> {
        {
            let state = self.state.lock();

            if state.known.contains(&key) {
                return Ok(state.confirmed.get(key));
            }
        }

        self.fetch(key).await
    }

    /// Reads the current value of a key from the backend, updating the confirmed value
    pub async fn fetch(&self, key: SettingKey) -> Result<i64> {
        let value = match self.gateway.get_setting(&key.key()).await {
            Ok(row) => self.decode_or_default(key, &row),
            Err(e) if e.is_not_found() => key.default_value(),
            Err(e) => return Err(SettingsError::LoadFailed(e)),
        };

        let mut state = self.state.lock();
        state.confirmed.set(key, value);
        state.known.insert(key);

        Ok(value)
    }

    // Thresholds are always read from the backend

    pub async fn transfer_limits(&self) -> Result<TransferLimits> {
        Ok(TransferLimits {
            min_transfer: self.fetch(SettingKey::MinimumTokenTransfer).await?,
            min_balance: self.fetch(SettingKey::MinimumBalance).await?,
        })
    }

    pub async fn minimum_request(&self) -> Result<Tokens> {
        self.fetch(SettingKey::MinimumTokenRequest).await
    }

    pub async fn expiration_days(&self) -> Result<i64> {
        self.fetch(SettingKey::TokenExpiration).await
    }

    pub async fn service_fee(&self, service: ServiceFee) -> Result<Tokens> {
        self.fetch(SettingKey::ServiceFee(service)).await
    }

    /// Changes the draft of a key without sending anything
    pub fn edit(&self, key: SettingKey, value: i64) {
        self.state.lock().drafts.insert(key, value);
    }

    /// The value shown for a key, the draft if there is one
    pub fn draft(&self, key: SettingKey) -> i64 {
        let state = self.state.lock();

        state
            .drafts
            .get(&key)
            .copied()
            .unwrap_or_else(|| state.confirmed.get(key))
    }

    /// Sends the draft of a single key, then reads the key back.
    /// On failure the draft is kept as typed.
    pub async fn commit(&self, key: SettingKey) -> Result<i64> {
        let value = self.draft(key);

        if value < 0 {
            return Err(SettingsError::Negative { key });
        }

        if value > key.maximum_value() {
            return Err(SettingsError::TooLarge {
                key,
                maximum: key.maximum_value(),
            });
        }

        self.gateway
            .update_setting(&key.key(), key.encode(value))
            .await
            .map_err(|source| SettingsError::UpdateFailed { key, source })?;

        info!("Updated setting {} to {}", key, value);

        let confirmed = match self.gateway.get_setting(&key.key()).await {
            Ok(row) => self.decode_or_default(key, &row),
            Err(e) => {
                warn!("Failed to read back {} after updating it: {}", key, e);
                value
            }
        };

        let mut state = self.state.lock();
        state.confirmed.set(key, confirmed);
        state.known.insert(key);
        state.drafts.remove(&key);

        Ok(confirmed)
    }

    fn decode_or_default(&self, key: SettingKey, row: &SettingRow) -> i64 {
        key.decode(row).unwrap_or_else(|| {
            warn!("Setting {} has an unreadable value: {}", key, row.value);
            key.default_value()
        })
    }
}

//! # Settings Service
//!
//! Persisted threshold overrides on top of the defaults in
//! [`motormods_core::thresholds`].
//!
//! ```text
//! get_all():   defaults ──merge──► overrides (settings table) ──► Vec<Setting>
//! snapshot():  same merge, invalid rows skipped with a warning ──► ThresholdConfig
//! set(k, v):   validate ──► normalize ──► upsert
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use motormods_core::thresholds::{Setting, SETTING_KEYS};
use motormods_core::ThresholdConfig;

use crate::clock::Clock;
use crate::error::DbResult;
use crate::store::InventoryStore;

#[derive(Debug, Clone)]
pub struct SettingsService {
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
}

impl SettingsService {
    pub fn new(store: Arc<dyn InventoryStore>, clock: Arc<dyn Clock>) -> Self {
        SettingsService { store, clock }
    }

    /// Effective value of one key: the override if valid, else the default.
    pub async fn get(&self, key: &str) -> DbResult<String> {
        // Unknown keys fail here, before touching storage.
        let default = ThresholdConfig::default().get(key)?;

        match self.store.get_setting(key).await? {
            Some(value) => match ThresholdConfig::normalize(key, &value) {
                Ok(normalized) => Ok(normalized),
                Err(error) => {
                    warn!(key = %key, value = %value, error = %error, "Ignoring invalid setting");
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }

    /// Validates and persists one override.
    pub async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        let normalized = ThresholdConfig::normalize(key, value)?;
        self.store.put_setting(key, &normalized, self.clock.now()).await?;
        info!(key = %key, value = %normalized, "Setting updated");
        Ok(())
    }

    /// Every known key with its effective value.
    pub async fn get_all(&self) -> DbResult<Vec<Setting>> {
        let config = self.snapshot().await?;
        let persisted = self.store.list_settings().await?;

        let mut settings = Vec::with_capacity(SETTING_KEYS.len());
        for key in SETTING_KEYS {
            let value = config.get(key)?;
            let is_default = !persisted
                .iter()
                .any(|(k, v)| k == key && ThresholdConfig::normalize(key, v).is_ok());
            settings.push(Setting {
                key: key.to_string(),
                value,
                is_default,
            });
        }
        Ok(settings)
    }

    /// The current thresholds as one consistent value.
    pub async fn snapshot(&self) -> DbResult<ThresholdConfig> {
        let persisted = self.store.list_settings().await?;
        let (config, rejected) = ThresholdConfig::from_overrides(persisted);
        for r in rejected {
            warn!(key = %r.key, value = %r.value, error = %r.error, "Ignoring invalid setting");
        }
        Ok(config)
    }
}

//! # Threshold Configuration
//!
//! Named scalar settings that parameterize the stock reports.
//!
//! ```text
//! ┌──────────────────────────────┬─────────────────┬──────────────────────┐
//! │ key                          │ default         │ allowed              │
//! ├──────────────────────────────┼─────────────────┼──────────────────────┤
//! │ low_stock_method             │ reorder_level   │ reorder_level |      │
//! │                              │                 │ percentage |         │
//! │                              │                 │ days_supply          │
//! │ low_stock_percentage         │ 20              │ 0..=100              │
//! │ low_stock_days_supply        │ 15              │ 1..=30               │
//! │ non_moving_threshold_days    │ 120             │ 30..=365             │
//! └──────────────────────────────┴─────────────────┴──────────────────────┘
//! ```
//!
//! Defaults exist without any persisted row; persisted overrides merge on
//! top. Reports take a [`ThresholdConfig`] snapshot per call so one report
//! never mixes two versions of a setting.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::validation::ValidationResult;

pub const KEY_LOW_STOCK_METHOD: &str = "low_stock_method";
pub const KEY_LOW_STOCK_PERCENTAGE: &str = "low_stock_percentage";
pub const KEY_LOW_STOCK_DAYS_SUPPLY: &str = "low_stock_days_supply";
pub const KEY_NON_MOVING_THRESHOLD_DAYS: &str = "non_moving_threshold_days";

/// Every known key, in display order.
pub const SETTING_KEYS: [&str; 4] = [
    KEY_LOW_STOCK_METHOD,
    KEY_LOW_STOCK_PERCENTAGE,
    KEY_LOW_STOCK_DAYS_SUPPLY,
    KEY_NON_MOVING_THRESHOLD_DAYS,
];

// =============================================================================
// Low Stock Method
// =============================================================================

/// How the current-stock report decides an item is low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LowStockMethod {
    /// quantity ≤ item reorder level.
    ReorderLevel,
    /// quantity ≤ max stock × percentage.
    Percentage,
    /// remaining days of supply ≤ configured days.
    DaysSupply,
}

string_enum!(LowStockMethod, "low_stock_method", {
    ReorderLevel => "reorder_level",
    Percentage => "percentage",
    DaysSupply => "days_supply",
});

impl Default for LowStockMethod {
    fn default() -> Self {
        LowStockMethod::ReorderLevel
    }
}

// =============================================================================
// Threshold Config
// =============================================================================

/// Snapshot of all report thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ThresholdConfig {
    pub low_stock_method: LowStockMethod,
    pub low_stock_percentage: u32,
    pub low_stock_days_supply: u32,
    pub non_moving_threshold_days: u32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        ThresholdConfig {
            low_stock_method: LowStockMethod::ReorderLevel,
            low_stock_percentage: 20,
            low_stock_days_supply: 15,
            non_moving_threshold_days: 120,
        }
    }
}

/// A setting as shown on the settings screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Setting {
    pub key: String,
    pub value: String,
    /// True when no override is persisted.
    pub is_default: bool,
}

/// A persisted override that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedSetting {
    pub key: String,
    pub value: String,
    pub error: ValidationError,
}

impl ThresholdConfig {
    /// Builds a snapshot from persisted overrides on top of the defaults.
    ///
    /// Unknown keys and invalid values are skipped and returned so the
    /// caller can log them; the default stays in effect for those keys.
    pub fn from_overrides<I, K, V>(overrides: I) -> (Self, Vec<RejectedSetting>)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = ThresholdConfig::default();
        let mut rejected = Vec::new();

        for (key, value) in overrides {
            if let Err(error) = config.set(key.as_ref(), value.as_ref()) {
                rejected.push(RejectedSetting {
                    key: key.as_ref().to_string(),
                    value: value.as_ref().to_string(),
                    error,
                });
            }
        }

        (config, rejected)
    }

    /// Returns the value of a key in its storage form.
    pub fn get(&self, key: &str) -> ValidationResult<String> {
        match key {
            KEY_LOW_STOCK_METHOD => Ok(self.low_stock_method.as_str().to_string()),
            KEY_LOW_STOCK_PERCENTAGE => Ok(self.low_stock_percentage.to_string()),
            KEY_LOW_STOCK_DAYS_SUPPLY => Ok(self.low_stock_days_supply.to_string()),
            KEY_NON_MOVING_THRESHOLD_DAYS => Ok(self.non_moving_threshold_days.to_string()),
            _ => Err(ValidationError::UnknownSetting {
                key: key.to_string(),
            }),
        }
    }

    /// Validates and applies one key.
    pub fn set(&mut self, key: &str, value: &str) -> ValidationResult<()> {
        match key {
            KEY_LOW_STOCK_METHOD => self.low_stock_method = value.parse()?,
            KEY_LOW_STOCK_PERCENTAGE => {
                self.low_stock_percentage = parse_bounded(key, value, 0, 100)?
            }
            KEY_LOW_STOCK_DAYS_SUPPLY => {
                self.low_stock_days_supply = parse_bounded(key, value, 1, 30)?
            }
            KEY_NON_MOVING_THRESHOLD_DAYS => {
                self.non_moving_threshold_days = parse_bounded(key, value, 30, 365)?
            }
            _ => {
                return Err(ValidationError::UnknownSetting {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    /// Checks a key/value pair without applying it.
    ///
    /// ## Returns
    /// The normalized value to persist (e.g. `" 20 "` becomes `"20"`).
    pub fn normalize(key: &str, value: &str) -> ValidationResult<String> {
        let mut scratch = ThresholdConfig::default();
        scratch.set(key, value)?;
        scratch.get(key)
    }
}

fn parse_bounded(field: &str, value: &str, min: u32, max: u32) -> ValidationResult<u32> {
    let out_of_range = || ValidationError::OutOfRange {
        field: field.to_string(),
        min: i64::from(min),
        max: i64::from(max),
    };

    let parsed: u32 = value.trim().parse().map_err(|_| out_of_range())?;
    if parsed < min || parsed > max {
        return Err(out_of_range());
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_defaults() {
        let config = ThresholdConfig::default();
        assert_eq!(config.low_stock_method, LowStockMethod::ReorderLevel);
        assert_eq!(config.low_stock_percentage, 20);
        assert_eq!(config.low_stock_days_supply, 15);
        assert_eq!(config.non_moving_threshold_days, 120);
    }

    #[test]
    fn test_overrides_merge_on_defaults() {
        let (config, rejected) = ThresholdConfig::from_overrides([
            ("low_stock_method", "days_supply"),
            ("non_moving_threshold_days", "90"),
        ]);
        assert!(rejected.is_empty());
        assert_eq!(config.low_stock_method, LowStockMethod::DaysSupply);
        assert_eq!(config.non_moving_threshold_days, 90);
        assert_eq!(config.low_stock_percentage, 20);
    }

    #[test]
    fn test_invalid_overrides_keep_defaults() {
        let (config, rejected) = ThresholdConfig::from_overrides([
            ("low_stock_percentage", "150"),
            ("non_moving_threshold_days", "abc"),
            ("theme", "dark"),
        ]);
        assert_eq!(config, ThresholdConfig::default());
        assert_eq!(rejected.len(), 3);
    }

    #[test]
    fn test_range_bounds() {
        let mut config = ThresholdConfig::default();
        assert!(config.set(KEY_LOW_STOCK_DAYS_SUPPLY, "0").is_err());
        assert!(config.set(KEY_LOW_STOCK_DAYS_SUPPLY, "30").is_ok());
        assert!(config.set(KEY_NON_MOVING_THRESHOLD_DAYS, "29").is_err());
        assert!(config.set(KEY_NON_MOVING_THRESHOLD_DAYS, "365").is_ok());
        assert!(config.set(KEY_LOW_STOCK_PERCENTAGE, "0").is_ok());
        assert!(config.set(KEY_LOW_STOCK_METHOD, "average").is_err());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(ThresholdConfig::normalize(KEY_LOW_STOCK_PERCENTAGE, " 25 ").unwrap(), "25");
        assert!(ThresholdConfig::normalize("unknown", "1").is_err());
    }

    #[test]
    fn test_get_every_key() {
        let config = ThresholdConfig::default();
        for key in SETTING_KEYS {
            assert!(config.get(key).is_ok());
        }
    }
}

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AssetClass, ScrollMode};

/// A display device identified by a client-supplied, opaque `device_id`.
/// The hub never generates device ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub device_name: Option<String>,
    pub device_type: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub enabled: bool,
}

/// Per-device display preferences. Created with defaults the first time a
/// device is seen; mutated only through a patch that always advances
/// `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    pub scroll_mode: ScrollMode,
    pub scroll_speed: i64,
    pub brightness: i64,
    pub update_interval: i64,
    pub top_sources: HashSet<AssetClass>,
    pub bottom_sources: HashSet<AssetClass>,
    pub dwell_seconds: f64,
    pub asset_order: Vec<AssetClass>,
    pub font: String,
    pub updated_at: DateTime<Utc>,
}

impl DeviceSettings {
    pub fn defaults(updated_at: DateTime<Utc>) -> Self {
        Self {
            scroll_mode: ScrollMode::Single,
            scroll_speed: 100,
            brightness: 10,
            update_interval: 300,
            top_sources: HashSet::from([AssetClass::Stocks]),
            bottom_sources: HashSet::from([AssetClass::Crypto, AssetClass::Forex]),
            dwell_seconds: 3.0,
            asset_order: vec![AssetClass::Stocks, AssetClass::Crypto, AssetClass::Forex],
            font: "default".to_string(),
            updated_at,
        }
    }
}

/// Partial update over `DeviceSettings`; every field optional.
/// `deny_unknown_fields` rejects a patch body containing a key that isn't
/// one of these (e.g. a typo'd `"brigthness"`) instead of silently ignoring it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSettingsPatch {
    pub scroll_mode: Option<String>,
    pub scroll_speed: Option<i64>,
    pub brightness: Option<i64>,
    pub update_interval: Option<i64>,
    pub top_sources: Option<HashSet<AssetClass>>,
    pub bottom_sources: Option<HashSet<AssetClass>>,
    pub dwell_seconds: Option<f64>,
    pub asset_order: Option<Vec<AssetClass>>,
    pub font: Option<String>,
}

impl DeviceSettingsPatch {
    /// Validate every field present in the patch, per the ranges in the API
    /// surface's settings-write contract. Returns a human-readable reason
    /// for the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(mode) = &self.scroll_mode {
            mode.parse::<ScrollMode>()
                .map_err(|_| "scroll_mode must be 'single' or 'dual'".to_string())?;
        }
        if let Some(speed) = self.scroll_speed {
            if !(10..=200).contains(&speed) {
                return Err("scroll_speed must be an integer between 10 and 200".to_string());
            }
        }
        if let Some(brightness) = self.brightness {
            if !(1..=10).contains(&brightness) {
                return Err("brightness must be an integer between 1 and 10".to_string());
            }
        }
        if let Some(interval) = self.update_interval {
            if !(60..=900).contains(&interval) {
                return Err("update_interval must be an integer between 60 and 900".to_string());
            }
        }
        if let Some(dwell) = self.dwell_seconds {
            if !(1.0..=30.0).contains(&dwell) {
                return Err("dwell_seconds must be between 1 and 30".to_string());
            }
        }
        if let Some(order) = &self.asset_order {
            if order.is_empty() {
                return Err("asset_order must be a non-empty ordered list".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_shape() {
        let now = Utc::now();
        let d = DeviceSettings::defaults(now);
        assert_eq!(d.scroll_mode, ScrollMode::Single);
        assert_eq!(d.scroll_speed, 100);
        assert_eq!(d.brightness, 10);
        assert_eq!(d.update_interval, 300);
        assert_eq!(d.font, "default");
        assert_eq!(d.asset_order.len(), 3);
    }

    #[test]
    fn validate_rejects_out_of_range_brightness() {
        let patch = DeviceSettingsPatch {
            brightness: Some(11),
            ..Default::default()
        };
        let err = patch.validate().unwrap_err();
        assert_eq!(err, "brightness must be an integer between 1 and 10");
    }

    #[test]
    fn validate_accepts_partial_patch() {
        let patch = DeviceSettingsPatch {
            brightness: Some(8),
            ..Default::default()
        };
        assert!(patch.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_asset_order() {
        let patch = DeviceSettingsPatch {
            asset_order: Some(vec![]),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }
}

// =============================================================================
// Shared types used across the hub
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three upstream asset classes the hub tracks. The scheduler selects an
/// adapter by variant, never by string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Stocks,
    Forex,
    Crypto,
}

impl AssetClass {
    pub const ALL: [AssetClass; 3] = [AssetClass::Stocks, AssetClass::Forex, AssetClass::Crypto];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stocks => "stocks",
            Self::Forex => "forex",
            Self::Crypto => "crypto",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stocks" => Ok(Self::Stocks),
            "forex" => Ok(Self::Forex),
            "crypto" => Ok(Self::Crypto),
            other => Err(format!("unknown asset class: '{other}'")),
        }
    }
}

/// Scroll layout mode for a device's display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollMode {
    Single,
    Dual,
}

impl Default for ScrollMode {
    fn default() -> Self {
        Self::Single
    }
}

impl fmt::Display for ScrollMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Dual => write!(f, "dual"),
        }
    }
}

impl FromStr for ScrollMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "dual" => Ok(Self::Dual),
            other => Err(format!("scroll_mode must be 'single' or 'dual', got '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_class_roundtrips_through_str() {
        for class in AssetClass::ALL {
            let s = class.to_string();
            assert_eq!(AssetClass::from_str(&s).unwrap(), class);
        }
    }

    #[test]
    fn asset_class_rejects_unknown() {
        assert!(AssetClass::from_str("commodities").is_err());
    }

    #[test]
    fn scroll_mode_rejects_unknown() {
        assert!(ScrollMode::from_str("triple").is_err());
    }
}

use serde::{Deserialize, Serialize};

use crate::types::AssetClass;

/// A `(symbol, asset_class)` the operator has chosen to track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedAsset {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub enabled: bool,
}

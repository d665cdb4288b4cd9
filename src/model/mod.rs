pub mod asset;
pub mod device;
pub mod price;

pub use asset::SelectedAsset;
pub use device::{Device, DeviceSettings, DeviceSettingsPatch};
pub use price::{BarPoint, PriceRecord, QuotePoint, RawSnapshot, TradePoint};

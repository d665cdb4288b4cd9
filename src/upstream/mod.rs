pub mod equities_crypto;
pub mod forex;
pub mod rate_limit;

pub use equities_crypto::EquitiesCryptoClient;
pub use forex::ForexClient;

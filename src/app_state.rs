// =============================================================================
// Central Application State — LAN Market Data Hub
// =============================================================================
//
// Shared handle threaded through the axum router and the two scheduler jobs.
// Owns the persistence layer, both upstream adapters, and the scheduler's
// status/trigger surface. Cheap to clone (every field is an `Arc` or a
// `Clone`-able handle already internally Arc'd), so it's carried as
// `Arc<AppState>` rather than wrapped in an outer `Arc` twice.
// =============================================================================

use crate::config::HubConfig;
use crate::scheduler::Scheduler;
use crate::store::Store;
use crate::upstream::{EquitiesCryptoClient, ForexClient};

pub struct AppState {
    pub store: Store,
    pub equities_client: EquitiesCryptoClient,
    pub forex_client: ForexClient,
    pub scheduler: Scheduler,
    pub config: HubConfig,
}

impl AppState {
    pub fn new(store: Store, config: HubConfig) -> Self {
        let equities_client = EquitiesCryptoClient::new(
            std::time::Duration::from_secs(config.upstream_timeout_secs),
            std::time::Duration::from_millis(config.rate_limit_delay_ms),
        );
        let forex_client = ForexClient::new(
            std::time::Duration::from_secs(config.upstream_timeout_secs),
            config.forex_batch_size,
            std::time::Duration::from_secs(config.forex_batch_delay_secs),
            config.forex_credits_per_minute,
            config.forex_credits_per_day,
        );
        let scheduler = Scheduler::new(config.update_interval_secs, config.forex_interval_secs);

        Self { store, equities_client, forex_client, scheduler, config }
    }
}

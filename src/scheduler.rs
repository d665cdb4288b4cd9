// =============================================================================
// Scheduler — drives per-class refresh jobs on time, under rate budgets
// =============================================================================
//
// Grounded on `original_source/scheduler.py`'s `PriceScheduler`: a general
// job covering stocks+crypto and a separate forex job on its own cadence,
// plus an on-demand trigger equivalent to one immediate tick. Per spec §4.D,
// a tick that fires while the same class is already dispatching is dropped,
// not queued.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::normalizer::normalize;
use crate::types::AssetClass;

/// Scheduler status surfaced on `GET /status` (spec §4.D).
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub next_update: Option<DateTime<Utc>>,
    pub interval: u64,
    pub forex_interval: u64,
    pub last_forex_update: Option<DateTime<Utc>>,
}

pub struct Scheduler {
    general_dispatching: AtomicBool,
    forex_dispatching: AtomicBool,
    general_notify: Notify,
    forex_notify: Notify,
    shutting_down: AtomicBool,
    status: RwLock<SchedulerStatus>,
}

impl Scheduler {
    pub fn new(interval_secs: u64, forex_interval_secs: u64) -> Self {
        Self {
            general_dispatching: AtomicBool::new(false),
            forex_dispatching: AtomicBool::new(false),
            general_notify: Notify::new(),
            forex_notify: Notify::new(),
            shutting_down: AtomicBool::new(false),
            status: RwLock::new(SchedulerStatus {
                running: false,
                last_update: None,
                next_update: None,
                interval: interval_secs,
                forex_interval: forex_interval_secs,
                last_forex_update: None,
            }),
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.read().clone()
    }

    /// `running` tracks actual dispatch readiness, not process liveness — an
    /// empty hub (no enabled assets) reports `running: false` until assets
    /// are added, per the status contract.
    pub fn set_running(&self, running: bool) {
        self.status.write().running = running;
    }

    /// Equivalent to one immediate tick of every class; same overlap-drop
    /// rule applies as a regular interval tick.
    pub fn trigger_refresh(&self) {
        self.general_notify.notify_one();
        self.forex_notify.notify_one();
    }

    pub fn request_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}

/// General (stocks + crypto) refresh job. Spawned once from `main`, owns its
/// own `tokio::time::interval` and awaits either the next tick or an
/// on-demand notification.
pub async fn run_general_job(state: Arc<AppState>) {
    let period = std::time::Duration::from_secs(state.config.update_interval_secs);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = state.scheduler.general_notify.notified() => {}
        }

        if state.scheduler.is_shutting_down() {
            info!("general refresh job stopping — shutdown in progress");
            break;
        }

        if state
            .scheduler
            .general_dispatching
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("general refresh tick dropped — previous tick still dispatching");
            continue;
        }

        run_general_tick(&state).await;
        state.scheduler.general_dispatching.store(false, Ordering::SeqCst);

        let mut status = state.scheduler.status.write();
        status.last_update = Some(Utc::now());
        status.next_update = Some(Utc::now() + chrono::Duration::seconds(period.as_secs() as i64));
    }
}

/// Dedicated forex refresh job, on its own cadence, never amalgamated with
/// the general job (spec §4.D).
pub async fn run_forex_job(state: Arc<AppState>) {
    let period = std::time::Duration::from_secs(state.config.forex_interval_secs);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = state.scheduler.forex_notify.notified() => {}
        }

        if state.scheduler.is_shutting_down() {
            info!("forex refresh job stopping — shutdown in progress");
            break;
        }

        if state
            .scheduler
            .forex_dispatching
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("forex refresh tick dropped — previous tick still dispatching");
            continue;
        }

        run_forex_tick(&state).await;
        state.scheduler.forex_dispatching.store(false, Ordering::SeqCst);
        state.scheduler.status.write().last_forex_update = Some(Utc::now());
    }
}

async fn run_general_tick(state: &Arc<AppState>) {
    refresh_running_flag(state).await;

    for class in [AssetClass::Stocks, AssetClass::Crypto] {
        let assets = match state.store.list_assets(Some(class), false).await {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, %class, "failed to list enabled assets for refresh");
                continue;
            }
        };
        if assets.is_empty() {
            continue;
        }
        let symbols: Vec<String> = assets.into_iter().map(|a| a.symbol).collect();

        let credential = match state.store.get_credential("alpaca").await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "failed to read alpaca credential");
                None
            }
        };

        let snapshots = state.equities_client.fetch(class, &symbols, credential).await;
        write_snapshots(state, class, snapshots).await;
    }
}

async fn run_forex_tick(state: &Arc<AppState>) {
    refresh_running_flag(state).await;

    let assets = match state.store.list_assets(Some(AssetClass::Forex), false).await {
        Ok(a) => a,
        Err(e) => {
            warn!(error = %e, "failed to list enabled forex assets for refresh");
            return;
        }
    };
    if assets.is_empty() {
        return;
    }
    let symbols: Vec<String> = assets.into_iter().map(|a| a.symbol).collect();

    let credential = state.store.get_credential("twelvedata").await.unwrap_or(None);
    let api_key = credential
        .as_ref()
        .map(|(key, _)| key.clone())
        .or_else(|| state.config.forex_api_key.clone());

    let snapshots = state.forex_client.fetch(&symbols, api_key.as_deref()).await;
    write_snapshots(state, AssetClass::Forex, snapshots).await;
}

/// `running` reflects whether the hub currently has anything to dispatch
/// against, across every class — recomputed on each tick rather than set
/// once at startup, since assets can be added after the process starts.
async fn refresh_running_flag(state: &Arc<AppState>) {
    match state.store.has_enabled_assets().await {
        Ok(has_assets) => state.scheduler.set_running(has_assets),
        Err(e) => warn!(error = %e, "failed to check enabled assets for scheduler status"),
    }
}

async fn write_snapshots(
    state: &Arc<AppState>,
    class: AssetClass,
    snapshots: std::collections::HashMap<String, crate::model::RawSnapshot>,
) {
    let today = Utc::now().date_naive();
    let mut written = 0usize;
    for (symbol, snapshot) in snapshots {
        let Some(record) = normalize(&symbol, class, &snapshot, None, today) else {
            debug!(symbol, %class, "normalizer dropped symbol — no last price derivable");
            continue;
        };
        let result = state
            .store
            .upsert_price(
                &record.symbol,
                record.asset_class,
                record.date,
                record.open_price,
                record.prev_close,
                record.last_price.unwrap_or_default(),
            )
            .await;
        match result {
            Ok(()) => written += 1,
            Err(e) => warn!(error = %e, symbol = %record.symbol, "failed to persist refreshed price"),
        }
    }
    info!(%class, written, "refresh tick wrote prices");
}

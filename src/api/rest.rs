// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// LAN-local, unauthenticated by design (spec §9 open question — the
// teacher's `AuthBearer` bearer-token extractor is deliberately not carried
// over here; see DESIGN.md). CORS stays permissive since every client lives
// on the same LAN as the hub.
//
// Every handler returns `Result<_, HubError>`; `HubError::into_response`
// does the status-code mapping from spec §4.E/§7 in one place.
// =============================================================================

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::app_state::AppState;
use crate::error::HubError;
use crate::model::DeviceSettingsPatch;
use crate::types::AssetClass;

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/prices", get(prices_all))
        .route("/prices/:class", get(prices_by_class))
        .route("/prices/:class/:symbol", get(price_one))
        .route("/status", get(status))
        .route("/assets", get(assets))
        .route("/refresh", post(refresh))
        .route("/device/:id/settings", get(get_device_settings))
        .route("/device/:id/settings", post(put_device_settings))
        .route("/device/:id/heartbeat", post(heartbeat))
        .route("/devices", get(devices))
        .layer(cors)
        .with_state(state)
}

fn parse_class(raw: &str) -> Result<AssetClass, HubError> {
    AssetClass::from_str(raw).map_err(HubError::ValidationFailure)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    store_healthy: bool,
    scheduler_running: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store_healthy = state.store.health_check().await;
    let scheduler_running = state.scheduler.status().running;
    let body = HealthResponse { store_healthy, scheduler_running };

    if store_healthy {
        Json(body).into_response()
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

// =============================================================================
// Prices
// =============================================================================

async fn prices_all(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, HubError> {
    let prices = state.store.get_latest_prices(None, None).await?;
    Ok(Json(prices))
}

async fn prices_by_class(
    State(state): State<Arc<AppState>>,
    Path(class): Path<String>,
) -> Result<impl IntoResponse, HubError> {
    let class = parse_class(&class)?;
    let prices = state.store.get_latest_prices(Some(class), None).await?;
    Ok(Json(prices))
}

async fn price_one(
    State(state): State<Arc<AppState>>,
    Path((class, symbol)): Path<(String, String)>,
) -> Result<impl IntoResponse, HubError> {
    let class = parse_class(&class)?;
    let symbol = symbol.to_uppercase();
    let mut prices = state.store.get_latest_prices(Some(class), Some(&symbol)).await?;
    prices
        .pop()
        .map(Json)
        .ok_or_else(|| HubError::NotFound(format!("no price for {symbol} ({class})")))
}

// =============================================================================
// Scheduler status / on-demand refresh
// =============================================================================

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.scheduler.status())
}

async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("on-demand refresh requested via API");
    state.scheduler.trigger_refresh();
    Json(serde_json::json!({ "status": "accepted" }))
}

// =============================================================================
// Assets
// =============================================================================

#[derive(Deserialize)]
struct AssetsQuery {
    class: Option<String>,
}

async fn assets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AssetsQuery>,
) -> Result<impl IntoResponse, HubError> {
    let class = query.class.as_deref().map(parse_class).transpose()?;
    let assets = state.store.list_assets(class, true).await?;
    Ok(Json(assets))
}

// =============================================================================
// Devices
// =============================================================================

async fn devices(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, HubError> {
    let devices = state.store.list_devices().await?;
    Ok(Json(devices))
}

async fn get_device_settings(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Result<impl IntoResponse, HubError> {
    let settings = state.store.get_device_settings(&device_id).await?;
    Ok(Json(settings))
}

async fn put_device_settings(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
    Json(patch): Json<DeviceSettingsPatch>,
) -> Result<impl IntoResponse, HubError> {
    patch.validate().map_err(HubError::ValidationFailure)?;
    let settings = state.store.put_device_settings(&device_id, &patch).await?;
    Ok(Json(settings))
}

#[derive(Deserialize, Default)]
struct HeartbeatRequest {
    #[serde(default)]
    device_name: Option<String>,
    #[serde(default)]
    device_type: Option<String>,
}

#[derive(Serialize)]
struct HeartbeatResponse {
    status: &'static str,
    settings_updated_at: chrono::DateTime<chrono::Utc>,
}

async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
    body: Option<Json<HeartbeatRequest>>,
) -> Result<impl IntoResponse, HubError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    state
        .store
        .register_device(&device_id, req.device_name.as_deref(), req.device_type.as_deref())
        .await?;
    let settings = state.store.get_device_settings(&device_id).await?;
    Ok(Json(HeartbeatResponse { status: "ok", settings_updated_at: settings.updated_at }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_class_accepts_known_classes() {
        assert_eq!(parse_class("stocks").unwrap(), AssetClass::Stocks);
        assert_eq!(parse_class("FOREX").unwrap(), AssetClass::Forex);
    }

    #[test]
    fn parse_class_rejects_unknown() {
        assert!(matches!(parse_class("bonds"), Err(HubError::ValidationFailure(_))));
    }
}

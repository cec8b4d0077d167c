//! HTTP handlers for the Fleetwatch dashboard.
//!
//! # Endpoints
//!
//! - `GET /` - Landing page
//! - `GET /alerts` - Alerts dashboard page
//! - `GET /api/alerts` - The same dashboard state as JSON
//! - `GET /map` - Map popup for one device location
//! - `GET /health` - Health check
//!
//! Each dashboard request builds its own controller from the query string.
//! The only state shared between requests is the set of devices seen so
//! far, which feeds the device selector.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::controller::AlertsController;
use crate::dashboard::{AlertsParams, AlertsView, load_dashboard, render_alerts_page};
use crate::data_sources::AlertApiClient;
use crate::map::MapLaunch;
use crate::render::{landing_body, page_shell};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: AlertApiClient,
    pub config: Arc<AppConfig>,
    /// Distinct IMEIs seen on first pages, across requests.
    pub known_devices: Arc<RwLock<BTreeSet<String>>>,
}

impl AppState {
    pub fn new(client: AlertApiClient, config: AppConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
            known_devices: Arc::new(RwLock::new(BTreeSet::new())),
        }
    }

    fn known_devices_snapshot(&self) -> Vec<String> {
        self.known_devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn remember_devices<'a>(&self, devices: impl Iterator<Item = &'a str>) {
        self.known_devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(devices.map(str::to_string));
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/alerts", get(alerts_page))
        .route("/api/alerts", get(alerts_json))
        .route("/map", get(map_view))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Run one dashboard request and fold newly seen devices back into the
/// shared catalog.
async fn run_dashboard(state: &AppState, params: &AlertsParams) -> AlertsView {
    let mut controller = AlertsController::new(state.client.clone(), Utc::now())
        .with_pinned_devices(state.config.pinned_devices.clone())
        .with_known_devices(state.known_devices_snapshot());

    let view = load_dashboard(&mut controller, params).await;
    state.remember_devices(controller.known_devices());
    view
}

/// GET / - Landing page.
pub async fn landing() -> Html<String> {
    Html(page_shell("Dashboard", &landing_body(), Utc::now().year()))
}

/// GET /alerts - Alerts dashboard page.
///
/// # Query Parameters
///
/// - `start`, `end` (optional): `YYYY-MM-DDTHH:MM` bounds, UTC
/// - `imei` (required to fetch): device identifier
/// - `search` (optional): free-text filter over the retrieved page
/// - `device_search` (optional): narrows the device selector
/// - `page`, `limit` (optional): page number and page size
/// - `jump` (optional): jump-to-page input
///
/// Upstream failures are shown on the page; the response is always 200.
#[instrument(skip(state))]
pub async fn alerts_page(
    State(state): State<AppState>,
    Query(params): Query<AlertsParams>,
) -> Html<String> {
    let view = run_dashboard(&state, &params).await;
    info!(
        status = ?view.status,
        rows = view.alerts.len(),
        total = view.page.total_records,
        "Alerts page rendered"
    );
    Html(render_alerts_page(&view, Utc::now().year()))
}

/// GET /api/alerts - Dashboard state as JSON.
///
/// Takes the same query parameters as `/alerts`.
#[instrument(skip(state))]
pub async fn alerts_json(
    State(state): State<AppState>,
    Query(params): Query<AlertsParams>,
) -> Json<AlertsView> {
    let view = run_dashboard(&state, &params).await;
    info!(
        status = ?view.status,
        rows = view.alerts.len(),
        "Alerts view served"
    );
    Json(view)
}

/// Query parameters for the map endpoint.
#[derive(Debug, Deserialize)]
pub struct MapQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub imei: Option<String>,
}

/// GET /map - Map popup for a device location.
///
/// Without a configured embed key the client is redirected to the public
/// map instead.
#[instrument(skip(state))]
pub async fn map_view(State(state): State<AppState>, Query(query): Query<MapQuery>) -> Response {
    let launch = match MapLaunch::new(
        query.lat,
        query.lng,
        query.imei.as_deref(),
        state.config.maps_api_key.as_deref(),
    ) {
        Ok(launch) => launch,
        Err(e) => {
            warn!(error = %e, "Rejected map request");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    match launch.popup_document() {
        Some(document) => {
            info!(imei = ?launch.imei, "Map popup served");
            Html(document).into_response()
        }
        None => {
            info!(imei = ?launch.imei, "No maps key, redirecting to public map");
            Redirect::temporary(&launch.fallback_url).into_response()
        }
    }
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

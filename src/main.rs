//! Fleetwatch - a dashboard for browsing device alerts from asset-tracking
//! fleets.
//!
//! # Overview
//!
//! Fleetwatch sits in front of the alert retrieval API of a tracking
//! backend. Operators pick a device and a time window, page through the
//! alerts reported for it, and open any reported location on a map.
//!
//! # Endpoints
//!
//! - `GET /` - Landing page
//! - `GET /alerts` - Alerts dashboard
//! - `GET /api/alerts` - Alerts dashboard state as JSON
//! - `GET /map` - Device location popup
//! - `GET /health` - Health check

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use fleetwatch::api::{AppState, build_router};
use fleetwatch::config::AppConfig;
use fleetwatch::data_sources::AlertApiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("fleetwatch=info".parse()?))
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env();

    info!(
        port = config.port,
        alert_api = %config.alert_api_url,
        maps_enabled = config.maps_api_key.is_some(),
        pinned_devices = config.pinned_devices.len(),
        "Starting Fleetwatch server"
    );

    let client = AlertApiClient::with_timeout(&config.alert_api_url, config.request_timeout)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let app = build_router(AppState::new(client, config));

    // Start server
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Fleetwatch is listening");

    axum::serve(listener, app).await?;

    Ok(())
}

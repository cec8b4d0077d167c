//! Mock upstream alert API shared by the integration tests.
//!
//! The mock picks its behaviour from the `imei` query parameter:
//!
//! - `five`: five alerts, no `meta`
//! - `paged`: `limit` alerts per page out of 95
//! - `missing`: 404 with a message
//! - `broken`: 500
//! - `odd`: `success: false`

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub type RequestLog = Arc<Mutex<Vec<HashMap<String, String>>>>;

pub struct MockUpstream {
    pub base_url: String,
    pub requests: RequestLog,
}

impl MockUpstream {
    pub fn requests(&self) -> Vec<HashMap<String, String>> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn alert_record(id: usize, imei: &str, alert_type: &str) -> Value {
    json!({
        "_id": { "$oid": format!("65f1c0ffee{id:04}") },
        "imei": imei,
        "dateTime": "2025-03-21T07:38:13.000Z",
        "alertType": alert_type,
        "alertMessage": format!("{alert_type} alert {id}"),
        "source": "gps",
        "value": id,
        "deviceTypeAlert": "e-lock",
        "latitude": 12.9716,
        "longitude": 77.5946,
        "Additional Data": [{ "batteryPercentage": 80 }]
    })
}

async fn mock_alerts(
    State(log): State<RequestLog>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    log.lock().unwrap().push(params.clone());

    let imei = params.get("imei").cloned().unwrap_or_default();
    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let limit: usize = params.get("limit").and_then(|l| l.parse().ok()).unwrap_or(10);

    match imei.as_str() {
        "five" => {
            let data: Vec<Value> = (0..5)
                .map(|i| {
                    let device = if i % 2 == 0 { "700070635323" } else { "860000000000001" };
                    let kind = if i == 3 { "tamper" } else { "battery" };
                    alert_record(i, device, kind)
                })
                .collect();
            Json(json!({ "success": true, "data": data })).into_response()
        }
        "paged" => {
            let first = (page - 1) * limit;
            let data: Vec<Value> = (first..(first + limit).min(95))
                .map(|i| alert_record(i, "paged", "speed"))
                .collect();
            Json(json!({ "success": true, "data": data, "meta": { "total": 95 } })).into_response()
        }
        "missing" => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "No alerts found" })),
        )
            .into_response(),
        "broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "odd" => Json(json!({ "success": false, "data": "nope" })).into_response(),
        _ => Json(json!({ "success": true, "data": [] })).into_response(),
    }
}

/// Serve the mock on an ephemeral local port.
pub async fn spawn_upstream() -> MockUpstream {
    let requests = RequestLog::default();
    let app = Router::new()
        .route("/alert", get(mock_alerts))
        .with_state(Arc::clone(&requests));

    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockUpstream {
        base_url: format!("http://{addr}"),
        requests,
    }
}

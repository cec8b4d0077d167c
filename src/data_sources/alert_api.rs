//! Client for the upstream alert retrieval API.
//!
//! The ingestion system exposes a single paged endpoint:
//!
//! ```text
//! GET /alert?startDate=<iso>&endDate=<iso>&imei=<id>&page=<n>&limit=<n>
//! ```
//!
//! answering with an envelope `{ "success": true, "data": [...], "meta": { "total": n } }`.
//! A `404` carries `{ "message": "..." }` and means "no records for this
//! filter combination"; it is reported as [`FetchOutcome::NotFound`], not as
//! an error.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::model::Alert;

/// Base URL of the alert API when none is configured.
pub const DEFAULT_ALERT_API_BASE: &str = "http://localhost:3000";

/// Message shown when a `404` carries no message of its own.
pub const DEFAULT_NOT_FOUND_MESSAGE: &str = "No data found for the selected criteria";

/// Parameters of one retrieval call.
///
/// A query captures the filter values at the moment it was issued, so a
/// request in flight is unaffected by later filter edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertQuery {
    /// Inclusive lower bound.
    pub start: DateTime<Utc>,
    /// Inclusive upper bound.
    pub end: DateTime<Utc>,
    /// Device IMEI.
    pub imei: String,
    /// 1-based page number.
    pub page: usize,
    /// Page size.
    pub limit: usize,
}

impl AlertQuery {
    /// Percent-encoded query string for the upstream endpoint.
    pub fn query_string(&self) -> String {
        format!(
            "startDate={}&endDate={}&imei={}&page={}&limit={}",
            urlencoding::encode(&iso_timestamp(self.start)),
            urlencoding::encode(&iso_timestamp(self.end)),
            urlencoding::encode(&self.imei),
            self.page,
            self.limit
        )
    }
}

/// ISO-8601 UTC timestamp with millisecond precision (`2025-03-21T07:38:00.000Z`).
pub fn iso_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One page of alerts.
#[derive(Debug, Clone, Default)]
pub struct AlertPage {
    pub alerts: Vec<Alert>,

    /// Total records across all pages, as reported by the server or, when
    /// the server omits it, the length of this page.
    pub total_records: usize,
}

/// Successful result of a retrieval call.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// A page of alerts.
    Page(AlertPage),
    /// The server found nothing for the filter combination.
    NotFound(String),
}

/// Errors from the alert API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, timeout or body read failure.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status other than `404`.
    #[error("API request failed with status {0}")]
    Status(u16),

    /// Body is not valid JSON.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Body is JSON but not the expected envelope.
    #[error("Unexpected API response structure: {0}")]
    UnexpectedShape(String),
}

/// Anything that can answer an [`AlertQuery`].
///
/// Implemented by [`AlertApiClient`] for the real endpoint and by in-memory
/// doubles in tests.
pub trait AlertSource: Send + Sync {
    fn fetch_alerts(
        &self,
        query: &AlertQuery,
    ) -> impl Future<Output = Result<FetchOutcome, FetchError>> + Send;
}

/// Interpret a raw response from the alert endpoint.
pub fn parse_response(status: u16, body: &[u8]) -> Result<FetchOutcome, FetchError> {
    if status == 404 {
        let message = serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .and_then(Value::as_str)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_NOT_FOUND_MESSAGE.to_string());
        return Ok(FetchOutcome::NotFound(message));
    }

    if !(200..300).contains(&status) {
        return Err(FetchError::Status(status));
    }

    let envelope: Value = serde_json::from_slice(body)?;

    if envelope.get("success").and_then(Value::as_bool) != Some(true) {
        return Err(FetchError::UnexpectedShape(
            "missing success flag".to_string(),
        ));
    }

    let Some(Value::Array(items)) = envelope.get("data") else {
        return Err(FetchError::UnexpectedShape(
            "data is not an array".to_string(),
        ));
    };

    let mut alerts = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<Alert>(item.clone()) {
            Ok(alert) => alerts.push(alert),
            Err(e) => warn!(error = %e, "Skipping undecodable alert record"),
        }
    }

    // Without metadata the upstream record count stands, even when some
    // records could not be shown.
    let total_records = envelope
        .pointer("/meta/total")
        .and_then(Value::as_u64)
        .filter(|total| *total > 0)
        .map(|total| total as usize)
        .unwrap_or(items.len());

    Ok(FetchOutcome::Page(AlertPage {
        alerts,
        total_records,
    }))
}

/// HTTP client for the alert API.
#[derive(Clone)]
pub struct AlertApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for AlertApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertApiClient {
    /// Create a client for the default local endpoint.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_ALERT_API_BASE)
    }

    /// Create a client with a custom base URL.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a client whose requests give up after `timeout`.
    ///
    /// A timed-out request surfaces as [`FetchError::Transport`].
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full request URL for a query.
    pub fn alerts_url(&self, query: &AlertQuery) -> String {
        format!("{}/alert?{}", self.base_url, query.query_string())
    }
}

impl AlertSource for AlertApiClient {
    #[instrument(skip(self, query), fields(imei = %query.imei, page = query.page, limit = query.limit))]
    async fn fetch_alerts(&self, query: &AlertQuery) -> Result<FetchOutcome, FetchError> {
        let url = self.alerts_url(query);

        let response = self.client.get(&url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        let outcome = parse_response(status, &body);
        match &outcome {
            Ok(FetchOutcome::Page(page)) => debug!(
                count = page.alerts.len(),
                total = page.total_records,
                "Alert page received"
            ),
            Ok(FetchOutcome::NotFound(message)) => debug!(%message, "No alerts found"),
            Err(e) => warn!(status, error = %e, "Alert retrieval failed"),
        }
        outcome
    }
}

//! Integration tests for the alert API client against a mock upstream.

mod common;

use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio_test::{assert_err, assert_ok};

use fleetwatch::data_sources::{AlertApiClient, AlertQuery, AlertSource, FetchError, FetchOutcome};

use common::spawn_upstream;

fn query(imei: &str, page: usize, limit: usize) -> AlertQuery {
    AlertQuery {
        start: Utc.with_ymd_and_hms(2025, 3, 21, 7, 38, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2025, 3, 22, 7, 38, 0).unwrap(),
        imei: imei.to_string(),
        page,
        limit,
    }
}

#[tokio::test]
async fn test_fetch_sends_query_parameters() {
    let upstream = spawn_upstream().await;
    let client = assert_ok!(AlertApiClient::with_timeout(
        &upstream.base_url,
        Duration::from_secs(5)
    ));

    let outcome = assert_ok!(client.fetch_alerts(&query("paged", 2, 25)).await);

    let FetchOutcome::Page(page) = outcome else {
        panic!("expected a page");
    };
    assert_eq!(page.alerts.len(), 25);
    assert_eq!(page.total_records, 95);
    assert_eq!(page.alerts[0].id.as_str(), "65f1c0ffee0025");

    let requests = upstream.requests();
    assert_eq!(requests[0]["startDate"], "2025-03-21T07:38:00.000Z");
    assert_eq!(requests[0]["endDate"], "2025-03-22T07:38:00.000Z");
    assert_eq!(requests[0]["imei"], "paged");
    assert_eq!(requests[0]["page"], "2");
    assert_eq!(requests[0]["limit"], "25");
}

#[tokio::test]
async fn test_fetch_without_meta_counts_records() {
    let upstream = spawn_upstream().await;
    let client = AlertApiClient::with_base_url(&upstream.base_url);

    let outcome = assert_ok!(client.fetch_alerts(&query("five", 1, 10)).await);

    let FetchOutcome::Page(page) = outcome else {
        panic!("expected a page");
    };
    assert_eq!(page.total_records, 5);
    assert_eq!(page.alerts[0].battery_percentage(), Some(80.0));
}

#[tokio::test]
async fn test_fetch_not_found() {
    let upstream = spawn_upstream().await;
    let client = AlertApiClient::with_base_url(&upstream.base_url);

    let outcome = assert_ok!(client.fetch_alerts(&query("missing", 1, 10)).await);

    assert!(matches!(outcome, FetchOutcome::NotFound(message) if message == "No alerts found"));
}

#[tokio::test]
async fn test_fetch_failures() {
    let upstream = spawn_upstream().await;
    let client = AlertApiClient::with_base_url(&upstream.base_url);

    let err = assert_err!(client.fetch_alerts(&query("broken", 1, 10)).await);
    assert!(matches!(err, FetchError::Status(500)));

    let err = assert_err!(client.fetch_alerts(&query("odd", 1, 10)).await);
    assert!(matches!(err, FetchError::UnexpectedShape(_)));
}

#[tokio::test]
async fn test_fetch_unreachable_is_transport_error() {
    let client = AlertApiClient::with_base_url("http://127.0.0.1:9");

    let err = assert_err!(client.fetch_alerts(&query("five", 1, 10)).await);

    assert!(matches!(err, FetchError::Transport(_)));
}

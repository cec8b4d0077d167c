//! Filter/fetch controller for the alerts view.
//!
//! The controller owns the filter state, turns it into retrieval calls
//! against an [`AlertSource`], and derives the rows the table shows:
//!
//! 1. [`AlertsController::apply_filters`] validates the mandatory filters and
//!    fetches page 1.
//! 2. The retrieved page is narrowed by the free-text search without any
//!    further network activity.
//! 3. Page and page-size requests coming back from the table are coalesced
//!    into a single re-fetch.
//!
//! Every failure is converted into a [`FeedStatus`]; nothing propagates past
//! the fetch boundary and no retry is attempted.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::data_sources::{AlertQuery, AlertSource, FetchError, FetchOutcome};
use crate::filters::{FilterState, filter_devices};
use crate::model::Alert;
use crate::pagination::{PageRequest, PageState};

/// Banner shown before the first retrieval.
pub const AWAITING_INPUT_MESSAGE: &str = "Please select date range and IMEI to view alerts.";

/// Table placeholder before the first retrieval.
pub const INITIAL_EMPTY_MESSAGE: &str = "Select filters to view data";

/// Table placeholder when the search hides every retrieved alert.
pub const NO_MATCH_MESSAGE: &str = "No alerts found matching your filters.";

/// Where the feed stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum FeedStatus {
    /// Mandatory filters are missing; nothing has been requested.
    AwaitingInput,
    /// A retrieval is in flight.
    Loading,
    /// The last retrieval returned a page.
    Ready,
    /// The server reported no records for the filters.
    NoData(String),
    /// The last retrieval failed.
    Failed(String),
}

/// Controller for one alerts view.
pub struct AlertsController<S> {
    source: S,
    filters: FilterState,
    page: PageState,
    alerts: Vec<Alert>,
    visible: Vec<Alert>,
    status: FeedStatus,
    known_devices: BTreeSet<String>,
    pinned_devices: Vec<String>,
}

impl<S: AlertSource> AlertsController<S> {
    /// Create a controller with default filters anchored at `now`.
    pub fn new(source: S, now: DateTime<Utc>) -> Self {
        Self {
            source,
            filters: FilterState::with_default_window(now),
            page: PageState::default(),
            alerts: Vec::new(),
            visible: Vec::new(),
            status: FeedStatus::AwaitingInput,
            known_devices: BTreeSet::new(),
            pinned_devices: Vec::new(),
        }
    }

    /// Devices always offered first in the selector.
    pub fn with_pinned_devices(mut self, pinned: Vec<String>) -> Self {
        self.pinned_devices = pinned;
        self
    }

    /// Seed the distinct-device set, e.g. from earlier sessions.
    pub fn with_known_devices(mut self, devices: impl IntoIterator<Item = String>) -> Self {
        self.known_devices.extend(devices);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn page_state(&self) -> PageState {
        self.page
    }

    pub fn status(&self) -> &FeedStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == FeedStatus::Loading
    }

    /// The last retrieved page, before the text search.
    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    /// The retrieved page narrowed by the text search.
    pub fn visible_alerts(&self) -> &[Alert] {
        &self.visible
    }

    /// Distinct IMEIs seen on first pages so far, sorted.
    pub fn known_devices(&self) -> impl Iterator<Item = &str> {
        self.known_devices.iter().map(String::as_str)
    }

    /// Selector entries: pinned devices, then known ones, narrowed by the
    /// selector's search term.
    pub fn device_options(&self) -> Vec<&str> {
        let pinned = self.pinned_devices.iter().map(String::as_str);
        let known = self
            .known_devices
            .iter()
            .map(String::as_str)
            .filter(|imei| !self.pinned_devices.iter().any(|p| p == imei));

        filter_devices(pinned.chain(known), &self.filters.device_search)
    }

    /// Placeholder for an empty table.
    pub fn empty_message(&self) -> String {
        match &self.status {
            FeedStatus::NoData(message) => message.clone(),
            FeedStatus::AwaitingInput => INITIAL_EMPTY_MESSAGE.to_string(),
            _ => NO_MATCH_MESSAGE.to_string(),
        }
    }

    pub fn set_search(&mut self, term: &str) {
        self.filters.search = term.to_string();
        self.refresh_visible();
    }

    pub fn set_start(&mut self, start: Option<DateTime<Utc>>) {
        self.filters.set_start(start);
    }

    pub fn set_end(&mut self, end: Option<DateTime<Utc>>) {
        self.filters.set_end(end);
    }

    pub fn set_range(&mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) {
        self.filters.set_range(start, end);
    }

    pub fn select_device(&mut self, imei: &str) {
        self.filters.select_device(imei);
    }

    pub fn toggle_device_dropdown(&mut self) {
        self.filters.toggle_device_dropdown();
    }

    pub fn set_device_search(&mut self, term: &str) {
        self.filters.device_search = term.to_string();
    }

    /// Fetch page 1 with the current filters.
    ///
    /// Without a date range and a device nothing is requested and the feed
    /// is left awaiting input. Returns whether a request was made.
    pub async fn apply_filters(&mut self) -> bool {
        if !self.filters.is_complete() {
            debug!("Mandatory filters missing, not fetching");
            self.status = FeedStatus::AwaitingInput;
            return false;
        }

        info!(
            imei = %self.filters.device,
            page_size = self.page.page_size,
            "Applying alert filters"
        );
        self.page.current_page = 1;
        self.fetch(1, self.page.page_size).await
    }

    /// Retrieve one page. Returns whether a request was made.
    pub async fn fetch(&mut self, page: usize, page_size: usize) -> bool {
        let Some(query) = self.begin_fetch(page, page_size) else {
            return false;
        };
        let outcome = self.source.fetch_alerts(&query).await;
        self.complete_fetch(&query, outcome);

        // A page past the end was clamped to the last page; load its rows.
        if self.status == FeedStatus::Ready && self.page.current_page < query.page {
            debug!(
                requested = query.page,
                last = self.page.current_page,
                "Requested page is past the end"
            );
            if let Some(query) = self.begin_fetch(self.page.current_page, query.limit) {
                let outcome = self.source.fetch_alerts(&query).await;
                self.complete_fetch(&query, outcome);
            }
        }
        true
    }

    /// First half of [`fetch`](Self::fetch): build the query and enter the
    /// loading state.
    ///
    /// Drivers that run several requests at once pair each query with
    /// [`complete_fetch`](Self::complete_fetch). Completions are applied in
    /// arrival order, so the last one to resolve wins.
    pub fn begin_fetch(&mut self, page: usize, page_size: usize) -> Option<AlertQuery> {
        let Some(query) = self.filters.query(page.max(1), page_size.max(1)) else {
            self.status = FeedStatus::AwaitingInput;
            return None;
        };

        self.page.current_page = query.page;
        self.page.page_size = query.limit;
        self.status = FeedStatus::Loading;
        Some(query)
    }

    /// Second half of [`fetch`](Self::fetch): apply a retrieval outcome.
    pub fn complete_fetch(
        &mut self,
        query: &AlertQuery,
        outcome: Result<FetchOutcome, FetchError>,
    ) {
        self.page.current_page = query.page;
        self.page.page_size = query.limit;

        match outcome {
            Ok(FetchOutcome::Page(page)) => {
                if query.page == 1 || self.known_devices.is_empty() {
                    self.known_devices.extend(
                        page.alerts
                            .iter()
                            .filter(|alert| !alert.imei.is_empty())
                            .map(|alert| alert.imei.clone()),
                    );
                }

                info!(
                    imei = %query.imei,
                    page = query.page,
                    count = page.alerts.len(),
                    total = page.total_records,
                    "Alerts loaded"
                );
                self.page.total_records = page.total_records;
                let last = self.page.total_pages();
                if last > 0 && self.page.current_page > last {
                    self.page.current_page = last;
                }
                self.alerts = page.alerts;
                self.status = FeedStatus::Ready;
            }
            Ok(FetchOutcome::NotFound(message)) => {
                info!(imei = %query.imei, %message, "No alerts for filters");
                self.clear_rows();
                self.status = FeedStatus::NoData(message);
            }
            Err(e) => {
                warn!(imei = %query.imei, error = %e, "Failed to load alerts");
                self.clear_rows();
                self.status = FeedStatus::Failed(format!("Failed to load alerts: {e}"));
            }
        }

        self.refresh_visible();
    }

    /// Apply a batch of table navigation requests with at most one fetch.
    pub async fn handle_page_requests(
        &mut self,
        requests: impl IntoIterator<Item = PageRequest>,
    ) -> bool {
        let mut target = self.page;
        let mut changed = false;

        for request in requests {
            match request {
                PageRequest::Page(page) if page != target.current_page => {
                    target.current_page = page;
                    changed = true;
                }
                PageRequest::PageSize(size) if size != target.page_size => {
                    target.set_page_size(size);
                    changed = true;
                }
                _ => {}
            }
        }

        if !changed {
            return false;
        }

        debug!(
            page = target.current_page,
            page_size = target.page_size,
            "Page change requested"
        );
        self.fetch(target.current_page, target.page_size).await
    }

    /// Drain pending requests from a channel-backed table and apply them.
    pub async fn handle_pending(&mut self, requests: &mut mpsc::UnboundedReceiver<PageRequest>) -> bool {
        let mut batch = Vec::new();
        while let Ok(request) = requests.try_recv() {
            batch.push(request);
        }
        self.handle_page_requests(batch).await
    }

    /// Reset every filter, the rows and the pagination. Does not fetch.
    pub fn clear_filters(&mut self) {
        self.clear_filters_at(Utc::now());
    }

    /// [`clear_filters`](Self::clear_filters) with an explicit clock.
    pub fn clear_filters_at(&mut self, now: DateTime<Utc>) {
        self.filters = FilterState::with_default_window(now);
        self.alerts.clear();
        self.visible.clear();
        self.page = PageState::default();
        self.status = FeedStatus::AwaitingInput;
    }

    fn clear_rows(&mut self) {
        self.alerts.clear();
        self.page.total_records = 0;
    }

    fn refresh_visible(&mut self) {
        let term = &self.filters.search;
        self.visible = self
            .alerts
            .iter()
            .filter(|alert| alert.matches_search(term))
            .cloned()
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_sources::AlertPage;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubSource {
        responses: Mutex<VecDeque<Result<FetchOutcome, FetchError>>>,
        queries: Mutex<Vec<AlertQuery>>,
    }

    impl StubSource {
        fn with(responses: Vec<Result<FetchOutcome, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn queries(&self) -> Vec<AlertQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    impl AlertSource for StubSource {
        async fn fetch_alerts(&self, query: &AlertQuery) -> Result<FetchOutcome, FetchError> {
            self.queries.lock().unwrap().push(query.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(FetchOutcome::NotFound("exhausted".to_string())))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 21, 7, 38, 13).unwrap()
    }

    fn alert(id: &str, imei: &str, alert_type: &str) -> Alert {
        serde_json::from_value(json!({
            "_id": id,
            "imei": imei,
            "alertType": alert_type,
            "alertMessage": format!("{alert_type} event"),
        }))
        .unwrap()
    }

    fn page(alerts: Vec<Alert>, total: usize) -> Result<FetchOutcome, FetchError> {
        Ok(FetchOutcome::Page(AlertPage {
            alerts,
            total_records: total,
        }))
    }

    fn ready_controller(
        responses: Vec<Result<FetchOutcome, FetchError>>,
    ) -> AlertsController<StubSource> {
        let mut controller = AlertsController::new(StubSource::with(responses), now());
        controller.select_device("700070635323");
        controller
    }

    #[tokio::test]
    async fn test_apply_without_device_awaits_input() {
        let mut controller = AlertsController::new(StubSource::default(), now());

        assert!(!controller.apply_filters().await);

        assert_eq!(controller.status(), &FeedStatus::AwaitingInput);
        assert!(controller.source().queries().is_empty());
        assert_eq!(controller.empty_message(), INITIAL_EMPTY_MESSAGE);
    }

    #[tokio::test]
    async fn test_apply_fetches_first_page() {
        let alerts = (0..5).map(|i| alert(&format!("a{i}"), "7000", "speed")).collect();
        let mut controller = ready_controller(vec![page(alerts, 5)]);

        assert!(controller.apply_filters().await);

        let queries = controller.source().queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].page, 1);
        assert_eq!(queries[0].limit, 10);
        assert_eq!(queries[0].imei, "700070635323");

        assert_eq!(controller.status(), &FeedStatus::Ready);
        assert_eq!(controller.page_state().total_records, 5);
        assert_eq!(controller.page_state().total_pages(), 1);
        assert_eq!(controller.page_state().current_page, 1);
        assert_eq!(controller.visible_alerts().len(), 5);
    }

    #[tokio::test]
    async fn test_page_past_the_end_clamps_to_last_page() {
        let mut controller = ready_controller(vec![
            page(Vec::new(), 95),
            page(vec![alert("a90", "7000", "speed")], 95),
        ]);

        assert!(controller.fetch(50, 10).await);

        let pages: Vec<_> = controller.source().queries().iter().map(|q| q.page).collect();
        assert_eq!(pages, vec![50, 10]);
        assert_eq!(controller.status(), &FeedStatus::Ready);
        assert_eq!(controller.page_state().current_page, 10);
        assert_eq!(controller.page_state().total_pages(), 10);
        assert_eq!(controller.visible_alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_not_an_error() {
        let mut controller = ready_controller(vec![
            page(vec![alert("a", "1", "speed")], 1),
            Ok(FetchOutcome::NotFound("No alerts found".to_string())),
        ]);
        controller.apply_filters().await;

        controller.apply_filters().await;

        assert_eq!(
            controller.status(),
            &FeedStatus::NoData("No alerts found".to_string())
        );
        assert!(controller.alerts().is_empty());
        assert!(controller.visible_alerts().is_empty());
        assert_eq!(controller.page_state().total_records, 0);
        assert_eq!(controller.empty_message(), "No alerts found");
    }

    #[tokio::test]
    async fn test_failure_clears_rows_and_keeps_filters() {
        let mut controller = ready_controller(vec![
            page(vec![alert("a", "1", "speed")], 1),
            Err(FetchError::Status(500)),
        ]);
        controller.set_search("speed");
        controller.apply_filters().await;
        let filters_before = controller.filters().clone();

        controller.apply_filters().await;

        assert_eq!(
            controller.status(),
            &FeedStatus::Failed("Failed to load alerts: API request failed with status 500".into())
        );
        assert!(controller.visible_alerts().is_empty());
        assert_eq!(controller.filters(), &filters_before);
    }

    #[tokio::test]
    async fn test_search_filters_retrieved_page() {
        let mut controller = ready_controller(vec![page(
            vec![alert("a", "1", "battery"), alert("b", "2", "tamper")],
            2,
        )]);
        controller.apply_filters().await;

        controller.set_search("TAMP");
        let ids: Vec<_> = controller
            .visible_alerts()
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b"]);
        assert_eq!(controller.alerts().len(), 2);

        controller.set_search("");
        assert_eq!(controller.visible_alerts().len(), 2);
        assert_eq!(controller.source().queries().len(), 1);
    }

    #[tokio::test]
    async fn test_known_devices_grow_from_first_pages_only() {
        let mut controller = ready_controller(vec![
            page(vec![alert("a", "111", "speed"), alert("b", "222", "speed")], 30),
            page(vec![alert("c", "333", "speed")], 30),
            page(vec![alert("d", "444", "speed")], 30),
        ]);

        controller.apply_filters().await;
        controller.handle_page_requests([PageRequest::Page(2)]).await;
        assert_eq!(controller.known_devices().collect::<Vec<_>>(), vec!["111", "222"]);

        controller.handle_page_requests([PageRequest::Page(1)]).await;
        assert_eq!(
            controller.known_devices().collect::<Vec<_>>(),
            vec!["111", "222", "444"]
        );
    }

    #[tokio::test]
    async fn test_size_change_coalesces_into_one_fetch() {
        let mut controller = ready_controller(vec![
            page(vec![alert("a", "1", "speed")], 95),
            page(vec![alert("b", "1", "speed")], 95),
            page(vec![alert("c", "1", "speed")], 95),
        ]);
        controller.apply_filters().await;
        controller.handle_page_requests([PageRequest::Page(4)]).await;

        let fetched = controller
            .handle_page_requests([PageRequest::PageSize(25), PageRequest::Page(1)])
            .await;

        assert!(fetched);
        let queries = controller.source().queries();
        assert_eq!(queries.len(), 3);
        assert_eq!((queries[2].page, queries[2].limit), (1, 25));
        assert_eq!(controller.page_state().current_page, 1);
        assert_eq!(controller.page_state().page_size, 25);

        // Nothing new to do.
        assert!(!controller.handle_page_requests([PageRequest::Page(1)]).await);
    }

    #[tokio::test]
    async fn test_handle_pending_drains_channel() {
        let mut controller = ready_controller(vec![
            page(vec![alert("a", "1", "speed")], 40),
            page(vec![alert("b", "1", "speed")], 40),
        ]);
        controller.apply_filters().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(PageRequest::Page(2)).unwrap();
        tx.send(PageRequest::Page(3)).unwrap();

        assert!(controller.handle_pending(&mut rx).await);
        assert_eq!(controller.source().queries().last().unwrap().page, 3);
    }

    #[tokio::test]
    async fn test_clear_filters_is_idempotent() {
        let mut controller = ready_controller(vec![page(vec![alert("a", "1", "speed")], 1)]);
        controller.set_search("speed");
        controller.apply_filters().await;

        let later = now() + chrono::Duration::hours(3);
        controller.clear_filters_at(later);
        let once = (
            controller.filters().clone(),
            controller.page_state(),
            controller.status().clone(),
            controller.visible_alerts().len(),
        );

        controller.clear_filters_at(later);
        let twice = (
            controller.filters().clone(),
            controller.page_state(),
            controller.status().clone(),
            controller.visible_alerts().len(),
        );

        assert_eq!(once, twice);
        assert_eq!(once.0, FilterState::with_default_window(later));
        assert_eq!(once.1, PageState::default());
        assert_eq!(once.2, FeedStatus::AwaitingInput);
        assert_eq!(controller.source().queries().len(), 1);
    }

    #[test]
    fn test_last_completion_wins() {
        let mut controller = ready_controller(Vec::new());

        let first = controller.begin_fetch(1, 10).unwrap();
        assert!(controller.is_loading());
        let second = controller.begin_fetch(2, 10).unwrap();

        controller.complete_fetch(&second, page(vec![alert("new", "1", "speed")], 20));
        controller.complete_fetch(&first, page(vec![alert("old", "1", "speed")], 20));

        assert_eq!(controller.page_state().current_page, 1);
        assert_eq!(controller.visible_alerts()[0].id.as_str(), "old");
    }

    #[test]
    fn test_device_options_pinned_first() {
        let mut controller = AlertsController::new(StubSource::default(), now())
            .with_pinned_devices(vec!["700070635323".to_string()])
            .with_known_devices(["111".to_string(), "700070635323".to_string()]);

        assert_eq!(controller.device_options(), vec!["700070635323", "111"]);

        controller.set_device_search("11");
        assert_eq!(controller.device_options(), vec!["111"]);
    }
}

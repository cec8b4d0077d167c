//! Alerts dashboard.
//!
//! Composes the [`AlertsController`] with a controlled [`TableView`] and
//! turns the result into either a JSON view or a rendered page.
//!
//! Every dashboard state is reachable through the query string of
//! `/alerts`, so a request is replayed as a short sequence of controller
//! operations:
//!
//! 1. Filters from the query are applied to a fresh controller.
//! 2. The requested page is fetched.
//! 3. A jump-to-page input is submitted to the table, whose navigation
//!    request goes back through the controller.
//!
//! # Usage
//!
//! ```ignore
//! let mut controller = AlertsController::new(client, Utc::now());
//! let view = load_dashboard(&mut controller, &params).await;
//! let html = render_alerts_page(&view, 2025);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::controller::{AWAITING_INPUT_MESSAGE, AlertsController, FeedStatus};
use crate::data_sources::AlertSource;
use crate::filters::{FilterState, format_datetime_input, parse_datetime_input};
use crate::model::{Alert, BatteryTone, format_battery, format_coordinate, format_timestamp};
use crate::pagination::{
    DEFAULT_PAGE_SIZE, ExternalPaging, PageRequest, PageState, normalize_page_size,
};
use crate::render::{Banner, PagerLinks, escape_html, page_shell, render_banner, render_table};
use crate::table::{Cell, Column, PaginationConfig, TableOptions, TableRender, TableView};

/// Table placeholder while a page is loading.
pub const LOADING_MESSAGE: &str = "Loading alerts...";

/// Query parameters of the alerts page.
///
/// Missing parameters fall back to the controller defaults. An empty
/// `start` or `end` clears that bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertsParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub imei: Option<String>,
    pub search: Option<String>,
    pub device_search: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
    /// Raw jump-to-page input.
    pub jump: Option<String>,
}

impl AlertsParams {
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> usize {
        normalize_page_size(self.limit.unwrap_or(DEFAULT_PAGE_SIZE))
    }

    /// Copy the query's filters into a controller.
    pub fn apply_to<S: AlertSource>(&self, controller: &mut AlertsController<S>) {
        let start = match &self.start {
            Some(raw) => parse_datetime_input(raw),
            None => controller.filters().start(),
        };
        let end = match &self.end {
            Some(raw) => parse_datetime_input(raw),
            None => controller.filters().end(),
        };
        controller.set_range(start, end);

        if let Some(imei) = &self.imei {
            controller.select_device(imei);
        }
        if let Some(term) = &self.device_search {
            controller.set_device_search(term);
        }
        if let Some(term) = &self.search {
            controller.set_search(term);
        }
    }

    /// Parameters describing the controller's current filters at a given
    /// page and page size.
    pub fn for_state(filters: &FilterState, page: usize, page_size: usize) -> Self {
        let optional = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            start: Some(filters.start().map(format_datetime_input).unwrap_or_default()),
            end: Some(filters.end().map(format_datetime_input).unwrap_or_default()),
            imei: optional(&filters.device),
            search: optional(&filters.search),
            device_search: optional(&filters.device_search),
            page: Some(page),
            limit: Some(page_size),
            jump: None,
        }
    }

    /// Encoded query string, without the leading `?`.
    pub fn query_string(&self) -> String {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        let mut push = |name: &'static str, value: &Option<String>| {
            if let Some(value) = value {
                pairs.push((name, value.clone()));
            }
        };
        push("start", &self.start);
        push("end", &self.end);
        push("imei", &self.imei);
        push("search", &self.search);
        push("device_search", &self.device_search);
        push("jump", &self.jump);
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }

        pairs
            .iter()
            .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Links for the alerts pager, preserving the current filters.
pub struct AlertsLinks {
    path: String,
    base: AlertsParams,
}

impl AlertsLinks {
    pub fn new(path: &str, filters: &FilterState, page: PageState) -> Self {
        Self {
            path: path.to_string(),
            base: AlertsParams::for_state(filters, page.current_page, page.page_size),
        }
    }

    fn href(&self, params: &AlertsParams) -> String {
        format!("{}?{}", self.path, params.query_string())
    }
}

impl PagerLinks for AlertsLinks {
    fn page_href(&self, page: usize) -> String {
        self.href(&AlertsParams {
            page: Some(page),
            ..self.base.clone()
        })
    }

    fn page_size_href(&self, page_size: usize) -> String {
        self.href(&AlertsParams {
            page: Some(1),
            limit: Some(page_size),
            ..self.base.clone()
        })
    }

    fn form_action(&self) -> String {
        self.path.clone()
    }

    fn hidden_fields(&self) -> Vec<(String, String)> {
        let base = &self.base;
        [
            ("start", base.start.clone()),
            ("end", base.end.clone()),
            ("imei", base.imei.clone()),
            ("search", base.search.clone()),
            ("device_search", base.device_search.clone()),
            ("page", base.page.map(|p| p.to_string())),
            ("limit", base.limit.map(|l| l.to_string())),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
        .collect()
    }
}

/// Columns of the alerts table.
pub fn alert_columns() -> Vec<Column<Alert>> {
    vec![
        Column::field("IMEI", "imei").class("nowrap strong"),
        Column::render("Date & Time", |alert: &Alert| {
            Cell::text(format_timestamp(alert.date_time))
        })
        .class("nowrap"),
        Column::render("Alert Type", |alert: &Alert| Cell::Badge {
            label: alert.alert_type.clone(),
            class: alert.tone().css_class().to_string(),
        }),
        Column::field("Source", "source").class("nowrap"),
        Column::field("Value", "value").class("nowrap"),
        Column::field("Alert Message", "alertMessage").class("truncate"),
        Column::field("Device Type", "deviceTypeAlert").class("nowrap"),
        Column::render("Location", location_cell).class("nowrap"),
        Column::render("Battery", |alert: &Alert| {
            let percentage = alert.battery_percentage();
            Cell::Meter {
                fill: percentage.unwrap_or(0.0),
                label: format_battery(percentage),
                class: BatteryTone::from_percentage(percentage).css_class().to_string(),
            }
        }),
    ]
}

fn location_cell(alert: &Alert) -> Cell {
    let Some((lat, lng)) = alert.coordinates() else {
        return Cell::text("N/A");
    };
    Cell::Link {
        label: "Map".to_string(),
        href: format!(
            "/map?lat={lat}&lng={lng}&imei={}",
            urlencoding::encode(&alert.imei)
        ),
        title: format!(
            "{}, {}",
            format_coordinate(Some(lat)),
            format_coordinate(Some(lng))
        ),
    }
}

/// Build the alerts table in controlled mode, mirroring the controller.
///
/// Navigation requests are delivered on the returned receiver.
pub fn alert_table<S: AlertSource>(
    controller: &AlertsController<S>,
) -> (TableView<Alert>, mpsc::UnboundedReceiver<PageRequest>) {
    let (external, requests) = ExternalPaging::channel(controller.page_state());
    let options = TableOptions {
        loading_message: LOADING_MESSAGE.to_string(),
        ..TableOptions::default()
    };

    let mut table = TableView::new(
        alert_columns(),
        |alert: &Alert| alert.id.to_string(),
        options,
        PaginationConfig::controlled(external),
    );
    table.set_rows(controller.visible_alerts().to_vec());
    table.set_loading(controller.is_loading());
    table.set_empty_message(&controller.empty_message());

    (table, requests)
}

/// Serializable snapshot of the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct AlertsView {
    pub filters: FilterState,
    pub page: PageState,
    pub total_pages: usize,
    pub status: FeedStatus,
    pub alerts: Vec<Alert>,
    pub device_options: Vec<String>,
    pub empty_message: String,
    pub table: TableRender,
}

impl AlertsView {
    pub fn from_controller<S: AlertSource>(controller: &AlertsController<S>) -> Self {
        let (table, _) = alert_table(controller);
        let page = controller.page_state();

        Self {
            filters: controller.filters().clone(),
            page,
            total_pages: page.total_pages(),
            status: controller.status().clone(),
            alerts: controller.visible_alerts().to_vec(),
            device_options: controller
                .device_options()
                .into_iter()
                .map(str::to_string)
                .collect(),
            empty_message: controller.empty_message(),
            table: table.render(),
        }
    }
}

/// Replay a request against a controller and snapshot the result.
pub async fn load_dashboard<S: AlertSource>(
    controller: &mut AlertsController<S>,
    params: &AlertsParams,
) -> AlertsView {
    params.apply_to(controller);

    let (page, page_size) = (params.page(), params.page_size());
    if page == 1 && page_size == controller.page_state().page_size {
        controller.apply_filters().await;
    } else {
        controller.fetch(page, page_size).await;
    }

    if let Some(jump) = params.jump.as_deref().filter(|j| !j.is_empty()) {
        let (mut table, mut requests) = alert_table(controller);
        table.set_jump_input(jump);
        if table.submit_jump() {
            controller.handle_pending(&mut requests).await;
        }
    }

    AlertsView::from_controller(controller)
}

fn status_banner(status: &FeedStatus) -> Option<Banner> {
    match status {
        FeedStatus::AwaitingInput => Some(Banner::Info(AWAITING_INPUT_MESSAGE.to_string())),
        FeedStatus::NoData(message) => Some(Banner::NoData(message.clone())),
        FeedStatus::Failed(message) => Some(Banner::Error(message.clone())),
        FeedStatus::Loading | FeedStatus::Ready => None,
    }
}

fn datetime_value(ts: Option<DateTime<Utc>>) -> String {
    ts.map(format_datetime_input).unwrap_or_default()
}

fn render_filters(view: &AlertsView) -> String {
    let filters = &view.filters;
    let mut html = String::from(r#"<form class="filters" method="get" action="/alerts">"#);

    html.push_str(&format!(
        r#"<input type="text" name="search" placeholder="Search alerts..." value="{}">"#,
        escape_html(&filters.search)
    ));
    html.push_str(&format!(
        r#"<label>Start <input type="datetime-local" name="start" value="{}"></label>"#,
        datetime_value(filters.start())
    ));
    html.push_str(&format!(
        r#"<label>End <input type="datetime-local" name="end" value="{}"></label>"#,
        datetime_value(filters.end())
    ));

    html.push_str(&format!(
        r#"<label>IMEI <input type="text" name="imei" list="imei-options" placeholder="Select IMEI" value="{}"></label>"#,
        escape_html(&filters.device)
    ));
    html.push_str(r#"<datalist id="imei-options">"#);
    for imei in &view.device_options {
        html.push_str(&format!(r#"<option value="{}">"#, escape_html(imei)));
    }
    html.push_str("</datalist>");
    html.push_str(&format!(
        r#"<input type="text" name="device_search" placeholder="Search IMEI..." value="{}">"#,
        escape_html(&filters.device_search)
    ));
    if view.device_options.is_empty() {
        html.push_str(r#"<span class="hint">No IMEIs found</span>"#);
    }

    html.push_str(&format!(
        r#"<input type="hidden" name="limit" value="{}">"#,
        view.page.page_size
    ));
    html.push_str(r#"<button type="submit">Apply Filters</button>"#);
    html.push_str(r#"<a class="page-btn" href="/alerts">Clear Filters</a>"#);
    html.push_str("</form>");
    html
}

/// Full HTML page for the alerts dashboard.
pub fn render_alerts_page(view: &AlertsView, year: i32) -> String {
    let links = AlertsLinks::new("/alerts", &view.filters, view.page);

    let mut body = String::from(
        r#"<div class="heading"><h1>Device Alerts</h1><p>Monitor and manage device alerts from your fleet</p></div>"#,
    );
    // Errors sit above the filters, notices between filters and table.
    let banner = status_banner(&view.status);
    if let Some(error @ Banner::Error(_)) = &banner {
        body.push_str(&render_banner(error));
    }
    body.push_str(&render_filters(view));
    if let Some(notice) = banner.iter().find(|b| !matches!(b, Banner::Error(_))) {
        body.push_str(&render_banner(notice));
    }
    body.push_str(&render_table(&view.table, &links));

    page_shell("Device Alerts", &body, year)
}

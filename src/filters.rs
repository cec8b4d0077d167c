//! Filter state for the alerts view.
//!
//! The date range is inclusive on both ends and is kept non-negative:
//! moving the start past the end advances the end by one day, and an end
//! earlier than the start is clamped to the start.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;

use crate::data_sources::AlertQuery;

/// Format used by `datetime-local` form inputs.
const INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Length of the default window and of the auto-advanced end.
fn default_window() -> Duration {
    Duration::days(1)
}

/// The controller's working set of filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterState {
    /// Free-text search applied to the retrieved page.
    pub search: String,

    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,

    /// Selected device IMEI; empty means none selected.
    pub device: String,

    /// Whether the device selector is expanded.
    pub device_dropdown_open: bool,

    /// Search term typed into the device selector.
    pub device_search: String,
}

impl FilterState {
    /// Default filters: no search, no device, window `[now, now + 1 day]`
    /// with `now` truncated to the minute.
    pub fn with_default_window(now: DateTime<Utc>) -> Self {
        let start = truncate_to_minute(now);
        Self {
            search: String::new(),
            start: Some(start),
            end: Some(start + default_window()),
            device: String::new(),
            device_dropdown_open: false,
            device_search: String::new(),
        }
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// Set the start bound, advancing the end when it would precede it.
    pub fn set_start(&mut self, start: Option<DateTime<Utc>>) {
        self.start = start;
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end < start {
                self.end = Some(start + default_window());
            }
        }
    }

    /// Set the end bound, clamped to the start.
    pub fn set_end(&mut self, end: Option<DateTime<Utc>>) {
        self.end = match (self.start, end) {
            (Some(start), Some(end)) if end < start => Some(start),
            _ => end,
        };
    }

    /// Set both bounds as if the user had edited the end and then the start.
    pub fn set_range(&mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) {
        self.end = end;
        self.set_start(start);
    }

    /// Pick a device and collapse the selector.
    pub fn select_device(&mut self, imei: &str) {
        self.device = imei.trim().to_string();
        self.device_dropdown_open = false;
    }

    pub fn toggle_device_dropdown(&mut self) {
        self.device_dropdown_open = !self.device_dropdown_open;
    }

    /// Whether every mandatory filter (both bounds and a device) is set.
    pub fn is_complete(&self) -> bool {
        self.start.is_some() && self.end.is_some() && !self.device.is_empty()
    }

    /// Build a retrieval query from the current filters.
    ///
    /// Returns `None` while a mandatory filter is missing.
    pub fn query(&self, page: usize, limit: usize) -> Option<AlertQuery> {
        if !self.is_complete() {
            return None;
        }

        Some(AlertQuery {
            start: self.start?,
            end: self.end?,
            imei: self.device.clone(),
            page,
            limit,
        })
    }
}

/// Devices whose IMEI contains `term`, case-insensitively.
pub fn filter_devices<'a>(devices: impl IntoIterator<Item = &'a str>, term: &str) -> Vec<&'a str> {
    let needle = term.to_lowercase();
    devices
        .into_iter()
        .filter(|imei| imei.to_lowercase().contains(&needle))
        .collect()
}

/// Drop seconds and sub-second precision.
pub fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ts.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(60), 0).unwrap_or(ts)
}

/// Parse a form timestamp.
///
/// Accepts `datetime-local` values (`2025-03-21T07:38`, optionally with
/// seconds), interpreted as UTC, and full RFC 3339 timestamps.
pub fn parse_datetime_input(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, INPUT_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Render a timestamp for a `datetime-local` input.
pub fn format_datetime_input(ts: DateTime<Utc>) -> String {
    ts.format(INPUT_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 21, h, m, 0).unwrap()
    }

    #[test]
    fn test_default_window() {
        let now = Utc.with_ymd_and_hms(2025, 3, 21, 7, 38, 13).unwrap();
        let filters = FilterState::with_default_window(now);

        assert_eq!(filters.start(), Some(at(7, 38)));
        assert_eq!(filters.end(), Some(at(7, 38) + Duration::days(1)));
        assert!(filters.device.is_empty());
        assert!(!filters.is_complete());
    }

    #[test]
    fn test_start_past_end_advances_end() {
        let mut filters = FilterState::with_default_window(at(7, 0));
        filters.set_end(Some(at(9, 0)));

        filters.set_start(Some(at(10, 0)));

        assert_eq!(filters.start(), Some(at(10, 0)));
        assert_eq!(filters.end(), Some(at(10, 0) + Duration::days(1)));
    }

    #[test]
    fn test_start_before_end_keeps_end() {
        let mut filters = FilterState::with_default_window(at(7, 0));
        filters.set_end(Some(at(9, 0)));

        filters.set_start(Some(at(8, 0)));

        assert_eq!(filters.end(), Some(at(9, 0)));
    }

    #[test]
    fn test_end_before_start_is_clamped() {
        let mut filters = FilterState::with_default_window(at(7, 0));

        filters.set_end(Some(at(6, 0)));

        assert_eq!(filters.end(), Some(at(7, 0)));
    }

    #[test]
    fn test_set_range_inverted() {
        let mut filters = FilterState::with_default_window(at(0, 0));

        filters.set_range(Some(at(12, 0)), Some(at(11, 0)));

        assert_eq!(filters.start(), Some(at(12, 0)));
        assert!(filters.end().unwrap() >= filters.start().unwrap());
    }

    #[test]
    fn test_query_requires_device_and_range() {
        let mut filters = FilterState::with_default_window(at(7, 0));
        assert!(filters.query(1, 10).is_none());

        filters.select_device(" 700070635323 ");
        let query = filters.query(1, 10).unwrap();
        assert_eq!(query.imei, "700070635323");
        assert_eq!(query.start, at(7, 0));

        filters.set_start(None);
        assert!(filters.query(1, 10).is_none());
    }

    #[test]
    fn test_select_device_closes_dropdown() {
        let mut filters = FilterState::with_default_window(at(7, 0));
        filters.toggle_device_dropdown();
        assert!(filters.device_dropdown_open);

        filters.select_device("123");
        assert!(!filters.device_dropdown_open);
    }

    #[test]
    fn test_filter_devices() {
        let devices = ["700070635323", "ABC123", "abc999"];
        assert_eq!(filter_devices(devices, "abc"), vec!["ABC123", "abc999"]);
        assert_eq!(filter_devices(devices, "").len(), 3);
    }

    #[test]
    fn test_parse_datetime_input() {
        assert_eq!(parse_datetime_input("2025-03-21T07:38"), Some(at(7, 38)));
        assert_eq!(parse_datetime_input("2025-03-21T07:38:00Z"), Some(at(7, 38)));
        assert_eq!(
            parse_datetime_input("2025-03-21T09:38:00+02:00"),
            Some(at(7, 38))
        );
        assert_eq!(parse_datetime_input(""), None);
        assert_eq!(parse_datetime_input("yesterday"), None);
        assert_eq!(format_datetime_input(at(7, 38)), "2025-03-21T07:38");
    }
}

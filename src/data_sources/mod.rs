//! Upstream data sources for the dashboard.
//!
//! # Data Sources
//!
//! - [`alert_api`]: the paged alert retrieval endpoint of the ingestion system
//!
//! Nothing outside this module performs network I/O against upstream
//! services.

pub mod alert_api;

pub use alert_api::{
    AlertApiClient, AlertPage, AlertQuery, AlertSource, FetchError, FetchOutcome,
};

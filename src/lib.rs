//! Fleetwatch - a dashboard for browsing device alerts from asset-tracking
//! fleets.
//!
//! # Overview
//!
//! The dashboard retrieves alerts for one device over a time window, one
//! page at a time, from an upstream alert API. The retrieved page can be
//! narrowed by a free-text search without another request, and any alert
//! with a position can be opened on a map.
//!
//! Everything between the HTTP layer and the upstream API is plain state:
//! the controller and the table are view-models that can be driven and
//! inspected without a browser.
//!
//! # Modules
//!
//! - [`model`]: Alert records and display formatting
//! - [`data_sources`]: Upstream alert API client
//! - [`filters`]: Filter state and date-range rules
//! - [`pagination`]: Page arithmetic and the two paging strategies
//! - [`table`]: Generic paginated table view
//! - [`controller`]: Filter/fetch controller for the alerts view
//! - [`map`]: Map popup for a device location
//! - [`render`]: HTML rendering
//! - [`dashboard`]: Alerts dashboard composition
//! - [`config`]: Environment configuration
//! - [`api`]: HTTP handlers

pub mod api;
pub mod config;
pub mod controller;
pub mod dashboard;
pub mod data_sources;
pub mod filters;
pub mod map;
pub mod model;
pub mod pagination;
pub mod render;
pub mod table;

//! Core types and rules for the Pulse campaign analytics collector.
//!
//! This crate is free of HTTP and database dependencies. It owns the event
//! and registration models, banner validation, both view de-duplication
//! rules, the stats aggregator, and the [`store::AnalyticsStore`] trait that
//! storage backends implement.

pub mod banner;
pub mod dedup;
pub mod error;
pub mod event;
pub mod registration;
pub mod sanitize;
pub mod stats;
pub mod store;

pub use error::{Error, Result};

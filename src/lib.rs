//! Live air-quality pipeline for a single IoT sensor.
//!
//! A realtime database path is streamed through the [`feed`] boundary,
//! normalized into [`Reading`]s, scored by [`aqi`], kept in a rolling
//! [`history`] window and watched by the edge-triggered [`alerts`] engine.
//! The [`pipeline`] owns all of that state; [`routes`] exposes it over HTTP.
//!
//! This crate follows the Explicit Module Boundary Pattern (EMBP): sibling
//! modules reach each other through the re-exports below rather than deep
//! paths where possible.

pub mod alerts;
pub mod aqi;
pub mod config;
pub mod error;
pub mod feed;
pub mod history;
pub mod insights;
pub mod models;
pub mod pipeline;
pub mod routes;

pub use alerts::{Notification, NotificationKind, Severity};
pub use config::Config;
pub use error::{ExportError, FeedError};
pub use models::{RawSnapshot, Reading};

//! Feed subscription boundary.
//!
//! The pipeline never talks to the backend directly. A [`SensorFeed`] pushes
//! [`FeedEvent`]s for one path into an ordered channel and hands back a
//! [`Subscription`] that releases the underlying stream when cancelled.
//!
//! This module follows the Explicit Module Boundary Pattern (EMBP): the
//! concrete transport lives in `firebase`, its wire decoder in `sse`, and only
//! the types below are exported.

use std::fmt;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::FeedError;

mod firebase;
mod sse;

pub use firebase::FirebaseFeed;

// ---

/// One delivery from the feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Entire current value at the subscribed path (`Null` when empty).
    Snapshot(Value),
    /// Transport failure. No further events follow.
    Error(FeedError),
}

/// Source of realtime values for a database path.
pub trait SensorFeed: Send + Sync + 'static {
    /// Start delivering events for `path`. Events are sent one at a time, in
    /// order, until the returned subscription is cancelled or the receiver
    /// goes away.
    fn subscribe(&self, path: &str, events: mpsc::Sender<FeedEvent>) -> Subscription;
}

/// Cancel handle for an active subscription.
///
/// The release action runs exactly once: on [`Subscription::cancel`], or on
/// drop if the handle was never cancelled.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    // ---
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Subscription backed by a spawned task; cancelling aborts the task.
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self::new(move || task.abort())
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        // ---
        if let Some(release) = self.release.take() {
            tracing::debug!("Releasing feed subscription");
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

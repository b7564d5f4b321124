//! HTTP surface for the dashboard front end.
//!
//! Each sibling module exports a subrouter; this gateway merges them and
//! attaches the shared [`AppState`] (EMBP).

use axum::Router;
use tokio::sync::{broadcast, watch};

use crate::pipeline::{DashboardView, PipelineHandle};
use crate::Notification;

mod dashboard;
mod export;
mod health;
mod notifications;

// ---

/// Read-only handles onto the running pipeline.
#[derive(Clone)]
pub struct AppState {
    // ---
    pub view: watch::Receiver<DashboardView>,
    pub notifications: broadcast::Sender<Notification>,
}

impl AppState {
    pub fn from_pipeline(handle: &PipelineHandle) -> Self {
        Self {
            view: handle.view(),
            notifications: handle.notifications(),
        }
    }

    /// Clone of the latest published view.
    pub fn snapshot(&self) -> DashboardView {
        self.view.borrow().clone()
    }
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(dashboard::router())
        .merge(export::router())
        .merge(notifications::router())
        .merge(health::router())
        .with_state(state)
}

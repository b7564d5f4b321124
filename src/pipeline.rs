//! Single-consumer pipeline: feed → normalizer → {history, alerts} → view.
//!
//! [`Pipeline`] is plain synchronous state. [`spawn`] wraps it in a tokio
//! task that pulls one [`FeedEvent`] at a time, processes it completely,
//! then publishes the resulting [`DashboardView`] and notifications. Nothing
//! else writes to the pipeline state.

use chrono::SecondsFormat;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::alerts::{AlertEngine, Cycle, Notification};
use crate::aqi::{self, AqiLevel};
use crate::feed::{FeedEvent, SensorFeed, Subscription};
use crate::history::HistoryBuffer;
use crate::insights::{self, Recommendation, Trend};
use crate::models::{self, RawSnapshot};
use crate::{Config, FeedError, Reading};

// Feed events buffered ahead of the pipeline.
const FEED_BUFFER: usize = 16;

// ---

/// Connection state as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum FeedStatus {
    Loading,
    Live,
    SensorUnavailable(String),
    FeedFailed(String),
}

/// Everything the view layer needs for one render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    // ---
    pub status: FeedStatus,
    pub current: Option<Reading>,
    pub level: Option<AqiLevel>,
    pub level_label: Option<&'static str>,
    pub trend: Option<Trend>,
    /// RFC 3339, or "Waiting for data..." before the first reading.
    pub last_updated: String,
    pub history: Vec<Reading>,
    pub recommendations: Vec<Recommendation>,
}

pub struct Pipeline {
    // ---
    history: HistoryBuffer,
    alerts: AlertEngine,
    current: Option<Reading>,
    status: FeedStatus,
    epoch_floor_ms: i64,
    clock: fn() -> i64,
}

impl Pipeline {
    // ---
    pub fn new(history_capacity: usize, epoch_floor_ms: i64) -> Self {
        Self {
            history: HistoryBuffer::new(history_capacity),
            alerts: AlertEngine::new(),
            current: None,
            status: FeedStatus::Loading,
            epoch_floor_ms,
            clock: models::now_millis,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.history_capacity, cfg.epoch_floor_ms)
    }

    /// Replace the wall clock used to repair timestamps.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Run one full cycle for a feed event.
    pub fn process(&mut self, event: FeedEvent) -> Vec<Notification> {
        // ---
        match event {
            FeedEvent::Snapshot(value) => {
                let raw = RawSnapshot::from_value(&value);
                match models::normalize(raw, self.epoch_floor_ms, self.clock) {
                    Ok(reading) => self.accept(reading),
                    Err(e) => self.disconnected(e),
                }
            }
            FeedEvent::Error(e) => {
                error!("Feed error: {}", e);
                self.alerts.observe_feed_failure();
                self.status = FeedStatus::FeedFailed(e.to_string());
                Vec::new()
            }
        }
    }

    fn accept(&mut self, reading: Reading) -> Vec<Notification> {
        // ---
        debug!(
            "Reading ts={} mq135={} mq2={} aqi={}",
            reading.timestamp, reading.gas_primary, reading.gas_secondary, reading.aqi
        );

        let notes = self.alerts.observe(Cycle::Reading(&reading));
        self.history.append(reading.clone());
        self.current = Some(reading);
        self.status = FeedStatus::Live;
        notes
    }

    fn disconnected(&mut self, e: FeedError) -> Vec<Notification> {
        // ---
        if self.current.is_some() {
            warn!("Sensor path has no data");
        }
        let notes = self.alerts.observe(Cycle::Disconnected);
        self.current = None;
        self.status = FeedStatus::SensorUnavailable(e.to_string());
        notes
    }

    pub fn current(&self) -> Option<&Reading> {
        self.current.as_ref()
    }

    pub fn history(&self) -> Vec<Reading> {
        self.history.snapshot()
    }

    pub fn status(&self) -> &FeedStatus {
        &self.status
    }

    pub fn view(&self) -> DashboardView {
        // ---
        let current = self.current.clone();
        let level = current.as_ref().map(|r| aqi::classify(r.aqi));
        let last_updated = current
            .as_ref()
            .and_then(Reading::recorded_at)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| "Waiting for data...".to_string());
        let recommendations = insights::recommendations(
            current.as_ref().map(|r| r.aqi),
            current.as_ref().and_then(|r| r.temperature),
            current.as_ref().and_then(|r| r.humidity),
        );

        DashboardView {
            status: self.status.clone(),
            level,
            level_label: level.map(|l| l.label()),
            trend: self.history.last_pair().map(|(p, l)| insights::trend(p, l)),
            last_updated,
            history: self.history.snapshot(),
            recommendations,
            current,
        }
    }
}

// ---

/// Running pipeline task and its outputs.
pub struct PipelineHandle {
    // ---
    view: watch::Receiver<DashboardView>,
    notifications: broadcast::Sender<Notification>,
    subscription: Option<Subscription>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// Subscribe `feed` to the configured sensor path and start processing.
pub fn spawn<F: SensorFeed + ?Sized>(feed: &F, cfg: &Config) -> PipelineHandle {
    spawn_pipeline(feed, &cfg.sensor_path(), Pipeline::from_config(cfg), cfg.notification_buffer)
}

/// Like [`spawn`] with an explicit path and a prepared [`Pipeline`].
pub fn spawn_pipeline<F: SensorFeed + ?Sized>(
    feed: &F,
    path: &str,
    pipeline: Pipeline,
    notification_buffer: usize,
) -> PipelineHandle {
    // ---
    let (view_tx, view_rx) = watch::channel(pipeline.view());
    let (notify_tx, _) = broadcast::channel(notification_buffer.max(1));
    let (feed_tx, feed_rx) = mpsc::channel(FEED_BUFFER);
    let (stop_tx, stop_rx) = oneshot::channel();

    // Start consuming before the feed can deliver.
    let task = tokio::spawn(run(pipeline, feed_rx, stop_rx, view_tx, notify_tx.clone()));
    let subscription = feed.subscribe(path, feed_tx);
    info!("Pipeline started for {}", path);

    PipelineHandle {
        view: view_rx,
        notifications: notify_tx,
        subscription: Some(subscription),
        stop: Some(stop_tx),
        task,
    }
}

async fn run(
    mut pipeline: Pipeline,
    mut events: mpsc::Receiver<FeedEvent>,
    mut stop: oneshot::Receiver<()>,
    view: watch::Sender<DashboardView>,
    notifications: broadcast::Sender<Notification>,
) {
    // ---
    loop {
        let event = tokio::select! {
            biased;
            _ = &mut stop => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let notes = pipeline.process(event);
        view.send_replace(pipeline.view());

        for note in notes {
            info!("Notification [{}]: {}", note.kind.as_str(), note.message);
            // No subscribers is fine; the view still carries the state.
            let _ = notifications.send(note);
        }
    }
    debug!("Pipeline loop finished");
}

impl PipelineHandle {
    // ---
    pub fn view(&self) -> watch::Receiver<DashboardView> {
        self.view.clone()
    }

    pub fn notifications(&self) -> broadcast::Sender<Notification> {
        self.notifications.clone()
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Cancel the feed subscription and wait for the loop to exit.
    pub async fn shutdown(mut self) {
        // ---
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            error!("Pipeline task failed: {}", e);
        }
        info!("Pipeline stopped");
    }
}

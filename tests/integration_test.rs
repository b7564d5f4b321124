use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use codemetal_airwatch::feed::{FeedEvent, SensorFeed, Subscription};
use codemetal_airwatch::pipeline::{self, FeedStatus, Pipeline, PipelineHandle};
use codemetal_airwatch::routes::{self, AppState};
use codemetal_airwatch::{FeedError, Notification, NotificationKind, Reading};

const FLOOR: i64 = 1_735_693_200_000;
const NOW: i64 = 1_760_000_000_000;
const WAIT: Duration = Duration::from_secs(5);

fn fixed_clock() -> i64 {
    NOW
}

// ---

/// In-memory feed driven by the test.
#[derive(Clone, Default)]
struct ScriptedFeed {
    // ---
    sender: Arc<Mutex<Option<mpsc::Sender<FeedEvent>>>>,
    paths: Arc<Mutex<Vec<String>>>,
    cancels: Arc<AtomicUsize>,
}

impl SensorFeed for ScriptedFeed {
    fn subscribe(&self, path: &str, events: mpsc::Sender<FeedEvent>) -> Subscription {
        // ---
        self.paths.lock().unwrap().push(path.to_string());
        *self.sender.lock().unwrap() = Some(events);

        let sender = Arc::clone(&self.sender);
        let cancels = Arc::clone(&self.cancels);
        Subscription::new(move || {
            cancels.fetch_add(1, Ordering::SeqCst);
            sender.lock().unwrap().take();
        })
    }
}

impl ScriptedFeed {
    async fn push(&self, event: FeedEvent) {
        let tx = self.sender.lock().unwrap().clone().expect("feed not subscribed");
        tx.send(event).await.expect("pipeline stopped");
    }

    async fn snapshot(&self, value: Value) {
        self.push(FeedEvent::Snapshot(value)).await;
    }

    fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

fn start(feed: &ScriptedFeed) -> PipelineHandle {
    // ---
    let pipeline = Pipeline::new(20, FLOOR).with_clock(fixed_clock);
    pipeline::spawn_pipeline(feed, "/airQuality/TEST_01", pipeline, 32)
}

async fn wait_for_history(handle: &PipelineHandle, len: usize) -> Result<()> {
    let mut view = handle.view();
    timeout(WAIT, view.wait_for(|v| v.history.len() == len)).await??;
    Ok(())
}

fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<NotificationKind> {
    // ---
    let mut kinds = Vec::new();
    while let Ok(note) = rx.try_recv() {
        kinds.push(note.kind);
    }
    kinds
}

fn sample(mq135: u32) -> Value {
    json!({"mq135": mq135, "mq2": 100, "temperature": 22.5, "humidity": 45, "timestamp": NOW - 1_000})
}

async fn serve(handle: &PipelineHandle) -> Result<SocketAddr> {
    // ---
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = routes::router(AppState::from_pipeline(handle));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(addr)
}

// ---

#[tokio::test]
async fn end_to_end_reading_then_disconnect() -> Result<()> {
    // ---
    let feed = ScriptedFeed::default();
    let handle = start(&feed);
    let mut notes = handle.subscribe_notifications();

    feed.snapshot(json!({
        "mq135": 1200, "mq2": 100, "temperature": 36, "humidity": 85, "timestamp": NOW - 2_000
    }))
    .await;
    wait_for_history(&handle, 1).await?;

    feed.snapshot(json!({})).await;
    let mut view = handle.view();
    timeout(WAIT, view.wait_for(|v| v.current.is_none() && v.status != FeedStatus::Live)).await??;

    let history = handle.view().borrow().history.clone();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].aqi, 120);
    assert_eq!(history[0].timestamp, NOW - 2_000);

    handle.shutdown().await;
    assert_eq!(
        drain(&mut notes),
        vec![
            NotificationKind::HighAqi,
            NotificationKind::HighTemperature,
            NotificationKind::HighHumidity,
            NotificationKind::Disconnected,
        ]
    );
    assert_eq!(feed.cancels(), 1);
    assert_eq!(*feed.paths.lock().unwrap(), vec!["/airQuality/TEST_01".to_string()]);
    Ok(())
}

#[tokio::test]
async fn disconnect_edges_fire_once() -> Result<()> {
    // ---
    let feed = ScriptedFeed::default();
    let handle = start(&feed);
    let mut notes = handle.subscribe_notifications();

    feed.snapshot(sample(200)).await;
    feed.snapshot(Value::Null).await;
    feed.snapshot(Value::Null).await;
    feed.snapshot(sample(300)).await;
    wait_for_history(&handle, 2).await?;

    handle.shutdown().await;
    assert_eq!(
        drain(&mut notes),
        vec![NotificationKind::Disconnected, NotificationKind::Reconnected]
    );
    Ok(())
}

#[tokio::test]
async fn high_aqi_alerts_on_each_crossing() -> Result<()> {
    // ---
    let feed = ScriptedFeed::default();
    let handle = start(&feed);
    let mut rx = handle.subscribe_notifications();

    // mq135 / 10 == AQI
    for mq135 in [300, 1200, 1300, 400, 1500] {
        feed.snapshot(json!({"mq135": mq135, "timestamp": NOW})).await;
    }
    wait_for_history(&handle, 5).await?;
    handle.shutdown().await;

    let mut values = Vec::new();
    while let Ok(note) = rx.try_recv() {
        assert_eq!(note.kind, NotificationKind::HighAqi);
        values.push(note.value);
    }
    assert_eq!(values, vec![Some(120.0), Some(150.0)]);
    Ok(())
}

#[tokio::test]
async fn shutdown_before_any_data_cancels_once() -> Result<()> {
    // ---
    let feed = ScriptedFeed::default();
    let handle = start(&feed);

    handle.shutdown().await;
    assert_eq!(feed.cancels(), 1);
    assert!(feed.sender.lock().unwrap().is_none());
    Ok(())
}

#[tokio::test]
async fn feed_failure_is_reported_as_banner() -> Result<()> {
    // ---
    let feed = ScriptedFeed::default();
    let handle = start(&feed);
    let mut notes = handle.subscribe_notifications();

    feed.push(FeedEvent::Error(FeedError::ConnectionFailed("HTTP 401".into())))
        .await;
    let mut view = handle.view();
    timeout(WAIT, view.wait_for(|v| matches!(v.status, FeedStatus::FeedFailed(_)))).await??;

    handle.shutdown().await;
    assert!(drain(&mut notes).is_empty());
    Ok(())
}

#[tokio::test]
async fn http_endpoints_expose_pipeline_state() -> Result<()> {
    // ---
    let feed = ScriptedFeed::default();
    let handle = start(&feed);
    let base = format!("http://{}", serve(&handle).await?);
    let client = Client::new();

    let health: Value = client.get(format!("{base}/health")).send().await?.json().await?;
    assert_eq!(health, json!({"status": "ok"}));

    let resp = tokio_test::assert_ok!(client.get(format!("{base}/api/history.csv")).send().await);
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let current: Option<Reading> = client.get(format!("{base}/api/current")).send().await?.json().await?;
    assert!(current.is_none());

    feed.snapshot(sample(500)).await;
    feed.snapshot(json!({"mq135": 900, "mq2": 0, "timestamp": 1000})).await;
    wait_for_history(&handle, 2).await?;

    let current: Option<Reading> = client.get(format!("{base}/api/current")).send().await?.json().await?;
    let current = current.expect("current reading");
    assert_eq!(current.aqi, 90);
    assert_eq!(current.timestamp, NOW);
    assert_eq!(current.temperature, None);

    let history: Vec<Reading> = client.get(format!("{base}/api/history")).send().await?.json().await?;
    assert_eq!(history.iter().map(|r| r.aqi).collect::<Vec<_>>(), vec![50, 90]);

    let dashboard: Value = client.get(format!("{base}/api/dashboard")).send().await?.json().await?;
    assert_eq!(dashboard["status"]["state"], "live");
    assert_eq!(dashboard["level"], "Moderate");
    assert_eq!(dashboard["trend"], "up");
    assert_eq!(dashboard["history"].as_array().map(Vec::len), Some(2));

    let resp = client.get(format!("{base}/api/history.csv")).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.contains("air-quality-data.csv"));

    let csv = resp.text().await?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "timestamp,mq135,mq2,temperature,humidity,aqi");
    assert_eq!(lines.len(), 3);
    assert!(lines[2].ends_with(",,,90"));

    handle.shutdown().await;
    Ok(())
}

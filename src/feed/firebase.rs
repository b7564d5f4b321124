//! Realtime Database REST streaming client.
//!
//! Opens `GET {base}{path}.json` with `Accept: text/event-stream` and keeps a
//! local copy of the value at `path`, updated by `put` and `patch` events.
//! After each update the whole value is delivered, mirroring a value
//! listener. A stream that drops after it was established is re-opened
//! here; failures before that, HTTP errors, `cancel` and `auth_revoked` are
//! reported once as [`FeedError::ConnectionFailed`] and end the task.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::sse::{SseDecoder, SseEvent};
use super::{FeedEvent, SensorFeed, Subscription};
use crate::{Config, FeedError};

// ---

#[derive(Debug, Clone)]
pub struct FirebaseFeed {
    // ---
    client: reqwest::Client,
    base_url: String,
    reconnect_delay: Duration,
}

impl FirebaseFeed {
    // ---
    pub fn new(base_url: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            reconnect_delay,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.firebase_url.clone(),
            Duration::from_millis(cfg.feed_reconnect_delay_ms),
        )
    }

    fn stream_url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }
}

impl SensorFeed for FirebaseFeed {
    fn subscribe(&self, path: &str, events: mpsc::Sender<FeedEvent>) -> Subscription {
        // ---
        let client = self.client.clone();
        let url = self.stream_url(path);
        let delay = self.reconnect_delay;

        info!("Subscribing to realtime feed: {}", url);
        Subscription::from_task(tokio::spawn(run(client, url, delay, events)))
    }
}

/// How one streaming request ended.
enum StreamEnd {
    /// Network error or EOF; eligible for re-open once connected.
    Dropped(String),
    /// Server refused or revoked the subscription.
    Fatal(String),
    /// Nobody is listening anymore.
    Closed,
}

async fn run(client: reqwest::Client, url: String, delay: Duration, events: mpsc::Sender<FeedEvent>) {
    // ---
    let mut value = Value::Null;
    let mut connected = false;

    loop {
        let reason = match stream_once(&client, &url, &mut value, &events, &mut connected).await {
            StreamEnd::Closed => {
                debug!("Feed receiver closed, stopping stream for {}", url);
                return;
            }
            StreamEnd::Dropped(reason) if connected => {
                warn!("Feed stream dropped ({}), reopening in {:?}", reason, delay);
                tokio::time::sleep(delay).await;
                continue;
            }
            StreamEnd::Dropped(reason) | StreamEnd::Fatal(reason) => reason,
        };

        error!("Feed connection failed: {}", reason);
        let _ = events
            .send(FeedEvent::Error(FeedError::ConnectionFailed(reason)))
            .await;
        return;
    }
}

async fn stream_once(
    client: &reqwest::Client,
    url: &str,
    value: &mut Value,
    events: &mpsc::Sender<FeedEvent>,
    connected: &mut bool,
) -> StreamEnd {
    // ---
    let response = match client.get(url).header(ACCEPT, "text/event-stream").send().await {
        Ok(response) => response,
        Err(e) => return StreamEnd::Dropped(e.to_string()),
    };

    let status = response.status();
    if !status.is_success() {
        return StreamEnd::Fatal(format!("HTTP {} from {}", status, url));
    }
    *connected = true;
    debug!("Feed stream open: {}", url);

    let mut decoder = SseDecoder::default();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return StreamEnd::Dropped(e.to_string()),
        };

        let decoded = match decoder.push(&chunk) {
            Ok(decoded) => decoded,
            Err(e) => return StreamEnd::Fatal(e.to_string()),
        };
        for event in decoded {
            match apply_event(value, &event) {
                Ok(Some(snapshot)) => {
                    if events.send(FeedEvent::Snapshot(snapshot)).await.is_err() {
                        return StreamEnd::Closed;
                    }
                }
                Ok(None) => {}
                Err(reason) => return StreamEnd::Fatal(reason),
            }
        }
    }

    StreamEnd::Dropped("stream ended".to_string())
}

#[derive(Debug, Deserialize)]
struct Update {
    path: String,
    data: Value,
}

/// Apply one server event to the cached value. Returns the new value when
/// it changed, `Err` when the server ended the subscription.
fn apply_event(value: &mut Value, event: &SseEvent) -> Result<Option<Value>, String> {
    // ---
    match event.event.as_str() {
        "put" | "patch" => {
            let update: Update = match serde_json::from_str(&event.data) {
                Ok(update) => update,
                Err(e) => {
                    warn!("Ignoring malformed {} payload: {} - Raw: {}", event.event, e, event.data);
                    return Ok(None);
                }
            };

            if event.event == "put" {
                set_at(value, &update.path, update.data);
            } else if let Value::Object(children) = update.data {
                let base = update.path.trim_end_matches('/');
                for (key, child) in children {
                    set_at(value, &format!("{base}/{key}"), child);
                }
            }
            Ok(Some(value.clone()))
        }
        "keep-alive" => Ok(None),
        "cancel" => Err(format!("subscription cancelled by server: {}", event.data)),
        "auth_revoked" => Err("authorization revoked".to_string()),
        other => {
            debug!("Ignoring feed event '{}'", other);
            Ok(None)
        }
    }
}

/// Write `data` at a slash-separated `path` below `root`; `null` deletes.
fn set_at(root: &mut Value, path: &str, data: Value) {
    // ---
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        *root = data;
        return;
    };

    let mut node = root;
    for segment in parents {
        node = object_mut(node)
            .entry(segment.to_string())
            .or_insert(Value::Null);
    }

    let map = object_mut(node);
    if data.is_null() {
        map.remove(*last);
    } else {
        map.insert(last.to_string(), data);
    }
}

fn object_mut(node: &mut Value) -> &mut Map<String, Value> {
    // ---
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

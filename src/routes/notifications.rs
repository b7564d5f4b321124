//! Server-Sent Events stream of pipeline notifications.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use tokio_stream::{wrappers::BroadcastStream, StreamExt as _};
use tracing::{debug, warn};

use super::AppState;

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/api/notifications", get(handler))
}

async fn handler(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // ---
    debug!("GET /api/notifications - client subscribed");
    let rx = state.notifications.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(note) => {
            let data = serde_json::to_string(&note).unwrap_or_default();
            Some(Ok(Event::default()
                .event(note.kind.as_str())
                .id(note.id.to_string())
                .data(data)))
        }
        Err(e) => {
            // Lagged receivers skip what they missed.
            warn!("Notification stream lagged: {}", e);
            None
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

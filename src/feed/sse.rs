//! Incremental decoder for `text/event-stream` bodies.
//!
//! Chunks may split lines (and UTF-8 sequences) anywhere, so bytes are
//! buffered until a full line is available. The buffer is bounded: a stream
//! that never terminates its lines or events is rejected.

use thiserror::Error;

/// Upper bound on bytes held for one partial line plus the event being built.
pub const MAX_BUFFERED_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event stream buffered more than {0} bytes without completing an event")]
pub struct BufferOverflow(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

#[derive(Debug)]
pub struct SseDecoder {
    // ---
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    data_bytes: usize,
    limit: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_BUFFERED_BYTES)
    }
}

impl SseDecoder {
    // ---
    pub fn with_limit(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            event: None,
            data: Vec::new(),
            data_bytes: 0,
            limit,
        }
    }

    /// Feed a body chunk and collect every event it completes.
    ///
    /// Fails once the unfinished line and the pending event data together
    /// exceed the decoder's limit. The decoder is unusable after that.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, BufferOverflow> {
        // ---
        self.pending.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(|c| c == '\n' || c == '\r');
            if let Some(event) = self.process_line(line) {
                out.push(event);
            }
            if self.data_bytes > self.limit {
                return Err(BufferOverflow(self.limit));
            }
        }

        if self.pending.len() + self.data_bytes > self.limit {
            return Err(BufferOverflow(self.limit));
        }
        Ok(out)
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        // ---
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data_bytes += value.len();
                self.data.push(value.to_string());
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        // ---
        let event = self.event.take();
        if self.data.is_empty() && event.is_none() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        self.data_bytes = 0;
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

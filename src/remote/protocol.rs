//! Wire format of the event-stream channel.
//!
//! The service pushes `text/event-stream` frames: an `event:` line
//! naming the event, one or more `data:` lines carrying a JSON payload,
//! and a blank line ending the frame. Write notifications (`put`,
//! `patch`) carry `{"path": "...", "data": ...}` payloads scoped to the
//! subscribed location.

use serde::Deserialize;
use serde_json::Value;

use super::error::RemoteWriteError;

/// Payload of a `put` or `patch` frame.
#[derive(Debug, Clone, Deserialize)]
struct WritePayload {
    path: String,
    data: Value,
}

/// One event pushed by the service over the stream channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// The value at `path` was replaced with `data`.
    Put { path: String, data: Value },
    /// The children named in `data` were written into `path`.
    Patch { path: String, data: Value },
    /// Periodic no-op keeping the connection open.
    KeepAlive,
    /// The server ended the listen (rules changed, location gone).
    Cancel,
    /// The credential backing the listen expired or was revoked.
    AuthRevoked,
}

impl ServerEvent {
    /// Decodes one complete frame. Unknown event names are skipped.
    pub fn decode(event: &str, data: &str) -> Result<Option<ServerEvent>, RemoteWriteError> {
        match event {
            "put" | "patch" => {
                let payload: WritePayload = serde_json::from_str(data)
                    .map_err(|e| RemoteWriteError::new(format!("bad stream payload: {}", e)))?;
                Ok(Some(if event == "put" {
                    ServerEvent::Put {
                        path: payload.path,
                        data: payload.data,
                    }
                } else {
                    ServerEvent::Patch {
                        path: payload.path,
                        data: payload.data,
                    }
                }))
            }
            "keep-alive" => Ok(Some(ServerEvent::KeepAlive)),
            "cancel" => Ok(Some(ServerEvent::Cancel)),
            "auth_revoked" => Ok(Some(ServerEvent::AuthRevoked)),
            _ => Ok(None),
        }
    }
}

/// Incremental parser for `text/event-stream` framing.
///
/// Feed raw body bytes as they arrive; complete frames come out as
/// `(event name, joined data)` pairs. Bytes are buffered until a full
/// line is available, so multi-byte characters split across chunks
/// survive. Comment lines (leading `:`) and unknown fields are ignored,
/// CRLF line endings are tolerated, and multiple `data:` lines join
/// with a newline.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes a chunk of the response body, returning every frame it
    /// completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<(String, String)> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(&['\r', '\n'][..]);

            if line.is_empty() {
                if let Some(event) = self.event.take() {
                    frames.push((event, self.data.join("\n")));
                }
                self.data.clear();
            } else if let Some(rest) = line.strip_prefix("event:") {
                self.event = Some(rest.trim_start().to_string());
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            }
        }

        frames
    }
}

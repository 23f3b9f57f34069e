//! Live subscription to a remote location.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::client::Reference;
use super::error::RemoteWriteError;
use super::protocol::{FrameParser, ServerEvent};

/// A change at one child of the subscribed location.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildEvent {
    /// A child appeared: part of the initial snapshot, or newly created.
    Added { key: String, value: Value },
    /// An existing child's value was replaced or partially written.
    Changed { key: String, value: Value },
    /// A child was removed.
    Removed { key: String },
}

/// An open listen on a remote location.
///
/// Delivers the current entries first (one [`ChildEvent::Added`] per
/// existing child), then an open-ended, order-unspecified sequence of
/// changes for as long as the subscription is held. Dropping it
/// detaches the listener and ends the stream. A `cancel` or
/// `auth_revoked` from the service surfaces as one final `Err` item.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Result<ChildEvent, RemoteWriteError>>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) async fn open(reference: Reference) -> Result<Self, RemoteWriteError> {
        tracing::debug!("subscribe at {}", reference.path());
        let response = reference
            .http()
            .get(reference.url())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RemoteWriteError::new(format!(
                "service returned status {}",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(read_loop(response, tx));
        Ok(Self { rx, task })
    }

    /// Waits for the next change. `None` means the stream ended without
    /// a service-reported failure.
    pub async fn next_event(&mut self) -> Option<Result<ChildEvent, RemoteWriteError>> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = Result<ChildEvent, RemoteWriteError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Reads the event-stream body and forwards classified child events
/// until the body ends, the receiver is dropped, or the service ends
/// the listen.
async fn read_loop(
    response: reqwest::Response,
    tx: mpsc::UnboundedSender<Result<ChildEvent, RemoteWriteError>>,
) {
    let mut body = response.bytes_stream();
    let mut parser = FrameParser::new();
    let mut tracker = ChildTracker::default();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx.send(Err(RemoteWriteError::new(e.to_string())));
                return;
            }
        };

        for (event, data) in parser.feed(&chunk) {
            let event = match ServerEvent::decode(&event, &data) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(e) => {
                    let _ = tx.send(Err(e));
                    return;
                }
            };

            match event {
                ServerEvent::KeepAlive => {}
                ServerEvent::Cancel => {
                    tracing::warn!("listen cancelled by the service");
                    let _ = tx.send(Err(RemoteWriteError::new("listen cancelled by the service")));
                    return;
                }
                ServerEvent::AuthRevoked => {
                    tracing::warn!("listen auth revoked");
                    let _ = tx.send(Err(RemoteWriteError::new("auth credential revoked")));
                    return;
                }
                event => {
                    for child_event in tracker.apply(event) {
                        if tx.send(Ok(child_event)).is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Classifies path-scoped writes into per-child events.
///
/// The service reports writes as puts and patches relative to the
/// subscribed location; telling an add from a change requires knowing
/// which children exist, and reporting a deep write as a change
/// requires the child's current value. Both live here, owned entirely
/// by the reader task.
#[derive(Debug, Default)]
struct ChildTracker {
    children: Map<String, Value>,
}

impl ChildTracker {
    fn apply(&mut self, event: ServerEvent) -> Vec<ChildEvent> {
        match event {
            ServerEvent::Put { path, data } => self.apply_put(&segments(&path), data),
            ServerEvent::Patch { path, data } => self.apply_patch(&segments(&path), data),
            _ => Vec::new(),
        }
    }

    fn apply_put(&mut self, path: &[&str], data: Value) -> Vec<ChildEvent> {
        match path {
            [] => self.resync(data),
            [key] => {
                if is_empty(&data) {
                    match self.children.remove(*key) {
                        Some(_) => vec![ChildEvent::Removed {
                            key: key.to_string(),
                        }],
                        None => Vec::new(),
                    }
                } else {
                    let existed = self
                        .children
                        .insert(key.to_string(), data.clone())
                        .is_some();
                    vec![child_event(existed, key, data)]
                }
            }
            [key, rest @ ..] => self.apply_deep(key, |value| set_nested(value, rest, data)),
        }
    }

    fn apply_patch(&mut self, path: &[&str], data: Value) -> Vec<ChildEvent> {
        let Value::Object(entries) = data else {
            return Vec::new();
        };
        match path {
            [] => {
                let mut events = Vec::new();
                for (key, value) in entries {
                    if is_empty(&value) {
                        if self.children.remove(&key).is_some() {
                            events.push(ChildEvent::Removed { key });
                        }
                    } else {
                        let existed = self.children.insert(key.clone(), value.clone()).is_some();
                        events.push(child_event(existed, &key, value));
                    }
                }
                events
            }
            [key, rest @ ..] => self.apply_deep(key, |value| {
                for (field, field_value) in entries {
                    let mut path: Vec<&str> = rest.to_vec();
                    path.push(&field);
                    set_nested(value, &path, field_value);
                }
            }),
        }
    }

    /// Mutates one child's value in place and reports the resulting
    /// event. A child left null or empty by the write is gone.
    fn apply_deep(&mut self, key: &str, write: impl FnOnce(&mut Value)) -> Vec<ChildEvent> {
        let existed = self.children.contains_key(key);
        let mut value = self.children.remove(key).unwrap_or(Value::Null);
        write(&mut value);

        if is_empty(&value) {
            if existed {
                vec![ChildEvent::Removed {
                    key: key.to_string(),
                }]
            } else {
                Vec::new()
            }
        } else {
            self.children.insert(key.to_string(), value.clone());
            vec![child_event(existed, key, value)]
        }
    }

    /// A put at the subscribed location itself replaces everything:
    /// the initial snapshot arrives this way, and so does any later
    /// whole-collection write. Diffing against the known children keeps
    /// the event sequence consistent.
    fn resync(&mut self, data: Value) -> Vec<ChildEvent> {
        let mut new = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        new.retain(|_, value| !is_empty(value));

        let old = std::mem::take(&mut self.children);
        let mut events = Vec::new();

        for key in old.keys() {
            if !new.contains_key(key) {
                events.push(ChildEvent::Removed { key: key.clone() });
            }
        }
        for (key, value) in &new {
            match old.get(key) {
                None => events.push(ChildEvent::Added {
                    key: key.clone(),
                    value: value.clone(),
                }),
                Some(prev) if prev != value => events.push(ChildEvent::Changed {
                    key: key.clone(),
                    value: value.clone(),
                }),
                Some(_) => {}
            }
        }

        self.children = new;
        events
    }
}

fn child_event(existed: bool, key: &str, value: Value) -> ChildEvent {
    if existed {
        ChildEvent::Changed {
            key: key.to_string(),
            value,
        }
    } else {
        ChildEvent::Added {
            key: key.to_string(),
            value,
        }
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Writes `data` at a nested path inside `value`, creating intermediate
/// objects; a null leaf deletes the field instead.
fn set_nested(value: &mut Value, path: &[&str], data: Value) {
    let Some((head, rest)) = path.split_first() else {
        *value = data;
        return;
    };
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    if let Value::Object(map) = value {
        if rest.is_empty() && data.is_null() {
            map.remove(*head);
        } else {
            set_nested(
                map.entry(head.to_string()).or_insert(Value::Null),
                rest,
                data,
            );
        }
    }
}

/// The service stores no empty nodes: null and `{}` both mean absent.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

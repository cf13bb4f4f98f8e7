//! Post mutation notifications
//!
//! Successful mutations are announced on a bounded queue. Delivery is
//! fire-and-forget: when the queue is full or nobody is listening the event
//! is dropped with a log line and the request carries on.

use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Kind of mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostEventKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for PostEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PostEventKind::Create => "create",
            PostEventKind::Update => "update",
            PostEventKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// A post was created, updated or deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostEvent {
    pub kind: PostEventKind,
    /// URL path of the post, `/{identifier}`
    pub url: String,
}

impl PostEvent {
    pub fn new(kind: PostEventKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
        }
    }
}

/// Sending half of the event queue
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<PostEvent>,
}

impl EventSender {
    /// Queue an event without waiting. Returns whether it was queued.
    pub fn emit(&self, event: PostEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!("Event queue full, dropping {} event for {}", event.kind, event.url);
                false
            }
            Err(TrySendError::Closed(event)) => {
                tracing::debug!("No event listener, dropping {} event for {}", event.kind, event.url);
                false
            }
        }
    }
}

/// Create a bounded event queue holding at most `capacity` events
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<PostEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender { tx }, rx)
}

/// Default consumer: log every event until all senders are gone
pub async fn log_events(mut rx: mpsc::Receiver<PostEvent>) {
    while let Some(event) = rx.recv().await {
        tracing::info!("Post {}: {}", event.kind, event.url);
    }
    tracing::debug!("Event queue closed");
}

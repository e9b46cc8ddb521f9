//! In-process change feed backed by a `tokio::sync::broadcast` channel.
//!
//! [`ChangeFeed`] is the publish side of an entity store's change
//! notifications. Stores publish a [`ChangeEvent`] after every successful
//! write; callers obtain a filtered [`Subscription`] for one collection.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tradeit_core::types::EntityId;

// ---------------------------------------------------------------------------
// ChangeEvent
// ---------------------------------------------------------------------------

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Put,
    Patched,
    Deleted,
}

/// A single write observed on the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Collection name, e.g. `"listings"`.
    pub collection: String,

    /// Key of the record that changed.
    pub key: EntityId,

    pub kind: ChangeKind,

    /// Field names touched by a patch. Empty for puts and deletes.
    pub fields: Vec<String>,

    /// The record as it stood after the write. `None` for deletes.
    pub record: Option<serde_json::Value>,

    /// When the store applied the write (UTC).
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(collection: impl Into<String>, key: EntityId, kind: ChangeKind) -> Self {
        Self {
            collection: collection.into(),
            key,
            kind,
            fields: Vec::new(),
            record: None,
            timestamp: Utc::now(),
        }
    }

    /// Record the field names a patch touched.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Attach the post-write record.
    pub fn with_record(mut self, record: serde_json::Value) -> Self {
        self.record = Some(record);
        self
    }

    /// Read a field of the post-write record.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.record.as_ref().and_then(|r| r.get(name))
    }
}

/// Filter applied to a collection's events before they reach a subscriber.
pub type ChangePredicate = Arc<dyn Fn(&ChangeEvent) -> bool + Send + Sync>;

// ---------------------------------------------------------------------------
// ChangeFeed
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out hub for store change events.
///
/// # Usage
///
/// ```rust
/// use tradeit_core::types::EntityId;
/// use tradeit_events::bus::{ChangeEvent, ChangeFeed, ChangeKind};
///
/// let feed = ChangeFeed::default();
/// let _sub = feed.subscribe("listings", |_| true);
///
/// feed.publish(ChangeEvent::new("listings", EntityId::nil(), ChangeKind::Put));
/// ```
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    /// Create a feed with a specific channel capacity.
    ///
    /// When the buffer is full the oldest events are dropped and slow
    /// subscribers observe a lag, which they log and skip past.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: ChangeEvent) {
        // A send error only means nobody is listening.
        let _ = self.sender.send(event);
    }

    /// Subscribe to one collection, keeping only events matching `predicate`.
    pub fn subscribe<F>(&self, collection: impl Into<String>, predicate: F) -> Subscription
    where
        F: Fn(&ChangeEvent) -> bool + Send + Sync + 'static,
    {
        Subscription {
            receiver: self.sender.subscribe(),
            collection: collection.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Number of events a subscriber missed because the feed buffer overflowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lagged(pub u64);

/// A filtered view of the feed for a single collection.
pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    collection: String,
    predicate: ChangePredicate,
}

impl Subscription {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn matches(&self, event: &ChangeEvent) -> bool {
        event.collection == self.collection && (self.predicate)(event)
    }

    /// Wait for the next matching event. Returns `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        collection = %self.collection,
                        skipped,
                        "Change subscription lagged, some events were dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv). Returns `None` when no
    /// matching event is buffered.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.try_recv_checked() {
                Ok(next) => return next,
                Err(Lagged(skipped)) => {
                    tracing::warn!(
                        collection = %self.collection,
                        skipped,
                        "Change subscription lagged, some events were dropped"
                    );
                }
            }
        }
    }

    /// Like [`try_recv`](Self::try_recv), but reports a lag to the caller
    /// instead of skipping past it. Consumers that mirror store state must
    /// resynchronise after a lag.
    pub fn try_recv_checked(&mut self) -> Result<Option<ChangeEvent>, Lagged> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.matches(&event) => return Ok(Some(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => return Err(Lagged(skipped)),
                Err(_) => return Ok(None),
            }
        }
    }

    /// Convert into a `Stream` of matching events.
    pub fn into_stream(self) -> impl Stream<Item = ChangeEvent> + Send + 'static {
        let Subscription {
            receiver,
            collection,
            predicate,
        } = self;

        BroadcastStream::new(receiver).filter_map(move |item| {
            let next = match item {
                Ok(event) if event.collection == collection && predicate(&event) => Some(event),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        collection = %collection,
                        skipped,
                        "Change stream lagged, some events were dropped"
                    );
                    None
                }
            };
            futures::future::ready(next)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Per-client cache of category titles.
//!
//! Each party client keeps the titles it has already read so that the
//! completion snapshot can be taken without another round trip. A cache
//! built with [`CategoryTitleCache::synced`] follows the categories change
//! feed, so renames and deletions made by other clients replace or evict
//! its entries before the next read.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::Mutex;
use tradeit_core::category::FIELD_TITLE;
use tradeit_core::types::EntityId;
use tradeit_events::{ChangeEvent, ChangeKind, Lagged, Subscription};

pub struct CategoryTitleCache {
    inner: Mutex<Inner>,
}

struct Inner {
    titles: HashMap<EntityId, String>,
    changes: Option<Subscription>,
}

impl Inner {
    /// Apply every buffered category change to `titles`.
    fn sync(&mut self) {
        let Some(changes) = self.changes.as_mut() else {
            return;
        };
        loop {
            match changes.try_recv_checked() {
                Ok(Some(event)) => apply(&mut self.titles, &event),
                Ok(None) => return,
                Err(Lagged(skipped)) => {
                    tracing::warn!(
                        skipped,
                        cached = self.titles.len(),
                        "Category feed lagged, dropping cached titles"
                    );
                    self.titles.clear();
                }
            }
        }
    }
}

fn apply(titles: &mut HashMap<EntityId, String>, event: &ChangeEvent) {
    let title = match event.kind {
        ChangeKind::Deleted => None,
        ChangeKind::Put | ChangeKind::Patched => event.field(FIELD_TITLE).and_then(Value::as_str),
    };
    match title {
        Some(title) => {
            titles.insert(event.key, title.to_string());
        }
        None => {
            if titles.remove(&event.key).is_some() {
                tracing::debug!(category_id = %event.key, "Evicted cached category title");
            }
        }
    }
}

impl CategoryTitleCache {
    /// A cache that only changes through its own calls.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A cache kept in step with `changes`, a subscription to the
    /// categories collection.
    pub fn synced(changes: Subscription) -> Self {
        Self::build(Some(changes))
    }

    fn build(changes: Option<Subscription>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                titles: HashMap::new(),
                changes,
            }),
        }
    }

    pub async fn get(&self, category_id: EntityId) -> Option<String> {
        let mut inner = self.inner.lock().await;
        inner.sync();
        inner.titles.get(&category_id).cloned()
    }

    pub async fn insert(&self, category_id: EntityId, title: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.sync();
        inner.titles.insert(category_id, title.into());
    }

    pub async fn remove(&self, category_id: EntityId) {
        let mut inner = self.inner.lock().await;
        inner.sync();
        inner.titles.remove(&category_id);
    }

    pub async fn len(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.sync();
        inner.titles.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for CategoryTitleCache {
    fn default() -> Self {
        Self::new()
    }
}

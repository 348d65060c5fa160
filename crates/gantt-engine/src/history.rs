//! Per-connection conversation histories.
//!
//! The store is a process-scoped registry keyed by connection. A connection
//! is admitted with [`ConversationStore::open`]; its history is created
//! lazily on the first message, seeded with the priming message, and removed
//! when the connection closes. Nothing else reclaims it, so a closed or
//! never-opened connection can not get a history.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard};

use gantt_core::{ConnectionId, Message};

/// One connection's history.
///
/// The mutex is held for the whole of a turn, so turns on the same
/// connection never interleave.
#[derive(Debug)]
pub struct ConversationSlot {
    history: Mutex<Vec<Message>>,
    retired: AtomicBool,
}

impl ConversationSlot {
    fn new(priming: String) -> Self {
        Self {
            history: Mutex::new(vec![Message::priming(priming)]),
            retired: AtomicBool::new(false),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        self.history.lock().await
    }

    pub async fn snapshot(&self) -> Vec<Message> {
        self.history.lock().await.clone()
    }

    /// Set once the connection is gone. An in-flight turn must not write
    /// back into a retired slot.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    /// Open connections. `None` until the first message creates a history.
    slots: DashMap<ConnectionId, Option<Arc<ConversationSlot>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a connection. No history exists until its first message.
    pub fn open(&self, connection_id: &ConnectionId) {
        let _ = self.slots.entry(connection_id.clone()).or_insert(None);
    }

    /// Existing history for `connection_id`, or a new one holding only the
    /// priming message. `priming` runs only when a history is created.
    ///
    /// Returns `None` for a connection that is not open, including one that
    /// has already been deleted.
    pub fn get_or_create(
        &self,
        connection_id: &ConnectionId,
        priming: impl FnOnce() -> String,
    ) -> Option<Arc<ConversationSlot>> {
        // The shard lock is held across the check and the insert, so a
        // concurrent delete either runs first (None) or sees the new slot.
        let mut entry = self.slots.get_mut(connection_id)?;
        let slot = entry
            .value_mut()
            .get_or_insert_with(|| Arc::new(ConversationSlot::new(priming())));
        Some(Arc::clone(slot))
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<Arc<ConversationSlot>> {
        self.slots
            .get(connection_id)
            .and_then(|entry| entry.value().as_ref().map(Arc::clone))
    }

    /// Close a connection and drop its history. Returns whether a history
    /// existed.
    pub fn delete(&self, connection_id: &ConnectionId) -> bool {
        match self.slots.remove(connection_id) {
            Some((_, Some(slot))) => {
                slot.retire();
                true
            }
            _ => false,
        }
    }

    pub fn is_open(&self, connection_id: &ConnectionId) -> bool {
        self.slots.contains_key(connection_id)
    }

    /// Whether a history exists for the connection.
    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.get(connection_id).is_some()
    }

    /// Number of live histories.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|entry| entry.value().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Apply the retention cap: keep the priming message plus the most recent
/// `max_pairs * 2` messages.
pub fn trim(history: &mut Vec<Message>, max_pairs: usize) {
    let keep = max_pairs.saturating_mul(2);
    let limit = keep.saturating_add(1);
    if history.len() > limit {
        let excess = history.len() - limit;
        let _ = history.drain(1..1 + excess);
    }
}

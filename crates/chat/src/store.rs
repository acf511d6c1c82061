use std::collections::HashMap;
use std::sync::Arc;

use boshu_core::{MessageId, Session};
use tokio::sync::Mutex;

use crate::body::StructuredBody;

/// A live session together with the body last written to the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub session: Session,
    pub body: StructuredBody,
}

/// Per-session slot. Holding the lock serializes every read-modify-write of
/// one session; an empty slot means the session has not been loaded yet.
pub type SessionSlot = Arc<Mutex<Option<SessionRecord>>>;

#[derive(Default)]
pub struct SessionStore {
    slots: Mutex<HashMap<MessageId, SessionSlot>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn slot(&self, message_id: &MessageId) -> SessionSlot {
        let mut slots = self.slots.lock().await;
        slots.entry(message_id.clone()).or_default().clone()
    }

    /// Returns false when the slot was already populated, e.g. rehydrated by
    /// a reaction that raced the post confirmation.
    pub async fn insert_if_absent(&self, message_id: MessageId, record: SessionRecord) -> bool {
        let slot = self.slot(&message_id).await;
        let mut guard = slot.lock().await;
        if guard.is_some() {
            return false;
        }
        *guard = Some(record);
        true
    }

    pub async fn snapshot(&self, message_id: &MessageId) -> Option<SessionRecord> {
        let slot = {
            let slots = self.slots.lock().await;
            slots.get(message_id).cloned()
        }?;
        let guard = slot.lock().await;
        guard.clone()
    }

    /// Drops the slot for `message_id` once nothing but the store holds it and
    /// it carries no live session: never loaded, or cancelled. A cancelled
    /// session that is reacted to again is rehydrated from its body.
    pub async fn release(&self, message_id: &MessageId) -> bool {
        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.get(message_id) else {
            return false;
        };
        if Arc::strong_count(slot) > 1 {
            return false;
        }
        let settled = match slot.try_lock() {
            Ok(guard) => guard.as_ref().map_or(true, |record| record.session.status.is_terminal()),
            Err(_) => false,
        };
        if settled {
            slots.remove(message_id);
        }
        settled
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

//! In-process message store.
//!
//! Backs the binary in single-instance deployments and doubles as the test
//! store. A shared persistent backend plugs in behind the same trait; the
//! delivery-id uniqueness rule is the contract either way.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{MessageStore, StoreError};
use crate::model::{
    EventCategory, EventRecord, MessageRecord, MessageStatus, NewEvent, NewMessage,
};

#[derive(Default)]
struct Inner {
    messages: HashMap<Uuid, MessageRecord>,
    events: Vec<EventRecord>,
    delivery_ids: HashSet<String>,
}

/// Message store held entirely in process memory.
///
/// A single lock guards messages, events and the delivery-id index so an
/// append and its index update are atomic.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a message record, as the send pipeline does at dispatch time.
    pub async fn insert_message(&self, message: NewMessage) -> MessageRecord {
        let now = Utc::now();
        let record = MessageRecord {
            id: Uuid::new_v4(),
            correlation_id: message.correlation_id,
            sender: message.sender,
            recipient: message.recipient,
            subject: message.subject,
            status: MessageStatus::Queued,
            created_at: now,
            updated_at: now,
        };

        let mut inner = self.inner.write().await;
        inner.messages.insert(record.id, record.clone());
        record
    }

    /// All events for a message, in insertion order.
    pub async fn events_for(&self, message_id: Uuid) -> Vec<EventRecord> {
        let inner = self.inner.read().await;
        inner
            .events
            .iter()
            .filter(|e| e.message_id == message_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn find_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Option<MessageRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .values()
            .find(|m| m.correlation_id == correlation_id)
            .cloned())
    }

    async fn update_status(
        &self,
        message_id: Uuid,
        status: MessageStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let message = inner
            .messages
            .get_mut(&message_id)
            .ok_or(StoreError::MessageNotFound(message_id))?;
        message.status = status;
        message.updated_at = Utc::now();
        Ok(())
    }

    async fn append_event(&self, event: NewEvent) -> Result<EventRecord, StoreError> {
        let mut inner = self.inner.write().await;

        if !inner.messages.contains_key(&event.message_id) {
            return Err(StoreError::MessageNotFound(event.message_id));
        }

        if let Some(delivery_id) = &event.delivery_id {
            if !inner.delivery_ids.insert(delivery_id.clone()) {
                return Err(StoreError::DuplicateDeliveryId(delivery_id.clone()));
            }
        }

        let record = EventRecord {
            id: Uuid::new_v4(),
            message_id: event.message_id,
            category: event.category,
            metadata: event.metadata,
            delivery_id: event.delivery_id,
            created_at: event.created_at,
        };
        inner.events.push(record.clone());
        Ok(record)
    }

    async fn exists_by_delivery_id(&self, delivery_id: &str) -> Result<bool, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.delivery_ids.contains(delivery_id))
    }

    async fn exists_open_today(&self, message_id: Uuid) -> Result<bool, StoreError> {
        let today = Utc::now().date_naive();
        let inner = self.inner.read().await;
        Ok(inner.events.iter().any(|e| {
            e.message_id == message_id
                && e.category == EventCategory::Open
                && e.created_at.date_naive() == today
        }))
    }

    async fn exists_click(&self, message_id: Uuid, url: &str) -> Result<bool, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.events.iter().any(|e| {
            e.message_id == message_id
                && e.category == EventCategory::Click
                && e.metadata.get("url").and_then(Value::as_str) == Some(url)
        }))
    }
}

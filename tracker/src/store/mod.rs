//! Message store abstraction.
//!
//! The tracking pipeline consumes a narrow interface over the platform's
//! message storage: lookup by correlation id, status transition, event
//! append, and the three idempotency probes. The pipeline never creates or
//! deletes messages; those belong to the send path.
//!
//! Idempotency correctness under concurrent ingestion rests on the store:
//! the pre-checks here are best-effort reads, and the delivery-id uniqueness
//! rule enforced by `append_event` is the authoritative gate.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{EventRecord, MessageRecord, MessageStatus, NewEvent};

pub use memory::InMemoryStore;

/// Errors surfaced by a message store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No message with the given id.
    #[error("message {0} not found")]
    MessageNotFound(Uuid),

    /// An event already recorded this delivery id. Raised at append time so
    /// two racing ingestions of the same envelope cannot both write.
    #[error("event with delivery id {0} already recorded")]
    DuplicateDeliveryId(String),

    /// Backend failure (connection, query, serialization).
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Narrow persistence interface consumed by the tracking pipeline.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Look up a message by its send-time correlation identifier.
    async fn find_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Option<MessageRecord>, StoreError>;

    /// Transition a message's lifecycle status.
    async fn update_status(
        &self,
        message_id: Uuid,
        status: MessageStatus,
    ) -> Result<(), StoreError>;

    /// Append an immutable audit event.
    ///
    /// Fails with [`StoreError::DuplicateDeliveryId`] when the event carries
    /// a delivery id that an earlier event already recorded.
    async fn append_event(&self, event: NewEvent) -> Result<EventRecord, StoreError>;

    /// Whether any event already recorded this outer-envelope delivery id.
    async fn exists_by_delivery_id(&self, delivery_id: &str) -> Result<bool, StoreError>;

    /// Whether an open event exists for this message on the current UTC
    /// calendar day.
    async fn exists_open_today(&self, message_id: Uuid) -> Result<bool, StoreError>;

    /// Whether a click event exists for this (message, destination URL) pair.
    async fn exists_click(&self, message_id: Uuid, url: &str) -> Result<bool, StoreError>;
}

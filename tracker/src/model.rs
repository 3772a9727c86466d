//! Core data model: messages, their audit events, and the closed
//! category/status sets.
//!
//! Categories and statuses are enums rather than free strings so a typo can
//! never mint a new untracked category. The category→status mapping lives in
//! one place (`EventCategory::status_transition`).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// =============================================================================
// Closed enumerations
// =============================================================================

/// Lifecycle status of an outbound message.
///
/// `queued → sent → {delivered, bounced, complaint, rejected,
/// rendering_failed}`. The outcome statuses overwrite each other; an accepted
/// event of a status-bearing category always wins over the previous status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Queued,
    Sent,
    Delivered,
    Bounced,
    Complaint,
    Rejected,
    RenderingFailed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Queued => "queued",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Bounced => "bounced",
            MessageStatus::Complaint => "complaint",
            MessageStatus::Rejected => "rejected",
            MessageStatus::RenderingFailed => "rendering_failed",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of an audit event.
///
/// The first five arrive over the provider webhook; `open` and `click` arrive
/// over the pixel/redirect endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Delivered,
    Bounce,
    Complaint,
    Reject,
    RenderingFailure,
    Open,
    Click,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Delivered => "delivered",
            EventCategory::Bounce => "bounce",
            EventCategory::Complaint => "complaint",
            EventCategory::Reject => "reject",
            EventCategory::RenderingFailure => "rendering_failure",
            EventCategory::Open => "open",
            EventCategory::Click => "click",
        }
    }

    /// Status a message transitions to when an event of this category is
    /// accepted. Engagement categories never change status.
    pub fn status_transition(&self) -> Option<MessageStatus> {
        match self {
            EventCategory::Delivered => Some(MessageStatus::Delivered),
            EventCategory::Bounce => Some(MessageStatus::Bounced),
            EventCategory::Complaint => Some(MessageStatus::Complaint),
            EventCategory::Reject => Some(MessageStatus::Rejected),
            EventCategory::RenderingFailure => Some(MessageStatus::RenderingFailed),
            EventCategory::Open | EventCategory::Click => None,
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Records
// =============================================================================

/// One outbound email attempt, owned by the message store.
///
/// Created at send time, mutated only through status transitions, never
/// deleted by the tracking pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    /// RFC-shaped value injected as the `Message-ID` header at send time and
    /// echoed back by the provider.
    pub correlation_id: String,
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when the send pipeline creates a message record.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub correlation_id: String,
    pub sender: String,
    pub recipient: String,
    pub subject: String,
}

/// An immutable audit record attached to exactly one message.
///
/// Append-only; insertion order is the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub message_id: Uuid,
    pub category: EventCategory,
    /// Category-specific payload: recipients, diagnostic codes, URL,
    /// user agent, provider correlation id.
    pub metadata: Value,
    /// Outer-envelope delivery id for provider-pushed categories. Indexed
    /// and unique at the store so redelivered envelopes cannot double-write.
    pub delivery_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when appending an event.
///
/// `created_at` is the arrival time observed by the caller, which keeps the
/// per-day open gate and the audit trail on the same clock.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub message_id: Uuid,
    pub category: EventCategory,
    pub metadata: Value,
    pub delivery_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

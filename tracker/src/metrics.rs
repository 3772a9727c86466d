//! Process-wide event counters.
//!
//! One `Metrics` instance is constructed at startup and handed to whoever
//! needs it through the application state; nothing here is a global.
//! `GET /metrics` serves the snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::model::EventCategory;

/// Counters for the ingestion pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    delivered: AtomicU64,
    bounced: AtomicU64,
    complaints: AtomicU64,
    rejects: AtomicU64,
    rendering_failures: AtomicU64,
    opens_tracked: AtomicU64,
    clicks_tracked: AtomicU64,
    duplicates_skipped: AtomicU64,
    unknown_messages: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an accepted event.
    pub fn record_event(&self, category: EventCategory) {
        let counter = match category {
            EventCategory::Delivered => &self.delivered,
            EventCategory::Bounce => &self.bounced,
            EventCategory::Complaint => &self.complaints,
            EventCategory::Reject => &self.rejects,
            EventCategory::RenderingFailure => &self.rendering_failures,
            EventCategory::Open => &self.opens_tracked,
            EventCategory::Click => &self.clicks_tracked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an event suppressed by an idempotency gate.
    pub fn record_duplicate(&self) {
        self.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an event whose correlation id matched no known message.
    pub fn record_unknown_message(&self) {
        self.unknown_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            bounced: self.bounced.load(Ordering::Relaxed),
            complaints: self.complaints.load(Ordering::Relaxed),
            rejects: self.rejects.load(Ordering::Relaxed),
            rendering_failures: self.rendering_failures.load(Ordering::Relaxed),
            opens_tracked: self.opens_tracked.load(Ordering::Relaxed),
            clicks_tracked: self.clicks_tracked.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
            unknown_messages: self.unknown_messages.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub delivered: u64,
    pub bounced: u64,
    pub complaints: u64,
    pub rejects: u64,
    pub rendering_failures: u64,
    pub opens_tracked: u64,
    pub clicks_tracked: u64,
    pub duplicates_skipped: u64,
    pub unknown_messages: u64,
}

//! MailTrace - delivery-event ingestion and engagement tracking.
//!
//! This library backs the `mailtrace-web` binary: an HTTP service that
//! receives provider delivery notifications (wrapped in a pub/sub
//! envelope), authenticates them, and applies each logical event to the
//! message store exactly once. It also serves the open pixel and click
//! redirect that close the engagement loop.
//!
//! ## Architecture
//!
//! ```text
//! Provider webhook → envelope parse → signature verify → event router
//!                                        → idempotency gate → store write
//! Pixel / redirect → identity resolve → idempotency gate → store write
//! ```

pub mod config;
pub mod metrics;
pub mod model;
pub mod sns;
pub mod store;
pub mod tracking;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use metrics::{Metrics, MetricsSnapshot};
pub use model::{EventCategory, EventRecord, MessageRecord, MessageStatus, NewEvent, NewMessage};
pub use sns::{SignatureVerifier, SnsEnvelope};
pub use store::{InMemoryStore, MessageStore, StoreError};
pub use tracking::{MessageTracker, TrackError, TrackOutcome};
pub use web::AppState;

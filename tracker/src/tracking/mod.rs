//! Message tracking: identity resolution, event routing, idempotent
//! recording, and the outbound instrumentation that closes the loop.

pub mod identity;
pub mod pixel;
pub mod rewrite;
pub mod tracker;

pub use identity::{normalize_correlation_id, resolve_correlation_id};
pub use pixel::PIXEL_GIF;
pub use rewrite::{inject_open_pixel, rewrite_links};
pub use tracker::{MessageTracker, TrackError, TrackOutcome};

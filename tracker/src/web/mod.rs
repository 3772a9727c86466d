//! HTTP surface for the tracking service.
//!
//! This module provides the inbound endpoints:
//! - The provider webhook (envelope parse, signature check, event routing)
//! - The open pixel and click redirect for engagement signals
//! - Health and counter-snapshot endpoints
//!
//! Response policy lives in the handlers: the provider retries anything
//! that is not a 200, so only forgeries (403) and non-JSON bodies (400)
//! refuse acknowledgment.

pub mod handlers;
pub mod redirect;

pub use handlers::{
    health, metrics_snapshot, router, sns_webhook, track_click, track_open, AppState,
    HealthResponse, WebhookResponse,
};
pub use redirect::{decode_click_target, is_valid_redirect_target};

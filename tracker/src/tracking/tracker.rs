//! Event routing and idempotent recording.
//!
//! One tracker instance serves every inbound request. Each provider-pushed
//! category runs the same sequence: resolve the correlation id, look up the
//! message, pass the idempotency gate, append the audit event, transition
//! status. Opens and clicks reuse the resolution and gating machinery with
//! their own dedup keys.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::metrics::Metrics;
use crate::model::{EventCategory, MessageRecord, NewEvent};
use crate::sns::event::{SesBounce, SesComplaint, SesDelivery, SesReject, SesRenderingFailure};
use crate::sns::{SesEventKind, SesMail, SesNotification};
use crate::store::{MessageStore, StoreError};
use crate::tracking::identity::{normalize_correlation_id, resolve_correlation_id};

/// Outcome of a tracking attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// A new event was persisted, with a status transition where the
    /// category maps to one.
    Recorded,
    /// The idempotency gate matched an existing event; nothing written.
    Duplicate,
    /// The notification type is outside the known set; nothing written.
    Ignored,
}

/// Errors surfaced by the tracker. The webhook layer logs these and still
/// acknowledges the provider.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("no message found for correlation id {correlation_id}")]
    MessageNotFound { correlation_id: String },

    #[error("notification claims type {0} but carries no payload")]
    MissingPayload(EventCategory),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Routes decoded provider events to their handlers and records engagement
/// signals from the pixel and redirect endpoints.
pub struct MessageTracker {
    store: Arc<dyn MessageStore>,
    metrics: Arc<Metrics>,
}

impl MessageTracker {
    pub fn new(store: Arc<dyn MessageStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// Route a decoded notification to its category handler.
    ///
    /// `delivery_id` is the outer envelope's unique id. It is the
    /// idempotency key for provider-pushed categories since the provider
    /// redelivers the same envelope verbatim.
    pub async fn process_notification(
        &self,
        notification: &SesNotification,
        delivery_id: &str,
    ) -> Result<TrackOutcome, TrackError> {
        match notification.kind() {
            SesEventKind::Delivery(payload) => {
                self.apply_provider_event(
                    EventCategory::Delivered,
                    &notification.mail,
                    delivery_metadata(payload),
                    delivery_id,
                )
                .await
            }
            SesEventKind::Bounce(payload) => {
                self.apply_provider_event(
                    EventCategory::Bounce,
                    &notification.mail,
                    bounce_metadata(payload),
                    delivery_id,
                )
                .await
            }
            SesEventKind::Complaint(payload) => {
                self.apply_provider_event(
                    EventCategory::Complaint,
                    &notification.mail,
                    complaint_metadata(payload),
                    delivery_id,
                )
                .await
            }
            SesEventKind::Reject(payload) => {
                self.apply_provider_event(
                    EventCategory::Reject,
                    &notification.mail,
                    reject_metadata(payload),
                    delivery_id,
                )
                .await
            }
            SesEventKind::RenderingFailure(payload) => {
                self.apply_provider_event(
                    EventCategory::RenderingFailure,
                    &notification.mail,
                    rendering_failure_metadata(payload),
                    delivery_id,
                )
                .await
            }
            SesEventKind::MissingPayload(category) => {
                warn!(
                    correlation_id = %resolve_correlation_id(&notification.mail),
                    category = %category,
                    "notification_payload_missing"
                );
                Err(TrackError::MissingPayload(category))
            }
            SesEventKind::Unknown(name) => {
                warn!(notification_type = %name, "notification_type_unknown");
                Ok(TrackOutcome::Ignored)
            }
        }
    }

    /// Record an open-pixel hit, at most once per message per UTC day.
    pub async fn process_open(&self, raw_id: &str) -> Result<TrackOutcome, TrackError> {
        let correlation_id = normalize_correlation_id(raw_id);
        let message = self.find_message(correlation_id).await?;

        match self.store.exists_open_today(message.id).await {
            Ok(true) => {
                info!(
                    correlation_id = %correlation_id,
                    message_id = %message.id,
                    category = %EventCategory::Open,
                    reason = "duplicate_event_skipped",
                    "event_skipped"
                );
                self.metrics.record_duplicate();
                return Ok(TrackOutcome::Duplicate);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(
                    correlation_id = %correlation_id,
                    error = %e,
                    "dedup_check_failed"
                );
            }
        }

        let now = Utc::now();
        self.store
            .append_event(NewEvent {
                message_id: message.id,
                category: EventCategory::Open,
                metadata: json!({ "tracked_at": now.to_rfc3339() }),
                delivery_id: None,
                created_at: now,
            })
            .await?;

        info!(
            correlation_id = %correlation_id,
            message_id = %message.id,
            "open_recorded"
        );
        self.metrics.record_event(EventCategory::Open);
        Ok(TrackOutcome::Recorded)
    }

    /// Record a click on a destination URL, at most once per (message, URL)
    /// pair. The caller validates the URL before this runs.
    pub async fn process_click(
        &self,
        raw_id: &str,
        url: &str,
    ) -> Result<TrackOutcome, TrackError> {
        let correlation_id = normalize_correlation_id(raw_id);
        let message = self.find_message(correlation_id).await?;

        match self.store.exists_click(message.id, url).await {
            Ok(true) => {
                info!(
                    correlation_id = %correlation_id,
                    message_id = %message.id,
                    url = %url,
                    category = %EventCategory::Click,
                    reason = "duplicate_event_skipped",
                    "event_skipped"
                );
                self.metrics.record_duplicate();
                return Ok(TrackOutcome::Duplicate);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(
                    correlation_id = %correlation_id,
                    error = %e,
                    "dedup_check_failed"
                );
            }
        }

        let now = Utc::now();
        self.store
            .append_event(NewEvent {
                message_id: message.id,
                category: EventCategory::Click,
                metadata: json!({ "url": url, "tracked_at": now.to_rfc3339() }),
                delivery_id: None,
                created_at: now,
            })
            .await?;

        info!(
            correlation_id = %correlation_id,
            message_id = %message.id,
            url = %url,
            "click_recorded"
        );
        self.metrics.record_event(EventCategory::Click);
        Ok(TrackOutcome::Recorded)
    }

    /// Shared handler body for provider-pushed categories: resolve, gate,
    /// append, transition.
    async fn apply_provider_event(
        &self,
        category: EventCategory,
        mail: &SesMail,
        mut metadata: Value,
        delivery_id: &str,
    ) -> Result<TrackOutcome, TrackError> {
        let correlation_id = resolve_correlation_id(mail);
        let message = self.find_message(&correlation_id).await?;

        if !delivery_id.is_empty() {
            match self.store.exists_by_delivery_id(delivery_id).await {
                Ok(true) => {
                    info!(
                        correlation_id = %correlation_id,
                        message_id = %message.id,
                        delivery_id = %delivery_id,
                        category = %category,
                        reason = "duplicate_event_skipped",
                        "event_skipped"
                    );
                    self.metrics.record_duplicate();
                    return Ok(TrackOutcome::Duplicate);
                }
                Ok(false) => {}
                // A gate failure must not block ingestion; the store's
                // uniqueness constraint still catches a true duplicate.
                Err(e) => {
                    warn!(
                        correlation_id = %correlation_id,
                        delivery_id = %delivery_id,
                        error = %e,
                        "dedup_check_failed"
                    );
                }
            }

            if let Some(object) = metadata.as_object_mut() {
                object.insert("sns_message_id".to_string(), json!(delivery_id));
            }
        }

        let append = self
            .store
            .append_event(NewEvent {
                message_id: message.id,
                category,
                metadata,
                delivery_id: (!delivery_id.is_empty()).then(|| delivery_id.to_string()),
                created_at: Utc::now(),
            })
            .await;

        match append {
            Ok(_) => {}
            // The pre-check raced a concurrent redelivery; same outcome.
            Err(StoreError::DuplicateDeliveryId(_)) => {
                info!(
                    correlation_id = %correlation_id,
                    message_id = %message.id,
                    delivery_id = %delivery_id,
                    category = %category,
                    reason = "duplicate_event_skipped",
                    "event_skipped"
                );
                self.metrics.record_duplicate();
                return Ok(TrackOutcome::Duplicate);
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(status) = category.status_transition() {
            self.store.update_status(message.id, status).await?;
        }

        info!(
            correlation_id = %correlation_id,
            message_id = %message.id,
            category = %category,
            "event_recorded"
        );
        self.metrics.record_event(category);
        Ok(TrackOutcome::Recorded)
    }

    async fn find_message(&self, correlation_id: &str) -> Result<MessageRecord, TrackError> {
        match self.store.find_by_correlation_id(correlation_id).await? {
            Some(message) => Ok(message),
            None => {
                error!(
                    correlation_id = %correlation_id,
                    "message_not_found_for_event"
                );
                self.metrics.record_unknown_message();
                Err(TrackError::MessageNotFound {
                    correlation_id: correlation_id.to_string(),
                })
            }
        }
    }
}

// ============================================================================
// Category-specific metadata payloads
// ============================================================================

fn delivery_metadata(payload: &SesDelivery) -> Value {
    json!({
        "recipients": payload.recipients,
        "smtp_response": payload.smtp_response,
        "reporting_mta": payload.reporting_mta,
        "processing_time_millis": payload.processing_time_millis,
        "timestamp": payload.timestamp,
    })
}

fn bounce_metadata(payload: &SesBounce) -> Value {
    json!({
        "type": payload.bounce_type,
        "sub_type": payload.bounce_sub_type,
        "reporting_mta": payload.reporting_mta,
        // Full recipient objects: action, status, and diagnostic code all
        // matter when investigating a bounce.
        "recipients": payload.bounced_recipients,
        "feedback_id": payload.feedback_id,
        "timestamp": payload.timestamp,
    })
}

fn complaint_metadata(payload: &SesComplaint) -> Value {
    json!({
        "complained_recipients": payload.complained_recipients,
        "feedback_id": payload.feedback_id,
        "complaint_feedback_type": payload.complaint_feedback_type,
        "user_agent": payload.user_agent,
        "arrival_date": payload.arrival_date,
        "timestamp": payload.timestamp,
    })
}

fn reject_metadata(payload: &SesReject) -> Value {
    json!({
        "reason": payload.reason,
        "recipients": payload.recipients,
        "timestamp": payload.timestamp,
    })
}

fn rendering_failure_metadata(payload: &SesRenderingFailure) -> Value {
    json!({
        "error_message": payload.error_message,
        "template_name": payload.template_name,
        "timestamp": payload.timestamp,
    })
}

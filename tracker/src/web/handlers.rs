//! HTTP endpoint handlers.
//!
//! The webhook handler owns the response policy toward the provider:
//! 1. Malformed outer JSON is the only 400
//! 2. Signature failure is the only 403
//! 3. Everything else acknowledges with 200, including duplicates,
//!    unknown types, and internal processing failures
//!
//! Anything other than 200 makes the provider redeliver, so errors that
//! redelivery cannot fix must not surface as errors.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::metrics::{Metrics, MetricsSnapshot};
use crate::sns::{EnvelopeKind, SignatureVerifier, SnsEnvelope};
use crate::tracking::{MessageTracker, PIXEL_GIF};
use crate::web::redirect::{decode_click_target, is_valid_redirect_target};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub verifier: Arc<SignatureVerifier>,
    pub tracker: Arc<MessageTracker>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        verifier: Arc<SignatureVerifier>,
        tracker: Arc<MessageTracker>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            verifier,
            tracker,
            metrics,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_snapshot))
        .route("/webhooks/sns", post(sns_webhook))
        .route("/track/open/*path", get(track_open))
        .route("/track/click/:correlation_id", get(track_click))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Health Check & Metrics
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Counter snapshot endpoint.
pub async fn metrics_snapshot(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

// =============================================================================
// Provider Webhook
// =============================================================================

/// Webhook acknowledgment body.
#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sns_message_id: Option<String>,
}

/// Provider webhook endpoint.
///
/// The body is taken raw so a non-JSON payload can be rejected at the
/// framing level; every field inside the envelope is optional.
pub async fn sns_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    let envelope: SnsEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "envelope_parse_failed");
            return (
                StatusCode::BAD_REQUEST,
                Json(WebhookResponse {
                    status: "invalid_json",
                    sns_message_id: None,
                }),
            );
        }
    };

    info!(
        envelope_type = %envelope.kind,
        sns_message_id = %envelope.message_id,
        "sns_webhook_received"
    );

    // A forged envelope must not be acknowledged; this is the one path
    // that rejects rather than absorbing the failure.
    if let Err(e) = state.verifier.verify(&envelope).await {
        warn!(
            sns_message_id = %envelope.message_id,
            error = %e,
            "signature_verification_failed"
        );
        return (
            StatusCode::FORBIDDEN,
            Json(WebhookResponse {
                status: "forbidden",
                sns_message_id: Some(envelope.message_id),
            }),
        );
    }

    match envelope.classify() {
        EnvelopeKind::SubscriptionConfirmation => {
            if let Err(e) = state.verifier.confirm_subscription(&envelope).await {
                error!(
                    sns_message_id = %envelope.message_id,
                    error = %e,
                    "subscription_confirmation_failed"
                );
            }
            (
                StatusCode::OK,
                Json(WebhookResponse {
                    status: "ok",
                    sns_message_id: Some(envelope.message_id),
                }),
            )
        }

        EnvelopeKind::UnsubscribeConfirmation => {
            info!(
                topic_arn = %envelope.topic_arn,
                sns_message_id = %envelope.message_id,
                "unsubscribe_confirmation_received"
            );
            (
                StatusCode::OK,
                Json(WebhookResponse {
                    status: "ok",
                    sns_message_id: Some(envelope.message_id),
                }),
            )
        }

        EnvelopeKind::Notification => {
            let notification = match envelope.parse_event() {
                Ok(notification) => notification,
                Err(e) => {
                    warn!(
                        sns_message_id = %envelope.message_id,
                        error = %e,
                        "event_body_parse_failed"
                    );
                    return (
                        StatusCode::OK,
                        Json(WebhookResponse {
                            status: "ignored",
                            sns_message_id: Some(envelope.message_id),
                        }),
                    );
                }
            };

            info!(
                notification_type = %notification.notification_type,
                sns_message_id = %envelope.message_id,
                ses_message_id = %notification.mail.message_id,
                "notification_received"
            );

            let status = match state
                .tracker
                .process_notification(&notification, &envelope.message_id)
                .await
            {
                Ok(outcome) => {
                    info!(
                        notification_type = %notification.notification_type,
                        sns_message_id = %envelope.message_id,
                        outcome = ?outcome,
                        "notification_processed"
                    );
                    "ok"
                }
                Err(e) => {
                    error!(
                        notification_type = %notification.notification_type,
                        sns_message_id = %envelope.message_id,
                        error = %e,
                        "notification_processing_failed"
                    );
                    "ignored"
                }
            };

            (
                StatusCode::OK,
                Json(WebhookResponse {
                    status,
                    sns_message_id: Some(envelope.message_id),
                }),
            )
        }

        EnvelopeKind::Other => {
            warn!(
                envelope_type = %envelope.kind,
                sns_message_id = %envelope.message_id,
                "envelope_type_unknown"
            );
            (
                StatusCode::OK,
                Json(WebhookResponse {
                    status: "ignored",
                    sns_message_id: Some(envelope.message_id),
                }),
            )
        }
    }
}

// =============================================================================
// Open Pixel
// =============================================================================

/// Open tracking pixel endpoint.
///
/// The wildcard captures the correlation id plus an image extension. The
/// pixel is served no matter what happens during recording; a broken image
/// in a recipient's mail client is never an acceptable failure mode.
pub async fn track_open(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let trimmed = path.strip_prefix('/').unwrap_or(&path);
    let correlation_id = trimmed.strip_suffix(".png").unwrap_or(trimmed);

    if correlation_id.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    if let Err(e) = state.tracker.process_open(correlation_id).await {
        error!(
            correlation_id = %correlation_id,
            error = %e,
            "open_tracking_failed"
        );
    }

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        PIXEL_GIF,
    )
        .into_response()
}

// =============================================================================
// Click Redirect
// =============================================================================

/// Click redirect query string.
#[derive(Debug, Deserialize)]
pub struct ClickQuery {
    /// base64url-encoded destination.
    pub url: Option<String>,
}

/// Click tracking redirect endpoint.
///
/// The destination is validated before anything is recorded; an invalid
/// target is rejected outright and never redirected to. Once validated,
/// the redirect happens whether or not recording succeeded.
pub async fn track_click(
    State(state): State<AppState>,
    Path(correlation_id): Path<String>,
    Query(query): Query<ClickQuery>,
) -> Response {
    let Some(encoded) = query.url.filter(|url| !url.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing url").into_response();
    };

    let Some(target) = decode_click_target(&encoded) else {
        return (StatusCode::BAD_REQUEST, "invalid url").into_response();
    };

    if !is_valid_redirect_target(&target) {
        warn!(
            correlation_id = %correlation_id,
            url = %target,
            "redirect_target_rejected"
        );
        return (StatusCode::BAD_REQUEST, "invalid url").into_response();
    }

    if let Err(e) = state.tracker.process_click(&correlation_id, &target).await {
        error!(
            correlation_id = %correlation_id,
            url = %target,
            error = %e,
            "click_tracking_failed"
        );
    }

    (StatusCode::FOUND, [(header::LOCATION, target)]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MessageStatus, NewMessage};
    use crate::store::{InMemoryStore, MessageStore};
    use axum::body::Body;
    use axum::http::Request;
    use base64::{engine::general_purpose, Engine as _};
    use tower::ServiceExt;

    fn test_state() -> (Arc<InMemoryStore>, AppState) {
        let store = Arc::new(InMemoryStore::new());
        let metrics = Arc::new(Metrics::new());
        let tracker = Arc::new(MessageTracker::new(store.clone(), metrics.clone()));
        let verifier = Arc::new(SignatureVerifier::new(false, reqwest::Client::new()));
        let state = AppState::new(Config::default(), verifier, tracker, metrics);
        (store, state)
    }

    fn queued_message(correlation_id: &str) -> NewMessage {
        NewMessage {
            correlation_id: correlation_id.to_string(),
            sender: "sender@example.com".to_string(),
            recipient: "rcpt@example.org".to_string(),
            subject: "Welcome".to_string(),
        }
    }

    fn delivery_envelope(correlation_id: &str, sns_message_id: &str) -> String {
        let inner = serde_json::json!({
            "notificationType": "Delivery",
            "mail": {
                "messageId": "ses-internal-id",
                "headers": [
                    {"name": "Message-ID", "value": format!("<{correlation_id}>")}
                ]
            },
            "delivery": {
                "recipients": ["rcpt@example.org"],
                "smtpResponse": "250 2.0.0 OK"
            }
        });
        serde_json::json!({
            "Type": "Notification",
            "MessageId": sns_message_id,
            "TopicArn": "arn:aws:sns:us-east-1:123456789012:ses-events",
            "Message": inner.to_string(),
            "Timestamp": "2024-03-01T12:00:00.000Z",
            "SignatureVersion": "1",
        })
        .to_string()
    }

    async fn post_webhook(state: &AppState, body: String) -> axum::http::Response<Body> {
        router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhooks/sns")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn get_path(state: &AppState, uri: &str) -> axum::http::Response<Body> {
        router(state.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_malformed_outer_json_is_rejected() {
        let (_, state) = test_state();
        let response = post_webhook(&state, "definitely not json".to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_envelope_type_acknowledged() {
        let (store, state) = test_state();
        let message = store.insert_message(queued_message("abc@mailer")).await;

        let body = serde_json::json!({"Type": "SomethingElse", "MessageId": "x"}).to_string();
        let response = post_webhook(&state, body).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(store.events_for(message.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_envelope_recorded_once() {
        let (store, state) = test_state();
        let message = store.insert_message(queued_message("abc@mailer")).await;
        let body = delivery_envelope("abc@mailer", "sns-delivery-1");

        let first = post_webhook(&state, body.clone()).await;
        let second = post_webhook(&state, body).await;

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(store.events_for(message.id).await.len(), 1);

        let found = store
            .find_by_correlation_id("abc@mailer")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.status, MessageStatus::Delivered);
    }

    #[tokio::test]
    async fn test_unverifiable_signature_is_forbidden() {
        let (store, state) = test_state();
        store.insert_message(queued_message("abc@mailer")).await;

        // Enabled verifier with an unfetchable certificate URL.
        let state = AppState {
            verifier: Arc::new(SignatureVerifier::new(true, reqwest::Client::new())),
            ..state
        };

        let response = post_webhook(&state, delivery_envelope("abc@mailer", "sns-1")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unparseable_event_body_acknowledged() {
        let (_, state) = test_state();
        let body = serde_json::json!({
            "Type": "Notification",
            "MessageId": "sns-1",
            "Message": "this is not json",
        })
        .to_string();

        let response = post_webhook(&state, body).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_pixel_served_even_for_unknown_message() {
        let (store, state) = test_state();
        let message = store.insert_message(queued_message("abc@mailer")).await;

        let response = get_path(&state, "/track/open/abc@mailer.png").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/gif"
        );
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-cache, no-store, must-revalidate"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], PIXEL_GIF);
        assert_eq!(store.events_for(message.id).await.len(), 1);

        // Unknown id: same pixel, nothing recorded.
        let response = get_path(&state, "/track/open/nobody@mailer.png").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.events_for(message.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_pixel_with_empty_id_rejected() {
        let (_, state) = test_state();
        let response = get_path(&state, "/track/open/.png").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_click_redirects_to_exact_target() {
        let (store, state) = test_state();
        let message = store.insert_message(queued_message("abc@mailer")).await;

        let target = "https://example.com/path?q=1";
        let encoded = general_purpose::URL_SAFE.encode(target);
        let uri = format!("/track/click/abc@mailer?url={encoded}");

        let response = get_path(&state, &uri).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            target
        );
        assert_eq!(store.events_for(message.id).await.len(), 1);

        // Repeat click: still redirected, not re-recorded.
        let response = get_path(&state, &uri).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(store.events_for(message.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_click_rejects_unsafe_targets() {
        let (store, state) = test_state();
        let message = store.insert_message(queued_message("abc@mailer")).await;

        for target in [
            "javascript:alert(1)",
            "//evil.com",
            "data:text/html,x",
            "",
            "https://",
        ] {
            let encoded = general_purpose::URL_SAFE.encode(target);
            let uri = format!("/track/click/abc@mailer?url={encoded}");
            let response = get_path(&state, &uri).await;
            assert_eq!(
                response.status(),
                StatusCode::BAD_REQUEST,
                "should reject {target:?}"
            );
        }

        // Missing and undecodable parameters are also rejected.
        let response = get_path(&state, "/track/click/abc@mailer").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = get_path(&state, "/track/click/abc@mailer?url=%21%21%21").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert!(store.events_for(message.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_health_and_metrics_endpoints() {
        let (_, state) = test_state();

        let response = get_path(&state, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = get_path(&state, "/metrics").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let snapshot: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(snapshot["delivered"], 0);
        assert_eq!(snapshot["duplicates_skipped"], 0);
    }
}

//! Outer pub/sub envelope wire types.
//!
//! The provider wraps every callback in an envelope carrying authenticity
//! metadata. For notifications the `Message` field is itself a JSON-encoded
//! string holding the event body (double encoding). Field names match the
//! wire exactly.

use serde::{Deserialize, Serialize};

use super::event::SesNotification;

/// Envelope classification, keyed by the `Type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    SubscriptionConfirmation,
    Notification,
    UnsubscribeConfirmation,
    Other,
}

/// The outer SNS envelope.
///
/// Every field defaults so that any JSON object deserializes; a missing or
/// unrecognized `Type` classifies as [`EnvelopeKind::Other`] and is
/// acknowledged downstream rather than rejected. Only a body that is not
/// JSON at all fails to parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnsEnvelope {
    #[serde(rename = "Type", default)]
    pub kind: String,

    /// Unique id of this envelope delivery. Redeliveries reuse it, which is
    /// what makes it the idempotency key for provider-pushed events.
    #[serde(rename = "MessageId", default)]
    pub message_id: String,

    #[serde(rename = "TopicArn", default)]
    pub topic_arn: String,

    /// Omitted entirely (not empty-stringed) when the notification carries
    /// no subject.
    #[serde(rename = "Subject", default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// JSON-encoded event body for `Notification` envelopes.
    #[serde(rename = "Message", default)]
    pub message: String,

    #[serde(rename = "Timestamp", default)]
    pub timestamp: String,

    #[serde(rename = "SignatureVersion", default)]
    pub signature_version: String,

    #[serde(rename = "Signature", default)]
    pub signature: String,

    #[serde(rename = "SigningCertURL", default)]
    pub signing_cert_url: String,

    #[serde(rename = "SubscribeURL", default, skip_serializing_if = "Option::is_none")]
    pub subscribe_url: Option<String>,

    #[serde(rename = "Token", default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(rename = "UnsubscribeURL", default, skip_serializing_if = "Option::is_none")]
    pub unsubscribe_url: Option<String>,
}

impl SnsEnvelope {
    /// Classify by the `Type` discriminant.
    pub fn classify(&self) -> EnvelopeKind {
        match self.kind.as_str() {
            "SubscriptionConfirmation" => EnvelopeKind::SubscriptionConfirmation,
            "Notification" => EnvelopeKind::Notification,
            "UnsubscribeConfirmation" => EnvelopeKind::UnsubscribeConfirmation,
            _ => EnvelopeKind::Other,
        }
    }

    /// Decode the double-encoded event body carried in `Message`.
    pub fn parse_event(&self) -> Result<SesNotification, serde_json::Error> {
        serde_json::from_str(&self.message)
    }
}

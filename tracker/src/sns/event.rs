//! Inner provider event body types.
//!
//! The envelope's `Message` field decodes into one of these notifications.
//! `notificationType` selects which optional payload should be populated; a
//! known type whose payload is absent is a wire defect the tracker reports
//! separately from an unknown type.

use serde::{Deserialize, Serialize};

use crate::model::EventCategory;

/// Event body carried inside a `Notification` envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesNotification {
    #[serde(default)]
    pub notification_type: String,
    #[serde(default)]
    pub mail: SesMail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<SesDelivery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounce: Option<SesBounce>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complaint: Option<SesComplaint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject: Option<SesReject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendering_failure: Option<SesRenderingFailure>,
}

/// Original message details echoed back with every event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesMail {
    /// Provider-assigned send id, also present as a `Message-ID`-style
    /// header. This is what ties an event back to a tracked message.
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub destination: Vec<String>,
    #[serde(default)]
    pub headers: Vec<SesHeader>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SesHeader {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesDelivery {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub processing_time_millis: i64,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default, rename = "reportingMTA")]
    pub reporting_mta: String,
    #[serde(default)]
    pub smtp_response: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesBounce {
    #[serde(default)]
    pub bounce_type: String,
    #[serde(default)]
    pub bounce_sub_type: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub bounced_recipients: Vec<SesBouncedRecipient>,
    #[serde(default, rename = "reportingMTA")]
    pub reporting_mta: String,
    #[serde(default)]
    pub feedback_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesBouncedRecipient {
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub diagnostic_code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesComplaint {
    #[serde(default)]
    pub complained_recipients: Vec<SesComplainedRecipient>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub feedback_id: String,
    #[serde(default)]
    pub complaint_feedback_type: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub arrival_date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesComplainedRecipient {
    #[serde(default)]
    pub email_address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesReject {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesRenderingFailure {
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub template_name: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Resolved view of a notification: the category it claims and whether the
/// matching payload actually arrived with it.
#[derive(Debug)]
pub enum SesEventKind<'a> {
    Delivery(&'a SesDelivery),
    Bounce(&'a SesBounce),
    Complaint(&'a SesComplaint),
    Reject(&'a SesReject),
    RenderingFailure(&'a SesRenderingFailure),
    /// Known notification type without its payload.
    MissingPayload(EventCategory),
    /// Notification type outside the known set.
    Unknown(&'a str),
}

impl SesNotification {
    /// Resolve the notification type against the payload that came with it.
    pub fn kind(&self) -> SesEventKind<'_> {
        match self.notification_type.as_str() {
            "Delivery" => match &self.delivery {
                Some(payload) => SesEventKind::Delivery(payload),
                None => SesEventKind::MissingPayload(EventCategory::Delivered),
            },
            "Bounce" => match &self.bounce {
                Some(payload) => SesEventKind::Bounce(payload),
                None => SesEventKind::MissingPayload(EventCategory::Bounce),
            },
            "Complaint" => match &self.complaint {
                Some(payload) => SesEventKind::Complaint(payload),
                None => SesEventKind::MissingPayload(EventCategory::Complaint),
            },
            "Reject" => match &self.reject {
                Some(payload) => SesEventKind::Reject(payload),
                None => SesEventKind::MissingPayload(EventCategory::Reject),
            },
            "RenderingFailure" => match &self.rendering_failure {
                Some(payload) => SesEventKind::RenderingFailure(payload),
                None => SesEventKind::MissingPayload(EventCategory::RenderingFailure),
            },
            other => SesEventKind::Unknown(other),
        }
    }
}

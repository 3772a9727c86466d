//! Correlation id resolution.
//!
//! Outbound sends inject the internally-generated correlation id as a
//! `Message-ID` header, angle-bracket-wrapped per RFC 5322. Provider events
//! echo the original headers back, so the resolver scans them to recover
//! our id; tracking URLs carry the same id and share the normalization.

use crate::sns::SesMail;

/// Strip surrounding whitespace and the angle brackets an SMTP
/// `Message-ID` value carries on the wire.
pub fn normalize_correlation_id(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '<' || c == '>')
}

/// Resolve the correlation id for an event's mail object.
///
/// Scans the echoed headers case-insensitively for `Message-ID`; when no
/// usable header is present, falls back to the provider's own send id,
/// which only matches when the two identifier spaces coincide.
pub fn resolve_correlation_id(mail: &SesMail) -> String {
    for header in &mail.headers {
        if header.name.to_lowercase() == "message-id" {
            let clean_id = normalize_correlation_id(&header.value);
            if !clean_id.is_empty() {
                return clean_id.to_string();
            }
        }
    }
    mail.message_id.clone()
}

//! Envelope signature verification and the subscription handshake.
//!
//! The provider signs a newline-delimited canonical string over selected
//! envelope fields using the RSA key inside the X.509 certificate at
//! `SigningCertURL`. Signature version 1 hashes with SHA-1, version 2 with
//! SHA-256. Parsed public keys are cached per certificate URL so repeated
//! deliveries from the same topic do not refetch the certificate.

use std::collections::HashMap;
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::envelope::SnsEnvelope;

/// Errors from envelope verification or the subscription handshake.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("certificate fetch failed: {0}")]
    CertificateFetch(#[from] reqwest::Error),

    #[error("certificate parse failed: {0}")]
    CertificateParse(String),

    #[error("signature is not valid base64: {0}")]
    SignatureEncoding(#[from] base64::DecodeError),

    #[error("signature mismatch: {0}")]
    SignatureMismatch(rsa::Error),

    #[error("subscribe URL missing from confirmation envelope")]
    MissingSubscribeUrl,

    #[error("subscription confirmation returned status {0}")]
    ConfirmationRejected(reqwest::StatusCode),
}

/// Verifies envelope signatures and confirms topic subscriptions.
pub struct SignatureVerifier {
    enabled: bool,
    client: Client,
    keys: RwLock<HashMap<String, Arc<RsaPublicKey>>>,
}

impl SignatureVerifier {
    /// Create a verifier. When `enabled` is false every envelope passes,
    /// which is the development default and gets flagged loudly at startup.
    pub fn new(enabled: bool, client: Client) -> Self {
        if !enabled {
            warn!("signature_verification_disabled");
        }
        Self {
            enabled,
            client,
            keys: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Verify the envelope signature against its signing certificate.
    ///
    /// Returns `Ok(())` without touching the network when verification is
    /// disabled.
    pub async fn verify(&self, envelope: &SnsEnvelope) -> Result<(), VerifyError> {
        if !self.enabled {
            return Ok(());
        }

        let key = self.public_key_for(&envelope.signing_cert_url).await?;
        let signature = general_purpose::STANDARD.decode(&envelope.signature)?;
        let string_to_sign = build_string_to_sign(envelope);

        let result = match envelope.signature_version.as_str() {
            "2" => key.verify(
                Pkcs1v15Sign::new::<Sha256>(),
                &Sha256::digest(string_to_sign.as_bytes()),
                &signature,
            ),
            // Version 1 and anything unrecognized use SHA-1.
            _ => key.verify(
                Pkcs1v15Sign::new::<Sha1>(),
                &Sha1::digest(string_to_sign.as_bytes()),
                &signature,
            ),
        };

        result.map_err(VerifyError::SignatureMismatch)
    }

    /// Complete the subscription handshake by visiting the subscribe URL.
    pub async fn confirm_subscription(&self, envelope: &SnsEnvelope) -> Result<(), VerifyError> {
        let url = envelope
            .subscribe_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(VerifyError::MissingSubscribeUrl)?;

        info!(
            topic_arn = %envelope.topic_arn,
            "subscription_confirmation_started"
        );

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(VerifyError::ConfirmationRejected(response.status()));
        }

        info!(topic_arn = %envelope.topic_arn, "subscription_confirmed");
        Ok(())
    }

    /// Fetch (or reuse) the RSA public key behind a certificate URL.
    async fn public_key_for(&self, cert_url: &str) -> Result<Arc<RsaPublicKey>, VerifyError> {
        {
            let keys = self.keys.read().await;
            if let Some(key) = keys.get(cert_url) {
                return Ok(key.clone());
            }
        }

        let pem = self
            .client
            .get(cert_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let key = Arc::new(parse_certificate_key(&pem)?);

        // Another request may have fetched the same certificate meanwhile;
        // keep whichever landed first.
        let mut keys = self.keys.write().await;
        Ok(keys.entry(cert_url.to_string()).or_insert(key).clone())
    }
}

/// Canonical string the provider signs: `label\nvalue\n` pairs in fixed
/// order. `Subject` participates only when present and non-empty.
pub fn build_string_to_sign(envelope: &SnsEnvelope) -> String {
    let mut out = String::new();
    out.push_str("Message\n");
    out.push_str(&envelope.message);
    out.push('\n');
    out.push_str("MessageId\n");
    out.push_str(&envelope.message_id);
    out.push('\n');
    if let Some(subject) = envelope.subject.as_deref().filter(|s| !s.is_empty()) {
        out.push_str("Subject\n");
        out.push_str(subject);
        out.push('\n');
    }
    out.push_str("Timestamp\n");
    out.push_str(&envelope.timestamp);
    out.push('\n');
    out.push_str("TopicArn\n");
    out.push_str(&envelope.topic_arn);
    out.push('\n');
    out.push_str("Type\n");
    out.push_str(&envelope.kind);
    out.push('\n');
    out
}

/// Extract the RSA public key from a PEM-encoded X.509 certificate.
fn parse_certificate_key(pem_bytes: &[u8]) -> Result<RsaPublicKey, VerifyError> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(pem_bytes)
        .map_err(|e| VerifyError::CertificateParse(e.to_string()))?;
    let cert = pem
        .parse_x509()
        .map_err(|e| VerifyError::CertificateParse(e.to_string()))?;

    RsaPublicKey::from_public_key_der(cert.public_key().raw)
        .map_err(|e| VerifyError::CertificateParse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification_envelope() -> SnsEnvelope {
        SnsEnvelope {
            kind: "Notification".to_string(),
            message_id: "22b80b92-fdea-4c2c-8f9d-bdfb0c7bf324".to_string(),
            topic_arn: "arn:aws:sns:us-east-1:123456789012:ses-events".to_string(),
            message: "{\"notificationType\":\"Delivery\"}".to_string(),
            timestamp: "2024-03-01T12:00:00.000Z".to_string(),
            signature_version: "1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_string_to_sign_without_subject() {
        let envelope = notification_envelope();
        let expected = "Message\n{\"notificationType\":\"Delivery\"}\n\
                        MessageId\n22b80b92-fdea-4c2c-8f9d-bdfb0c7bf324\n\
                        Timestamp\n2024-03-01T12:00:00.000Z\n\
                        TopicArn\narn:aws:sns:us-east-1:123456789012:ses-events\n\
                        Type\nNotification\n";
        assert_eq!(build_string_to_sign(&envelope), expected);
    }

    #[test]
    fn test_string_to_sign_includes_nonempty_subject() {
        let mut envelope = notification_envelope();
        envelope.subject = Some("Amazon SES Email Event Notification".to_string());

        let canonical = build_string_to_sign(&envelope);
        assert!(canonical.contains("Subject\nAmazon SES Email Event Notification\n"));

        // An empty subject is treated as absent.
        envelope.subject = Some(String::new());
        assert!(!build_string_to_sign(&envelope).contains("Subject"));
    }

    #[test]
    fn test_subject_sits_between_message_id_and_timestamp() {
        let mut envelope = notification_envelope();
        envelope.subject = Some("hello".to_string());

        let canonical = build_string_to_sign(&envelope);
        let subject_at = canonical.find("Subject\n").unwrap();
        assert!(canonical.find("MessageId\n").unwrap() < subject_at);
        assert!(subject_at < canonical.find("Timestamp\n").unwrap());
    }

    #[tokio::test]
    async fn test_disabled_verifier_accepts_anything() {
        let verifier = SignatureVerifier::new(false, Client::new());
        let mut envelope = notification_envelope();
        envelope.signature = "definitely not a signature".to_string();

        assert!(verifier.verify(&envelope).await.is_ok());
        assert!(!verifier.is_enabled());
    }

    #[tokio::test]
    async fn test_confirm_subscription_requires_url() {
        let verifier = SignatureVerifier::new(false, Client::new());

        let envelope = notification_envelope();
        let err = verifier.confirm_subscription(&envelope).await.unwrap_err();
        assert!(matches!(err, VerifyError::MissingSubscribeUrl));

        // An empty URL counts as missing.
        let mut envelope = notification_envelope();
        envelope.subscribe_url = Some(String::new());
        let err = verifier.confirm_subscription(&envelope).await.unwrap_err();
        assert!(matches!(err, VerifyError::MissingSubscribeUrl));
    }

    #[test]
    fn test_certificate_parse_rejects_garbage() {
        let err = parse_certificate_key(b"not a certificate").unwrap_err();
        assert!(matches!(err, VerifyError::CertificateParse(_)));
    }
}

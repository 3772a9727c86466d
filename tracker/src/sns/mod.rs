//! Provider pub/sub plumbing: envelope wire types, the double-decoded event
//! body, and signature verification.

pub mod envelope;
pub mod event;
pub mod signature;

pub use envelope::{EnvelopeKind, SnsEnvelope};
pub use event::{SesEventKind, SesMail, SesNotification};
pub use signature::{SignatureVerifier, VerifyError};

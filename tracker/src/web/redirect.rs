//! Click redirect target decoding and validation.
//!
//! The destination URL arrives base64url-encoded in the `url` query
//! parameter. Validation is an open-redirect boundary and runs before any
//! recording: reject everything that is not an absolute http(s) URL with a
//! real host.

use base64::{engine::general_purpose, Engine as _};
use url::Url;

/// Decode the base64url-encoded destination. `None` on bad encoding or
/// non-UTF-8 payloads.
pub fn decode_click_target(encoded: &str) -> Option<String> {
    let bytes = general_purpose::URL_SAFE.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

/// Whether a decoded destination is safe to redirect to.
///
/// Allows only absolute `http`/`https` URLs with a non-empty host;
/// rejects protocol-relative (`//...`), relative, and pseudo-scheme URLs.
pub fn is_valid_redirect_target(target: &str) -> bool {
    if target.is_empty() {
        return false;
    }

    // Protocol-relative URLs would inherit our scheme and escape the host
    // check in some parsers; reject them outright.
    if target.starts_with("//") {
        return false;
    }

    let parsed = match Url::parse(target) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return false;
    }

    parsed.host_str().map_or(false, |host| !host.is_empty())
}

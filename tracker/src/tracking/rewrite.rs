//! Outbound HTML instrumentation: click-link rewriting and the open pixel.
//!
//! The send pipeline runs these over an HTML body before dispatch so that
//! engagement signals carry the correlation id back to the tracking
//! endpoints. Destination URLs ride along base64url-encoded in the `url`
//! query parameter.

use std::sync::LazyLock;

use base64::{engine::general_purpose, Engine as _};
use regex::{Captures, NoExpand, Regex};

use super::identity::normalize_correlation_id;

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s+([^>]*\s+)?href=["']([^"']+)["']([^>]*)>([^<]*)</a>"#)
        .expect("anchor pattern is valid")
});

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href=["'][^"']+["']"#).expect("href pattern is valid")
});

/// Rewrite every anchor in `html` to point at the click-tracking redirect.
///
/// Mail-client pseudo-schemes (`mailto:`, `tel:`), fragment links, and
/// already-rewritten URLs are left alone.
pub fn rewrite_links(html: &str, correlation_id: &str, base_url: &str) -> String {
    if html.is_empty() || correlation_id.is_empty() {
        return html.to_string();
    }

    let clean_id = normalize_correlation_id(correlation_id);
    let base = base_url.trim_end_matches('/');

    ANCHOR_RE
        .replace_all(html, |caps: &Captures| {
            let original_url = &caps[2];
            if original_url.contains("/track/click/")
                || original_url.starts_with("mailto:")
                || original_url.starts_with("tel:")
                || original_url.starts_with('#')
            {
                return caps[0].to_string();
            }

            let encoded = general_purpose::URL_SAFE.encode(original_url);
            let tracking_url = format!("{base}/track/click/{clean_id}?url={encoded}");
            let replacement = format!(r#"href="{tracking_url}""#);
            HREF_RE
                .replace_all(&caps[0], NoExpand(&replacement))
                .into_owned()
        })
        .into_owned()
}

/// Append the invisible open pixel to an HTML body.
pub fn inject_open_pixel(html: &str, correlation_id: &str, base_url: &str) -> String {
    if html.is_empty() || correlation_id.is_empty() {
        return html.to_string();
    }

    let clean_id = normalize_correlation_id(correlation_id);
    let base = base_url.trim_end_matches('/');
    format!(
        r#"{html}<img src="{base}/track/open/{clean_id}.png" width="1" height="1" style="display:none;" />"#
    )
}

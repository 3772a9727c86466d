//! Configuration module for environment variable parsing.

use std::env;
use tracing::warn;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Whether inbound envelope signatures are verified.
    ///
    /// Off by default. Running unverified is an explicit deployment choice;
    /// the verifier logs it at construction so it is never a silent fallback.
    pub verify_signatures: bool,

    /// Timeout in milliseconds for outbound HTTP (certificate fetch,
    /// subscription confirmation)
    pub request_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            verify_signatures: false,
            request_timeout_ms: 10_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),

            verify_signatures: parse_bool("SNS_VERIFY", false),

            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
        }
    }
}

/// Parse a boolean env var, accepting the usual spellings.
fn parse_bool(name: &str, default: bool) -> bool {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => true,
        "0" | "f" | "false" | "no" | "off" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid boolean value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_true_spellings() {
        env::set_var("TEST_BOOL_TRUE", "TRUE");
        assert!(parse_bool("TEST_BOOL_TRUE", false));
        env::set_var("TEST_BOOL_TRUE", "1");
        assert!(parse_bool("TEST_BOOL_TRUE", false));
        env::remove_var("TEST_BOOL_TRUE");
    }

    #[test]
    fn test_parse_bool_false_spellings() {
        env::set_var("TEST_BOOL_FALSE", "off");
        assert!(!parse_bool("TEST_BOOL_FALSE", true));
        env::remove_var("TEST_BOOL_FALSE");
    }

    #[test]
    fn test_parse_bool_default() {
        assert!(!parse_bool("NONEXISTENT_BOOL", false));
        assert!(parse_bool("NONEXISTENT_BOOL", true));
    }

    #[test]
    fn test_parse_bool_invalid_uses_default() {
        env::set_var("TEST_BOOL_INVALID", "maybe");
        assert!(parse_bool("TEST_BOOL_INVALID", true));
        assert!(!parse_bool("TEST_BOOL_INVALID", false));
        env::remove_var("TEST_BOOL_INVALID");
    }
}

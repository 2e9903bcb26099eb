//! Secret wrappers for configuration values that must never reach a log line.
//!
//! The relay only carries one secret today: the ticket backend URL, which can
//! embed a Redis password (`redis://:password@host:6379`). Holding it in a
//! [`SecretString`] means a `#[derive(Debug)]` on any struct that contains it
//! prints `[REDACTED]` instead of the credential, and the backing memory is
//! zeroized on drop.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! let url = SecretString::from("redis://:hunter2@cache:6379");
//! assert!(!format!("{url:?}").contains("hunter2"));
//! assert_eq!(url.expose_secret(), "redis://:hunter2@cache:6379");
//! ```

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("redis://:pw@localhost:6379");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains(":pw@"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("redis://localhost:6379");
        assert_eq!(secret.expose_secret(), "redis://localhost:6379");
    }

    #[test]
    fn test_deserialized_settings_stay_redacted() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct BackendSettings {
            key_prefix: String,
            url: SecretString,
        }

        let json = r#"{"key_prefix": "tickets", "url": "redis://:s3cret@cache:6379"}"#;
        let settings: BackendSettings = serde_json::from_str(json).expect("deserialize");

        assert_eq!(settings.url.expose_secret(), "redis://:s3cret@cache:6379");

        let debug = format!("{settings:?}");
        assert!(debug.contains("tickets"));
        assert!(!debug.contains("s3cret"));
    }
}

//! Relay configuration.
//!
//! Configuration is loaded from environment variables. The Redis URL is
//! redacted in Debug output because it may embed a password.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP + WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default Redis key prefix for ticket storage.
pub const DEFAULT_TICKET_KEY_PREFIX: &str = "tickets";

/// Default acknowledgement text sent to every new connection.
pub const DEFAULT_ACK_MESSAGE: &str = "Connection established.";

/// Default per-connection outbound queue capacity.
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 256;

/// Default socket write timeout in milliseconds.
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 5000;

/// Default shutdown drain period in seconds.
pub const DEFAULT_SHUTDOWN_GRACE_SECONDS: u64 = 5;

/// Default relay instance ID prefix.
pub const DEFAULT_RELAY_ID_PREFIX: &str = "relay";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::InvalidValue(format!(
                "RELAY_LOG_FORMAT must be 'text' or 'json', got '{other}'"
            ))),
        }
    }
}

/// Relay configuration.
#[derive(Clone)]
pub struct Config {
    /// Redis connection URL for the ticket backend.
    pub redis_url: SecretString,

    /// HTTP + WebSocket bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Prefix for the ticket counter and store keys.
    pub ticket_key_prefix: String,

    /// Text sent to a connection right after it is registered.
    pub ack_message: String,

    /// Outbound queue capacity per connection.
    pub send_queue_capacity: usize,

    /// Socket write timeout for a single frame.
    pub send_timeout: Duration,

    /// How long to wait for connections to drain on shutdown.
    pub shutdown_grace: Duration,

    pub log_format: LogFormat,

    /// Unique identifier for this relay instance.
    pub relay_id: String,
}

/// Custom Debug implementation that redacts the Redis URL.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("redis_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("ticket_key_prefix", &self.ticket_key_prefix)
            .field("ack_message", &self.ack_message)
            .field("send_queue_capacity", &self.send_queue_capacity)
            .field("send_timeout", &self.send_timeout)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("log_format", &self.log_format)
            .field("relay_id", &self.relay_id)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Parse an optional positive integer variable, falling back to `default`.
fn parse_positive<T>(vars: &HashMap<String, String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
{
    match vars.get(key) {
        None => Ok(default),
        Some(raw) => {
            let value: T = raw.trim().parse().map_err(|_| {
                ConfigError::InvalidValue(format!("{key} must be a positive integer, got '{raw}'"))
            })?;
            if value == T::default() {
                return Err(ConfigError::InvalidValue(format!(
                    "{key} must be greater than zero"
                )));
            }
            Ok(value)
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let redis_url = SecretString::from(
            vars.get("REDIS_URL")
                .ok_or_else(|| ConfigError::MissingEnvVar("REDIS_URL".to_string()))?
                .clone(),
        );

        let bind_address = vars
            .get("RELAY_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let ticket_key_prefix = vars
            .get("RELAY_TICKET_KEY_PREFIX")
            .cloned()
            .unwrap_or_else(|| DEFAULT_TICKET_KEY_PREFIX.to_string());
        if ticket_key_prefix.is_empty() {
            return Err(ConfigError::InvalidValue(
                "RELAY_TICKET_KEY_PREFIX must not be empty".to_string(),
            ));
        }

        let ack_message = vars
            .get("RELAY_ACK_MESSAGE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ACK_MESSAGE.to_string());

        let send_queue_capacity =
            parse_positive(vars, "RELAY_SEND_QUEUE_CAPACITY", DEFAULT_SEND_QUEUE_CAPACITY)?;

        let send_timeout_ms = parse_positive(vars, "RELAY_SEND_TIMEOUT_MS", DEFAULT_SEND_TIMEOUT_MS)?;

        let shutdown_grace_seconds = parse_positive(
            vars,
            "RELAY_SHUTDOWN_GRACE_SECONDS",
            DEFAULT_SHUTDOWN_GRACE_SECONDS,
        )?;

        let log_format = match vars.get("RELAY_LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::Text,
        };

        // Generate relay instance ID
        let relay_id = vars.get("RELAY_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_RELAY_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            redis_url,
            bind_address,
            ticket_key_prefix,
            ack_message,
            send_queue_capacity,
            send_timeout: Duration::from_millis(send_timeout_ms),
            shutdown_grace: Duration::from_secs(shutdown_grace_seconds),
            log_format,
            relay_id,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "REDIS_URL".to_string(),
            "redis://:pw@localhost:6379".to_string(),
        )])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.redis_url.expose_secret(), "redis://:pw@localhost:6379");
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.ticket_key_prefix, DEFAULT_TICKET_KEY_PREFIX);
        assert_eq!(config.ack_message, DEFAULT_ACK_MESSAGE);
        assert_eq!(config.send_queue_capacity, DEFAULT_SEND_QUEUE_CAPACITY);
        assert_eq!(
            config.send_timeout,
            Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS)
        );
        assert_eq!(
            config.shutdown_grace,
            Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECONDS)
        );
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.relay_id.starts_with("relay-"));
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("RELAY_BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert("RELAY_TICKET_KEY_PREFIX".to_string(), "board".to_string());
        vars.insert("RELAY_ACK_MESSAGE".to_string(), "hello".to_string());
        vars.insert("RELAY_SEND_QUEUE_CAPACITY".to_string(), "16".to_string());
        vars.insert("RELAY_SEND_TIMEOUT_MS".to_string(), "250".to_string());
        vars.insert("RELAY_SHUTDOWN_GRACE_SECONDS".to_string(), "1".to_string());
        vars.insert("RELAY_LOG_FORMAT".to_string(), "JSON".to_string());
        vars.insert("RELAY_ID".to_string(), "relay-custom-001".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.ticket_key_prefix, "board");
        assert_eq!(config.ack_message, "hello");
        assert_eq!(config.send_queue_capacity, 16);
        assert_eq!(config.send_timeout, Duration::from_millis(250));
        assert_eq!(config.shutdown_grace, Duration::from_secs(1));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.relay_id, "relay-custom-001");
    }

    #[test]
    fn test_from_vars_missing_redis_url() {
        let result = Config::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "REDIS_URL"));
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let mut vars = base_vars();
        vars.insert("RELAY_SEND_QUEUE_CAPACITY".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_unparseable_timeout_rejected() {
        let mut vars = base_vars();
        vars.insert("RELAY_SEND_TIMEOUT_MS".to_string(), "soon".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("RELAY_SEND_TIMEOUT_MS"))
        );
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut vars = base_vars();
        vars.insert("RELAY_LOG_FORMAT".to_string(), "xml".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_empty_key_prefix_rejected() {
        let mut vars = base_vars();
        vars.insert("RELAY_TICKET_KEY_PREFIX".to_string(), String::new());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_debug_redacts_redis_url() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("redis://"));
    }
}

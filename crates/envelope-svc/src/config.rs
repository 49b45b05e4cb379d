//! Configuration loading and validation for the envelope service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.

use std::{net::SocketAddr, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::server::middleware::DEFAULT_REQUEST_TIMEOUT;

/// Validated envelope service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the JSON key file holding the base64 `EncryptionKey`. **Required.**
    pub encryption_key_path: String,

    /// Address the HTTP server binds to.
    #[serde(default = "default_listen_host")]
    pub listen_host: String,

    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Seconds allowed for a handler to produce the response head, and the
    /// longest wait between two chunks of a streamed response body.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_host() -> String {
    "127.0.0.1".into()
}
fn default_listen_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// The socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_HOST` is not an IP address.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let ip = self
            .listen_host
            .parse()
            .with_context(|| format!("LISTEN_HOST is not an IP address: {}", self.listen_host))?;
        Ok(SocketAddr::new(ip, self.listen_port))
    }

    /// The per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if self.encryption_key_path.trim().is_empty() {
            anyhow::bail!("ENCRYPTION_KEY_PATH is required and must not be empty");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be > 0");
        }
        self.listen_addr()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            encryption_key_path: "/run/secrets/envelope-key.json".into(),
            listen_host: default_listen_host(),
            listen_port: default_listen_port(),
            request_timeout_secs: default_request_timeout(),
            log_level: default_log_level(),
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_listen_host(), "127.0.0.1");
        assert_eq!(default_listen_port(), 8080);
        assert_eq!(default_request_timeout(), 120);
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn validate_accepts_valid_config() {
        let cfg = valid();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.listen_addr().unwrap().port(), 8080);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn validate_rejects_empty_key_path() {
        let cfg = Config {
            encryption_key_path: "  ".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let cfg = Config {
            request_timeout_secs: 0,
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_host() {
        let cfg = Config {
            listen_host: "not-an-ip".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }
}

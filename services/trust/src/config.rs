//! Centralized configuration for Trust Service.
//!
//! All configuration is loaded from environment variables (optionally
//! seeded from a `.env` file) and validated at startup.

use crate::error::TrustError;
use rust_common::{LogFormat, LogTarget, TracingConfig, parse_env_from};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Asymmetric signing algorithm for this instance's key pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    /// ECDSA with P-256 and SHA-256
    ES256,
    /// Ed25519
    EdDSA,
}

impl KeyAlgorithm {
    /// Algorithm name for the token header.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ES256 => "ES256",
            Self::EdDSA => "EdDSA",
        }
    }

    /// Matching `jsonwebtoken` algorithm.
    #[must_use]
    pub const fn jwt_algorithm(&self) -> jsonwebtoken::Algorithm {
        match self {
            Self::ES256 => jsonwebtoken::Algorithm::ES256,
            Self::EdDSA => jsonwebtoken::Algorithm::EdDSA,
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ES256" => Ok(Self::ES256),
            "EDDSA" | "ED25519" => Ok(Self::EdDSA),
            _ => Err(TrustError::config(format!("Invalid key algorithm: {s}"))),
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trust Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Service name used in logs
    pub service_name: String,

    // Keys
    /// Algorithm for generated key pairs
    pub key_algorithm: KeyAlgorithm,

    // Tokens
    /// Validity window for service-to-service tokens
    pub service_token_ttl: Duration,
    /// Validity window for demo tokens
    pub demo_token_ttl: Duration,
    /// Symmetric clock skew tolerance applied to `exp` and `nbf`
    pub clock_skew: Duration,
    /// Claim every service token must carry
    pub identity_claim: String,

    // Logging
    /// Default log filter directive
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
}

/// Service token window in seconds.
pub const DEFAULT_SERVICE_TOKEN_TTL_SECS: u64 = 60;

/// Demo token window: roughly a hundred years, effectively unbounded.
pub const DEFAULT_DEMO_TOKEN_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Claim naming the account a service token speaks for.
pub const DEFAULT_IDENTITY_CLAIM: &str = "userName";

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "trust-service".to_string(),
            key_algorithm: KeyAlgorithm::ES256,
            service_token_ttl: Duration::from_secs(DEFAULT_SERVICE_TOKEN_TTL_SECS),
            demo_token_ttl: Duration::from_secs(DEFAULT_DEMO_TOKEN_TTL_SECS),
            clock_skew: Duration::ZERO,
            identity_claim: DEFAULT_IDENTITY_CLAIM.to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparsable value or the
    /// resulting configuration is invalid.
    pub fn from_env() -> Result<Self, TrustError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TrustError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let service_name = parse_env_from(&lookup, "SERVICE_NAME", defaults.service_name)?;
        let key_algorithm = parse_env_from(&lookup, "KEY_ALGORITHM", defaults.key_algorithm)?;

        let service_token_ttl = Duration::from_secs(parse_env_from(
            &lookup,
            "SERVICE_TOKEN_TTL",
            DEFAULT_SERVICE_TOKEN_TTL_SECS,
        )?);
        let demo_token_ttl = Duration::from_secs(parse_env_from(
            &lookup,
            "DEMO_TOKEN_TTL",
            DEFAULT_DEMO_TOKEN_TTL_SECS,
        )?);
        let clock_skew = Duration::from_secs(parse_env_from(&lookup, "TOKEN_CLOCK_SKEW", 0u64)?);
        let identity_claim = parse_env_from(&lookup, "IDENTITY_CLAIM", defaults.identity_claim)?;

        let log_level = parse_env_from(&lookup, "LOG_LEVEL", defaults.log_level)?;
        let log_format = parse_env_from(&lookup, "LOG_FORMAT", defaults.log_format)?;

        let config = Self {
            service_name,
            key_algorithm,
            service_token_ttl,
            demo_token_ttl,
            clock_skew,
            identity_claim,
            log_level,
            log_format,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that parsing alone cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Config`] for a zero validity window, a window
    /// that does not fit a timestamp, or an empty identity claim.
    pub fn validate(&self) -> Result<(), TrustError> {
        for (name, ttl) in [
            ("SERVICE_TOKEN_TTL", self.service_token_ttl),
            ("DEMO_TOKEN_TTL", self.demo_token_ttl),
        ] {
            if ttl.is_zero() {
                return Err(TrustError::config(format!("{name} must be positive")));
            }
            if i64::try_from(ttl.as_secs()).is_err() {
                return Err(TrustError::config(format!("{name} is out of range")));
            }
        }
        if i64::try_from(self.clock_skew.as_secs()).is_err() {
            return Err(TrustError::config("TOKEN_CLOCK_SKEW is out of range"));
        }
        if self.identity_claim.trim().is_empty() {
            return Err(TrustError::config("IDENTITY_CLAIM must not be empty"));
        }
        Ok(())
    }

    /// Tracing setup derived from this configuration. Logs go to stderr;
    /// stdout carries the binary's replies.
    #[must_use]
    pub fn tracing(&self) -> TracingConfig {
        TracingConfig::default()
            .with_service_name(self.service_name.clone())
            .with_log_level(self.log_level.clone())
            .with_format(self.log_format)
            .with_target(LogTarget::Stderr)
    }
}

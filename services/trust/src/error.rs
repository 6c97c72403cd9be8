use thiserror::Error;

/// Errors raised by key management and token issuance/verification.
///
/// None of these are retried by the service: crypto failures are
/// deterministic. Callers decide how to surface them via [`TrustError::category`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrustError {
    /// Public key bytes are not a supported, well-formed key.
    #[error("Invalid public key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// Token header (or a registration request) carries no key id.
    #[error("Missing required 'kid' header parameter")]
    UnknownKeyId,

    /// Key id is well formed but no public key is registered for it.
    #[error("No public key registered for kid: {kid}")]
    UntrustedKeyId {
        /// The unregistered key id
        kid: String,
    },

    /// Token cannot be split into header, claims and signature.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Signature does not verify against the resolved public key.
    #[error("Token signature does not match")]
    BadSignature,

    /// Token expiration is in the past.
    #[error("Token expired at {expired_at}")]
    TokenExpired {
        /// `exp` claim, seconds since epoch
        expired_at: i64,
    },

    /// Token not-before is in the future.
    #[error("Token not valid before {not_before}")]
    TokenNotYetValid {
        /// `nbf` claim, seconds since epoch
        not_before: i64,
    },

    /// Claim mandated by the issuer is absent from the claims to sign.
    #[error("{claim} claim is required")]
    ClaimMissing {
        /// Claim name
        claim: String,
    },

    /// Claim required at verification time is absent from a verified token.
    #[error("Required claim: '{claim}' missing on the token")]
    RequiredClaimMissing {
        /// Claim name
        claim: String,
    },

    /// Claim present on a verified token but not holding the expected value.
    #[error("Claim '{claim}' mismatch: expected {expected}, got {actual}")]
    ClaimMismatch {
        /// Claim name
        claim: String,
        /// Expected value (JSON text)
        expected: String,
        /// Actual value (JSON text)
        actual: String,
    },

    /// Key pair generation failed.
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    /// Token could not be signed.
    #[error("Token signing error: {0}")]
    Signing(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification a transport layer maps onto its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller sent something unacceptable (bad token, untrusted key, missing claim).
    Client,
    /// This instance failed (key generation, signing, configuration).
    Server,
}

impl TrustError {
    /// Create an invalid key encoding error.
    #[must_use]
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKeyEncoding(msg.into())
    }

    /// Create an untrusted key id error.
    #[must_use]
    pub fn untrusted(kid: impl Into<String>) -> Self {
        Self::UntrustedKeyId { kid: kid.into() }
    }

    /// Create a malformed token error.
    #[must_use]
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedToken(msg.into())
    }

    /// Create a missing claim error raised at issuance.
    #[must_use]
    pub fn claim_missing(claim: impl Into<String>) -> Self {
        Self::ClaimMissing {
            claim: claim.into(),
        }
    }

    /// Create a missing claim error raised at verification.
    #[must_use]
    pub fn required_claim_missing(claim: impl Into<String>) -> Self {
        Self::RequiredClaimMissing {
            claim: claim.into(),
        }
    }

    /// Create a key generation error.
    #[must_use]
    pub fn key_generation(msg: impl Into<String>) -> Self {
        Self::KeyGeneration(msg.into())
    }

    /// Create a signing error.
    #[must_use]
    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable error code for logs and response bodies.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidKeyEncoding(_) => TRUST_INVALID_KEY_ENCODING,
            Self::UnknownKeyId => TRUST_UNKNOWN_KEY_ID,
            Self::UntrustedKeyId { .. } => TRUST_UNTRUSTED_KEY_ID,
            Self::MalformedToken(_) => TOKEN_MALFORMED,
            Self::BadSignature => TOKEN_BAD_SIGNATURE,
            Self::TokenExpired { .. } => TOKEN_EXPIRED,
            Self::TokenNotYetValid { .. } => TOKEN_NOT_YET_VALID,
            Self::ClaimMissing { .. } => TOKEN_CLAIM_MISSING,
            Self::RequiredClaimMissing { .. } => TOKEN_REQUIRED_CLAIM_MISSING,
            Self::ClaimMismatch { .. } => TOKEN_CLAIM_MISMATCH,
            Self::KeyGeneration(_) => TRUST_KEY_GENERATION,
            Self::Signing(_) => TOKEN_SIGNING,
            Self::Config(_) => TRUST_CONFIG,
        }
    }

    /// Whether the failure is the caller's or this instance's.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::KeyGeneration(_) | Self::Signing(_) | Self::Config(_) => ErrorCategory::Server,
            _ => ErrorCategory::Client,
        }
    }
}

impl From<rust_common::EnvError> for TrustError {
    fn from(err: rust_common::EnvError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result alias for trust operations.
pub type TrustResult<T> = Result<T, TrustError>;

// Error codes for response bodies and metric labels
pub const TRUST_INVALID_KEY_ENCODING: &str = "TRUST_INVALID_KEY_ENCODING";
pub const TRUST_UNKNOWN_KEY_ID: &str = "TRUST_UNKNOWN_KEY_ID";
pub const TRUST_UNTRUSTED_KEY_ID: &str = "TRUST_UNTRUSTED_KEY_ID";
pub const TRUST_KEY_GENERATION: &str = "TRUST_KEY_GENERATION";
pub const TRUST_CONFIG: &str = "TRUST_CONFIG";
pub const TOKEN_MALFORMED: &str = "TOKEN_MALFORMED";
pub const TOKEN_BAD_SIGNATURE: &str = "TOKEN_BAD_SIGNATURE";
pub const TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";
pub const TOKEN_NOT_YET_VALID: &str = "TOKEN_NOT_YET_VALID";
pub const TOKEN_CLAIM_MISSING: &str = "TOKEN_CLAIM_MISSING";
pub const TOKEN_REQUIRED_CLAIM_MISSING: &str = "TOKEN_REQUIRED_CLAIM_MISSING";
pub const TOKEN_CLAIM_MISMATCH: &str = "TOKEN_CLAIM_MISMATCH";
pub const TOKEN_SIGNING: &str = "TOKEN_SIGNING";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        let client = [
            TrustError::invalid_key("bad"),
            TrustError::UnknownKeyId,
            TrustError::untrusted("kid-1"),
            TrustError::malformed("bad"),
            TrustError::BadSignature,
            TrustError::TokenExpired { expired_at: 1 },
            TrustError::TokenNotYetValid { not_before: 1 },
            TrustError::claim_missing("userName"),
            TrustError::required_claim_missing("userName"),
        ];
        for err in client {
            assert_eq!(err.category(), ErrorCategory::Client, "{err}");
        }
    }

    #[test]
    fn test_server_errors() {
        assert_eq!(TrustError::key_generation("rng").category(), ErrorCategory::Server);
        assert_eq!(TrustError::signing("encode").category(), ErrorCategory::Server);
        assert_eq!(TrustError::config("ttl").category(), ErrorCategory::Server);
    }

    #[test]
    fn test_codes_distinguish_unknown_and_untrusted() {
        assert_eq!(TrustError::UnknownKeyId.code(), TRUST_UNKNOWN_KEY_ID);
        assert_eq!(TrustError::untrusted("x").code(), TRUST_UNTRUSTED_KEY_ID);
        assert_ne!(TrustError::UnknownKeyId.code(), TrustError::untrusted("x").code());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            TrustError::claim_missing("userName").to_string(),
            "userName claim is required"
        );
        assert_eq!(
            TrustError::untrusted("abc").to_string(),
            "No public key registered for kid: abc"
        );
    }
}

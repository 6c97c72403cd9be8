//! Trust Service library.
//!
//! Provides per-instance asymmetric signing keys, a kid-indexed registry of
//! trusted peer public keys, signed token issuance and verification, and
//! the verification contract token consumers depend on.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod jwt;
pub mod keys;
pub mod metrics;
pub mod service;
pub mod verify;

// Re-exports for convenience
pub use config::{Config, KeyAlgorithm};
pub use error::{ErrorCategory, TrustError, TrustResult};
pub use jwt::{ClaimRequirements, ClaimSet, Token, TokenCodec};
pub use keys::{KeyTrustRegistry, PublicCredential};
pub use service::TrustService;
pub use verify::{TokenVerifier, bearer_token};

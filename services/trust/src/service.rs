//! Trust service facade.
//!
//! One registry plus the two token codecs, exposing the operations a
//! request handler or message consumer performs.

use crate::config::Config;
use crate::error::{TrustError, TrustResult};
use crate::jwt::{ClaimRequirements, ClaimSet, Token, TokenCodec};
use crate::keys::{KeyTrustRegistry, PublicCredential};
use crate::metrics;
use crate::verify::TokenVerifier;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Token type label for service-to-service tokens.
pub const SERVICE_TOKEN: &str = "service";
/// Token type label for demo tokens.
pub const DEMO_TOKEN: &str = "demo";

/// Key trust and token operations of one service instance.
#[derive(Debug)]
pub struct TrustService {
    registry: Arc<KeyTrustRegistry>,
    service_codec: TokenCodec,
    demo_codec: TokenCodec,
    identity_claim: String,
}

impl TrustService {
    /// Create the service with a freshly generated signing identity.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::KeyGeneration`] if the first key pair cannot
    /// be generated.
    pub fn new(config: &Config) -> TrustResult<Self> {
        let registry = Arc::new(KeyTrustRegistry::new(config.key_algorithm)?);
        Ok(Self::with_registry(registry, config))
    }

    /// Create the service around an existing registry.
    #[must_use]
    pub fn with_registry(registry: Arc<KeyTrustRegistry>, config: &Config) -> Self {
        let service_codec = TokenCodec::new(config.service_token_ttl)
            .with_leeway(config.clock_skew)
            .require_claim(config.identity_claim.clone())
            .with_label(SERVICE_TOKEN);
        let demo_codec = TokenCodec::new(config.demo_token_ttl)
            .with_leeway(config.clock_skew)
            .with_label(DEMO_TOKEN);

        Self {
            registry,
            service_codec,
            demo_codec,
            identity_claim: config.identity_claim.clone(),
        }
    }

    /// Underlying registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<KeyTrustRegistry> {
        &self.registry
    }

    /// Replace this instance's signing identity and return the new
    /// credential to hand to peers.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::KeyGeneration`] if key generation fails.
    pub fn rotate_credentials(&self) -> TrustResult<PublicCredential> {
        self.registry.rotate()
    }

    /// This instance's current credential.
    #[must_use]
    pub fn public_credentials(&self) -> PublicCredential {
        self.registry.current_public_credential()
    }

    /// Trust a peer's credential and echo back what was stored.
    ///
    /// # Errors
    ///
    /// [`TrustError::UnknownKeyId`] or [`TrustError::InvalidKeyEncoding`].
    pub fn add_public_credentials(
        &self,
        credential: &PublicCredential,
    ) -> TrustResult<PublicCredential> {
        self.registry.register_credential(credential)?;
        self.registry.trusted_credential(&credential.kid)
    }

    /// Issue a short-lived token for calling another service. The identity
    /// claim is mandatory.
    ///
    /// # Errors
    ///
    /// [`TrustError::ClaimMissing`] if the identity claim is absent,
    /// [`TrustError::Signing`] if encoding fails.
    pub fn issue_service_token(&self, claims: ClaimSet) -> TrustResult<Token> {
        self.service_codec.issue(claims, &self.registry)
    }

    /// [`issue_service_token`](Self::issue_service_token) at an explicit time.
    ///
    /// # Errors
    ///
    /// Same as [`issue_service_token`](Self::issue_service_token).
    pub fn issue_service_token_at(&self, claims: ClaimSet, now: i64) -> TrustResult<Token> {
        self.service_codec.issue_at(claims, &self.registry, now)
    }

    /// Issue a token with the long demo window and no mandatory claims.
    ///
    /// # Errors
    ///
    /// [`TrustError::Signing`] if encoding fails.
    pub fn issue_demo_token(&self, claims: ClaimSet) -> TrustResult<Token> {
        self.demo_codec.issue(claims, &self.registry)
    }

    /// Verify `raw` as of `now`, recording the outcome.
    ///
    /// # Errors
    ///
    /// See [`TokenCodec::verify_at`].
    pub fn verify_token_at(&self, raw: &str, now: i64) -> TrustResult<ClaimSet> {
        let result = self.service_codec.verify_at(raw, self.registry.as_ref(), now);

        match &result {
            Ok(claims) => {
                metrics::record_token_verification("ok");
                debug!(claims = claims.len(), "Token verified");
            }
            Err(e) => {
                metrics::record_token_verification(e.code());
                warn!(error = %e, code = e.code(), "Token rejected");
            }
        }

        result
    }

    /// Verify `raw` and return the identity claim it speaks for.
    ///
    /// # Errors
    ///
    /// Any verification failure, [`TrustError::RequiredClaimMissing`] if
    /// the identity claim is absent, or [`TrustError::ClaimMismatch`] if it
    /// is not a string.
    pub fn verify_identity(&self, raw: &str) -> TrustResult<String> {
        let claims = self.verify_token(raw)?;
        ClaimRequirements::new()
            .require(self.identity_claim.as_str())
            .check(&claims)?;

        let identity = claims.get_str(&self.identity_claim).ok_or_else(|| {
            TrustError::ClaimMismatch {
                claim: self.identity_claim.clone(),
                expected: "a string".to_string(),
                actual: claims
                    .get(&self.identity_claim)
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            }
        })?;

        info!(identity = %identity, "Verified caller identity");
        Ok(identity.to_string())
    }
}

impl TokenVerifier for TrustService {
    fn verify_token(&self, raw: &str) -> TrustResult<ClaimSet> {
        self.verify_token_at(raw, chrono::Utc::now().timestamp())
    }
}

//! Token issuance and verification.
//!
//! Signatures go through `jsonwebtoken`; its own time validation is switched
//! off so expiry and not-before are checked here against an explicit clock
//! reading with inclusive bounds.

use crate::error::{TrustError, TrustResult};
use crate::jwt::claims::{ClaimSet, EXPIRATION, ISSUED_AT, NOT_BEFORE};
use crate::jwt::resolver::SigningKeyResolver;
use crate::jwt::token::Token;
use crate::keys::KeyTrustRegistry;
use crate::metrics;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Header, Validation, decode, encode};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

/// Issues and verifies signed tokens with a fixed validity window.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    label: String,
    validity: Duration,
    leeway: Duration,
    mandatory_claims: Vec<String>,
}

impl TokenCodec {
    /// Codec whose tokens are valid for `validity` from issuance.
    #[must_use]
    pub fn new(validity: Duration) -> Self {
        Self {
            label: "default".to_string(),
            validity,
            leeway: Duration::ZERO,
            mandatory_claims: Vec::new(),
        }
    }

    /// Clock skew tolerated on both `exp` and `nbf`.
    #[must_use]
    pub const fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Refuse to issue tokens whose claims lack `claim`.
    #[must_use]
    pub fn require_claim(mut self, claim: impl Into<String>) -> Self {
        self.mandatory_claims.push(claim.into());
        self
    }

    /// Token type used in metrics and logs.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Validity window.
    #[must_use]
    pub const fn validity(&self) -> Duration {
        self.validity
    }

    /// Sign `claims` with the registry's current key, stamped at the
    /// current time.
    ///
    /// # Errors
    ///
    /// See [`issue_at`](Self::issue_at).
    pub fn issue(&self, claims: ClaimSet, registry: &KeyTrustRegistry) -> TrustResult<Token> {
        self.issue_at(claims, registry, chrono::Utc::now().timestamp())
    }

    /// Sign `claims` with the registry's current key as if issued at `now`
    /// (seconds since epoch).
    ///
    /// `iat` and `nbf` become `now`, `exp` becomes `now + validity`;
    /// caller-supplied values for those claims are overwritten.
    ///
    /// # Errors
    ///
    /// - [`TrustError::ClaimMissing`] if a mandatory claim is absent or
    ///   null. Nothing is signed in that case.
    /// - [`TrustError::Signing`] if encoding fails.
    pub fn issue_at(
        &self,
        mut claims: ClaimSet,
        registry: &KeyTrustRegistry,
        now: i64,
    ) -> TrustResult<Token> {
        if let Some(missing) = self.mandatory_claims.iter().find(|c| !claims.contains(c)) {
            return Err(TrustError::claim_missing(missing.as_str()));
        }

        claims.stamp(now, secs(self.validity));

        let key = registry.current_signing_key();
        let mut header = Header::new(key.algorithm().jwt_algorithm());
        header.kid = Some(key.kid().to_string());

        let compact = encode(&header, &claims, key.encoding_key())
            .map_err(|e| TrustError::signing(e.to_string()))?;

        metrics::record_token_issued(&self.label, key.algorithm().as_str());
        debug!(
            kid = %key.kid(),
            token_type = %self.label,
            expires_at = claims.expiration().unwrap_or_default(),
            "Issued token"
        );

        Ok(Token::new(compact))
    }

    /// Verify `token` against the current time.
    ///
    /// # Errors
    ///
    /// See [`verify_at`](Self::verify_at).
    pub fn verify(&self, token: &str, resolver: &dyn SigningKeyResolver) -> TrustResult<ClaimSet> {
        self.verify_at(token, resolver, chrono::Utc::now().timestamp())
    }

    /// Verify `token` as of `now` and return its claims unmodified.
    ///
    /// Checks run in order and the first failure wins: structure, key id,
    /// signature, presence of `iat`/`nbf`/`exp`, expiry, not-before.
    ///
    /// # Errors
    ///
    /// - [`TrustError::MalformedToken`] if the token is not three base64url
    ///   segments holding a JSON header, a JSON object and a signature.
    /// - [`TrustError::UnknownKeyId`] / [`TrustError::UntrustedKeyId`] from
    ///   the resolver.
    /// - [`TrustError::BadSignature`] if the signature segment does not
    ///   decode or verify, or the header names another algorithm than the
    ///   resolved key's.
    /// - [`TrustError::RequiredClaimMissing`] for a missing time claim.
    /// - [`TrustError::TokenExpired`] if `now > exp + leeway`.
    /// - [`TrustError::TokenNotYetValid`] if `now < nbf - leeway`.
    pub fn verify_at(
        &self,
        token: &str,
        resolver: &dyn SigningKeyResolver,
        now: i64,
    ) -> TrustResult<ClaimSet> {
        let token = token.trim();
        let (header, signature) = parse_structure(token)?;
        let key = resolver.resolve_signing_key(header.kid.as_deref())?;

        if URL_SAFE_NO_PAD.decode(signature).is_err() {
            debug!(kid = %key.kid(), "Signature segment is not base64url");
            return Err(TrustError::BadSignature);
        }

        let mut validation = Validation::new(key.algorithm().jwt_algorithm());
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let claims = decode::<ClaimSet>(token, key.decoding_key(), &validation)
            .map_err(|e| match e.kind() {
                // Header and claims already decoded, so Base64 here is the signature
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::Base64(_) => {
                    debug!(kid = %key.kid(), error = %e, "Signature rejected");
                    TrustError::BadSignature
                }
                _ => TrustError::malformed(e.to_string()),
            })?
            .claims;

        let _issued_at = claims.timestamp(ISSUED_AT)?;
        let not_before = claims.timestamp(NOT_BEFORE)?;
        let expires_at = claims.timestamp(EXPIRATION)?;
        let leeway = secs(self.leeway);

        if now > expires_at.saturating_add(leeway) {
            return Err(TrustError::TokenExpired {
                expired_at: expires_at,
            });
        }
        if now < not_before.saturating_sub(leeway) {
            return Err(TrustError::TokenNotYetValid { not_before });
        }

        Ok(claims)
    }
}

fn secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

/// Check the compact form without trusting anything in it. Returns the
/// header and the still-encoded signature segment.
fn parse_structure(token: &str) -> TrustResult<(Header, &str)> {
    let mut segments = token.split('.');
    let (Some(header), Some(claims), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TrustError::malformed("expected three dot-separated segments"));
    };

    let header: Header = serde_json::from_slice(&decode_segment("header", header)?)
        .map_err(|e| TrustError::malformed(format!("header is not a JWS header: {e}")))?;

    serde_json::from_slice::<Map<String, Value>>(&decode_segment("claims", claims)?)
        .map_err(|e| TrustError::malformed(format!("claims are not a JSON object: {e}")))?;

    if signature.is_empty() {
        return Err(TrustError::malformed("signature segment is empty"));
    }

    Ok((header, signature))
}

fn decode_segment(name: &str, segment: &str) -> TrustResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TrustError::malformed(format!("{name} segment is not base64url: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyAlgorithm;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn registry() -> KeyTrustRegistry {
        KeyTrustRegistry::new(KeyAlgorithm::ES256).unwrap()
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(Duration::from_secs(60)).require_claim("userName")
    }

    fn anna() -> ClaimSet {
        ClaimSet::new().with("userName", "anna")
    }

    /// Sign arbitrary header/claims with the registry's private key.
    fn sign_raw(registry: &KeyTrustRegistry, header: &Header, claims: &Value) -> String {
        encode(header, claims, registry.current_signing_key().encoding_key()).unwrap()
    }

    fn es256_header(kid: Option<&str>) -> Header {
        let mut header = Header::new(jsonwebtoken::Algorithm::ES256);
        header.kid = kid.map(str::to_string);
        header
    }

    #[test]
    fn test_issue_then_verify_returns_claims() {
        for algorithm in [KeyAlgorithm::ES256, KeyAlgorithm::EdDSA] {
            let registry = KeyTrustRegistry::new(algorithm).unwrap();
            let token = codec()
                .issue_at(anna().with("role", "reader"), &registry, NOW)
                .unwrap();

            let claims = codec().verify_at(token.as_str(), &registry, NOW).unwrap();

            assert_eq!(claims.get_str("userName"), Some("anna"));
            assert_eq!(claims.get_str("role"), Some("reader"));
            assert_eq!(claims.issued_at(), Some(NOW));
            assert_eq!(claims.not_before(), Some(NOW));
            assert_eq!(claims.expiration(), Some(NOW + 60));
        }
    }

    #[test]
    fn test_issued_header_carries_current_kid() {
        let registry = registry();
        let token = codec().issue_at(anna(), &registry, NOW).unwrap();

        let header = jsonwebtoken::decode_header(token.as_str()).unwrap();
        assert_eq!(header.kid, Some(registry.current_public_credential().kid));
        assert_eq!(header.alg, jsonwebtoken::Algorithm::ES256);
    }

    #[test]
    fn test_caller_time_claims_are_overwritten() {
        let registry = registry();
        let claims = anna().with(ISSUED_AT, 1).with(NOT_BEFORE, 1).with(EXPIRATION, 2);

        let token = codec().issue_at(claims, &registry, NOW).unwrap();
        let verified = codec().verify_at(token.as_str(), &registry, NOW).unwrap();

        assert_eq!(verified.expiration(), Some(NOW + 60));
    }

    #[test]
    fn test_mandatory_claim_missing_or_null() {
        let registry = registry();

        let err = codec().issue_at(ClaimSet::new(), &registry, NOW).unwrap_err();
        assert_eq!(err, TrustError::claim_missing("userName"));

        let nulled = ClaimSet::new().with("userName", Value::Null);
        let err = codec().issue_at(nulled, &registry, NOW).unwrap_err();
        assert_eq!(err, TrustError::claim_missing("userName"));
    }

    #[test]
    fn test_expiry_bound_is_inclusive() {
        let registry = registry();
        let token = codec().issue_at(anna(), &registry, NOW).unwrap();

        assert!(codec().verify_at(token.as_str(), &registry, NOW + 60).is_ok());
        assert_eq!(
            codec().verify_at(token.as_str(), &registry, NOW + 61).unwrap_err(),
            TrustError::TokenExpired {
                expired_at: NOW + 60
            }
        );
    }

    #[test]
    fn test_not_before_bound_is_inclusive() {
        let registry = registry();
        let token = codec().issue_at(anna(), &registry, NOW).unwrap();

        assert!(codec().verify_at(token.as_str(), &registry, NOW).is_ok());
        assert_eq!(
            codec().verify_at(token.as_str(), &registry, NOW - 1).unwrap_err(),
            TrustError::TokenNotYetValid { not_before: NOW }
        );
    }

    #[test]
    fn test_leeway_widens_both_bounds() {
        let registry = registry();
        let codec = codec().with_leeway(Duration::from_secs(5));
        let token = codec.issue_at(anna(), &registry, NOW).unwrap();

        assert!(codec.verify_at(token.as_str(), &registry, NOW + 65).is_ok());
        assert!(matches!(
            codec.verify_at(token.as_str(), &registry, NOW + 66),
            Err(TrustError::TokenExpired { .. })
        ));
        assert!(codec.verify_at(token.as_str(), &registry, NOW - 5).is_ok());
        assert!(matches!(
            codec.verify_at(token.as_str(), &registry, NOW - 6),
            Err(TrustError::TokenNotYetValid { .. })
        ));
    }

    #[test]
    fn test_tampered_claims_fail_signature() {
        let registry = registry();
        let token = codec().issue_at(anna(), &registry, NOW).unwrap();
        let parts: Vec<&str> = token.as_str().split('.').collect();

        let forged_claims = URL_SAFE_NO_PAD.encode(
            json!({"userName": "mallory", "iat": NOW, "nbf": NOW, "exp": NOW + 60}).to_string(),
        );
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);

        assert_eq!(
            codec().verify_at(&forged, &registry, NOW).unwrap_err(),
            TrustError::BadSignature
        );
    }

    #[test]
    fn test_flipped_signature_byte_fails_signature() {
        let registry = registry();
        let token = codec().issue_at(anna(), &registry, NOW).unwrap();
        let parts: Vec<&str> = token.as_str().split('.').collect();

        let mut signature = URL_SAFE_NO_PAD.decode(parts[2]).unwrap();
        signature[10] ^= 0x01;
        let forged = format!("{}.{}.{}", parts[0], parts[1], URL_SAFE_NO_PAD.encode(signature));

        assert_eq!(
            codec().verify_at(&forged, &registry, NOW).unwrap_err(),
            TrustError::BadSignature
        );
    }

    #[test]
    fn test_any_flipped_signature_character_fails_signature() {
        for algorithm in [KeyAlgorithm::ES256, KeyAlgorithm::EdDSA] {
            let registry = KeyTrustRegistry::new(algorithm).unwrap();
            let token = codec().issue_at(anna(), &registry, NOW).unwrap();
            let (signed, signature) = token.as_str().rsplit_once('.').unwrap();

            for position in 0..signature.len() {
                let mut chars = signature.as_bytes().to_vec();
                chars[position] ^= 0x01;
                let forged = format!("{signed}.{}", String::from_utf8(chars).unwrap());

                assert_eq!(
                    codec().verify_at(&forged, &registry, NOW).unwrap_err(),
                    TrustError::BadSignature,
                    "{algorithm} signature character {position}"
                );
            }
        }
    }

    #[test]
    fn test_undecodable_signature_under_foreign_kid_is_untrusted() {
        let issuer = registry();
        let verifier = registry();
        let token = codec().issue_at(anna(), &issuer, NOW).unwrap();
        let (signed, _) = token.as_str().rsplit_once('.').unwrap();

        assert!(matches!(
            codec().verify_at(&format!("{signed}.@@@@"), &verifier, NOW),
            Err(TrustError::UntrustedKeyId { .. })
        ));
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let registry = registry();
        let token = codec().issue_at(anna(), &registry, NOW).unwrap();

        let padded = format!("  {token}\n");
        assert!(codec().verify_at(&padded, &registry, NOW).is_ok());
    }

    #[test]
    fn test_header_algorithm_must_match_key() {
        let registry = registry();
        let token = codec().issue_at(anna(), &registry, NOW).unwrap();
        let parts: Vec<&str> = token.as_str().split('.').collect();

        let kid = registry.current_public_credential().kid;
        let swapped = URL_SAFE_NO_PAD.encode(json!({"alg": "EdDSA", "kid": kid}).to_string());
        let forged = format!("{}.{}.{}", swapped, parts[1], parts[2]);

        assert_eq!(
            codec().verify_at(&forged, &registry, NOW).unwrap_err(),
            TrustError::BadSignature
        );
    }

    #[test]
    fn test_foreign_kid_is_untrusted_not_bad_signature() {
        let issuer = registry();
        let verifier = registry();
        let token = codec().issue_at(anna(), &issuer, NOW).unwrap();

        let err = codec().verify_at(token.as_str(), &verifier, NOW).unwrap_err();
        assert_eq!(err, TrustError::untrusted(issuer.current_public_credential().kid));
    }

    #[test]
    fn test_token_after_issuer_rotation_is_untrusted() {
        let registry = registry();
        let token = codec().issue_at(anna(), &registry, NOW).unwrap();

        registry.rotate().unwrap();

        assert!(matches!(
            codec().verify_at(token.as_str(), &registry, NOW),
            Err(TrustError::UntrustedKeyId { .. })
        ));
    }

    #[test]
    fn test_missing_or_blank_kid_is_unknown() {
        let registry = registry();
        let claims = json!({"userName": "anna", "iat": NOW, "nbf": NOW, "exp": NOW + 60});

        for header in [es256_header(None), es256_header(Some(""))] {
            let token = sign_raw(&registry, &header, &claims);
            assert_eq!(
                codec().verify_at(&token, &registry, NOW).unwrap_err(),
                TrustError::UnknownKeyId
            );
        }
    }

    #[test]
    fn test_missing_time_claim_is_required_claim_missing() {
        let registry = registry();
        let kid = registry.current_public_credential().kid;
        let claims = json!({"userName": "anna", "iat": NOW, "nbf": NOW});

        let token = sign_raw(&registry, &es256_header(Some(&kid)), &claims);

        assert_eq!(
            codec().verify_at(&token, &registry, NOW).unwrap_err(),
            TrustError::required_claim_missing(EXPIRATION)
        );
    }

    #[test]
    fn test_malformed_tokens() {
        let registry = registry();
        let token = codec().issue_at(anna(), &registry, NOW).unwrap();
        let parts: Vec<&str> = token.as_str().split('.').collect();
        let not_an_object = URL_SAFE_NO_PAD.encode("[1,2,3]");

        let cases = [
            String::new(),
            "not-a-token".to_string(),
            "a.b".to_string(),
            format!("{}.extra", token.as_str()),
            format!("{}.{}.", parts[0], parts[1]),
            format!("!!!.{}.{}", parts[1], parts[2]),
            format!("{}.{}.{}", parts[0], not_an_object, parts[2]),
        ];

        for case in cases {
            let err = codec().verify_at(&case, &registry, NOW).unwrap_err();
            assert!(
                matches!(err, TrustError::MalformedToken(_)),
                "{case:?} gave {err:?}"
            );
        }
    }
}

//! Key pair generation and public key encoding.
//!
//! Key pairs are generated with `ring`. Public keys travel between instances
//! as base64url (unpadded) X.509 SubjectPublicKeyInfo DER; the algorithm is
//! recovered from the SPKI algorithm identifier, so a credential needs no
//! separate algorithm field.

use crate::config::KeyAlgorithm;
use crate::error::{TrustError, TrustResult};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::pkcs8::{DecodePublicKey as _, EncodePublicKey as _};
use jsonwebtoken::{DecodingKey, EncodingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_FIXED_SIGNING, EcdsaKeyPair, Ed25519KeyPair, KeyPair};
use sha2::{Digest, Sha256};
use std::fmt;

/// Public half of a key pair, in both wire (SPKI) and verifier (raw) form.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKeyMaterial {
    algorithm: KeyAlgorithm,
    spki_der: Vec<u8>,
    // Uncompressed SEC1 point for P-256, 32 bytes for Ed25519
    raw: Vec<u8>,
}

impl PublicKeyMaterial {
    /// Build from the raw public key bytes `ring` hands out.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::InvalidKeyEncoding`] if the bytes are not a
    /// valid key for `algorithm`.
    pub fn from_raw(algorithm: KeyAlgorithm, raw: &[u8]) -> TrustResult<Self> {
        let spki = match algorithm {
            KeyAlgorithm::ES256 => p256::PublicKey::from_sec1_bytes(raw)
                .map_err(|e| TrustError::invalid_key(format!("invalid P-256 point: {e}")))?
                .to_public_key_der()
                .map_err(|e| TrustError::invalid_key(format!("cannot encode P-256 key: {e}")))?
                .as_bytes()
                .to_vec(),
            KeyAlgorithm::EdDSA => {
                let bytes: [u8; 32] = raw
                    .try_into()
                    .map_err(|_| TrustError::invalid_key("Ed25519 public key must be 32 bytes"))?;
                ed25519_dalek::VerifyingKey::from_bytes(&bytes)
                    .map_err(|e| TrustError::invalid_key(format!("invalid Ed25519 key: {e}")))?
                    .to_public_key_der()
                    .map_err(|e| {
                        TrustError::invalid_key(format!("cannot encode Ed25519 key: {e}"))
                    })?
                    .as_bytes()
                    .to_vec()
            }
        };

        Ok(Self {
            algorithm,
            spki_der: spki,
            raw: raw.to_vec(),
        })
    }

    /// Decode a SubjectPublicKeyInfo DER document.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::InvalidKeyEncoding`] unless the document holds
    /// a P-256 or Ed25519 public key.
    pub fn from_spki_der(der: &[u8]) -> TrustResult<Self> {
        if let Ok(key) = p256::PublicKey::from_public_key_der(der) {
            return Ok(Self {
                algorithm: KeyAlgorithm::ES256,
                spki_der: der.to_vec(),
                raw: key.to_encoded_point(false).as_bytes().to_vec(),
            });
        }

        if let Ok(key) = ed25519_dalek::VerifyingKey::from_public_key_der(der) {
            return Ok(Self {
                algorithm: KeyAlgorithm::EdDSA,
                spki_der: der.to_vec(),
                raw: key.to_bytes().to_vec(),
            });
        }

        Err(TrustError::invalid_key(
            "expected a P-256 or Ed25519 SubjectPublicKeyInfo",
        ))
    }

    /// Decode the base64url wire form. Trailing `=` padding is tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::InvalidKeyEncoding`] for bad base64url or an
    /// unsupported key.
    pub fn from_base64url(encoded: &str) -> TrustResult<Self> {
        let der = URL_SAFE_NO_PAD
            .decode(encoded.trim().trim_end_matches('='))
            .map_err(|e| TrustError::invalid_key(format!("public key is not base64url: {e}")))?;
        Self::from_spki_der(&der)
    }

    /// Base64url (unpadded) SPKI DER.
    #[must_use]
    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.spki_der)
    }

    /// Signature algorithm this key verifies.
    #[must_use]
    pub const fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// SubjectPublicKeyInfo DER bytes.
    #[must_use]
    pub fn spki_der(&self) -> &[u8] {
        &self.spki_der
    }

    /// Verification key for `jsonwebtoken`.
    #[must_use]
    pub fn decoding_key(&self) -> DecodingKey {
        match self.algorithm {
            KeyAlgorithm::ES256 => DecodingKey::from_ec_der(&self.raw),
            KeyAlgorithm::EdDSA => DecodingKey::from_ed_der(&self.raw),
        }
    }

    /// Short SHA-256 fingerprint of the SPKI, for logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        Sha256::digest(&self.spki_der)
            .iter()
            .take(8)
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

impl fmt::Debug for PublicKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKeyMaterial")
            .field("algorithm", &self.algorithm)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// A freshly generated key pair. The private half is only reachable as a
/// `jsonwebtoken` encoding key and is never printed.
pub struct SigningKeyPair {
    encoding_key: EncodingKey,
    public_key: PublicKeyMaterial,
}

impl SigningKeyPair {
    /// Generate a key pair for `algorithm`.
    ///
    /// This is the expensive step of a rotation (tens of microseconds for
    /// P-256 and Ed25519).
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::KeyGeneration`] if the system RNG or the key
    /// encoder fails.
    pub fn generate(algorithm: KeyAlgorithm) -> TrustResult<Self> {
        let rng = SystemRandom::new();

        match algorithm {
            KeyAlgorithm::ES256 => {
                let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
                    .map_err(|_| TrustError::key_generation("P-256 key generation failed"))?;
                let pair =
                    EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng)
                        .map_err(|e| {
                            TrustError::key_generation(format!("generated P-256 key rejected: {e}"))
                        })?;
                Ok(Self {
                    encoding_key: EncodingKey::from_ec_der(pkcs8.as_ref()),
                    public_key: PublicKeyMaterial::from_raw(algorithm, pair.public_key().as_ref())
                        .map_err(|e| TrustError::key_generation(e.to_string()))?,
                })
            }
            KeyAlgorithm::EdDSA => {
                let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
                    .map_err(|_| TrustError::key_generation("Ed25519 key generation failed"))?;
                let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).map_err(|e| {
                    TrustError::key_generation(format!("generated Ed25519 key rejected: {e}"))
                })?;
                Ok(Self {
                    encoding_key: EncodingKey::from_ed_der(pkcs8.as_ref()),
                    public_key: PublicKeyMaterial::from_raw(algorithm, pair.public_key().as_ref())
                        .map_err(|e| TrustError::key_generation(e.to_string()))?,
                })
            }
        }
    }

    /// Signature algorithm of this pair.
    #[must_use]
    pub const fn algorithm(&self) -> KeyAlgorithm {
        self.public_key.algorithm
    }

    /// Public half.
    #[must_use]
    pub const fn public_key(&self) -> &PublicKeyMaterial {
        &self.public_key
    }

    pub(crate) const fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

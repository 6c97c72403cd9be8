//! Key trust registry.
//!
//! Owns this instance's signing identity (kid + key pair) and the map of
//! public keys it accepts signatures from. The active identity is an
//! immutable snapshot swapped atomically, so a reader always sees a kid
//! together with the key pair it was minted for. The trust map sits behind
//! its own lock; rotation publishes the new identity while holding that
//! lock, which makes rotation and registration mutually exclusive.

use crate::config::KeyAlgorithm;
use crate::error::{TrustError, TrustResult};
use crate::keys::credential::PublicCredential;
use crate::keys::material::{PublicKeyMaterial, SigningKeyPair};
use crate::metrics;
use arc_swap::ArcSwap;
use jsonwebtoken::{DecodingKey, EncodingKey};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// How an entry got into the trust map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Self-registered by a rotation of this instance
    Local,
    /// Inserted by an explicit [`KeyTrustRegistry::register`] call
    Registered,
}

/// A public key this instance accepts signatures from.
pub struct TrustedKey {
    kid: String,
    material: PublicKeyMaterial,
    decoding_key: DecodingKey,
    origin: KeyOrigin,
}

impl TrustedKey {
    fn new(kid: impl Into<String>, material: PublicKeyMaterial, origin: KeyOrigin) -> Self {
        let decoding_key = material.decoding_key();
        Self {
            kid: kid.into(),
            material,
            decoding_key,
            origin,
        }
    }

    /// Key id.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Algorithm signatures under this key must use.
    #[must_use]
    pub const fn algorithm(&self) -> KeyAlgorithm {
        self.material.algorithm()
    }

    /// Public key material.
    #[must_use]
    pub const fn material(&self) -> &PublicKeyMaterial {
        &self.material
    }

    /// How the entry was inserted.
    #[must_use]
    pub const fn origin(&self) -> KeyOrigin {
        self.origin
    }

    /// The entry as an exportable credential.
    #[must_use]
    pub fn credential(&self) -> PublicCredential {
        PublicCredential::new(self.kid.clone(), self.material.to_base64url())
    }

    pub(crate) const fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for TrustedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustedKey")
            .field("kid", &self.kid)
            .field("material", &self.material)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// This instance's signing identity. Replaced wholesale on rotation.
#[derive(Debug)]
struct ActiveIdentity {
    kid: String,
    key_pair: SigningKeyPair,
    credential: PublicCredential,
}

impl ActiveIdentity {
    fn generate(algorithm: KeyAlgorithm) -> TrustResult<Self> {
        let key_pair = SigningKeyPair::generate(algorithm)?;
        let kid = Uuid::new_v4().to_string();
        let credential = PublicCredential::new(kid.clone(), key_pair.public_key().to_base64url());
        Ok(Self {
            kid,
            key_pair,
            credential,
        })
    }

    fn trusted_key(&self) -> Arc<TrustedKey> {
        Arc::new(TrustedKey::new(
            self.kid.clone(),
            self.key_pair.public_key().clone(),
            KeyOrigin::Local,
        ))
    }
}

/// Handle on the active private key, handed to the token codec only.
///
/// Holds one identity snapshot, so the kid and the key always belong
/// together even if a rotation happens while the handle is alive.
pub(crate) struct SigningKey(Arc<ActiveIdentity>);

impl SigningKey {
    pub(crate) fn kid(&self) -> &str {
        &self.0.kid
    }

    pub(crate) fn algorithm(&self) -> KeyAlgorithm {
        self.0.key_pair.algorithm()
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        self.0.key_pair.encoding_key()
    }
}

/// Registry of this instance's signing identity and its trusted public keys.
///
/// Entries are never expired; they live until the process exits. There is
/// no removal operation.
pub struct KeyTrustRegistry {
    algorithm: KeyAlgorithm,
    active: ArcSwap<ActiveIdentity>,
    trusted: RwLock<HashMap<String, Arc<TrustedKey>>>,
}

impl KeyTrustRegistry {
    /// Create a registry with a freshly generated signing identity that
    /// already trusts itself.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::KeyGeneration`] if the first key pair cannot
    /// be generated.
    pub fn new(algorithm: KeyAlgorithm) -> TrustResult<Self> {
        let identity = ActiveIdentity::generate(algorithm)?;
        let mut trusted = HashMap::new();
        trusted.insert(identity.kid.clone(), identity.trusted_key());

        info!(
            kid = %identity.kid,
            algorithm = %algorithm,
            fingerprint = %identity.key_pair.public_key().fingerprint(),
            "Created signing identity"
        );
        metrics::record_key_rotation(algorithm.as_str());

        Ok(Self {
            algorithm,
            active: ArcSwap::from_pointee(identity),
            trusted: RwLock::new(trusted),
        })
    }

    /// Algorithm used for this instance's key pairs.
    #[must_use]
    pub const fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// Replace the signing identity with a fresh key pair and kid.
    ///
    /// The new key is trusted immediately. The previous local key stops
    /// resolving unless it was separately registered; entries added by
    /// [`register`](Self::register) are left alone.
    ///
    /// Key generation runs before any lock is taken and is the only
    /// expensive step.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::KeyGeneration`] if the key pair cannot be
    /// generated; the current identity then stays in place.
    #[instrument(skip(self), fields(algorithm = %self.algorithm))]
    pub fn rotate(&self) -> TrustResult<PublicCredential> {
        let identity = Arc::new(ActiveIdentity::generate(self.algorithm)?);
        let credential = identity.credential.clone();
        let fingerprint = identity.key_pair.public_key().fingerprint();

        let previous = {
            let mut trusted = self.trusted.write();
            trusted.insert(identity.kid.clone(), identity.trusted_key());
            let previous = self.active.swap(identity);
            if trusted
                .get(&previous.kid)
                .is_some_and(|key| key.origin == KeyOrigin::Local)
            {
                trusted.remove(&previous.kid);
            }
            previous
        };

        metrics::record_key_rotation(self.algorithm.as_str());
        info!(
            old_kid = %previous.kid,
            new_kid = %credential.kid,
            fingerprint = %fingerprint,
            "Rotated signing key pair"
        );

        Ok(credential)
    }

    /// The active kid and its public key.
    #[must_use]
    pub fn current_public_credential(&self) -> PublicCredential {
        self.active.load().credential.clone()
    }

    pub(crate) fn current_signing_key(&self) -> SigningKey {
        SigningKey(self.active.load_full())
    }

    /// Trust `public_key` (base64url SPKI) for tokens carrying `kid`,
    /// replacing any earlier entry for that kid.
    ///
    /// On failure nothing is inserted and the rejection is logged.
    ///
    /// # Errors
    ///
    /// - [`TrustError::UnknownKeyId`] if `kid` is blank.
    /// - [`TrustError::InvalidKeyEncoding`] if `public_key` is not a
    ///   supported public key.
    #[instrument(skip(self, public_key), fields(kid = %kid))]
    pub fn register(&self, kid: &str, public_key: &str) -> TrustResult<()> {
        if kid.trim().is_empty() {
            warn!("Rejected public key registration without kid");
            metrics::record_key_registration("rejected");
            return Err(TrustError::UnknownKeyId);
        }

        let material = match PublicKeyMaterial::from_base64url(public_key) {
            Ok(material) => material,
            Err(e) => {
                warn!(error = %e, "Unable to create public key");
                metrics::record_key_registration("rejected");
                return Err(e);
            }
        };

        let algorithm = material.algorithm();
        let fingerprint = material.fingerprint();
        let key = Arc::new(TrustedKey::new(kid, material, KeyOrigin::Registered));

        let replaced = self.trusted.write().insert(kid.to_string(), key);

        metrics::record_key_registration("accepted");
        match replaced {
            Some(previous) if previous.material.fingerprint() != fingerprint => warn!(
                algorithm = %algorithm,
                fingerprint = %fingerprint,
                previous_fingerprint = %previous.material.fingerprint(),
                "Replaced trusted public key"
            ),
            _ => info!(
                algorithm = %algorithm,
                fingerprint = %fingerprint,
                "Registered trusted public key"
            ),
        }

        Ok(())
    }

    /// [`register`](Self::register) taking the wire credential.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn register_credential(&self, credential: &PublicCredential) -> TrustResult<()> {
        self.register(&credential.kid, &credential.public_key)
    }

    /// Look up the public key trusted for `kid`.
    ///
    /// # Errors
    ///
    /// - [`TrustError::UnknownKeyId`] if `kid` is blank.
    /// - [`TrustError::UntrustedKeyId`] if nothing is registered for `kid`.
    pub fn resolve(&self, kid: &str) -> TrustResult<Arc<TrustedKey>> {
        if kid.trim().is_empty() {
            return Err(TrustError::UnknownKeyId);
        }

        let found = self.trusted.read().get(kid).cloned();
        found.ok_or_else(|| {
            debug!(kid = %kid, "No public key registered for kid");
            TrustError::untrusted(kid)
        })
    }

    /// The credential stored under `kid`, as it would be exported.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn trusted_credential(&self, kid: &str) -> TrustResult<PublicCredential> {
        self.resolve(kid).map(|key| key.credential())
    }

    /// Kids currently trusted, sorted.
    #[must_use]
    pub fn trusted_key_ids(&self) -> Vec<String> {
        let mut kids: Vec<String> = self.trusted.read().keys().cloned().collect();
        kids.sort();
        kids
    }
}

impl fmt::Debug for KeyTrustRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyTrustRegistry")
            .field("algorithm", &self.algorithm)
            .field("kid", &self.active.load().kid)
            .field("trusted", &self.trusted.read().len())
            .finish()
    }
}

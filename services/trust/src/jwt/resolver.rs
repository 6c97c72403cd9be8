//! Key lookup seam used during verification.

use crate::error::{TrustError, TrustResult};
use crate::keys::{KeyTrustRegistry, TrustedKey};
use std::sync::Arc;

/// Resolves the public key a token must be verified against from the `kid`
/// in its header.
///
/// Implementations must distinguish a missing or blank kid
/// ([`TrustError::UnknownKeyId`]) from a kid nobody registered
/// ([`TrustError::UntrustedKeyId`]).
pub trait SigningKeyResolver: Send + Sync {
    /// Look up the key for `kid`.
    ///
    /// # Errors
    ///
    /// [`TrustError::UnknownKeyId`] or [`TrustError::UntrustedKeyId`].
    fn resolve_signing_key(&self, kid: Option<&str>) -> TrustResult<Arc<TrustedKey>>;
}

impl SigningKeyResolver for KeyTrustRegistry {
    fn resolve_signing_key(&self, kid: Option<&str>) -> TrustResult<Arc<TrustedKey>> {
        self.resolve(kid.ok_or(TrustError::UnknownKeyId)?)
    }
}

impl<R: SigningKeyResolver + ?Sized> SigningKeyResolver for Arc<R> {
    fn resolve_signing_key(&self, kid: Option<&str>) -> TrustResult<Arc<TrustedKey>> {
        (**self).resolve_signing_key(kid)
    }
}

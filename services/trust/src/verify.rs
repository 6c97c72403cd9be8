//! Verification contract for token consumers.
//!
//! Request handlers and message consumers only need a way to turn a raw
//! token into claims or a typed failure. They depend on [`TokenVerifier`]
//! rather than on the registry and codec directly.

use crate::error::{TrustError, TrustResult};
use crate::jwt::ClaimSet;
use std::sync::Arc;

/// Turns a raw token into its verified claims.
///
/// Implementations never mutate trust state, and every failure is one of
/// the token or key kinds of [`TrustError`].
pub trait TokenVerifier: Send + Sync {
    /// Verify `raw` and return its full claim set.
    ///
    /// # Errors
    ///
    /// Any token or key failure, e.g. [`TrustError::UntrustedKeyId`] or
    /// [`TrustError::TokenExpired`].
    fn verify_token(&self, raw: &str) -> TrustResult<ClaimSet>;
}

impl<T: TokenVerifier + ?Sized> TokenVerifier for Arc<T> {
    fn verify_token(&self, raw: &str) -> TrustResult<ClaimSet> {
        (**self).verify_token(raw)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value.
///
/// # Errors
///
/// [`TrustError::MalformedToken`] if the value is not a bearer credential.
pub fn bearer_token(header_value: &str) -> TrustResult<&str> {
    let (scheme, token) = header_value
        .trim()
        .split_once(' ')
        .ok_or_else(|| TrustError::malformed("expected 'Bearer <token>'"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(TrustError::malformed(format!(
            "unsupported authorization scheme: {scheme}"
        )));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(TrustError::malformed("bearer token is empty"));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
        assert_eq!(bearer_token("  bearer   abc.def.ghi ").unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_bearer_token_rejects_other_forms() {
        for value in ["", "abc.def.ghi", "Basic dXNlcjpwYXNz", "Bearer    "] {
            assert!(
                matches!(bearer_token(value), Err(TrustError::MalformedToken(_))),
                "{value:?}"
            );
        }
    }
}

use crate::error::{TrustError, TrustResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Issued-at claim name.
pub const ISSUED_AT: &str = "iat";
/// Not-before claim name.
pub const NOT_BEFORE: &str = "nbf";
/// Expiration claim name.
pub const EXPIRATION: &str = "exp";

/// Open set of JWT claims.
///
/// Any JSON value may be carried. The three time claims are stamped by the
/// codec at issuance and are the only claims it interprets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    /// Empty claim set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Insert or replace a claim, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Raw claim value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Claim value if it is a string.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// True if the claim is present and not `null`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.get(name).is_some_and(|v| !v.is_null())
    }

    /// `iat`, if present and integral.
    #[must_use]
    pub fn issued_at(&self) -> Option<i64> {
        self.timestamp(ISSUED_AT).ok()
    }

    /// `nbf`, if present and integral.
    #[must_use]
    pub fn not_before(&self) -> Option<i64> {
        self.timestamp(NOT_BEFORE).ok()
    }

    /// `exp`, if present and integral.
    #[must_use]
    pub fn expiration(&self) -> Option<i64> {
        self.timestamp(EXPIRATION).ok()
    }

    /// Claim names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no claims are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Underlying JSON object.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// Overwrite the time claims for a token issued at `now`.
    pub(crate) fn stamp(&mut self, now: i64, validity_secs: i64) {
        self.0.insert(ISSUED_AT.to_string(), now.into());
        self.0.insert(NOT_BEFORE.to_string(), now.into());
        self.0
            .insert(EXPIRATION.to_string(), now.saturating_add(validity_secs).into());
    }

    /// Read a time claim, failing with `RequiredClaimMissing` if it is absent
    /// or not a whole number of seconds.
    pub(crate) fn timestamp(&self, name: &str) -> TrustResult<i64> {
        self.0
            .get(name)
            .and_then(as_whole_seconds)
            .ok_or_else(|| TrustError::required_claim_missing(name))
    }
}

// `1700000000.0` is accepted; `1700000000.5` is not.
#[allow(clippy::cast_possible_truncation)]
fn as_whole_seconds(value: &Value) -> Option<i64> {
    if let Some(secs) = value.as_i64() {
        return Some(secs);
    }
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
        .map(|f| f as i64)
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

use crate::error::{TrustError, TrustResult};
use crate::jwt::claims::ClaimSet;
use serde_json::Value;

/// Extra checks a caller layers on top of a verified claim set.
#[derive(Debug, Clone, Default)]
pub struct ClaimRequirements {
    required: Vec<String>,
    expected: Vec<(String, Value)>,
}

impl ClaimRequirements {
    /// No requirements.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim must be present and non-null.
    #[must_use]
    pub fn require(mut self, claim: impl Into<String>) -> Self {
        self.required.push(claim.into());
        self
    }

    /// Claim must equal `value`.
    #[must_use]
    pub fn expect(mut self, claim: impl Into<String>, value: impl Into<Value>) -> Self {
        self.expected.push((claim.into(), value.into()));
        self
    }

    /// Check `claims`, reporting the first unmet requirement.
    ///
    /// # Errors
    ///
    /// [`TrustError::RequiredClaimMissing`] for an absent claim,
    /// [`TrustError::ClaimMismatch`] for a present claim with another value.
    pub fn check(&self, claims: &ClaimSet) -> TrustResult<()> {
        if let Some(missing) = self.required.iter().find(|c| !claims.contains(c)) {
            return Err(TrustError::required_claim_missing(missing.as_str()));
        }

        for (claim, expected) in &self.expected {
            match claims.get(claim) {
                None | Some(Value::Null) => {
                    return Err(TrustError::required_claim_missing(claim.as_str()));
                }
                Some(actual) if actual != expected => {
                    return Err(TrustError::ClaimMismatch {
                        claim: claim.clone(),
                        expected: expected.to_string(),
                        actual: actual.to_string(),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

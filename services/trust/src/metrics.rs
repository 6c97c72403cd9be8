//! Prometheus metrics for Trust Service.
//!
//! Counters for token issuance/verification and key lifecycle events.

use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, register_int_counter_vec};

/// Tokens issued counter.
pub static TOKENS_ISSUED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "trust_service_tokens_issued_total",
        "Total number of tokens issued",
        &["token_type", "algorithm"]
    )
    .expect("Failed to register tokens_issued metric")
});

/// Token verifications counter.
pub static TOKEN_VERIFICATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "trust_service_token_verifications_total",
        "Total number of token verifications",
        &["outcome"]
    )
    .expect("Failed to register token_verifications metric")
});

/// Key rotations counter.
pub static KEY_ROTATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "trust_service_key_rotations_total",
        "Total number of signing key rotations",
        &["algorithm"]
    )
    .expect("Failed to register key_rotations metric")
});

/// Public key registrations counter.
pub static KEY_REGISTRATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "trust_service_key_registrations_total",
        "Total number of remote public key registrations",
        &["status"]
    )
    .expect("Failed to register key_registrations metric")
});

/// Record a token issuance.
pub fn record_token_issued(token_type: &str, algorithm: &str) {
    TOKENS_ISSUED
        .with_label_values(&[token_type, algorithm])
        .inc();
}

/// Record a verification outcome (`ok` or an error code).
pub fn record_token_verification(outcome: &str) {
    TOKEN_VERIFICATIONS.with_label_values(&[outcome]).inc();
}

/// Record a key rotation.
pub fn record_key_rotation(algorithm: &str) {
    KEY_ROTATIONS.with_label_values(&[algorithm]).inc();
}

/// Record a registration attempt (`accepted` or `rejected`).
pub fn record_key_registration(status: &str) {
    KEY_REGISTRATIONS.with_label_values(&[status]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_token_issued() {
        record_token_issued("service", "ES256");
        let value = TOKENS_ISSUED
            .with_label_values(&["service", "ES256"])
            .get();
        assert!(value > 0);
    }

    #[test]
    fn test_record_token_verification() {
        record_token_verification("TOKEN_EXPIRED");
        let value = TOKEN_VERIFICATIONS
            .with_label_values(&["TOKEN_EXPIRED"])
            .get();
        assert!(value > 0);
    }

    #[test]
    fn test_record_key_registration() {
        record_key_registration("rejected");
        let value = KEY_REGISTRATIONS.with_label_values(&["rejected"]).get();
        assert!(value > 0);
    }
}

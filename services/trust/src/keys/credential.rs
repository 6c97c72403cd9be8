use serde::{Deserialize, Serialize};

/// Exported public half of a signing identity: the only key material that
/// leaves an instance.
///
/// Wire form is `{"kid": "...", "publicKey": "<base64url SPKI>"}`. The
/// legacy field name `b64UrlPublicKey` is accepted on input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCredential {
    /// Key id the token header refers to
    pub kid: String,
    /// Base64url (unpadded) SubjectPublicKeyInfo DER
    #[serde(alias = "b64UrlPublicKey")]
    pub public_key: String,
}

impl PublicCredential {
    /// Create a credential.
    #[must_use]
    pub fn new(kid: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            kid: kid.into(),
            public_key: public_key.into(),
        }
    }
}

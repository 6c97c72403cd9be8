//! Signing identities and the public key trust registry.

pub mod credential;
pub mod material;
pub mod registry;

pub use credential::PublicCredential;
pub use material::{PublicKeyMaterial, SigningKeyPair};
pub use registry::{KeyOrigin, KeyTrustRegistry, TrustedKey};

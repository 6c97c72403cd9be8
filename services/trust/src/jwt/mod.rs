pub mod claims;
pub mod codec;
pub mod requirements;
pub mod resolver;
pub mod token;

pub use claims::ClaimSet;
pub use codec::TokenCodec;
pub use requirements::ClaimRequirements;
pub use resolver::SigningKeyResolver;
pub use token::Token;

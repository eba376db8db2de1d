pub mod error;
pub mod interfaces;
pub mod serial;
pub mod identity;

pub use error::ResolutionError;
pub use identity::IdentityResolver;

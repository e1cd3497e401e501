//! Credential material: redacted secrets and the bearer/refresh pair.

pub mod pair;
pub mod secret;

pub use pair::*;
pub use secret::*;

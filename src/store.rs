//! Durable persistence contracts and built-in stores for refreshed credentials.

pub mod file;
pub mod memory;

pub use file::EnvFileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::TokenPair};

/// Key under which the bearer token is persisted.
pub const BEARER_TOKEN_KEY: &str = "BEARER_TOKEN";
/// Key under which the refresh token is persisted.
pub const REFRESH_TOKEN_KEY: &str = "REFRESH_TOKEN";

/// Storage backend contract for refreshed token pairs.
///
/// [`persist`](TokenStore::persist) runs inside the credential store's refresh critical
/// section, so implementations never observe two concurrent writes from the same store.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Durably records the pair, preserving any unrelated data the backend already holds.
	fn persist(&self, pair: &TokenPair) -> Result<(), StoreError>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StoreError {
	/// Existing contents could not be parsed; nothing was written.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

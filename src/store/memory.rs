//! Thread-safe in-memory [`TokenStore`] for ephemeral deployments and tests.

// self
use crate::{
	_prelude::*,
	auth::TokenPair,
	store::{StoreError, TokenStore},
};

#[derive(Debug, Default)]
struct MemoryState {
	last: Option<TokenPair>,
	writes: u64,
	failing: bool,
}

/// Keeps the most recently persisted pair in-process.
#[derive(Debug, Default)]
pub struct MemoryStore(Mutex<MemoryState>);
impl MemoryStore {
	/// Returns the most recently persisted pair, if any.
	pub fn last(&self) -> Option<TokenPair> {
		self.0.lock().last.clone()
	}

	/// Number of successful writes.
	pub fn writes(&self) -> u64 {
		self.0.lock().writes
	}

	/// Makes subsequent writes fail with [`StoreError::Backend`] while `failing` is set.
	pub fn set_failing(&self, failing: bool) {
		self.0.lock().failing = failing;
	}
}
impl TokenStore for MemoryStore {
	fn persist(&self, pair: &TokenPair) -> Result<(), StoreError> {
		let mut state = self.0.lock();

		if state.failing {
			return Err(StoreError::Backend { message: "memory store is in failing mode".into() });
		}

		state.last = Some(pair.clone());
		state.writes += 1;

		Ok(())
	}
}

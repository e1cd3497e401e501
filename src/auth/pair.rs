//! Bearer/refresh token pair that is always read and replaced as a unit.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Bearer + refresh credentials issued together by one exchange (or the initial configuration).
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
	/// Short-lived credential attached to every preview request.
	pub bearer: TokenSecret,
	/// Long-lived credential exchanged for a new bearer token.
	pub refresh: TokenSecret,
}
impl TokenPair {
	/// Builds a pair from raw token values.
	pub fn new(bearer: impl Into<String>, refresh: impl Into<String>) -> Self {
		Self { bearer: TokenSecret::new(bearer), refresh: TokenSecret::new(refresh) }
	}

	/// Applies an exchange result, keeping the current refresh token unless a non-empty
	/// replacement was issued.
	pub fn rotated(&self, bearer: TokenSecret, refresh: Option<TokenSecret>) -> Self {
		let refresh =
			refresh.filter(|secret| !secret.is_blank()).unwrap_or_else(|| self.refresh.clone());

		Self { bearer, refresh }
	}
}
impl Debug for TokenPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenPair")
			.field("bearer", &self.bearer.fingerprint())
			.field("refresh", &self.refresh.fingerprint())
			.finish()
	}
}

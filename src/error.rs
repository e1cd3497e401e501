//! Crate-level error types shared by the credential store, preview client, and wiring helpers.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Maximum number of characters of an upstream body carried inside an error.
pub const BODY_PREVIEW_LIMIT: usize = 512;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Durable credential persistence failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Network-level failure reaching either endpoint; no response was received.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Lookup key was empty or otherwise unusable.
	#[error("Invalid lookup input: {reason}.")]
	InvalidInput {
		/// Human-readable reason.
		reason: String,
	},
	/// Resource endpoint answered with a terminal status.
	#[error("Preview endpoint returned status {status}: {body}")]
	Upstream {
		/// HTTP status code.
		status: u16,
		/// Truncated response body.
		body: String,
	},
	/// Token endpoint rejected the refresh grant.
	#[error("Token endpoint rejected the refresh grant with status {status}: {body}")]
	RefreshFailed {
		/// HTTP status code.
		status: u16,
		/// Truncated response body.
		body: String,
	},
	/// Credential refresh failed while recovering from an authorization failure.
	#[error("Credential refresh failed: {source}")]
	CredentialRefreshFailed {
		/// Refresh failure reported by the credential store.
		#[source]
		source: Box<Error>,
	},
	/// Token endpoint answered with a body that violates the expected schema.
	#[error("Token endpoint returned a malformed response: {reason}.")]
	MalformedResponse {
		/// What was wrong with the payload.
		reason: String,
		/// Truncated response body.
		body: String,
	},
	/// Preview endpoint answered with JSON that could not be decoded.
	#[error("Preview endpoint returned malformed JSON.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// Truncated response body.
		body: String,
	},
	/// Preview endpoint returned an empty result set.
	#[error("No carrier data found for `{key}`.")]
	NoDataFound {
		/// Lookup key that produced no records.
		key: String,
	},
	/// Caller cancellation or deadline fired mid-flight.
	#[error("Operation was cancelled.")]
	Cancelled,
	/// Attempt loop finished without producing an outcome.
	#[error("Exhausted {attempts} attempts fetching carrier data.")]
	RetriesExhausted {
		/// Attempts performed.
		attempts: u8,
	},
}
impl Error {
	/// Returns `true` for the expected "carrier not found" outcome.
	pub fn is_no_data(&self) -> bool {
		matches!(self, Self::NoDataFound { .. })
	}

	/// Returns the HTTP status associated with the failure, when one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Upstream { status, .. } | Self::RefreshFailed { status, .. } => Some(*status),
			Self::CredentialRefreshFailed { source } => source.status(),
			_ => None,
		}
	}
}

/// Configuration failures raised while loading settings or building clients.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Required settings are absent or blank.
	#[error("Missing required environment variables: {}.", .keys.join(", "))]
	MissingVars {
		/// Sorted list of missing keys.
		keys: Vec<&'static str>,
	},
	/// A URL setting cannot be parsed.
	#[error("Setting `{key}` is not a valid URL.")]
	InvalidUrl {
		/// Offending key.
		key: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A numeric setting cannot be parsed.
	#[error("Setting `{key}` is not a valid number: {value}.")]
	InvalidNumber {
		/// Offending key.
		key: &'static str,
		/// Raw value.
		value: String,
	},
	/// The dotenv file exists but cannot be read.
	#[error("Env file {path} could not be loaded.")]
	EnvFile {
		/// File location.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: dotenvy::Error,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, timeout).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Request exceeded its configured timeout.
	#[error("Request to the {endpoint} endpoint timed out.")]
	Timeout {
		/// Endpoint label.
		endpoint: &'static str,
		/// Transport-specific error.
		#[source]
		source: BoxError,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Endpoint label.
		endpoint: &'static str,
		/// Transport-specific error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Classifies a reqwest failure raised while calling `endpoint`.
	pub fn from_reqwest(endpoint: &'static str, e: ReqwestError) -> Self {
		if e.is_timeout() {
			Self::Timeout { endpoint, source: Box::new(e) }
		} else {
			Self::Network { endpoint, source: Box::new(e) }
		}
	}
}

/// Truncates a response body to [`BODY_PREVIEW_LIMIT`] characters for diagnostics.
pub fn body_preview(body: &str) -> String {
	let trimmed = body.trim();

	match trimmed.char_indices().nth(BODY_PREVIEW_LIMIT) {
		Some((idx, _)) => format!("{}…", &trimmed[..idx]),
		None => trimmed.to_owned(),
	}
}

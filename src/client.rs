//! Preview client: fetches carrier records and hides bearer expiry from callers.
//!
//! Each [`PreviewClient::fetch`] walks a small state machine:
//!
//! ```text
//! Initial ──401──▶ refresh ──ok──▶ Refreshed ──401──▶ Upstream error
//!    │                 │                 │
//!    └─ record/error   └─ refresh error  └─ record/error
//! ```
//!
//! Every loop turn sends exactly one request and `MAX_ATTEMPTS` bounds the turns, so the
//! current token and the refreshed token are each attempted at most once and only one
//! refresh happens per call.

// crates.io
use reqwest::{Response, StatusCode, header::CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::Settings,
	credentials::CredentialStore,
	error::body_preview,
	http::{self, PREVIEW_ENDPOINT},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	preview::PreviewResult,
};

/// Query parameter carrying the lookup key.
pub const LOOKUP_QUERY_PARAM: &str = "docketNumber";
/// Upper bound on preview requests per fetch.
pub const MAX_ATTEMPTS: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FetchState {
	Initial,
	Refreshed,
}

enum AttemptOutcome {
	Found(PreviewResult),
	Unauthorized(Response),
}

/// Shared client for the carrier preview endpoint.
#[derive(Debug)]
pub struct PreviewClient {
	http_client: ReqwestClient,
	preview_url: Url,
	timeout: StdDuration,
	credentials: Arc<CredentialStore>,
}
impl PreviewClient {
	/// Creates a client for `preview_url` authenticated through `credentials`.
	pub fn new(preview_url: Url, credentials: Arc<CredentialStore>) -> Result<Self> {
		Ok(Self {
			http_client: http::preview_http_client()?,
			preview_url,
			timeout: http::DEFAULT_REQUEST_TIMEOUT,
			credentials,
		})
	}

	/// Builds a client from loaded settings around an existing credential store.
	pub fn from_settings(settings: &Settings, credentials: Arc<CredentialStore>) -> Result<Self> {
		Ok(Self::new(settings.preview_url.clone(), credentials)?
			.with_timeout(settings.request_timeout))
	}

	/// Replaces the HTTP client used for preview requests.
	pub fn with_http_client(mut self, client: ReqwestClient) -> Self {
		self.http_client = client;

		self
	}

	/// Overrides the per-request timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Credential store backing this client.
	pub fn credentials(&self) -> &Arc<CredentialStore> {
		&self.credentials
	}

	/// Fetches the preview record for `key`, refreshing credentials once on a 401.
	///
	/// Every call performs a live request; nothing is cached. An empty result set yields
	/// [`Error::NoDataFound`], which is logged at `info` because it is an expected outcome.
	pub async fn fetch(&self, key: &str, cancel: &CancellationToken) -> Result<PreviewResult> {
		const KIND: FlowKind = FlowKind::Preview;

		let key = key.trim();

		if key.is_empty() {
			return Err(Error::InvalidInput { reason: "lookup key is empty".into() });
		}

		let span = FlowSpan::new(KIND, "fetch");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.run(key, cancel)).await;

		match &result {
			Ok(_) => tracing::info!(key, "Data received for lookup key."),
			Err(Error::NoDataFound { .. }) => tracing::info!(key, "No data found for lookup key."),
			Err(Error::Cancelled) => tracing::info!(key, "Preview lookup cancelled."),
			Err(e) => tracing::warn!(key, error = %e, "Preview lookup failed."),
		}

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	async fn run(&self, key: &str, cancel: &CancellationToken) -> Result<PreviewResult> {
		let mut state = FetchState::Initial;
		let mut attempts = 0_u8;

		loop {
			if attempts >= MAX_ATTEMPTS {
				return Err(Error::RetriesExhausted { attempts });
			}

			attempts += 1;

			let lease = self.credentials.lease();
			let response = match self.attempt(key, &lease.bearer, cancel).await? {
				AttemptOutcome::Found(record) => return Ok(record),
				AttemptOutcome::Unauthorized(response) => response,
			};

			state = match state {
				FetchState::Initial => {
					drop(response);
					tracing::info!("Access token rejected; attempting refresh.");

					self.credentials.refresh_after(lease.generation, cancel).await.map_err(
						|e| match e {
							Error::Cancelled => Error::Cancelled,
							e => Error::CredentialRefreshFailed { source: Box::new(e) },
						},
					)?;

					FetchState::Refreshed
				},
				FetchState::Refreshed => {
					let body = http::read_text(PREVIEW_ENDPOINT, response, cancel).await?;

					return Err(Error::Upstream {
						status: StatusCode::UNAUTHORIZED.as_u16(),
						body: body_preview(&body),
					});
				},
			};
		}
	}

	async fn attempt(
		&self,
		key: &str,
		bearer: &TokenSecret,
		cancel: &CancellationToken,
	) -> Result<AttemptOutcome> {
		let mut url = self.preview_url.clone();

		url.query_pairs_mut().append_pair(LOOKUP_QUERY_PARAM, key);

		let request = self
			.http_client
			.post(url)
			.bearer_auth(bearer.expose())
			.header(CONTENT_TYPE, "application/json")
			.timeout(self.timeout);
		let response = http::send(PREVIEW_ENDPOINT, request, cancel).await?;
		let status = response.status();

		if status == StatusCode::UNAUTHORIZED {
			return Ok(AttemptOutcome::Unauthorized(response));
		}

		let body = http::read_text(PREVIEW_ENDPOINT, response, cancel).await?;

		if !status.is_success() {
			return Err(Error::Upstream { status: status.as_u16(), body: body_preview(&body) });
		}

		let records = decode_records(&body)?;

		records
			.into_iter()
			.next()
			.map(AttemptOutcome::Found)
			.ok_or_else(|| Error::NoDataFound { key: key.to_owned() })
	}
}

fn decode_records(body: &str) -> Result<Vec<PreviewResult>> {
	let de = &mut serde_json::Deserializer::from_str(body);

	serde_path_to_error::deserialize(de)
		.map_err(|source| Error::Decode { source, body: body_preview(body) })
}

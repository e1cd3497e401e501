//! Credential store: owns the bearer/refresh pair and renews it through the refresh grant.
//!
//! All reads go through [`CredentialStore::tokens`] (or one of its narrower accessors), which
//! return a snapshot taken under a single lock, so a bearer token is never paired with a
//! refresh token from a different exchange. Refreshes are serialized by an async guard that
//! covers the network exchange, the in-memory commit, and the durable write. Everything
//! after the exchange completes is synchronous, so cancelling a refresh either commits the
//! full new pair or nothing.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{TokenPair, TokenSecret},
	config::Settings,
	error::body_preview,
	http::{self, TOKEN_ENDPOINT},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::{EnvFileStore, TokenStore},
};

/// Bearer token handed to a request together with the generation it belongs to.
///
/// Pass [`generation`](CredentialLease::generation) to [`CredentialStore::refresh_after`] when
/// the bearer is rejected so concurrent callers share one exchange.
#[derive(Clone, Debug)]
pub struct CredentialLease {
	/// Bearer token current at lease time.
	pub bearer: TokenSecret,
	/// Number of successful refreshes committed before the lease was taken.
	pub generation: u64,
}

/// Result of a refresh call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshOutcome {
	/// A new non-empty refresh token was issued and replaced the old one.
	pub rotated: bool,
	/// The durable store accepted the new pair.
	pub persisted: bool,
	/// No exchange happened because another caller refreshed first.
	pub coalesced: bool,
}
impl RefreshOutcome {
	const COALESCED: Self = Self { rotated: false, persisted: true, coalesced: true };
}

#[derive(Debug)]
struct CredentialState {
	pair: TokenPair,
	generation: u64,
	refreshed_at: Option<OffsetDateTime>,
}

#[derive(Deserialize)]
struct TokenResponse {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	refresh_token: Option<String>,
}

/// Shared, long-lived holder of the bearer/refresh pair.
pub struct CredentialStore {
	http_client: ReqwestClient,
	token_endpoint: Url,
	client_id: String,
	client_secret: TokenSecret,
	timeout: StdDuration,
	store: Arc<dyn TokenStore>,
	state: RwLock<CredentialState>,
	refresh_guard: AsyncMutex<()>,
	metrics: RefreshMetrics,
}
impl CredentialStore {
	/// Creates a store seeded with `initial`, persisting renewals through `store`.
	pub fn new(
		token_endpoint: Url,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		initial: TokenPair,
		store: Arc<dyn TokenStore>,
	) -> Result<Self> {
		Ok(Self {
			http_client: http::token_http_client()?,
			token_endpoint,
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			timeout: http::DEFAULT_REQUEST_TIMEOUT,
			store,
			state: RwLock::new(CredentialState { pair: initial, generation: 0, refreshed_at: None }),
			refresh_guard: AsyncMutex::new(()),
			metrics: RefreshMetrics::default(),
		})
	}

	/// Builds a store from loaded settings, persisting to the settings' env file.
	pub fn from_settings(settings: &Settings) -> Result<Self> {
		let store: Arc<dyn TokenStore> = Arc::new(EnvFileStore::new(&settings.env_file));

		Ok(Self::new(
			settings.token_endpoint.clone(),
			&settings.client_id,
			settings.client_secret.expose(),
			TokenPair {
				bearer: settings.bearer_token.clone(),
				refresh: settings.refresh_token.clone(),
			},
			store,
		)?
		.with_timeout(settings.request_timeout))
	}

	/// Replaces the HTTP client used for token exchanges.
	pub fn with_http_client(mut self, client: ReqwestClient) -> Self {
		self.http_client = client;

		self
	}

	/// Overrides the per-exchange timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Returns the presently held bearer token.
	pub fn bearer_token(&self) -> TokenSecret {
		self.state.read().pair.bearer.clone()
	}

	/// Returns the presently held refresh token.
	pub fn refresh_token(&self) -> TokenSecret {
		self.state.read().pair.refresh.clone()
	}

	/// Returns both tokens from one consistent snapshot.
	pub fn tokens(&self) -> TokenPair {
		self.state.read().pair.clone()
	}

	/// Returns the bearer token along with its generation.
	pub fn lease(&self) -> CredentialLease {
		let state = self.state.read();

		CredentialLease { bearer: state.pair.bearer.clone(), generation: state.generation }
	}

	/// Instant of the last committed refresh, if any.
	pub fn last_refreshed_at(&self) -> Option<OffsetDateTime> {
		self.state.read().refreshed_at
	}

	/// Refresh counters for this store.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Exchanges the refresh token for a new pair.
	///
	/// Concurrent calls are serialized; each one performs its own exchange. Returns
	/// [`Error::RefreshFailed`] for any status ≥ 400 and [`Error::MalformedResponse`] when
	/// the body lacks a non-empty `access_token`. A failed durable write is logged and
	/// reported through [`RefreshOutcome::persisted`] without failing the refresh.
	pub async fn refresh(&self, cancel: &CancellationToken) -> Result<RefreshOutcome> {
		self.run_refresh(None, "refresh", cancel).await
	}

	/// Refreshes unless another caller already committed a refresh after `observed`.
	///
	/// Callers that lose the race wait for the in-flight exchange and then reuse its result.
	pub async fn refresh_after(
		&self,
		observed: u64,
		cancel: &CancellationToken,
	) -> Result<RefreshOutcome> {
		self.run_refresh(Some(observed), "refresh_after", cancel).await
	}

	async fn run_refresh(
		&self,
		observed: Option<u64>,
		stage: &'static str,
		cancel: &CancellationToken,
	) -> Result<RefreshOutcome> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, stage);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span
			.instrument(async move {
				let _singleflight = http::cancellable(cancel, self.refresh_guard.lock()).await?;
				let (current, generation) = {
					let state = self.state.read();

					(state.pair.clone(), state.generation)
				};

				if observed.is_some_and(|seen| seen != generation) {
					self.metrics.record_coalesced();

					return Ok(RefreshOutcome::COALESCED);
				}

				tracing::info!(
					refresh = %current.refresh.fingerprint(),
					"Attempting to refresh access token."
				);
				self.metrics.record_exchange();

				let (bearer, issued_refresh) = self.exchange(&current.refresh, cancel).await?;
				let rotated = issued_refresh.as_ref().is_some_and(|secret| !secret.is_blank());
				let next = current.rotated(bearer, issued_refresh);
				let now = OffsetDateTime::now_utc();

				{
					let mut state = self.state.write();

					state.pair = next.clone();
					state.generation += 1;
					state.refreshed_at = Some(now);
				}

				let persisted = match self.store.persist(&next) {
					Ok(()) => true,
					Err(e) => {
						tracing::warn!(
							error = %e,
							"Failed to persist refreshed credentials; continuing with in-memory tokens."
						);

						false
					},
				};

				if rotated {
					tracing::info!(
						refresh = %next.refresh.fingerprint(),
						"New refresh token issued."
					);
				} else {
					tracing::warn!("Refresh token was not rotated; the current one will be reused.");
				}

				tracing::info!(
					bearer = %next.bearer.fingerprint(),
					persisted,
					"Access token refreshed successfully."
				);

				Ok(RefreshOutcome { rotated, persisted, coalesced: false })
			})
			.await;

		match &result {
			Ok(_) => self.metrics.record_success(),
			Err(e) => {
				self.metrics.record_failure();

				if !matches!(e, Error::Cancelled) {
					tracing::error!(error = %e, "Access token refresh failed.");
				}
			},
		}

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	async fn exchange(
		&self,
		refresh: &TokenSecret,
		cancel: &CancellationToken,
	) -> Result<(TokenSecret, Option<TokenSecret>)> {
		let form = [
			("grant_type", "refresh_token"),
			("refresh_token", refresh.expose()),
			("client_id", self.client_id.as_str()),
			("client_secret", self.client_secret.expose()),
		];
		let request = self
			.http_client
			.post(self.token_endpoint.clone())
			.form(&form)
			.timeout(self.timeout);
		let response = http::send(TOKEN_ENDPOINT, request, cancel).await?;
		let status = response.status();
		let body = http::read_text(TOKEN_ENDPOINT, response, cancel).await?;

		if status.as_u16() >= 400 {
			return Err(Error::RefreshFailed { status: status.as_u16(), body: body_preview(&body) });
		}

		parse_token_response(&body)
	}
}
impl Debug for CredentialStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.read();

		f.debug_struct("CredentialStore")
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("client_id", &self.client_id)
			.field("tokens", &state.pair)
			.field("generation", &state.generation)
			.finish()
	}
}

fn parse_token_response(body: &str) -> Result<(TokenSecret, Option<TokenSecret>)> {
	let de = &mut serde_json::Deserializer::from_str(body);
	let payload: TokenResponse = serde_path_to_error::deserialize(de).map_err(|e| {
		Error::MalformedResponse { reason: e.to_string(), body: body_preview(body) }
	})?;
	let access = payload.access_token.filter(|token| !token.trim().is_empty()).ok_or_else(|| {
		Error::MalformedResponse {
			reason: "response did not include an access_token".into(),
			body: body_preview(body),
		}
	})?;

	Ok((TokenSecret::new(access), payload.refresh_token.map(TokenSecret::new)))
}

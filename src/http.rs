//! Transport primitives shared by the token exchange and the preview request.
//!
//! Both endpoints go through [`send`] and [`read_text`], which race the in-flight reqwest
//! future against the caller's [`CancellationToken`]. Dropping the losing future aborts the
//! HTTP operation, and the caller sees [`Error::Cancelled`].

// crates.io
use reqwest::{RequestBuilder, Response, redirect::Policy};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Per-request timeout applied when settings do not override it.
pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(10);

pub(crate) const TOKEN_ENDPOINT: &str = "token";
pub(crate) const PREVIEW_ENDPOINT: &str = "preview";

/// Builds the client used for refresh exchanges.
///
/// Token endpoints return results directly, so redirects are never followed.
pub fn token_http_client() -> Result<ReqwestClient, ConfigError> {
	Ok(ReqwestClient::builder().redirect(Policy::none()).build()?)
}

/// Builds the client used for preview lookups.
pub fn preview_http_client() -> Result<ReqwestClient, ConfigError> {
	Ok(ReqwestClient::builder().build()?)
}

/// Runs `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<F>(cancel: &CancellationToken, fut: F) -> Result<F::Output>
where
	F: Future,
{
	tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(Error::Cancelled),
		output = fut => Ok(output),
	}
}

pub(crate) async fn send(
	endpoint: &'static str,
	request: RequestBuilder,
	cancel: &CancellationToken,
) -> Result<Response> {
	cancellable(cancel, request.send())
		.await?
		.map_err(|e| TransportError::from_reqwest(endpoint, e).into())
}

pub(crate) async fn read_text(
	endpoint: &'static str,
	response: Response,
	cancel: &CancellationToken,
) -> Result<String> {
	cancellable(cancel, response.text())
		.await?
		.map_err(|e| TransportError::from_reqwest(endpoint, e).into())
}

//! Process settings loaded from a dotenv file overlaid by the environment.

// std
use std::{
	env,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ConfigError,
	http::DEFAULT_REQUEST_TIMEOUT,
	store::{BEARER_TOKEN_KEY, REFRESH_TOKEN_KEY},
};

/// Preview endpoint used when `MCP_API_URL` is unset.
pub const DEFAULT_PREVIEW_URL: &str =
	"https://mycarrierpacketsapi-stage.azurewebsites.net/api/v1/Carrier/PreviewCarrier";
/// Overall deadline for one chat command when `COMMAND_DEADLINE_SECS` is unset.
pub const DEFAULT_COMMAND_DEADLINE: StdDuration = StdDuration::from_secs(15);

const TOKEN_ENDPOINT_URL_KEY: &str = "TOKEN_ENDPOINT_URL";
const CLIENT_ID_KEY: &str = "CLIENT_ID";
const CLIENT_SECRET_KEY: &str = "CLIENT_SECRET";
const PREVIEW_URL_KEY: &str = "MCP_API_URL";
const REQUEST_TIMEOUT_KEY: &str = "REQUEST_TIMEOUT_SECS";
const COMMAND_DEADLINE_KEY: &str = "COMMAND_DEADLINE_SECS";

/// Everything needed to wire a [`CredentialStore`](crate::credentials::CredentialStore) and a
/// [`PreviewClient`](crate::client::PreviewClient).
#[derive(Clone, Debug)]
pub struct Settings {
	/// Initial bearer token.
	pub bearer_token: TokenSecret,
	/// Initial refresh token.
	pub refresh_token: TokenSecret,
	/// Authorization server's refresh-grant URL.
	pub token_endpoint: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
	/// Carrier preview endpoint.
	pub preview_url: Url,
	/// Dotenv file that seeds these settings and receives refreshed tokens.
	pub env_file: PathBuf,
	/// Per-request timeout for both endpoints.
	pub request_timeout: StdDuration,
	/// Overall deadline for one chat command.
	pub command_deadline: StdDuration,
}
impl Settings {
	/// Loads settings from `env_file` (if present), letting process environment values win.
	pub fn load(env_file: impl Into<PathBuf>) -> Result<Self, ConfigError> {
		let env_file = env_file.into();
		let file_values = read_env_file(&env_file)?;

		Self::from_lookup(env_file, |key| {
			env::var(key).ok().or_else(|| file_values.get(key).cloned())
		})
	}

	/// Builds settings from an arbitrary key lookup.
	pub fn from_lookup<F>(env_file: impl Into<PathBuf>, lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let value = |key: &str| {
			lookup(key).map(|raw| raw.trim().to_owned()).filter(|value| !value.is_empty())
		};
		let required = [
			BEARER_TOKEN_KEY,
			REFRESH_TOKEN_KEY,
			TOKEN_ENDPOINT_URL_KEY,
			CLIENT_ID_KEY,
			CLIENT_SECRET_KEY,
		];
		let mut missing: Vec<&'static str> =
			required.into_iter().filter(|&key| value(key).is_none()).collect();

		if !missing.is_empty() {
			missing.sort_unstable();

			return Err(ConfigError::MissingVars { keys: missing });
		}

		let require = |key: &str| value(key).unwrap_or_default();
		let preview_url = value(PREVIEW_URL_KEY).unwrap_or_else(|| DEFAULT_PREVIEW_URL.into());

		Ok(Self {
			bearer_token: TokenSecret::new(require(BEARER_TOKEN_KEY)),
			refresh_token: TokenSecret::new(require(REFRESH_TOKEN_KEY)),
			token_endpoint: parse_url(TOKEN_ENDPOINT_URL_KEY, &require(TOKEN_ENDPOINT_URL_KEY))?,
			client_id: require(CLIENT_ID_KEY),
			client_secret: TokenSecret::new(require(CLIENT_SECRET_KEY)),
			preview_url: parse_url(PREVIEW_URL_KEY, &preview_url)?,
			env_file: env_file.into(),
			request_timeout: parse_secs(REQUEST_TIMEOUT_KEY, value(REQUEST_TIMEOUT_KEY))?
				.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
			command_deadline: parse_secs(COMMAND_DEADLINE_KEY, value(COMMAND_DEADLINE_KEY))?
				.unwrap_or(DEFAULT_COMMAND_DEADLINE),
		})
	}
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
	if !path.exists() {
		return Ok(HashMap::new());
	}

	let to_error = |source| ConfigError::EnvFile { path: path.display().to_string(), source };

	dotenvy::from_path_iter(path).map_err(to_error)?.map(|item| item.map_err(to_error)).collect()
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { key, source })
}

fn parse_secs(key: &'static str, raw: Option<String>) -> Result<Option<StdDuration>, ConfigError> {
	raw.map(|value| match value.parse::<u64>() {
		Ok(secs) if secs > 0 => Ok(StdDuration::from_secs(secs)),
		_ => Err(ConfigError::InvalidNumber { key, value }),
	})
	.transpose()
}

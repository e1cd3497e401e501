//! Shared fixtures for the integration tests: credential stores and preview clients wired to
//! an `httpmock` server.

#![allow(dead_code)]

// std
use std::{path::Path, sync::Arc};
// crates.io
use httpmock::prelude::*;
// self
use carrier_preview::{
	auth::TokenPair,
	client::PreviewClient,
	credentials::CredentialStore,
	store::{EnvFileStore, MemoryStore, TokenStore},
	url::Url,
};

pub const TOKEN_PATH: &str = "/oauth/token";
pub const PREVIEW_PATH: &str = "/api/v1/Carrier/PreviewCarrier";
pub const CLIENT_ID: &str = "client-preview";
pub const CLIENT_SECRET: &str = "secret-preview";
pub const OLD_BEARER: &str = "bearer-old";
pub const OLD_REFRESH: &str = "refresh-old";
pub const NEW_BEARER: &str = "new-access";
pub const NEW_REFRESH: &str = "new-refresh";

pub const SAMPLE_RECORDS: &str = r#"[{
	"CompanyName": "Acme Freight LLC",
	"DotNumber": "1234567",
	"DocketNumber": "MC123456",
	"IsBlocked": false,
	"FreightValidateStatus": "Review Recommended",
	"RiskAssessmentDetails": {
		"TotalPoints": 150,
		"Authority": {
			"TotalPoints": 150,
			"Infractions": [
				{ "Points": 150, "RiskLevel": "Medium", "RuleText": "Authority age", "RuleOutput": "Under 1 year" }
			]
		},
		"Insurance": null
	}
}]"#;

/// Builds a credential store seeded with the old pair and pointed at the mock token endpoint.
pub fn build_test_credentials(
	server: &MockServer,
	store: Arc<dyn TokenStore>,
) -> Arc<CredentialStore> {
	let token_endpoint =
		Url::parse(&server.url(TOKEN_PATH)).expect("Mock token endpoint should parse.");
	let credentials = CredentialStore::new(
		token_endpoint,
		CLIENT_ID,
		CLIENT_SECRET,
		TokenPair::new(OLD_BEARER, OLD_REFRESH),
		store,
	)
	.expect("Credential store should build.");

	Arc::new(credentials)
}

/// Builds a credential store backed by a fresh [`MemoryStore`].
pub fn build_memory_credentials(server: &MockServer) -> (Arc<CredentialStore>, Arc<MemoryStore>) {
	let backend = Arc::new(MemoryStore::default());
	let credentials = build_test_credentials(server, backend.clone());

	(credentials, backend)
}

/// Builds a credential store that persists into `path`.
pub fn build_file_credentials(server: &MockServer, path: &Path) -> Arc<CredentialStore> {
	build_test_credentials(server, Arc::new(EnvFileStore::new(path)))
}

/// Builds a preview client pointed at the mock preview endpoint.
pub fn build_test_client(server: &MockServer, credentials: Arc<CredentialStore>) -> PreviewClient {
	let preview_url =
		Url::parse(&server.url(PREVIEW_PATH)).expect("Mock preview endpoint should parse.");

	PreviewClient::new(preview_url, credentials).expect("Preview client should build.")
}

/// Token endpoint answer carrying both rotated tokens.
pub fn rotated_token_body() -> String {
	format!("{{\"access_token\":\"{NEW_BEARER}\",\"refresh_token\":\"{NEW_REFRESH}\"}}")
}

/// Reads a dotenv file back through the store's own parser.
pub fn read_env_file(path: &Path) -> std::collections::BTreeMap<String, String> {
	EnvFileStore::new(path).read_entries().expect("Persisted env file should stay parseable.")
}

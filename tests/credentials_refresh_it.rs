mod common;

// std
use std::{fs, sync::Arc, time::Duration};
// crates.io
use httpmock::prelude::*;
// self
use carrier_preview::{
	CancellationToken,
	auth::TokenPair,
	credentials::RefreshOutcome,
	error::Error,
};
use common::*;

#[tokio::test]
async fn refresh_replaces_bearer_and_rotates_refresh_token() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let (credentials, backend) = build_memory_credentials(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", OLD_REFRESH)
				.form_urlencoded_tuple("client_id", CLIENT_ID)
				.form_urlencoded_tuple("client_secret", CLIENT_SECRET);
			then.status(200).header("content-type", "application/json").body(rotated_token_body());
		})
		.await;
	let outcome = credentials.refresh(&CancellationToken::new()).await?;

	mock.assert_async().await;

	assert_eq!(outcome, RefreshOutcome { rotated: true, persisted: true, coalesced: false });
	assert_eq!(credentials.bearer_token().expose(), NEW_BEARER);
	assert_eq!(credentials.refresh_token().expose(), NEW_REFRESH);
	assert_eq!(backend.last(), Some(TokenPair::new(NEW_BEARER, NEW_REFRESH)));
	assert_eq!(credentials.lease().generation, 1);
	assert!(credentials.last_refreshed_at().is_some());

	Ok(())
}

#[tokio::test]
async fn rejected_refresh_keeps_current_tokens() {
	let server = MockServer::start_async().await;
	let (credentials, backend) = build_memory_credentials(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\"}");
		})
		.await;
	let err = credentials
		.refresh(&CancellationToken::new())
		.await
		.expect_err("A 400 from the token endpoint should fail the refresh.");

	mock.assert_async().await;

	match err {
		Error::RefreshFailed { status, body } => {
			assert_eq!(status, 400);
			assert!(body.contains("invalid_grant"));
		},
		other => panic!("Unexpected error: {other:?}"),
	}

	assert_eq!(credentials.bearer_token().expose(), OLD_BEARER);
	assert_eq!(credentials.refresh_token().expose(), OLD_REFRESH);
	assert_eq!(backend.writes(), 0);
	assert_eq!(credentials.metrics().failures(), 1);
}

#[tokio::test]
async fn access_token_is_required_even_on_success() {
	let server = MockServer::start_async().await;
	let (credentials, backend) = build_memory_credentials(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"\",\"refresh_token\":\"orphan\"}");
		})
		.await;

	let err = credentials
		.refresh(&CancellationToken::new())
		.await
		.expect_err("An empty access_token should be rejected.");

	assert!(matches!(err, Error::MalformedResponse { .. }));
	assert_eq!(credentials.tokens(), TokenPair::new(OLD_BEARER, OLD_REFRESH));
	assert_eq!(backend.writes(), 0);
}

#[tokio::test]
async fn refresh_merges_tokens_into_env_file() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let dir = tempfile::tempdir()?;
	let path = dir.path().join(".env");

	fs::write(&path, "OTHER_KEY=\"x\"\nBEARER_TOKEN=\"bearer-old\"\n")?;

	let credentials = build_file_credentials(&server, &path);

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").body(rotated_token_body());
		})
		.await;

	let outcome = credentials.refresh(&CancellationToken::new()).await?;
	let entries = read_env_file(&path);

	assert!(outcome.persisted);
	assert_eq!(entries.get("OTHER_KEY").map(String::as_str), Some("x"));
	assert_eq!(entries.get("BEARER_TOKEN").map(String::as_str), Some(NEW_BEARER));
	assert_eq!(entries.get("REFRESH_TOKEN").map(String::as_str), Some(NEW_REFRESH));
	assert_eq!(entries.len(), 3);
	assert!(fs::read_to_string(&path)?.contains("OTHER_KEY=\"x\""));
	assert!(!path.with_extension("tmp").exists());

	Ok(())
}

#[tokio::test]
async fn refresh_keeps_unrelated_env_lines_verbatim() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let dir = tempfile::tempdir()?;
	let path = dir.path().join(".env");

	fs::write(
		&path,
		"# deployment settings\nURL=\"$HOME/x\"\nDB_PASSWORD=\"pa$sw0rd\"\nBEARER_TOKEN=\"bearer-old\"\n",
	)?;

	let credentials = build_file_credentials(&server, &path);

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").body(rotated_token_body());
		})
		.await;

	let outcome = credentials.refresh(&CancellationToken::new()).await?;

	assert!(outcome.persisted);
	assert_eq!(
		fs::read_to_string(&path)?,
		format!(
			"# deployment settings\nURL=\"$HOME/x\"\nDB_PASSWORD=\"pa$sw0rd\"\n\
			 BEARER_TOKEN=\"{NEW_BEARER}\"\nREFRESH_TOKEN=\"{NEW_REFRESH}\"\n"
		)
	);

	Ok(())
}

#[tokio::test]
async fn refresh_without_rotation_keeps_refresh_token() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let dir = tempfile::tempdir()?;
	let path = dir.path().join(".env");

	fs::write(&path, "REFRESH_TOKEN=\"refresh-old\"\n")?;

	let credentials = build_file_credentials(&server, &path);

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(format!("{{\"access_token\":\"{NEW_BEARER}\"}}"));
		})
		.await;

	let outcome = credentials.refresh(&CancellationToken::new()).await?;
	let entries = read_env_file(&path);

	assert!(!outcome.rotated);
	assert_eq!(credentials.bearer_token().expose(), NEW_BEARER);
	assert_eq!(credentials.refresh_token().expose(), OLD_REFRESH);
	assert_eq!(entries.get("BEARER_TOKEN").map(String::as_str), Some(NEW_BEARER));
	assert_eq!(entries.get("REFRESH_TOKEN").map(String::as_str), Some(OLD_REFRESH));

	Ok(())
}

#[tokio::test]
async fn persistence_failure_does_not_fail_refresh() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let (credentials, backend) = build_memory_credentials(&server);

	backend.set_failing(true);
	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").body(rotated_token_body());
		})
		.await;

	let outcome = credentials.refresh(&CancellationToken::new()).await?;

	assert!(!outcome.persisted);
	assert!(outcome.rotated);
	assert_eq!(credentials.bearer_token().expose(), NEW_BEARER);
	assert_eq!(backend.last(), None);
	assert_eq!(credentials.metrics().successes(), 1);

	Ok(())
}

#[tokio::test]
async fn unparsable_env_file_is_left_untouched() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let dir = tempfile::tempdir()?;
	let path = dir.path().join(".env");
	let original = "OTHER_KEY=\"x\"\nnot a valid line\n";

	fs::write(&path, original)?;

	let credentials = build_file_credentials(&server, &path);

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").body(rotated_token_body());
		})
		.await;

	let outcome = credentials.refresh(&CancellationToken::new()).await?;

	assert!(!outcome.persisted);
	assert_eq!(credentials.bearer_token().expose(), NEW_BEARER);
	assert_eq!(fs::read_to_string(&path)?, original);

	Ok(())
}

#[tokio::test]
async fn stale_refreshes_coalesce_into_one_exchange() {
	let server = MockServer::start_async().await;
	let (credentials, backend) = build_memory_credentials(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(rotated_token_body())
				.delay(Duration::from_millis(50));
		})
		.await;
	let observed = credentials.lease().generation;
	let cancel = CancellationToken::new();
	let handles: Vec<_> = (0..10)
		.map(|_| {
			let credentials = Arc::clone(&credentials);
			let cancel = cancel.clone();

			tokio::spawn(async move { credentials.refresh_after(observed, &cancel).await })
		})
		.collect();
	let mut coalesced = 0;

	for handle in handles {
		let outcome = handle
			.await
			.expect("Refresh task should not panic.")
			.expect("Every caller should observe a successful refresh.");

		if outcome.coalesced {
			coalesced += 1;
		}
	}

	mock.assert_calls_async(1).await;

	assert_eq!(coalesced, 9);
	assert_eq!(credentials.metrics().exchanges(), 1);
	assert_eq!(credentials.metrics().coalesced(), 9);
	assert_eq!(credentials.tokens(), TokenPair::new(NEW_BEARER, NEW_REFRESH));
	assert_eq!(backend.writes(), 1);
}

#[tokio::test]
async fn unconditional_refreshes_are_serialized() {
	let server = MockServer::start_async().await;
	let (credentials, backend) = build_memory_credentials(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(rotated_token_body())
				.delay(Duration::from_millis(20));
		})
		.await;
	let handles: Vec<_> = (0..4)
		.map(|_| {
			let credentials = Arc::clone(&credentials);

			tokio::spawn(async move {
				let outcome = credentials.refresh(&CancellationToken::new()).await;
				let pair = credentials.tokens();

				(outcome, pair)
			})
		})
		.collect();

	for handle in handles {
		let (outcome, pair) = handle.await.expect("Refresh task should not panic.");

		assert!(!outcome.expect("Each refresh should succeed.").coalesced);
		assert_eq!(pair, TokenPair::new(NEW_BEARER, NEW_REFRESH));
	}

	mock.assert_calls_async(4).await;

	assert_eq!(credentials.lease().generation, 4);
	assert_eq!(backend.writes(), 4);
}

#[tokio::test]
async fn cancellation_during_exchange_commits_nothing() {
	let server = MockServer::start_async().await;
	let (credentials, backend) = build_memory_credentials(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(rotated_token_body())
				.delay(Duration::from_secs(5));
		})
		.await;

	let cancel = CancellationToken::new();
	let trigger = cancel.clone();

	tokio::spawn(async move {
		tokio::time::sleep(Duration::from_millis(100)).await;
		trigger.cancel();
	});

	let err = credentials.refresh(&cancel).await.expect_err("Cancelled refresh should fail.");

	assert!(matches!(err, Error::Cancelled));
	assert_eq!(credentials.tokens(), TokenPair::new(OLD_BEARER, OLD_REFRESH));
	assert_eq!(credentials.lease().generation, 0);
	assert_eq!(backend.writes(), 0);
}

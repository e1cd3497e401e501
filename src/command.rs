//! Chat command adapter: turns free-text lookup requests into replies.

// self
use crate::{
	_prelude::*,
	client::PreviewClient,
	config::{DEFAULT_COMMAND_DEADLINE, Settings},
	render::{self, Block},
};

/// Reply shown when the command text is blank.
pub const MISSING_KEY_MESSAGE: &str = "Please provide a valid MC number.";
/// Reply shown when the carrier lookup returns no records.
pub const NO_DATA_MESSAGE: &str = "No data found for the provided MC number.";
/// Reply shown for every other failure.
pub const FETCH_FAILED_MESSAGE: &str = "Error fetching data. Please try again later.";

/// What the chat layer should post back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandReply {
	/// Short notice visible only to the invoking user.
	Ephemeral(String),
	/// Rendered assessment for the channel.
	Blocks(Vec<Block>),
}

/// Handles one lookup command per call; share it across tasks behind an [`Arc`].
#[derive(Debug)]
pub struct LookupCommand {
	client: Arc<PreviewClient>,
	deadline: StdDuration,
}
impl LookupCommand {
	/// Creates a command bound to `client` with the default deadline.
	pub fn new(client: Arc<PreviewClient>) -> Self {
		Self { client, deadline: DEFAULT_COMMAND_DEADLINE }
	}

	/// Creates a command using the configured deadline.
	pub fn from_settings(settings: &Settings, client: Arc<PreviewClient>) -> Self {
		Self::new(client).with_deadline(settings.command_deadline)
	}

	/// Overrides the overall deadline for one command.
	pub fn with_deadline(mut self, deadline: StdDuration) -> Self {
		self.deadline = deadline;

		self
	}

	/// Looks up `text` and builds the reply.
	///
	/// The whole lookup, including any nested refresh, must finish within the deadline;
	/// when it elapses the in-flight request is dropped.
	pub async fn respond(&self, text: &str, cancel: &CancellationToken) -> CommandReply {
		let key = text.trim();

		if key.is_empty() {
			return CommandReply::Ephemeral(MISSING_KEY_MESSAGE.into());
		}

		let result = tokio::time::timeout(self.deadline, self.client.fetch(key, cancel))
			.await
			.unwrap_or_else(|_| {
				tracing::warn!(key, deadline = ?self.deadline, "Lookup command deadline elapsed.");

				Err(Error::Cancelled)
			});

		match result {
			Ok(record) => CommandReply::Blocks(render::preview_blocks(&record)),
			Err(e) if e.is_no_data() => CommandReply::Ephemeral(NO_DATA_MESSAGE.into()),
			Err(e) => {
				tracing::error!(key, error = %e, "Error fetching carrier data.");

				CommandReply::Ephemeral(FETCH_FAILED_MESSAGE.into())
			},
		}
	}
}

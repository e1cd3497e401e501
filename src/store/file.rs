//! Dotenv-style [`TokenStore`] that merges refreshed tokens into an existing key-value file.

// std
use std::{
	fs::{self, File, Permissions},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::TokenPair,
	store::{BEARER_TOKEN_KEY, REFRESH_TOKEN_KEY, StoreError, TokenStore},
};

/// Persists tokens as `KEY="value"` lines, keeping every other line of the file byte-for-byte.
///
/// Only the `BEARER_TOKEN` and `REFRESH_TOKEN` entries are rewritten in place (or appended when
/// absent); comments, blank lines, and unrelated entries are copied verbatim without variable
/// expansion. Writes go to a sibling `.tmp` file that carries the target's permissions before
/// any secret is written, is synced, and is then renamed over the target, so readers only ever
/// see a complete file.
#[derive(Clone, Debug)]
pub struct EnvFileStore {
	path: PathBuf,
}
impl EnvFileStore {
	/// Creates a store bound to `path`. The file does not need to exist yet.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Reads every entry the way a dotenv loader would see it; a missing file yields an empty
	/// map.
	///
	/// Values go through dotenv substitution, so `$NAME` references are expanded.
	pub fn read_entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
		if !self.path.exists() {
			return Ok(BTreeMap::new());
		}

		let iter = dotenvy::from_path_iter(&self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to open {}: {e}", self.path.display()),
		})?;
		let mut entries = BTreeMap::new();

		for item in iter {
			let (key, value) = item.map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", self.path.display()),
			})?;

			entries.insert(key, value);
		}

		Ok(entries)
	}

	fn read_contents(&self) -> Result<String, StoreError> {
		match fs::read_to_string(&self.path) {
			Ok(contents) => Ok(contents),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
			Err(e) => Err(StoreError::Backend {
				message: format!("Failed to read {}: {e}", self.path.display()),
			}),
		}
	}

	fn write_contents(&self, contents: &str) -> Result<(), StoreError> {
		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create directory {}: {e}", parent.display()),
			})?;
		}

		let permissions = self.target_permissions()?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			// Restrict the file before it holds any secret.
			if let Some(permissions) = permissions {
				file.set_permissions(permissions).map_err(|e| StoreError::Backend {
					message: format!("Failed to set permissions on {}: {e}", tmp_path.display()),
				})?;
			}

			file.write_all(contents.as_bytes()).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn target_permissions(&self) -> Result<Option<Permissions>, StoreError> {
		match fs::metadata(&self.path) {
			Ok(metadata) => Ok(Some(metadata.permissions())),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(new_file_permissions()),
			Err(e) => Err(StoreError::Backend {
				message: format!("Failed to stat {}: {e}", self.path.display()),
			}),
		}
	}
}
impl TokenStore for EnvFileStore {
	fn persist(&self, pair: &TokenPair) -> Result<(), StoreError> {
		let current = self.read_contents()?;
		let merged = merge_tokens(&current, pair).map_err(|line| StoreError::Serialization {
			message: format!("Line {line} of {} is not a KEY=value entry", self.path.display()),
		})?;

		self.write_contents(&merged)
	}
}

struct Assignment<'a> {
	key: &'a str,
	open_quote: Option<char>,
}

/// Rewrites the token entries of `contents`, returning the 1-based number of the first line
/// that is neither blank, a comment, nor an assignment.
fn merge_tokens(contents: &str, pair: &TokenPair) -> Result<String, usize> {
	let mut pending = [
		(BEARER_TOKEN_KEY, pair.bearer.expose(), true),
		(REFRESH_TOKEN_KEY, pair.refresh.expose(), true),
	];
	let mut merged = String::with_capacity(contents.len() + 128);
	let mut lines = contents.split_inclusive('\n').enumerate();

	while let Some((idx, line)) = lines.next() {
		if is_trivia(line) {
			merged.push_str(line);

			continue;
		}

		let Assignment { key, open_quote } = parse_assignment(line).ok_or(idx + 1)?;
		let mut entry = String::from(line);

		// Quoted values may span lines; the entry moves as one unit.
		if let Some(quote) = open_quote {
			loop {
				let (_, next) = lines.next().ok_or(idx + 1)?;

				entry.push_str(next);

				if closes(next, quote) {
					break;
				}
			}
		}

		match pending.iter_mut().find(|(token_key, ..)| *token_key == key) {
			Some((token_key, value, unwritten)) => {
				// Later duplicates are dropped so a loader cannot pick up a stale value.
				if *unwritten {
					push_entry(&mut merged, *token_key, *value);

					*unwritten = false;
				}
			},
			None => merged.push_str(&entry),
		}
	}

	for (key, value, unwritten) in pending {
		if unwritten {
			if !merged.is_empty() && !merged.ends_with('\n') {
				merged.push('\n');
			}

			push_entry(&mut merged, key, value);
		}
	}

	Ok(merged)
}

fn is_trivia(line: &str) -> bool {
	let trimmed = line.trim();

	trimmed.is_empty() || trimmed.starts_with('#')
}

fn parse_assignment(line: &str) -> Option<Assignment<'_>> {
	let body = line.trim_start();
	let body = body.strip_prefix("export ").map(str::trim_start).unwrap_or(body);
	let (key, value) = body.split_once('=')?;
	let key = key.trim_end();

	if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
		return None;
	}

	let value = value.trim_start();
	let open_quote = value
		.chars()
		.next()
		.filter(|&c| matches!(c, '"' | '\''))
		.filter(|&quote| !closes(&value[1..], quote));

	Some(Assignment { key, open_quote })
}

fn closes(text: &str, quote: char) -> bool {
	let mut escaped = false;

	for c in text.chars() {
		match c {
			_ if escaped => escaped = false,
			'\\' if quote == '"' => escaped = true,
			c if c == quote => return true,
			_ => {},
		}
	}

	false
}

fn push_entry(buf: &mut String, key: &str, value: &str) {
	buf.push_str(key);
	buf.push_str("=\"");
	buf.push_str(&escape_value(value));
	buf.push_str("\"\n");
}

fn escape_value(value: &str) -> String {
	let mut escaped = String::with_capacity(value.len());

	for c in value.chars() {
		match c {
			'\\' => escaped.push_str("\\\\"),
			'"' => escaped.push_str("\\\""),
			'$' => escaped.push_str("\\$"),
			'\n' => escaped.push_str("\\n"),
			_ => escaped.push(c),
		}
	}

	escaped
}

#[cfg(unix)]
fn new_file_permissions() -> Option<Permissions> {
	// std
	use std::os::unix::fs::PermissionsExt;

	Some(Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<Permissions> {
	None
}

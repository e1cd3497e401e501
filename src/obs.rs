//! Observability helpers for the refresh and preview flows.
//!
//! # Feature Flags
//!
//! - Spans named `carrier_preview.flow` carry the `flow` and `stage` fields and are always
//!   emitted through `tracing`.
//! - Enable `metrics` to increment the `carrier_preview_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Refresh-token exchange against the token endpoint.
	Refresh,
	/// Carrier preview lookup against the resource endpoint.
	Preview,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Refresh => "refresh",
			FlowKind::Preview => "preview",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Expected empty result; not a fault.
	NotFound,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::NotFound => "not_found",
			FlowOutcome::Failure => "failure",
		}
	}

	/// Maps a flow result onto its outcome label.
	pub fn of<T>(result: &Result<T>) -> Self {
		match result {
			Ok(_) => FlowOutcome::Success,
			Err(e) if e.is_no_data() => FlowOutcome::NotFound,
			Err(_) => FlowOutcome::Failure,
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn outcome_of_classifies_no_data_separately() {
		let ok: Result<()> = Ok(());
		let missing: Result<()> = Err(Error::NoDataFound { key: "1".into() });
		let failed: Result<()> = Err(Error::Cancelled);

		assert_eq!(FlowOutcome::of(&ok), FlowOutcome::Success);
		assert_eq!(FlowOutcome::of(&missing), FlowOutcome::NotFound);
		assert_eq!(FlowOutcome::of(&failed), FlowOutcome::Failure);
		assert_eq!(FlowKind::Preview.to_string(), "preview");
	}
}

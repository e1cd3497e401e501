//! Chat-block rendering of a [`PreviewResult`] in Slack Block Kit shape.

// std
use std::fmt::Write;
// self
use crate::{
	_prelude::*,
	preview::{Infraction, PreviewResult, RiskCategory, RiskLevel},
};

/// Header text of every rendered assessment.
pub const HEADER_TEXT: &str = "MyCarrierPortal Risk Assessment";

const MISSING_FIELD: &str = "N/A";

/// Text payload carried by header, section, and context blocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
	/// Unformatted text.
	PlainText {
		/// Text content.
		text: String,
		/// Render `:emoji:` shortcodes.
		emoji: bool,
	},
	/// Markdown-formatted text.
	Mrkdwn {
		/// Text content.
		text: String,
	},
}
impl TextObject {
	/// Builds a plain-text object with emoji rendering on.
	pub fn plain(text: impl Into<String>) -> Self {
		Self::PlainText { text: text.into(), emoji: true }
	}

	/// Builds a markdown object.
	pub fn mrkdwn(text: impl Into<String>) -> Self {
		Self::Mrkdwn { text: text.into() }
	}

	/// Text content regardless of format.
	pub fn text(&self) -> &str {
		match self {
			Self::PlainText { text, .. } | Self::Mrkdwn { text } => text,
		}
	}
}

/// One layout block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
	/// Large plain-text heading.
	Header {
		/// Heading text.
		text: TextObject,
	},
	/// Body paragraph.
	Section {
		/// Paragraph text.
		text: TextObject,
	},
	/// Small supporting text.
	Context {
		/// Context elements.
		elements: Vec<TextObject>,
	},
	/// Horizontal rule.
	Divider,
}
impl Block {
	fn header(text: &str) -> Self {
		Self::Header { text: TextObject::plain(text) }
	}

	fn section(text: String) -> Self {
		Self::Section { text: TextObject::mrkdwn(text) }
	}

	fn context(text: String) -> Self {
		Self::Context { elements: vec![TextObject::mrkdwn(text)] }
	}
}

/// Renders the full assessment message for one carrier.
pub fn preview_blocks(record: &PreviewResult) -> Vec<Block> {
	let details = &record.risk_assessment_details;
	let overall = RiskLevel::from_points(details.total_points);
	let mut blocks = vec![
		Block::header(HEADER_TEXT),
		Block::section(format!(
			"*{}*\nDOT: {} / MC: {}",
			or_missing(record.company_name.as_deref()),
			or_missing(record.dot_number.as_deref()),
			or_missing(record.docket_number.as_deref()),
		)),
		Block::section(format!("*Overall assessment:* {} {overall}", overall.emoji())),
		Block::context(format!("Total Points: {}", details.total_points)),
		Block::Divider,
	];

	for (label, category) in details.categories() {
		push_category(&mut blocks, label, category);
	}

	if let Some(addendum) = record.protect_addendum() {
		push_category(&mut blocks, "MyCarrierProtect", &addendum);
		blocks.push(Block::Divider);
	}

	blocks
}

/// Formats infractions as `- text: output (N points)` lines.
pub fn format_infractions(infractions: &[Infraction]) -> String {
	if infractions.is_empty() {
		return "No infractions found.".into();
	}

	infractions.iter().fold(String::new(), |mut out, infraction| {
		let _ = writeln!(
			out,
			"- {}: {} ({} points)",
			infraction.rule_text, infraction.rule_output, infraction.points
		);

		out
	})
}

fn push_category(blocks: &mut Vec<Block>, label: &str, category: &RiskCategory) {
	let level = RiskLevel::from_points(category.total_points);

	blocks.push(Block::section(format!("*{label}:* {} {level}", level.emoji())));
	blocks.push(Block::context(format!(
		"Risk Level: {level} | Points: {}\nInfractions:\n{}",
		category.total_points,
		format_infractions(&category.infractions)
	)));
}

fn or_missing(value: Option<&str>) -> &str {
	value.map(str::trim).filter(|value| !value.is_empty()).unwrap_or(MISSING_FIELD)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::preview::RiskAssessment;

	fn infraction(points: u32, text: &str, output: &str) -> Infraction {
		Infraction { points, risk_level: None, rule_text: text.into(), rule_output: output.into() }
	}

	#[test]
	fn format_infractions_handles_empty_and_lines() {
		assert_eq!(format_infractions(&[]), "No infractions found.");
		assert_eq!(
			format_infractions(&[
				infraction(100, "Authority age", "Under 1 year"),
				infraction(25, "Fleet size", "1 unit"),
			]),
			"- Authority age: Under 1 year (100 points)\n- Fleet size: 1 unit (25 points)\n"
		);
	}

	#[test]
	fn minimal_record_renders_summary_only() {
		let blocks = preview_blocks(&PreviewResult::default());

		assert_eq!(blocks.len(), 5);
		assert_eq!(blocks[0], Block::header(HEADER_TEXT));
		assert_eq!(blocks[1], Block::section("*N/A*\nDOT: N/A / MC: N/A".into()));
		assert_eq!(blocks[2], Block::section("*Overall assessment:* 🟢 Low".into()));
		assert_eq!(blocks[3], Block::context("Total Points: 0".into()));
		assert_eq!(blocks[4], Block::Divider);
	}

	#[test]
	fn present_categories_render_in_order_with_addendum() {
		let record = PreviewResult {
			company_name: Some("Acme Freight".into()),
			dot_number: Some("111".into()),
			docket_number: Some(" ".into()),
			risk_assessment_details: RiskAssessment {
				total_points: 300,
				safety: Some(RiskCategory { total_points: 0, infractions: Vec::new() }),
				authority: Some(RiskCategory {
					total_points: 300,
					infractions: vec![infraction(300, "Authority age", "Under 1 year")],
				}),
				..Default::default()
			},
			is_blocked: true,
			freight_validate_status: None,
		};
		let blocks = preview_blocks(&record);
		let texts: Vec<_> = blocks
			.iter()
			.filter_map(|block| match block {
				Block::Section { text } => Some(text.text()),
				_ => None,
			})
			.collect();

		assert_eq!(
			texts,
			[
				"*Acme Freight*\nDOT: 111 / MC: N/A",
				"*Overall assessment:* 🟠 Review Required",
				"*Authority:* 🟠 Review Required",
				"*Safety:* 🟢 Low",
				"*MyCarrierProtect:* 🔴 Fail",
			]
		);
		assert_eq!(
			blocks[blocks.len() - 2],
			Block::context(
				"Risk Level: Fail | Points: 1000\nInfractions:\n- MyCarrierProtect: Blocked: Carrier blocked by 3 or more companies (1000 points)\n"
					.into()
			)
		);
		assert_eq!(blocks.last(), Some(&Block::Divider));
	}

	#[test]
	fn blocks_serialize_as_block_kit() {
		let blocks = [Block::header("Hi"), Block::context("c".into()), Block::Divider];
		let value = serde_json::to_value(blocks).expect("Blocks should serialize.");

		assert_eq!(
			value,
			serde_json::json!([
				{ "type": "header", "text": { "type": "plain_text", "text": "Hi", "emoji": true } },
				{ "type": "context", "elements": [{ "type": "mrkdwn", "text": "c" }] },
				{ "type": "divider" },
			])
		);
	}
}

//! Carrier preview records returned by the resource endpoint, plus risk classification.

// crates.io
use serde::Deserializer;
// self
use crate::_prelude::*;

/// Points added by each protect flag.
pub const PROTECT_FLAG_POINTS: u32 = 1000;
/// `FreightValidateStatus` value that triggers the protect addendum.
pub const REVIEW_RECOMMENDED: &str = "Review Recommended";

/// Carrier risk record; the first element of the resource endpoint's array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PreviewResult {
	/// Legal company name.
	#[serde(default)]
	pub company_name: Option<String>,
	/// USDOT number.
	#[serde(default)]
	pub dot_number: Option<String>,
	/// MC/docket number.
	#[serde(default)]
	pub docket_number: Option<String>,
	/// Overall and per-category risk breakdown.
	#[serde(default)]
	pub risk_assessment_details: RiskAssessment,
	/// Carrier is blocked by three or more companies.
	#[serde(default, deserialize_with = "null_as_default")]
	pub is_blocked: bool,
	/// FreightValidate status string, when reported.
	#[serde(default)]
	pub freight_validate_status: Option<String>,
}
impl PreviewResult {
	/// Derives the protect addendum from the blocked and FreightValidate flags.
	///
	/// Returns `None` when neither flag contributes points.
	pub fn protect_addendum(&self) -> Option<RiskCategory> {
		let mut infractions = Vec::new();

		if self.is_blocked {
			infractions.push(Infraction::synthetic(
				"MyCarrierProtect: Blocked",
				"Carrier blocked by 3 or more companies",
			));
		}
		if self
			.freight_validate_status
			.as_deref()
			.is_some_and(|status| status.trim().eq_ignore_ascii_case(REVIEW_RECOMMENDED))
		{
			infractions.push(Infraction::synthetic(
				"FreightValidate Status",
				"Carrier has a FreightValidate Review Recommended status",
			));
		}

		if infractions.is_empty() {
			return None;
		}

		let total_points = infractions.iter().map(|infraction| infraction.points).sum();

		Some(RiskCategory { total_points, infractions })
	}
}

/// Overall point total and the five optional category breakdowns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RiskAssessment {
	/// Overall point total.
	#[serde(default, deserialize_with = "null_as_default")]
	pub total_points: u32,
	/// Authority category.
	#[serde(default)]
	pub authority: Option<RiskCategory>,
	/// Insurance category.
	#[serde(default)]
	pub insurance: Option<RiskCategory>,
	/// Operation category.
	#[serde(default)]
	pub operation: Option<RiskCategory>,
	/// Safety category.
	#[serde(default)]
	pub safety: Option<RiskCategory>,
	/// Other category.
	#[serde(default)]
	pub other: Option<RiskCategory>,
}
impl RiskAssessment {
	/// Present categories in display order, labeled.
	pub fn categories(&self) -> impl Iterator<Item = (&'static str, &RiskCategory)> {
		[
			("Authority", &self.authority),
			("Insurance", &self.insurance),
			("Operation", &self.operation),
			("Safety", &self.safety),
			("Other", &self.other),
		]
		.into_iter()
		.filter_map(|(label, category)| category.as_ref().map(|category| (label, category)))
	}
}

/// One risk category breakdown.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RiskCategory {
	/// Category point total.
	#[serde(default, deserialize_with = "null_as_default")]
	pub total_points: u32,
	/// Ordered infraction records.
	#[serde(default, deserialize_with = "null_as_default")]
	pub infractions: Vec<Infraction>,
}

/// Single rule hit contributing points to a category.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Infraction {
	/// Points contributed.
	#[serde(default, deserialize_with = "null_as_default")]
	pub points: u32,
	/// Upstream risk level label.
	#[serde(default)]
	pub risk_level: Option<String>,
	/// Rule description.
	#[serde(default, deserialize_with = "null_as_default")]
	pub rule_text: String,
	/// Rule evaluation output.
	#[serde(default, deserialize_with = "null_as_default")]
	pub rule_output: String,
}
impl Infraction {
	fn synthetic(rule_text: &str, rule_output: &str) -> Self {
		Self {
			points: PROTECT_FLAG_POINTS,
			risk_level: None,
			rule_text: rule_text.into(),
			rule_output: rule_output.into(),
		}
	}
}

/// Risk bucket derived from a point total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RiskLevel {
	/// 0–124 points.
	Low,
	/// 125–249 points.
	Medium,
	/// 250–999 points.
	ReviewRequired,
	/// 1000 points or more.
	Fail,
}
impl RiskLevel {
	/// Classifies a point total.
	pub const fn from_points(points: u32) -> Self {
		match points {
			0..=124 => Self::Low,
			125..=249 => Self::Medium,
			250..=999 => Self::ReviewRequired,
			_ => Self::Fail,
		}
	}

	/// Human-readable label.
	pub const fn label(self) -> &'static str {
		match self {
			Self::Low => "Low",
			Self::Medium => "Medium",
			Self::ReviewRequired => "Review Required",
			Self::Fail => "Fail",
		}
	}

	/// Traffic-light emoji.
	pub const fn emoji(self) -> &'static str {
		match self {
			Self::Low => "🟢",
			Self::Medium => "🟡",
			Self::ReviewRequired => "🟠",
			Self::Fail => "🔴",
		}
	}
}
impl Display for RiskLevel {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.label())
	}
}

// The upstream API sends explicit `null` for absent collections and flags.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

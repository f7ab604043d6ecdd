use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::product::{Origin, Product};

/// Which retrieval phase produced a candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
	#[default]
	Local,
	Cache,
}
impl Provenance {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Local => "local",
			Self::Cache => "cache",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
	pub product_id: i64,
	pub name: String,
	pub category: String,
	pub price: f64,
	pub score: f32,
	pub origin: Origin,
	pub provenance: Provenance,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub tags: Vec<String>,
}
impl Candidate {
	pub fn from_product(product: Product, score: f32) -> Self {
		Self {
			product_id: product.product_id,
			name: product.name,
			category: product.category,
			price: product.price,
			score,
			origin: product.origin,
			provenance: Provenance::Local,
			description: product.description,
			tags: product.tags,
		}
	}
}

/// Free-form judge rationale. Always a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JudgeReport(pub Map<String, Value>);
impl JudgeReport {
	/// Accepts any JSON value; non-objects collapse to an empty report.
	pub fn from_value(value: Value) -> Self {
		match value {
			Value::Object(map) => Self(map),
			Value::Null => Self::default(),
			other => {
				tracing::warn!(kind = value_kind(&other), "Judge report is not an object. Dropping it.");

				Self::default()
			},
		}
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn to_value(&self) -> Value {
		Value::Object(self.0.clone())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
	Accepted,
	RejectedByJudge,
	NoCandidatesFound,
}
impl OutcomeStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Accepted => "accepted",
			Self::RejectedByJudge => "rejected_by_judge",
			Self::NoCandidatesFound => "no_candidates_found",
		}
	}
}

/// Final word on one query after judging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SelectionOutcome {
	Accepted {
		candidate: Candidate,
		index: usize,
		report: JudgeReport,
	},
	/// The judge saw candidates and turned every one down, with reasons.
	#[serde(rename = "rejected_by_judge")]
	Rejected {
		query_id: String,
		report: JudgeReport,
		rejected_candidates_present: bool,
	},
	#[serde(rename = "no_candidates_found")]
	NoCandidates {
		#[serde(default)]
		report: JudgeReport,
	},
}
impl SelectionOutcome {
	pub fn status(&self) -> OutcomeStatus {
		match self {
			Self::Accepted { .. } => OutcomeStatus::Accepted,
			Self::Rejected { .. } => OutcomeStatus::RejectedByJudge,
			Self::NoCandidates { .. } => OutcomeStatus::NoCandidatesFound,
		}
	}

	pub fn is_accepted(&self) -> bool {
		matches!(self, Self::Accepted { .. })
	}

	pub fn candidate(&self) -> Option<&Candidate> {
		match self {
			Self::Accepted { candidate, .. } => Some(candidate),
			_ => None,
		}
	}

	pub fn report(&self) -> &JudgeReport {
		match self {
			Self::Accepted { report, .. }
			| Self::Rejected { report, .. }
			| Self::NoCandidates { report } => report,
		}
	}
}

fn value_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

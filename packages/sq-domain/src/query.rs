use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{product::Origin, text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
	/// The request's main solution.
	Root,
	Item,
}

/// Server-side filters for one query. Unknown keys ride along in `extra` for the judge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilters {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub origin: Option<Origin>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub category: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub keywords: Vec<String>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl QueryFilters {
	/// Keywords split on `,`, `/` and `|`, then normalized for matching.
	pub fn normalized_keywords(&self) -> Vec<String> {
		let mut out = Vec::new();

		for term in text::split_terms(&self.keywords) {
			let normalized = text::normalize_text(&term);

			if !normalized.is_empty() && !out.contains(&normalized) {
				out.push(normalized);
			}
		}

		out
	}

	pub fn category(&self) -> Option<&str> {
		self.category.as_deref().map(str::trim).filter(|category| !category.is_empty())
	}
}

/// Pointer back to the brief element a query came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub category: Option<String>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
	pub id: String,
	pub kind: QueryKind,
	pub query_text: String,
	#[serde(default)]
	pub filters: QueryFilters,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cost_benefit_hint: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rigor_hint: Option<Value>,
	#[serde(default = "default_quantity")]
	pub quantity: i64,
	#[serde(default)]
	pub source_ref: SourceRef,
}
impl QuerySpec {
	/// Copy of the query pinned to one origin.
	pub fn with_origin(&self, origin: Origin) -> Self {
		let mut query = self.clone();

		query.filters.origin = Some(origin);

		query
	}

	/// Quantity used on quotation lines; non-positive requests count as one.
	pub fn effective_quantity(&self) -> i64 {
		if self.quantity <= 0 { 1 } else { self.quantity }
	}
}

fn default_quantity() -> i64 {
	1
}

//! Structured reading of a procurement request, as produced by the decomposer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Brief {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub main_solution: Option<BriefSolution>,
	#[serde(default)]
	pub items: Vec<BriefItem>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BriefSolution {
	pub name: String,
	#[serde(default)]
	pub description: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub category: Option<String>,
	#[serde(default)]
	pub keywords: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cost_benefit: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rigor: Option<Value>,
}
impl BriefSolution {
	pub fn search_text(&self) -> String {
		join_non_empty([self.name.as_str(), self.description.as_str()])
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BriefItem {
	pub name: String,
	#[serde(default)]
	pub description: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub category: Option<String>,
	#[serde(default)]
	pub keywords: Vec<String>,
	#[serde(default = "default_quantity")]
	pub quantity: i64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cost_benefit: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rigor: Option<Value>,
}
impl BriefItem {
	/// Text searched for this item: name, then description when present.
	pub fn search_text(&self) -> String {
		join_non_empty([self.name.as_str(), self.description.as_str()])
	}
}

fn join_non_empty<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
	parts.into_iter().map(str::trim).filter(|part| !part.is_empty()).collect::<Vec<_>>().join(" ")
}

fn default_quantity() -> i64 {
	1
}

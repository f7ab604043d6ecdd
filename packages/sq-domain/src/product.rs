use serde::{Deserialize, Serialize};
use uuid::Uuid;

const POINT_ID_PREFIX: &str = "produto-";

/// Index point id for a natural key.
///
/// Must stay stable across releases; stored collections are keyed by it.
pub fn derive_point_id(product_id: i64) -> Uuid {
	Uuid::new_v5(&Uuid::NAMESPACE_DNS, format!("{POINT_ID_PREFIX}{product_id}").as_bytes())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
	#[default]
	Local,
	#[serde(alias = "externo")]
	External,
}
impl Origin {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Local => "local",
			Self::External => "external",
		}
	}

	/// Lenient parse used for stored payloads and source rows.
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"local" => Some(Self::Local),
			"external" | "externo" => Some(Self::External),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
	pub product_id: i64,
	pub name: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub category: String,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default)]
	pub price: f64,
	#[serde(default)]
	pub stock: i64,
	#[serde(default)]
	pub origin: Origin,
}
impl Product {
	/// Text fed to every embedding space and to the lexical index.
	pub fn canonical_text(&self) -> String {
		format!(
			"Name: {}. Category: {}. Tags: {}. Description: {}",
			self.name,
			self.category,
			self.tags.join(", "),
			self.description
		)
	}

	pub fn point_id(&self) -> Uuid {
		derive_point_id(self.product_id)
	}

	/// Products without a positive natural key cannot be indexed.
	pub fn has_natural_key(&self) -> bool {
		self.product_id > 0
	}

	/// Classifies how `self` differs from the indexed copy `stored`.
	pub fn change_from(&self, stored: &Self) -> ProductChange {
		if self.name != stored.name
			|| self.description != stored.description
			|| self.category != stored.category
			|| self.tags != stored.tags
		{
			return ProductChange::Text;
		}
		if self.price != stored.price || self.stock != stored.stock || self.origin != stored.origin
		{
			return ProductChange::Scalars;
		}

		ProductChange::Unchanged
	}
}

/// What an index update for a changed product has to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductChange {
	Unchanged,
	/// Only price, stock or origin moved; vectors stay valid.
	Scalars,
	/// A text-bearing field moved; every space must be re-embedded.
	Text,
}

/// Splits a comma separated tag string the way source rows store it.
pub fn split_tags(raw: &str) -> Vec<String> {
	raw.split(',').map(str::trim).filter(|tag| !tag.is_empty()).map(str::to_string).collect()
}

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use sq_domain::{Origin, Product, split_tags};

/// Row shape of the source-of-record products table. Nullable columns are tolerated.
#[derive(Debug, sqlx::FromRow)]
pub struct ProductRow {
	pub product_id: i64,
	pub name: Option<String>,
	pub description: Option<String>,
	pub category: Option<String>,
	pub tags: Option<String>,
	pub price: Option<f64>,
	pub stock: Option<i64>,
	pub origin: Option<String>,
}
impl ProductRow {
	pub fn into_product(self) -> Product {
		let origin = match self.origin.as_deref() {
			Some(raw) => Origin::parse(raw).unwrap_or_else(|| {
				tracing::warn!(
					product_id = self.product_id,
					origin = raw,
					"Unknown product origin. Treating it as local."
				);

				Origin::Local
			}),
			None => Origin::Local,
		};

		Product {
			product_id: self.product_id,
			name: self.name.unwrap_or_default().trim().to_string(),
			description: self.description.unwrap_or_default().trim().to_string(),
			category: self.category.unwrap_or_default().trim().to_string(),
			tags: self.tags.as_deref().map(split_tags).unwrap_or_default(),
			price: self.price.unwrap_or_default(),
			stock: self.stock.unwrap_or_default(),
			origin,
		}
	}
}

#[derive(Debug, Clone)]
pub struct NewPrompt {
	pub request_text: String,
	pub brief: Value,
	pub client: Value,
	pub source: Value,
}

#[derive(Debug, Clone)]
pub struct NewQuotation {
	pub prompt_id: i64,
	pub notes: String,
	pub currency: String,
	pub valid_until: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
	Complete,
	Incomplete,
}
impl QuotationStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Complete => "complete",
			Self::Incomplete => "incomplete",
		}
	}
}

/// A quotation line. Placeholders for unmet queries have no product and no price.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuotationItem {
	pub quotation_id: i64,
	pub query_id: String,
	pub product_id: Option<i64>,
	pub name: String,
	pub description: String,
	pub tags: Vec<String>,
	pub price: Option<f64>,
	pub currency: String,
	pub quantity: i64,
	pub origin: String,
	pub available: bool,
	pub request_text: String,
	pub analysis: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct QuotationItem {
	pub item_id: i64,
	pub quotation_id: i64,
	pub query_id: String,
	pub product_id: Option<i64>,
	pub name: String,
	pub price: Option<f64>,
	pub quantity: i64,
	pub available: bool,
}

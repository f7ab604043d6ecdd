use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub sync: CatalogSync,
	#[serde(default)]
	pub quotation: Quotation,
}
impl Config {
	/// Spaces a search runs against. The primary space always comes first.
	pub fn active_spaces(&self, use_multilingual: bool) -> Vec<&EmbeddingSpace> {
		let primary = self.primary_space();
		let mut spaces = Vec::with_capacity(self.providers.embedding.spaces.len());

		if let Some(primary) = primary {
			spaces.push(primary);
		}
		if use_multilingual {
			for space in &self.providers.embedding.spaces {
				if primary.is_some_and(|primary| primary.name == space.name) {
					continue;
				}

				spaces.push(space);
			}
		}

		spaces
	}

	pub fn primary_space(&self) -> Option<&EmbeddingSpace> {
		let spaces = &self.providers.embedding.spaces;

		match self.search.primary_space.as_deref() {
			Some(name) => spaces.iter().find(|space| space.name == name),
			None => spaces.first(),
		}
	}

	/// Clamps a requested result limit to the configured window.
	pub fn resolve_limit(&self, requested: Option<u32>) -> u32 {
		match requested {
			Some(limit) if (1..=self.search.max_limit).contains(&limit) => limit,
			_ => self.search.default_limit,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
	/// Source-of-record table scanned for catalog snapshots.
	#[serde(default = "default_products_table")]
	pub products_table: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	#[serde(default)]
	pub api_key: Option<String>,
	pub collection: String,
	#[serde(default = "default_qdrant_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub judge: LlmProviderConfig,
	pub decomposer: LlmProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
	pub spaces: Vec<EmbeddingSpace>,
}

/// A named vector field backed by one embedding model.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingSpace {
	pub name: String,
	pub model: String,
	pub dimensions: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	pub default_limit: u32,
	pub max_limit: u32,
	/// Server-side fusion of the dense and lexical prefetches: `rrf` or `dbsf`.
	pub fusion: String,
	pub primary_space: Option<String>,
}
impl Default for Search {
	fn default() -> Self {
		Self { default_limit: 4, max_limit: 50, fusion: "rrf".to_string(), primary_space: None }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogSync {
	pub max_retries: u32,
	pub backoff_ms: u64,
	pub max_backoff_ms: u64,
	pub attempt_timeout_ms: u64,
	pub page_size: u32,
	pub sync_before_search: bool,
}
impl Default for CatalogSync {
	fn default() -> Self {
		Self {
			max_retries: 5,
			backoff_ms: 3_000,
			max_backoff_ms: 15_000,
			attempt_timeout_ms: 120_000,
			page_size: 100,
			sync_before_search: true,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Quotation {
	pub enabled: bool,
	pub currency: String,
	pub validity_days: i64,
}
impl Default for Quotation {
	fn default() -> Self {
		Self { enabled: true, currency: "AOA".to_string(), validity_days: 15 }
	}
}

fn default_products_table() -> String {
	"products".to_string()
}

fn default_qdrant_timeout_ms() -> u64 {
	10_000
}

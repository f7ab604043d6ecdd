pub mod backends;
pub mod phases;
pub mod pipeline;
pub mod queries;
pub mod quotation;
pub mod retrieval;
pub mod retry;
pub mod selection;
pub mod sync;
pub mod time_serde;

mod error;

use std::{
	collections::HashMap,
	future::Future,
	pin::Pin,
	sync::{Arc, Mutex, MutexGuard},
};

use serde_json::Value;
use uuid::Uuid;

pub use backends::SqlCatalog;
pub use error::{Error, Result};
pub use phases::PhaseRun;
pub use pipeline::{
	HealthReport, HybridSearchRequest, HybridSearchResponse, MissingItemTask, ProcessRequest,
	ProcessResponse, ProcurementRequest, QueryResult,
};
pub use queries::{BriefQueryBuilder, QueryBuilder, ROOT_QUERY_ID};
pub use quotation::{MaterializeStatus, QuotationInput, QuotationOutcome};
pub use retry::RetryPolicy;
pub use selection::{JudgeContext, JudgeVerdict};
pub use sq_providers::judge::JudgeRequest;
pub use sq_storage::qdrant::{HybridQuery, IndexPage, ScoredProduct, StoredPoint};
pub use sync::{CatalogStatus, SyncReport};

use sq_config::{Config, EmbeddingProviderConfig, EmbeddingSpace, LlmProviderConfig};
use sq_domain::Product;
use sq_providers::{decomposer, embedding, judge};
use sq_storage::models::{
	NewPrompt, NewQuotation, NewQuotationItem, QuotationItem, QuotationStatus,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		space: &'a EmbeddingSpace,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

/// Picks at most one candidate per query. Returns the raw JSON verdict.
pub trait Judge
where
	Self: Send + Sync,
{
	fn judge<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request: &'a JudgeRequest,
	) -> BoxFuture<'a, color_eyre::Result<Value>>;
}

/// Turns request text into brief JSON.
pub trait Decomposer
where
	Self: Send + Sync,
{
	fn decompose<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request_text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Value>>;
}

/// Vector-indexed catalog: named dense spaces plus a lexical signal, keyed by product.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn ensure_collection(&self) -> BoxFuture<'_, Result<()>>;

	/// Drops and recreates the collection, empty.
	fn recreate(&self) -> BoxFuture<'_, Result<()>>;

	fn fetch_by_product_id(&self, product_id: i64) -> BoxFuture<'_, Result<Option<Product>>>;

	fn scroll(&self, cursor: Option<Uuid>, page_size: u32) -> BoxFuture<'_, Result<IndexPage>>;

	fn insert<'a>(
		&'a self,
		product: &'a Product,
		vectors: &'a HashMap<String, Vec<f32>>,
	) -> BoxFuture<'a, Result<()>>;

	fn update_full<'a>(
		&'a self,
		product: &'a Product,
		vectors: &'a HashMap<String, Vec<f32>>,
	) -> BoxFuture<'a, Result<()>>;

	fn update_scalars<'a>(&'a self, product: &'a Product) -> BoxFuture<'a, Result<()>>;

	fn delete(&self, point_id: Uuid) -> BoxFuture<'_, Result<()>>;

	fn hybrid_search<'a>(
		&'a self,
		query: HybridQuery<'a>,
	) -> BoxFuture<'a, Result<Vec<ScoredProduct>>>;

	fn count(&self) -> BoxFuture<'_, Result<u64>>;

	/// Deletes every stored point page by page. Returns how many were removed.
	fn purge_all(&self, page_size: u32) -> BoxFuture<'_, Result<u64>> {
		Box::pin(async move {
			let mut removed = 0;
			let mut cursor = None;

			loop {
				let page = self.scroll(cursor, page_size).await?;

				for point in &page.points {
					let Some(point_id) = point
						.point_id
						.or_else(|| point.product_id.map(sq_domain::derive_point_id))
					else {
						continue;
					};

					self.delete(point_id).await?;

					removed += 1;
				}

				match page.next_cursor {
					Some(next) if Some(next) != cursor => cursor = Some(next),
					_ => break,
				}
			}

			Ok(removed)
		})
	}
}

/// The system of record for products.
pub trait CatalogSource
where
	Self: Send + Sync,
{
	fn snapshot(&self) -> BoxFuture<'_, Result<Vec<Product>>>;

	fn count(&self) -> BoxFuture<'_, Result<u64>>;
}

pub trait QuotationStore
where
	Self: Send + Sync,
{
	fn create_prompt<'a>(&'a self, prompt: &'a NewPrompt) -> BoxFuture<'a, Result<i64>>;

	fn create_quotation<'a>(&'a self, quotation: &'a NewQuotation) -> BoxFuture<'a, Result<i64>>;

	fn item_exists(&self, quotation_id: i64, product_id: i64) -> BoxFuture<'_, Result<bool>>;

	/// Returns `false` when the product already sits on the quotation.
	fn insert_item<'a>(&'a self, item: &'a NewQuotationItem) -> BoxFuture<'a, Result<bool>>;

	fn list_items(&self, quotation_id: i64) -> BoxFuture<'_, Result<Vec<QuotationItem>>>;

	fn update_quotation(
		&self,
		quotation_id: i64,
		total: f64,
		status: QuotationStatus,
	) -> BoxFuture<'_, Result<()>>;

	/// Appends one per-query analysis entry to the quotation's report.
	fn append_report<'a>(
		&'a self,
		quotation_id: i64,
		entry: &'a Value,
	) -> BoxFuture<'a, Result<()>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub judge: Arc<dyn Judge>,
	pub decomposer: Arc<dyn Decomposer>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		judge: Arc<dyn Judge>,
		decomposer: Arc<dyn Decomposer>,
	) -> Self {
		Self { embedding, judge, decomposer }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), judge: provider.clone(), decomposer: provider }
	}
}

/// Storage collaborators the service reads and writes.
#[derive(Clone)]
pub struct Backends {
	pub index: Arc<dyn VectorIndex>,
	pub catalog: Arc<dyn CatalogSource>,
	pub quotations: Arc<dyn QuotationStore>,
}

pub struct SmartQuoteService {
	pub cfg: Config,
	pub backends: Backends,
	pub providers: Providers,
	pub query_builder: Arc<dyn QueryBuilder>,
	/// Last product state this process wrote to the index, by natural key.
	known_products: Mutex<HashMap<i64, Product>>,
}
impl SmartQuoteService {
	pub fn new(cfg: Config, backends: Backends) -> Self {
		Self::with_providers(cfg, backends, Providers::default())
	}

	pub fn with_providers(cfg: Config, backends: Backends, providers: Providers) -> Self {
		Self {
			cfg,
			backends,
			providers,
			query_builder: Arc::new(BriefQueryBuilder),
			known_products: Mutex::new(HashMap::new()),
		}
	}

	pub fn with_query_builder(mut self, query_builder: Arc<dyn QueryBuilder>) -> Self {
		self.query_builder = query_builder;

		self
	}

	pub(crate) fn known_products(&self) -> MutexGuard<'_, HashMap<i64, Product>> {
		self.known_products.lock().unwrap_or_else(|err| err.into_inner())
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		space: &'a EmbeddingSpace,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, space, texts))
	}
}

impl Judge for DefaultProviders {
	fn judge<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request: &'a JudgeRequest,
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		Box::pin(judge::judge(cfg, request))
	}
}

impl Decomposer for DefaultProviders {
	fn decompose<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request_text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		Box::pin(decomposer::decompose(cfg, request_text))
	}
}

pub(crate) fn cmp_f32_desc(a: f32, b: f32) -> std::cmp::Ordering {
	use std::cmp::Ordering;

	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

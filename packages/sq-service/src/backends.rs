use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use uuid::Uuid;

use crate::{Backends, BoxFuture, CatalogSource, QuotationStore, Result, VectorIndex};
use sq_config::Config;
use sq_domain::Product;
use sq_storage::{
	catalog,
	db::Db,
	models::{NewPrompt, NewQuotation, NewQuotationItem, QuotationItem, QuotationStatus},
	qdrant::{CatalogStore, HybridQuery, IndexPage, ScoredProduct},
	quotations,
};

/// Products table in Postgres read as the source of record.
#[derive(Clone)]
pub struct SqlCatalog {
	pub db: Db,
	pub table: String,
}
impl SqlCatalog {
	pub fn new(db: Db, table: impl Into<String>) -> Self {
		Self { db, table: table.into() }
	}
}

impl CatalogSource for SqlCatalog {
	fn snapshot(&self) -> BoxFuture<'_, Result<Vec<Product>>> {
		Box::pin(async move { Ok(catalog::fetch_products(&self.db, &self.table).await?) })
	}

	fn count(&self) -> BoxFuture<'_, Result<u64>> {
		Box::pin(async move { Ok(catalog::count_products(&self.db, &self.table).await?) })
	}
}

impl VectorIndex for CatalogStore {
	fn ensure_collection(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move { Ok(CatalogStore::ensure_collection(self).await?) })
	}

	fn recreate(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move { Ok(CatalogStore::recreate(self).await?) })
	}

	fn fetch_by_product_id(&self, product_id: i64) -> BoxFuture<'_, Result<Option<Product>>> {
		Box::pin(async move { Ok(self.fetch_product(product_id).await?) })
	}

	fn scroll(&self, cursor: Option<Uuid>, page_size: u32) -> BoxFuture<'_, Result<IndexPage>> {
		Box::pin(async move { Ok(self.scroll_page(cursor, page_size).await?) })
	}

	fn insert<'a>(
		&'a self,
		product: &'a Product,
		vectors: &'a HashMap<String, Vec<f32>>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(self.upsert_product(product, vectors).await?) })
	}

	fn update_full<'a>(
		&'a self,
		product: &'a Product,
		vectors: &'a HashMap<String, Vec<f32>>,
	) -> BoxFuture<'a, Result<()>> {
		// Same deterministic id, so the upsert replaces vectors and payload together.
		Box::pin(async move { Ok(self.upsert_product(product, vectors).await?) })
	}

	fn update_scalars<'a>(&'a self, product: &'a Product) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(CatalogStore::update_scalars(self, product).await?) })
	}

	fn delete(&self, point_id: Uuid) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move { Ok(self.delete_point(point_id).await?) })
	}

	fn hybrid_search<'a>(
		&'a self,
		query: HybridQuery<'a>,
	) -> BoxFuture<'a, Result<Vec<ScoredProduct>>> {
		Box::pin(async move { Ok(CatalogStore::hybrid_search(self, &query).await?) })
	}

	fn count(&self) -> BoxFuture<'_, Result<u64>> {
		Box::pin(async move { Ok(CatalogStore::count(self).await?) })
	}
}

impl QuotationStore for Db {
	fn create_prompt<'a>(&'a self, prompt: &'a NewPrompt) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move { Ok(quotations::insert_prompt(self, prompt).await?) })
	}

	fn create_quotation<'a>(&'a self, quotation: &'a NewQuotation) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move { Ok(quotations::insert_quotation(self, quotation).await?) })
	}

	fn item_exists(&self, quotation_id: i64, product_id: i64) -> BoxFuture<'_, Result<bool>> {
		Box::pin(async move { Ok(quotations::item_exists(self, quotation_id, product_id).await?) })
	}

	fn insert_item<'a>(&'a self, item: &'a NewQuotationItem) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(quotations::insert_item(self, item).await?) })
	}

	fn list_items(&self, quotation_id: i64) -> BoxFuture<'_, Result<Vec<QuotationItem>>> {
		Box::pin(async move { Ok(quotations::list_items(self, quotation_id).await?) })
	}

	fn update_quotation(
		&self,
		quotation_id: i64,
		total: f64,
		status: QuotationStatus,
	) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			Ok(quotations::update_quotation(self, quotation_id, total, status).await?)
		})
	}

	fn append_report<'a>(
		&'a self,
		quotation_id: i64,
		entry: &'a Value,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(quotations::append_report(self, quotation_id, entry).await?) })
	}
}

impl Backends {
	pub fn new(
		index: Arc<dyn VectorIndex>,
		catalog: Arc<dyn CatalogSource>,
		quotations: Arc<dyn QuotationStore>,
	) -> Self {
		Self { index, catalog, quotations }
	}

	/// Connects Postgres and Qdrant, then makes sure the schema and the collection exist.
	pub async fn connect(cfg: &Config) -> Result<Self> {
		let db = Db::connect(&cfg.storage.postgres).await?;

		db.ensure_schema(&cfg.storage.postgres.products_table).await?;

		let store = CatalogStore::new(
			&cfg.storage.qdrant,
			&cfg.providers.embedding.spaces,
			&cfg.search.fusion,
		)?;

		CatalogStore::ensure_collection(&store).await?;

		let catalog = SqlCatalog::new(db.clone(), cfg.storage.postgres.products_table.clone());

		Ok(Self::new(Arc::new(store), Arc::new(catalog), Arc::new(db)))
	}
}

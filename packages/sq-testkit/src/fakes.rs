use std::{
	collections::{BTreeMap, HashMap, HashSet},
	sync::{
		Arc, Mutex, MutexGuard,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
};

use color_eyre::eyre;
use serde_json::Value;
use uuid::Uuid;

use sq_config::{EmbeddingProviderConfig, EmbeddingSpace, LlmProviderConfig};
use sq_domain::{Origin, Product};
use sq_service::{
	BoxFuture, CatalogSource, Decomposer, EmbeddingProvider, Error, HybridQuery, IndexPage,
	Judge, JudgeRequest, QuotationStore, Result, ScoredProduct, StoredPoint, VectorIndex,
};
use sq_storage::models::{
	NewPrompt, NewQuotation, NewQuotationItem, QuotationItem, QuotationStatus,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}

fn count(counter: &Arc<AtomicUsize>) -> usize {
	counter.load(Ordering::SeqCst)
}

/// Scroll position of a stored point. Points without an id resume from their derived id.
fn cursor_key(point: &StoredPoint) -> Uuid {
	point.point_id.or(point.product_id.map(sq_domain::derive_point_id)).unwrap_or_else(Uuid::nil)
}

/// Vector index held in memory. Search hits are scripted per `(space, origin)`.
#[derive(Default)]
pub struct InMemoryIndex {
	points: Mutex<BTreeMap<Uuid, Product>>,
	foreign: Mutex<Vec<StoredPoint>>,
	hits: Mutex<HashMap<(String, Option<Origin>), Vec<ScoredProduct>>>,
	failing_spaces: Mutex<HashSet<String>>,
	failing_lookups: AtomicBool,
	failing_deletes: Mutex<HashSet<Uuid>>,
	deleted: Mutex<Vec<Uuid>>,
	vectors: Mutex<HashMap<i64, HashMap<String, Vec<f32>>>>,
	pub searches: Arc<AtomicUsize>,
	pub lookups: Arc<AtomicUsize>,
	pub inserts: Arc<AtomicUsize>,
	pub full_updates: Arc<AtomicUsize>,
	pub scalar_updates: Arc<AtomicUsize>,
	pub deletes: Arc<AtomicUsize>,
	pub recreates: Arc<AtomicUsize>,
}
impl InMemoryIndex {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Stores `product` as if a previous sync had indexed it.
	pub fn seed(&self, product: Product) {
		lock(&self.points).insert(product.point_id(), product);
	}

	/// Adds a point the catalog never produced, e.g. one missing its product id.
	pub fn seed_foreign(&self, point: StoredPoint) {
		lock(&self.foreign).push(point);
	}

	pub fn script_hits(&self, space: &str, origin: Option<Origin>, hits: Vec<ScoredProduct>) {
		lock(&self.hits).insert((space.to_string(), origin), hits);
	}

	pub fn fail_space(&self, space: &str) {
		lock(&self.failing_spaces).insert(space.to_string());
	}

	pub fn fail_lookups(&self) {
		self.failing_lookups.store(true, Ordering::SeqCst);
	}

	pub fn fail_delete(&self, point_id: Uuid) {
		lock(&self.failing_deletes).insert(point_id);
	}

	/// Point ids removed so far, in delete order.
	pub fn deleted(&self) -> Vec<Uuid> {
		lock(&self.deleted).clone()
	}

	pub fn stored(&self, product_id: i64) -> Option<Product> {
		lock(&self.points).values().find(|product| product.product_id == product_id).cloned()
	}

	pub fn stored_vectors(&self, product_id: i64) -> Option<HashMap<String, Vec<f32>>> {
		lock(&self.vectors).get(&product_id).cloned()
	}

	pub fn len(&self) -> usize {
		lock(&self.points).len() + lock(&self.foreign).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn searches(&self) -> usize {
		count(&self.searches)
	}

	pub fn writes(&self) -> usize {
		count(&self.inserts) + count(&self.full_updates) + count(&self.scalar_updates)
	}

	fn all_points(&self) -> Vec<StoredPoint> {
		let mut points = lock(&self.points)
			.iter()
			.map(|(point_id, product)| StoredPoint {
				point_id: Some(*point_id),
				product_id: Some(product.product_id),
			})
			.collect::<Vec<_>>();

		points.extend(lock(&self.foreign).iter().copied());

		points
	}

	fn write(&self, product: &Product, vectors: &HashMap<String, Vec<f32>>) {
		lock(&self.points).insert(product.point_id(), product.clone());
		lock(&self.vectors).insert(product.product_id, vectors.clone());
	}
}

impl VectorIndex for InMemoryIndex {
	fn ensure_collection(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async { Ok(()) })
	}

	fn recreate(&self) -> BoxFuture<'_, Result<()>> {
		self.recreates.fetch_add(1, Ordering::SeqCst);
		lock(&self.points).clear();
		lock(&self.foreign).clear();
		lock(&self.vectors).clear();

		Box::pin(async { Ok(()) })
	}

	fn fetch_by_product_id(&self, product_id: i64) -> BoxFuture<'_, Result<Option<Product>>> {
		self.lookups.fetch_add(1, Ordering::SeqCst);

		let result = if self.failing_lookups.load(Ordering::SeqCst) {
			Err(Error::Qdrant { message: "lookup unavailable".to_string() })
		} else {
			Ok(self.stored(product_id))
		};

		Box::pin(async move { result })
	}

	fn scroll(&self, cursor: Option<Uuid>, page_size: u32) -> BoxFuture<'_, Result<IndexPage>> {
		let points = self.all_points();
		let start = match cursor {
			Some(cursor) =>
				points.iter().position(|point| cursor_key(point) == cursor).unwrap_or(points.len()),
			None => 0,
		};
		let end = (start + page_size as usize).min(points.len());
		let page = IndexPage {
			points: points[start..end].to_vec(),
			next_cursor: points.get(end).map(cursor_key),
		};

		Box::pin(async move { Ok(page) })
	}

	fn insert<'a>(
		&'a self,
		product: &'a Product,
		vectors: &'a HashMap<String, Vec<f32>>,
	) -> BoxFuture<'a, Result<()>> {
		self.inserts.fetch_add(1, Ordering::SeqCst);
		self.write(product, vectors);

		Box::pin(async { Ok(()) })
	}

	fn update_full<'a>(
		&'a self,
		product: &'a Product,
		vectors: &'a HashMap<String, Vec<f32>>,
	) -> BoxFuture<'a, Result<()>> {
		self.full_updates.fetch_add(1, Ordering::SeqCst);
		self.write(product, vectors);

		Box::pin(async { Ok(()) })
	}

	fn update_scalars<'a>(&'a self, product: &'a Product) -> BoxFuture<'a, Result<()>> {
		self.scalar_updates.fetch_add(1, Ordering::SeqCst);

		if let Some(stored) = lock(&self.points).get_mut(&product.point_id()) {
			stored.price = product.price;
			stored.stock = product.stock;
			stored.origin = product.origin;
		}

		Box::pin(async { Ok(()) })
	}

	fn delete(&self, point_id: Uuid) -> BoxFuture<'_, Result<()>> {
		self.deletes.fetch_add(1, Ordering::SeqCst);

		let result = if lock(&self.failing_deletes).contains(&point_id) {
			Err(Error::Qdrant { message: format!("delete of {point_id} refused") })
		} else {
			lock(&self.points).remove(&point_id);
			lock(&self.foreign).retain(|point| {
				point.point_id != Some(point_id)
					&& point.product_id.map(sq_domain::derive_point_id) != Some(point_id)
			});
			lock(&self.deleted).push(point_id);

			Ok(())
		};

		Box::pin(async move { result })
	}

	fn hybrid_search<'a>(
		&'a self,
		query: HybridQuery<'a>,
	) -> BoxFuture<'a, Result<Vec<ScoredProduct>>> {
		self.searches.fetch_add(1, Ordering::SeqCst);

		let result = if lock(&self.failing_spaces).contains(query.space) {
			Err(Error::Qdrant { message: format!("space {} unavailable", query.space) })
		} else {
			let key = (query.space.to_string(), query.filters.origin);
			let mut hits = lock(&self.hits).get(&key).cloned().unwrap_or_default();

			hits.truncate(query.limit as usize);

			Ok(hits)
		};

		Box::pin(async move { result })
	}

	fn count(&self) -> BoxFuture<'_, Result<u64>> {
		let total = self.len() as u64;

		Box::pin(async move { Ok(total) })
	}
}

/// Source of record returning a fixed product list.
#[derive(Default)]
pub struct StaticCatalog {
	products: Mutex<Vec<Product>>,
	failing: AtomicBool,
	pub snapshots: Arc<AtomicUsize>,
}
impl StaticCatalog {
	pub fn new(products: Vec<Product>) -> Arc<Self> {
		Arc::new(Self { products: Mutex::new(products), ..Self::default() })
	}

	pub fn replace(&self, products: Vec<Product>) {
		*lock(&self.products) = products;
	}

	pub fn fail(&self) {
		self.failing.store(true, Ordering::SeqCst);
	}

	fn read(&self) -> Result<Vec<Product>> {
		if self.failing.load(Ordering::SeqCst) {
			return Err(Error::Storage { message: "source of record unreachable".to_string() });
		}

		Ok(lock(&self.products).clone())
	}
}

impl CatalogSource for StaticCatalog {
	fn snapshot(&self) -> BoxFuture<'_, Result<Vec<Product>>> {
		self.snapshots.fetch_add(1, Ordering::SeqCst);

		let result = self.read();

		Box::pin(async move { result })
	}

	fn count(&self) -> BoxFuture<'_, Result<u64>> {
		let result = self.read().map(|products| products.len() as u64);

		Box::pin(async move { result })
	}
}

/// Quotation tables in memory, with the same one-line-per-product guard as Postgres.
#[derive(Default)]
pub struct InMemoryQuotations {
	prompts: Mutex<Vec<NewPrompt>>,
	quotations: Mutex<Vec<NewQuotation>>,
	items: Mutex<Vec<NewQuotationItem>>,
	totals: Mutex<HashMap<i64, (f64, QuotationStatus)>>,
	reports: Mutex<HashMap<i64, Vec<Value>>>,
	failing_prompts: AtomicBool,
	failing_reports: AtomicBool,
}
impl InMemoryQuotations {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn fail_prompts(&self) {
		self.failing_prompts.store(true, Ordering::SeqCst);
	}

	pub fn prompts(&self) -> Vec<NewPrompt> {
		lock(&self.prompts).clone()
	}

	pub fn quotations(&self) -> Vec<NewQuotation> {
		lock(&self.quotations).clone()
	}

	pub fn items(&self, quotation_id: i64) -> Vec<NewQuotationItem> {
		lock(&self.items).iter().filter(|item| item.quotation_id == quotation_id).cloned().collect()
	}

	pub fn totals(&self, quotation_id: i64) -> Option<(f64, QuotationStatus)> {
		lock(&self.totals).get(&quotation_id).copied()
	}

	pub fn fail_reports(&self) {
		self.failing_reports.store(true, Ordering::SeqCst);
	}

	pub fn report(&self, quotation_id: i64) -> Vec<Value> {
		lock(&self.reports).get(&quotation_id).cloned().unwrap_or_default()
	}
}

impl QuotationStore for InMemoryQuotations {
	fn create_prompt<'a>(&'a self, prompt: &'a NewPrompt) -> BoxFuture<'a, Result<i64>> {
		let result = if self.failing_prompts.load(Ordering::SeqCst) {
			Err(Error::Storage { message: "prompt rejected".to_string() })
		} else {
			let mut prompts = lock(&self.prompts);

			prompts.push(prompt.clone());

			Ok(prompts.len() as i64)
		};

		Box::pin(async move { result })
	}

	fn create_quotation<'a>(&'a self, quotation: &'a NewQuotation) -> BoxFuture<'a, Result<i64>> {
		let mut quotations = lock(&self.quotations);

		quotations.push(quotation.clone());

		let quotation_id = quotations.len() as i64;

		Box::pin(async move { Ok(quotation_id) })
	}

	fn item_exists(&self, quotation_id: i64, product_id: i64) -> BoxFuture<'_, Result<bool>> {
		let exists = lock(&self.items)
			.iter()
			.any(|item| item.quotation_id == quotation_id && item.product_id == Some(product_id));

		Box::pin(async move { Ok(exists) })
	}

	fn insert_item<'a>(&'a self, item: &'a NewQuotationItem) -> BoxFuture<'a, Result<bool>> {
		let mut items = lock(&self.items);
		let duplicate = item.product_id.is_some()
			&& items.iter().any(|existing| {
				existing.quotation_id == item.quotation_id && existing.product_id == item.product_id
			});

		if !duplicate {
			items.push(item.clone());
		}

		Box::pin(async move { Ok(!duplicate) })
	}

	fn list_items(&self, quotation_id: i64) -> BoxFuture<'_, Result<Vec<QuotationItem>>> {
		let items = self
			.items(quotation_id)
			.into_iter()
			.enumerate()
			.map(|(position, item)| QuotationItem {
				item_id: position as i64 + 1,
				quotation_id: item.quotation_id,
				query_id: item.query_id,
				product_id: item.product_id,
				name: item.name,
				price: item.price,
				quantity: item.quantity,
				available: item.available,
			})
			.collect();

		Box::pin(async move { Ok(items) })
	}

	fn update_quotation(
		&self,
		quotation_id: i64,
		total: f64,
		status: QuotationStatus,
	) -> BoxFuture<'_, Result<()>> {
		lock(&self.totals).insert(quotation_id, (total, status));

		Box::pin(async { Ok(()) })
	}

	fn append_report<'a>(
		&'a self,
		quotation_id: i64,
		entry: &'a Value,
	) -> BoxFuture<'a, Result<()>> {
		let result = if self.failing_reports.load(Ordering::SeqCst) {
			Err(Error::Storage { message: "report rejected".to_string() })
		} else {
			lock(&self.reports).entry(quotation_id).or_default().push(entry.clone());

			Ok(())
		};

		Box::pin(async move { result })
	}
}

/// Counts embedding calls and returns constant vectors sized by the space.
#[derive(Default)]
pub struct SpyEmbedding {
	pub calls: Arc<AtomicUsize>,
	per_space: Mutex<HashMap<String, usize>>,
	transient_failures: AtomicUsize,
	failing_spaces: Mutex<HashSet<String>>,
}
impl SpyEmbedding {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// The next `count` calls fail with a retryable connection error.
	pub fn fail_transiently(&self, count: usize) {
		self.transient_failures.store(count, Ordering::SeqCst);
	}

	/// Every call for `space` fails with a non-retryable error.
	pub fn fail_space(&self, space: &str) {
		lock(&self.failing_spaces).insert(space.to_string());
	}

	pub fn calls(&self) -> usize {
		count(&self.calls)
	}

	pub fn calls_for(&self, space: &str) -> usize {
		lock(&self.per_space).get(space).copied().unwrap_or(0)
	}
}

impl EmbeddingProvider for SpyEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		space: &'a EmbeddingSpace,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		*lock(&self.per_space).entry(space.name.clone()).or_default() += 1;

		let transient = self
			.transient_failures
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
			.is_ok();
		let result = if transient {
			Err(eyre::eyre!("Connection reset by peer."))
		} else if lock(&self.failing_spaces).contains(&space.name) {
			Err(eyre::eyre!("Embedding request failed with HTTP 400: unknown model."))
		} else {
			let dim = space.dimensions as usize;

			Ok(texts.iter().map(|_| vec![1.0; dim]).collect())
		};

		Box::pin(async move { result })
	}
}

/// Judge answering from a script keyed by query text. Unscripted queries pick candidate 0.
#[derive(Default)]
pub struct ScriptedJudge {
	pub calls: Arc<AtomicUsize>,
	verdicts: Mutex<HashMap<String, Value>>,
	requests: Mutex<Vec<JudgeRequest>>,
	failing: AtomicBool,
}
impl ScriptedJudge {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn script(&self, query_text: &str, verdict: Value) {
		lock(&self.verdicts).insert(query_text.to_string(), verdict);
	}

	pub fn fail(&self) {
		self.failing.store(true, Ordering::SeqCst);
	}

	pub fn calls(&self) -> usize {
		count(&self.calls)
	}

	pub fn requests(&self) -> Vec<JudgeRequest> {
		lock(&self.requests).clone()
	}
}

impl Judge for ScriptedJudge {
	fn judge<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		request: &'a JudgeRequest,
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		lock(&self.requests).push(request.clone());

		let result = if self.failing.load(Ordering::SeqCst) {
			Err(eyre::eyre!("Judge request failed with HTTP 500: internal error."))
		} else {
			Ok(lock(&self.verdicts).get(&request.query).cloned().unwrap_or_else(|| {
				serde_json::json!({ "index": 0, "report": { "reason": "best match" } })
			}))
		};

		Box::pin(async move { result })
	}
}

/// Decomposer returning one fixed brief.
pub struct StaticDecomposer {
	pub calls: Arc<AtomicUsize>,
	brief: Value,
	failing: AtomicBool,
}
impl StaticDecomposer {
	pub fn new(brief: Value) -> Arc<Self> {
		Arc::new(Self { calls: Arc::new(AtomicUsize::new(0)), brief, failing: AtomicBool::new(false) })
	}

	pub fn fail(&self) {
		self.failing.store(true, Ordering::SeqCst);
	}

	pub fn calls(&self) -> usize {
		count(&self.calls)
	}
}

impl Decomposer for StaticDecomposer {
	fn decompose<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_request_text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let result = if self.failing.load(Ordering::SeqCst) {
			Err(eyre::eyre!("Decomposer request failed with HTTP 502: bad gateway."))
		} else {
			Ok(self.brief.clone())
		};

		Box::pin(async move { result })
	}
}

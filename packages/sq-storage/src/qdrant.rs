pub const BM25_VECTOR_NAME: &str = "bm25";
pub const BM25_MODEL: &str = "qdrant/bm25";

use std::{collections::HashMap, time::Duration};

use qdrant_client::{
	Payload, Qdrant,
	qdrant::{
		Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollection,
		DeletePointsBuilder, Distance, Document, FieldType, Filter, Fusion, Modifier, PointId,
		PointStruct, PointsIdsList, PrefetchQueryBuilder, Query, QueryPointsBuilder,
		ScrollPointsBuilder, SetPayloadPointsBuilder, SparseVectorParamsBuilder,
		SparseVectorsConfigBuilder, UpsertPointsBuilder, Value, Vector, VectorParamsBuilder,
		VectorsConfigBuilder, point_id::PointIdOptions, value::Kind,
	},
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use sq_config::EmbeddingSpace;
use sq_domain::{Origin, Product, QueryFilters};

use crate::{Error, Result};

const PAYLOAD_INDEXES: [(&str, FieldType); 4] = [
	("product_id", FieldType::Integer),
	("origin", FieldType::Keyword),
	("tags", FieldType::Keyword),
	("category", FieldType::Text),
];

/// One stored point as seen by a full scan. Either half may be missing on foreign points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredPoint {
	pub point_id: Option<Uuid>,
	pub product_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexPage {
	pub points: Vec<StoredPoint>,
	pub next_cursor: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredProduct {
	pub product: Product,
	pub score: f32,
}

/// A hybrid query against one dense space plus the shared lexical vector.
#[derive(Debug, Clone, Copy)]
pub struct HybridQuery<'a> {
	pub space: &'a str,
	pub vector: &'a [f32],
	pub text: &'a str,
	pub filters: &'a QueryFilters,
	pub limit: u32,
}

pub struct CatalogStore {
	pub client: Qdrant,
	pub collection: String,
	pub spaces: Vec<EmbeddingSpace>,
	pub fusion: Fusion,
}
impl CatalogStore {
	pub fn new(cfg: &sq_config::Qdrant, spaces: &[EmbeddingSpace], fusion: &str) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url)
			.api_key(cfg.api_key.clone())
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.build()?;
		let fusion = match fusion {
			"rrf" => Fusion::Rrf,
			"dbsf" => Fusion::Dbsf,
			other => return Err(Error::InvalidArgument(format!("Unknown fusion {other:?}."))),
		};

		Ok(Self { client, collection: cfg.collection.clone(), spaces: spaces.to_vec(), fusion })
	}

	/// Creates the collection and its payload indexes when missing.
	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(&self.collection).await? {
			return Ok(());
		}

		let mut vectors_config = VectorsConfigBuilder::default();

		for space in &self.spaces {
			vectors_config.add_named_vector_params(
				space.name.as_str(),
				VectorParamsBuilder::new(space.dimensions.into(), Distance::Cosine),
			);
		}

		let mut sparse_vectors_config = SparseVectorsConfigBuilder::default();

		sparse_vectors_config.add_named_vector_params(
			BM25_VECTOR_NAME,
			SparseVectorParamsBuilder::default().modifier(Modifier::Idf as i32),
		);

		let builder = CreateCollectionBuilder::new(self.collection.clone())
			.vectors_config(vectors_config)
			.sparse_vectors_config(sparse_vectors_config);

		self.client.create_collection(builder).await?;

		for (field_name, field_type) in PAYLOAD_INDEXES {
			let request = CreateFieldIndexCollection {
				collection_name: self.collection.clone(),
				wait: Some(true),
				field_name: field_name.to_string(),
				field_type: Some(field_type as i32),
				field_index_params: None,
				ordering: None,
			};

			self.client.create_field_index(request).await?;
		}

		tracing::info!(
			collection = %self.collection,
			spaces = self.spaces.len(),
			"Catalog collection created."
		);

		Ok(())
	}

	/// Drops the collection and creates it again, empty.
	pub async fn recreate(&self) -> Result<()> {
		if self.client.collection_exists(&self.collection).await? {
			self.client.delete_collection(self.collection.clone()).await?;
		}

		self.ensure_collection().await
	}

	pub async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>> {
		let request = ScrollPointsBuilder::new(self.collection.clone())
			.filter(Filter::must([Condition::matches("product_id", product_id)]))
			.limit(1)
			.with_payload(true)
			.with_vectors(false);
		let response = self.client.scroll(request).await?;

		Ok(response.result.first().and_then(|point| product_from_payload(&point.payload)))
	}

	pub async fn scroll_page(&self, cursor: Option<Uuid>, page_size: u32) -> Result<IndexPage> {
		let mut request = ScrollPointsBuilder::new(self.collection.clone())
			.limit(page_size)
			.with_payload(true)
			.with_vectors(false);

		if let Some(cursor) = cursor {
			request = request.offset(PointId::from(cursor.to_string()));
		}

		let response = self.client.scroll(request).await?;
		let points = response
			.result
			.iter()
			.map(|point| StoredPoint {
				point_id: point.id.as_ref().and_then(point_id_to_uuid),
				product_id: point.payload.get("product_id").and_then(payload_i64),
			})
			.collect();
		let next_cursor = response.next_page_offset.as_ref().and_then(point_id_to_uuid);

		Ok(IndexPage { points, next_cursor })
	}

	/// Writes every vector and property of `product`. `vectors` maps space names to vectors.
	pub async fn upsert_product(
		&self,
		product: &Product,
		vectors: &HashMap<String, Vec<f32>>,
	) -> Result<()> {
		let mut vector_map = HashMap::with_capacity(vectors.len() + 1);

		for space in &self.spaces {
			let Some(vector) = vectors.get(&space.name) else {
				return Err(Error::InvalidArgument(format!(
					"Missing {} vector for product {}.",
					space.name, product.product_id
				)));
			};

			vector_map.insert(space.name.clone(), Vector::from(vector.clone()));
		}

		vector_map.insert(
			BM25_VECTOR_NAME.to_string(),
			Vector::from(Document::new(product.canonical_text(), BM25_MODEL)),
		);

		let point =
			PointStruct::new(product.point_id().to_string(), vector_map, product_payload(product));

		self.client
			.upsert_points(
				UpsertPointsBuilder::new(self.collection.clone(), vec![point]).wait(true),
			)
			.await?;

		Ok(())
	}

	/// Rewrites price, stock and origin in place. Vectors are untouched.
	pub async fn update_scalars(&self, product: &Product) -> Result<()> {
		let mut payload = Payload::new();

		payload.insert("price", Value::from(product.price));
		payload.insert("stock", Value::from(product.stock));
		payload.insert("origin", Value::from(product.origin.as_str().to_string()));

		let request = SetPayloadPointsBuilder::new(self.collection.clone(), payload)
			.points_selector(PointsIdsList {
				ids: vec![PointId::from(product.point_id().to_string())],
			})
			.wait(true);

		self.client.set_payload(request).await?;

		Ok(())
	}

	pub async fn delete_point(&self, point_id: Uuid) -> Result<()> {
		let request = DeletePointsBuilder::new(self.collection.clone())
			.points(PointsIdsList { ids: vec![PointId::from(point_id.to_string())] })
			.wait(true);

		self.client.delete_points(request).await?;

		Ok(())
	}

	pub async fn hybrid_search(&self, query: &HybridQuery<'_>) -> Result<Vec<ScoredProduct>> {
		let limit = u64::from(query.limit);
		let filter = build_filter(query.filters);
		let mut dense_prefetch = PrefetchQueryBuilder::default()
			.query(Query::new_nearest(query.vector.to_vec()))
			.using(query.space)
			.limit(limit);
		let mut bm25_prefetch = PrefetchQueryBuilder::default()
			.query(Query::new_nearest(Document::new(lexical_text(query), BM25_MODEL)))
			.using(BM25_VECTOR_NAME)
			.limit(limit);

		if let Some(filter) = filter {
			dense_prefetch = dense_prefetch.filter(filter.clone());
			bm25_prefetch = bm25_prefetch.filter(filter);
		}

		let search = QueryPointsBuilder::new(self.collection.clone())
			.add_prefetch(dense_prefetch)
			.add_prefetch(bm25_prefetch)
			.with_payload(true)
			.query(self.fusion)
			.limit(limit);
		let response = self.client.query(search).await?;
		let mut hits = Vec::with_capacity(response.result.len());

		for point in response.result {
			let Some(product) = product_from_payload(&point.payload) else {
				tracing::warn!(
					collection = %self.collection,
					"Skipping hit with unreadable payload."
				);

				continue;
			};

			hits.push(ScoredProduct { product, score: point.score });
		}

		Ok(hits)
	}

	pub async fn count(&self) -> Result<u64> {
		let response =
			self.client.count(CountPointsBuilder::new(self.collection.clone()).exact(true)).await?;

		Ok(response.result.map(|result| result.count).unwrap_or(0))
	}
}

/// Server-side filter: origin as an exact keyword, category as a full-text match.
pub fn build_filter(filters: &QueryFilters) -> Option<Filter> {
	let mut must = Vec::new();

	if let Some(origin) = filters.origin {
		must.push(Condition::matches("origin", origin.as_str().to_string()));
	}
	if let Some(category) = filters.category() {
		must.push(Condition::matches_text("category", category));
	}

	if must.is_empty() { None } else { Some(Filter::must(must)) }
}

/// Query text plus normalized keywords, fed to the BM25 prefetch.
pub fn lexical_text(query: &HybridQuery<'_>) -> String {
	let keywords = query.filters.normalized_keywords();

	if keywords.is_empty() {
		return query.text.to_string();
	}

	format!("{} {}", query.text, keywords.join(" "))
}

pub fn product_payload(product: &Product) -> Payload {
	Payload::from(payload_map(product))
}

pub fn product_from_payload(payload: &HashMap<String, Value>) -> Option<Product> {
	let product_id = payload.get("product_id").and_then(payload_i64)?;
	let name = payload.get("name").and_then(payload_string)?;
	let origin = payload
		.get("origin")
		.and_then(payload_string)
		.and_then(|raw| Origin::parse(&raw))
		.unwrap_or_default();

	Some(Product {
		product_id,
		name,
		description: payload.get("description").and_then(payload_string).unwrap_or_default(),
		category: payload.get("category").and_then(payload_string).unwrap_or_default(),
		tags: payload.get("tags").map(payload_strings).unwrap_or_default(),
		price: payload.get("price").and_then(payload_f64).unwrap_or_default(),
		stock: payload.get("stock").and_then(payload_i64).unwrap_or_default(),
		origin,
	})
}

fn payload_map(product: &Product) -> HashMap<String, Value> {
	let mut map = HashMap::new();

	map.insert("product_id".to_string(), Value::from(product.product_id));
	map.insert("name".to_string(), Value::from(product.name.clone()));
	map.insert("description".to_string(), Value::from(product.description.clone()));
	map.insert("category".to_string(), Value::from(product.category.clone()));
	map.insert("tags".to_string(), Value::from(JsonValue::from(product.tags.clone())));
	map.insert("price".to_string(), Value::from(product.price));
	map.insert("stock".to_string(), Value::from(product.stock));
	map.insert("origin".to_string(), Value::from(product.origin.as_str().to_string()));

	map
}

fn point_id_to_uuid(point_id: &PointId) -> Option<Uuid> {
	match point_id.point_id_options.as_ref() {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}

fn payload_string(value: &Value) -> Option<String> {
	match value.kind.as_ref() {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

fn payload_i64(value: &Value) -> Option<i64> {
	match value.kind.as_ref() {
		Some(Kind::IntegerValue(value)) => Some(*value),
		Some(Kind::DoubleValue(value)) if value.fract() == 0.0 => Some(*value as i64),
		Some(Kind::StringValue(text)) => text.trim().parse().ok(),
		_ => None,
	}
}

fn payload_f64(value: &Value) -> Option<f64> {
	match value.kind.as_ref() {
		Some(Kind::DoubleValue(value)) => Some(*value),
		Some(Kind::IntegerValue(value)) => Some(*value as f64),
		_ => None,
	}
}

fn payload_strings(value: &Value) -> Vec<String> {
	match value.kind.as_ref() {
		Some(Kind::ListValue(list)) => list.values.iter().filter_map(payload_string).collect(),
		Some(Kind::StringValue(text)) => sq_domain::split_tags(text),
		_ => Vec::new(),
	}
}

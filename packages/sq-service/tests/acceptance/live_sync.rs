use sqlx::PgPool;

use sq_service::{Backends, Providers, SmartQuoteService, SyncReport};
use sq_testkit::{ScriptedJudge, SpyEmbedding, StaticDecomposer, TestDatabase};

async fn insert_product(pool: &PgPool, product_id: i64, name: &str, price: f64) {
	sqlx::query(
		"\
INSERT INTO products (product_id, name, description, category, tags, price, stock, origin)
VALUES ($1, $2, $3, 'Furniture', 'office,furniture', $4, 5, 'local')",
	)
	.bind(product_id)
	.bind(name)
	.bind(format!("{name} for the office"))
	.bind(price)
	.execute(pool)
	.await
	.expect("Failed to insert product.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set SQ_PG_DSN and SQ_QDRANT_URL to run."]
async fn sync_mirrors_the_products_table() {
	let Some(base_dsn) = sq_testkit::env_dsn() else {
		eprintln!("Skipping sync_mirrors_the_products_table; set SQ_PG_DSN to run this test.");

		return;
	};
	let Some(qdrant_url) = sq_testkit::env_qdrant_url() else {
		eprintln!("Skipping sync_mirrors_the_products_table; set SQ_QDRANT_URL to run this test.");

		return;
	};
	let mut test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let mut cfg = sq_testkit::test_config();

	cfg.storage.postgres.dsn = test_db.dsn().to_string();
	cfg.storage.qdrant.url = qdrant_url;
	cfg.storage.qdrant.collection = test_db.collection_name("sq_acceptance");

	let backends = Backends::connect(&cfg).await.expect("Failed to connect backends.");
	let embedding = SpyEmbedding::new();
	let providers = Providers::new(
		embedding.clone(),
		ScriptedJudge::new(),
		StaticDecomposer::new(serde_json::json!({})),
	);
	let service = SmartQuoteService::with_providers(cfg, backends, providers);
	let pool = PgPool::connect(test_db.dsn()).await.expect("Failed to connect to test database.");

	insert_product(&pool, 1, "Desk", 120.0).await;
	insert_product(&pool, 2, "Chair", 45.5).await;

	let first = service.sync_catalog().await.expect("First sync failed.");

	assert_eq!(first, SyncReport { inserted: 2, updated: 0, removed: 0, failed: 0 });
	assert_eq!(embedding.calls(), 4);

	let second = service.sync_catalog().await.expect("Second sync failed.");

	assert_eq!(second, SyncReport::default());

	sqlx::query("UPDATE products SET price = 99.0 WHERE product_id = 1")
		.execute(&pool)
		.await
		.expect("Failed to reprice product.");
	sqlx::query("DELETE FROM products WHERE product_id = 2")
		.execute(&pool)
		.await
		.expect("Failed to delete product.");

	let third = service.sync_catalog().await.expect("Third sync failed.");

	assert_eq!(third, SyncReport { inserted: 0, updated: 1, removed: 1, failed: 0 });
	assert_eq!(embedding.calls(), 4);

	let status = service.catalog_status().await.expect("Status failed.");

	assert_eq!((status.source_count, status.index_count, status.in_sync), (1, 1, true));

	pool.close().await;
	drop(service);
	test_db.cleanup().await.expect("Failed to clean up test database.");
}

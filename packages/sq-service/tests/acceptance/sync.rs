use std::sync::atomic::Ordering;

use serde_json::json;
use uuid::Uuid;

use sq_domain::{Origin, derive_point_id};
use sq_service::{Providers, StoredPoint, SyncReport};

use super::{PRIMARY_SPACE, SECONDARY_SPACE, product};

fn report(inserted: usize, updated: usize, removed: usize, failed: usize) -> SyncReport {
	SyncReport { inserted, updated, removed, failed }
}

#[tokio::test]
async fn empty_snapshot_leaves_the_index_alone() {
	let h = super::harness(Vec::new(), json!({}));

	h.index.seed(product(1, "Desk", "Furniture"));
	h.index.seed(product(2, "Chair", "Furniture"));

	let result = h.service.sync_catalog().await.expect("Sync failed.");

	assert_eq!(result, SyncReport::default());
	assert_eq!(h.index.deletes.load(Ordering::SeqCst), 0);
	assert_eq!(h.index.len(), 2);
}

#[tokio::test]
async fn new_product_is_embedded_once_per_space() {
	let h = super::harness(vec![product(1, "Desk", "Furniture")], json!({}));
	let result = h.service.sync_catalog().await.expect("Sync failed.");

	assert_eq!(result, report(1, 0, 0, 0));
	assert_eq!(h.embedding.calls(), 2);
	assert_eq!(h.embedding.calls_for(PRIMARY_SPACE), 1);
	assert_eq!(h.embedding.calls_for(SECONDARY_SPACE), 1);

	let vectors = h.index.stored_vectors(1).expect("Vectors must be stored.");

	assert_eq!(vectors.len(), 2);
	assert_eq!(vectors[PRIMARY_SPACE].len(), sq_testkit::VECTOR_DIM as usize);
	assert_eq!(h.index.stored(1).map(|stored| stored.point_id()), Some(derive_point_id(1)));
}

#[tokio::test]
async fn repeated_sync_does_no_work() {
	let h = super::harness(
		vec![product(1, "Desk", "Furniture"), product(2, "Chair", "Furniture")],
		json!({}),
	);

	h.service.sync_catalog().await.expect("First sync failed.");

	let embeddings = h.embedding.calls();
	let lookups = h.index.lookups.load(Ordering::SeqCst);
	let writes = h.index.writes();
	let second = h.service.sync_catalog().await.expect("Second sync failed.");

	assert_eq!(second, SyncReport::default());
	assert_eq!(h.embedding.calls(), embeddings);
	assert_eq!(h.index.writes(), writes);
	// Unchanged products are answered from memory.
	assert_eq!(h.index.lookups.load(Ordering::SeqCst), lookups);
}

#[tokio::test]
async fn fresh_service_recognizes_already_indexed_products() {
	let h = super::harness(vec![product(1, "Desk", "Furniture")], json!({}));

	h.service.sync_catalog().await.expect("First sync failed.");

	let embeddings = h.embedding.calls();
	let restarted = sq_testkit::memory_service(
		sq_testkit::test_config(),
		h.index.clone(),
		h.catalog.clone(),
		h.quotations.clone(),
		Providers::new(h.embedding.clone(), h.judge.clone(), h.decomposer.clone()),
	);
	let result = restarted.sync_catalog().await.expect("Second sync failed.");

	assert_eq!(result, SyncReport::default());
	assert_eq!(h.embedding.calls(), embeddings);
}

#[tokio::test]
async fn price_change_updates_scalars_without_embedding() {
	let h = super::harness(vec![product(1, "Desk", "Furniture")], json!({}));

	h.service.sync_catalog().await.expect("First sync failed.");

	let embeddings = h.embedding.calls();
	let mut repriced = product(1, "Desk", "Furniture");

	repriced.price = 250.0;
	repriced.origin = Origin::External;
	h.catalog.replace(vec![repriced]);

	let result = h.service.sync_catalog().await.expect("Second sync failed.");

	assert_eq!(result, report(0, 1, 0, 0));
	assert_eq!(h.embedding.calls(), embeddings);
	assert_eq!(h.index.scalar_updates.load(Ordering::SeqCst), 1);
	assert_eq!(h.index.full_updates.load(Ordering::SeqCst), 0);

	let stored = h.index.stored(1).expect("Product must stay indexed.");

	assert_eq!(stored.price, 250.0);
	assert_eq!(stored.origin, Origin::External);
}

#[tokio::test]
async fn text_change_reembeds_every_space() {
	let h = super::harness(vec![product(1, "Desk", "Furniture")], json!({}));

	h.service.sync_catalog().await.expect("First sync failed.");

	let embeddings = h.embedding.calls();
	let mut renamed = product(1, "Oak desk", "Furniture");

	renamed.description = "Solid oak writing desk".to_string();
	h.catalog.replace(vec![renamed]);

	let result = h.service.sync_catalog().await.expect("Second sync failed.");

	assert_eq!(result, report(0, 1, 0, 0));
	assert_eq!(h.embedding.calls(), embeddings + 2);
	assert_eq!(h.index.full_updates.load(Ordering::SeqCst), 1);
	assert_eq!(h.index.stored(1).map(|stored| stored.name), Some("Oak desk".to_string()));
}

#[tokio::test]
async fn orphans_are_removed_across_pages() {
	let h = super::harness(vec![product(1, "Desk", "Furniture")], json!({}));
	let stray = Uuid::new_v4();

	for (product_id, name) in [(1, "Desk"), (2, "Chair"), (3, "Lamp"), (4, "Shelf")] {
		h.index.seed(product(product_id, name, "Furniture"));
	}

	h.index.seed_foreign(StoredPoint { point_id: Some(stray), product_id: None });

	let result = h.service.sync_catalog().await.expect("Sync failed.");

	assert_eq!(result, report(0, 0, 4, 0));
	assert_eq!(h.index.len(), 1);
	assert!(h.index.stored(1).is_some());
	assert_eq!(h.embedding.calls(), 0);
}

#[tokio::test]
async fn orphan_without_a_point_id_is_deleted_by_its_derived_id() {
	let h = super::harness(vec![product(1, "Desk", "Furniture")], json!({}));
	let stray = Uuid::new_v4();

	h.index.seed(product(1, "Desk", "Furniture"));
	h.index.seed(product(2, "Chair", "Furniture"));
	// First point of the second page.
	h.index.seed_foreign(StoredPoint { point_id: None, product_id: Some(9) });
	h.index.seed_foreign(StoredPoint { point_id: Some(stray), product_id: None });
	h.index.seed_foreign(StoredPoint { point_id: None, product_id: None });

	let result = h.service.sync_catalog().await.expect("Sync failed.");
	let deleted = h.index.deleted();

	// The point with neither id cannot be addressed.
	assert_eq!(result, report(0, 0, 3, 1));
	assert!(deleted.contains(&derive_point_id(9)));
	assert!(deleted.contains(&stray));
	assert!(deleted.contains(&derive_point_id(2)));
	assert!(!deleted.contains(&derive_point_id(1)));
	assert_eq!(h.index.len(), 2);
}

#[tokio::test]
async fn failed_orphan_delete_is_counted() {
	let h = super::harness(vec![product(1, "Desk", "Furniture")], json!({}));

	h.index.seed(product(1, "Desk", "Furniture"));
	h.index.seed(product(2, "Chair", "Furniture"));
	h.index.seed(product(3, "Lamp", "Furniture"));
	h.index.fail_delete(derive_point_id(3));

	let result = h.service.sync_catalog().await.expect("Sync failed.");

	assert_eq!(result, report(0, 0, 1, 1));
	assert!(h.index.stored(3).is_some());
	assert!(h.index.stored(2).is_none());
}

#[tokio::test]
async fn keyless_snapshot_skips_orphan_removal() {
	let h = super::harness(vec![product(0, "Unnumbered desk", "Furniture")], json!({}));

	h.index.seed(product(7, "Chair", "Furniture"));

	let result = h.service.sync_catalog().await.expect("Sync failed.");

	assert_eq!(result, SyncReport::default());
	assert!(h.index.stored(7).is_some());
	assert_eq!(h.embedding.calls(), 0);
}

#[tokio::test]
async fn transient_embedding_failures_are_retried() {
	let h = super::harness(vec![product(1, "Desk", "Furniture")], json!({}));

	h.embedding.fail_transiently(2);

	let result = h.service.sync_catalog().await.expect("Sync failed.");

	assert_eq!(result, report(1, 0, 0, 0));
	// Two failed attempts and one success in the first space, one call in the second.
	assert_eq!(h.embedding.calls(), 4);
}

#[tokio::test]
async fn exhausted_retries_count_the_product_as_failed() {
	let h = super::harness(
		vec![product(1, "Desk", "Furniture"), product(2, "Chair", "Furniture")],
		json!({}),
	);

	h.embedding.fail_transiently(3);

	let result = h.service.sync_catalog().await.expect("Sync failed.");

	assert_eq!(result, report(1, 0, 0, 1));
	assert!(h.index.stored(1).is_none());
	assert!(h.index.stored(2).is_some());

	// The failed product is retried on the next pass.
	let retry = h.service.sync_catalog().await.expect("Second sync failed.");

	assert_eq!(retry, report(1, 0, 0, 0));
}

#[tokio::test]
async fn permanent_embedding_failure_is_not_retried() {
	let h = super::harness(vec![product(1, "Desk", "Furniture")], json!({}));

	h.embedding.fail_space(PRIMARY_SPACE);

	let result = h.service.sync_catalog().await.expect("Sync failed.");

	assert_eq!(result, report(0, 0, 0, 1));
	assert_eq!(h.embedding.calls_for(PRIMARY_SPACE), 1);
	assert_eq!(h.index.writes(), 0);
}

#[tokio::test]
async fn failed_existence_check_indexes_the_product_as_new() {
	let h = super::harness(vec![product(1, "Desk", "Furniture")], json!({}));

	h.index.fail_lookups();

	let result = h.service.sync_catalog().await.expect("Sync failed.");

	assert_eq!(result, report(1, 0, 0, 0));
	assert_eq!(h.index.inserts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_source_of_record_fails_the_sync() {
	let h = super::harness(vec![product(1, "Desk", "Furniture")], json!({}));

	h.catalog.fail();

	let result = h.service.sync_catalog().await;

	assert!(matches!(result, Err(sq_service::Error::Storage { .. })));
	assert_eq!(h.index.writes(), 0);
}

#[tokio::test]
async fn purge_empties_the_index_and_forgets_known_products() {
	let h = super::harness(
		vec![product(1, "Desk", "Furniture"), product(2, "Chair", "Furniture")],
		json!({}),
	);

	h.service.sync_catalog().await.expect("Sync failed.");
	h.index.seed(product(3, "Lamp", "Lighting"));

	let removed = h.service.purge_index().await.expect("Purge failed.");

	assert_eq!(removed, 3);
	assert!(h.index.is_empty());

	let result = h.service.sync_catalog().await.expect("Resync failed.");

	assert_eq!(result, report(2, 0, 0, 0));
}

#[tokio::test]
async fn rebuild_recreates_then_reindexes() {
	let h = super::harness(vec![product(1, "Desk", "Furniture")], json!({}));

	h.service.sync_catalog().await.expect("Sync failed.");

	let result = h.service.rebuild_index().await.expect("Rebuild failed.");

	assert_eq!(result, report(1, 0, 0, 0));
	assert_eq!(h.index.recreates.load(Ordering::SeqCst), 1);
	assert_eq!(h.embedding.calls(), 4);
}

#[tokio::test]
async fn status_compares_source_and_index_counts() {
	let h = super::harness(
		vec![product(1, "Desk", "Furniture"), product(2, "Chair", "Furniture")],
		json!({}),
	);
	let before = h.service.catalog_status().await.expect("Status failed.");

	assert_eq!((before.source_count, before.index_count, before.in_sync), (2, 0, false));

	h.service.sync_catalog().await.expect("Sync failed.");

	let after = h.service.catalog_status().await.expect("Status failed.");

	assert!(after.in_sync);
}

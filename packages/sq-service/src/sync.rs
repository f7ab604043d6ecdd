use std::collections::{HashMap, HashSet};

use serde::Serialize;

use sq_domain::{Product, ProductChange, derive_point_id};

use crate::{
	Result, SmartQuoteService,
	retry::{self, RetryPolicy},
};

/// Counters from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
	pub inserted: usize,
	pub updated: usize,
	pub removed: usize,
	pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogStatus {
	pub source_count: u64,
	pub index_count: u64,
	pub in_sync: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpsertOutcome {
	Inserted,
	Updated,
	Unchanged,
}

impl SmartQuoteService {
	/// Pulls a fresh snapshot from the source of record and reconciles the index against it.
	pub async fn sync_catalog(&self) -> Result<SyncReport> {
		let snapshot = self.backends.catalog.snapshot().await?;

		Ok(self.reconcile(&snapshot).await)
	}

	/// Makes the index mirror `snapshot`: orphans removed, new items inserted, changed items
	/// updated. Per-item failures are counted, never propagated.
	pub async fn reconcile(&self, snapshot: &[Product]) -> SyncReport {
		let mut report = SyncReport::default();

		if snapshot.is_empty() {
			tracing::warn!("Catalog snapshot is empty. Skipping sync to avoid wiping the index.");

			return report;
		}

		let valid_ids = snapshot
			.iter()
			.filter(|product| product.has_natural_key())
			.map(|product| product.product_id)
			.collect::<HashSet<_>>();

		if valid_ids.is_empty() {
			tracing::warn!(
				products = snapshot.len(),
				"No snapshot item carries a natural key. Skipping orphan removal."
			);
		} else {
			let (removed, failed) = self.remove_orphans(&valid_ids).await;

			report.removed = removed;
			report.failed += failed;
		}

		let policy = RetryPolicy::from_config(&self.cfg.sync);

		for product in snapshot {
			if !product.has_natural_key() {
				tracing::warn!(name = %product.name, "Skipping product without a natural key.");

				continue;
			}

			match self.upsert(product, policy).await {
				Ok(UpsertOutcome::Inserted) => report.inserted += 1,
				Ok(UpsertOutcome::Updated) => report.updated += 1,
				Ok(UpsertOutcome::Unchanged) => {},
				Err(err) => {
					tracing::error!(
						error = %err,
						product_id = product.product_id,
						name = %product.name,
						"Failed to index product."
					);

					report.failed += 1;
				},
			}
		}

		if report.inserted > 0 || report.updated > 0 || report.removed > 0 || report.failed > 0 {
			tracing::info!(
				inserted = report.inserted,
				updated = report.updated,
				removed = report.removed,
				failed = report.failed,
				"Catalog synchronized."
			);
		}

		report
	}

	/// Deletes every indexed point whose product id is not in `valid_ids`.
	///
	/// Returns `(removed, failed)`. A scan error ends the pass early with what was done so far.
	pub async fn remove_orphans(&self, valid_ids: &HashSet<i64>) -> (usize, usize) {
		let page_size = self.cfg.sync.page_size.max(1);
		let mut removed = 0;
		let mut failed = 0;
		let mut cursor = None;

		loop {
			let page = match self.backends.index.scroll(cursor, page_size).await {
				Ok(page) => page,
				Err(err) => {
					tracing::warn!(error = %err, "Index scan failed during orphan removal.");

					break;
				},
			};

			for point in &page.points {
				if point.product_id.is_some_and(|id| valid_ids.contains(&id)) {
					continue;
				}

				let fallback = point.product_id.map(derive_point_id);
				let Some(point_id) = point.point_id.or(fallback) else {
					failed += 1;

					continue;
				};

				match self.backends.index.delete(point_id).await {
					Ok(()) => {
						removed += 1;

						if let Some(product_id) = point.product_id {
							self.known_products().remove(&product_id);
						}
					},
					Err(err) => {
						tracing::warn!(
							error = %err,
							point_id = %point_id,
							product_id = ?point.product_id,
							"Failed to delete orphan point."
						);

						failed += 1;
					},
				}
			}

			match page.next_cursor {
				Some(next) if Some(next) != cursor => cursor = Some(next),
				_ => break,
			}
		}

		if removed > 0 {
			tracing::info!(removed, failed, "Orphan points removed.");
		}

		(removed, failed)
	}

	async fn upsert(&self, product: &Product, policy: RetryPolicy) -> Result<UpsertOutcome> {
		if self.known_products().get(&product.product_id) == Some(product) {
			return Ok(UpsertOutcome::Unchanged);
		}

		let stored = match self.backends.index.fetch_by_product_id(product.product_id).await {
			Ok(stored) => stored,
			Err(err) => {
				tracing::warn!(
					error = %err,
					product_id = product.product_id,
					"Existence check failed. Indexing the product as new."
				);

				None
			},
		};
		let outcome = match stored {
			None => {
				let vectors = self.embed_product(product, policy).await?;

				self.backends.index.insert(product, &vectors).await?;

				UpsertOutcome::Inserted
			},
			Some(stored) => match product.change_from(&stored) {
				ProductChange::Unchanged => UpsertOutcome::Unchanged,
				ProductChange::Scalars => {
					self.backends.index.update_scalars(product).await?;

					UpsertOutcome::Updated
				},
				ProductChange::Text => {
					let vectors = self.embed_product(product, policy).await?;

					self.backends.index.update_full(product, &vectors).await?;

					UpsertOutcome::Updated
				},
			},
		};

		self.known_products().insert(product.product_id, product.clone());

		Ok(outcome)
	}

	/// Embeds the canonical text of `product` in every configured space.
	pub async fn embed_product(
		&self,
		product: &Product,
		policy: RetryPolicy,
	) -> Result<HashMap<String, Vec<f32>>> {
		let cfg = &self.cfg.providers.embedding;
		let texts = [product.canonical_text()];
		let mut vectors = HashMap::with_capacity(cfg.spaces.len());

		for space in &cfg.spaces {
			let mut embedded = retry::embed_with_retry(
				self.providers.embedding.as_ref(),
				cfg,
				space,
				&texts,
				policy,
			)
			.await?;

			if embedded.len() != 1 {
				return Err(crate::Error::Provider {
					message: format!(
						"Embedding space {} returned {} vectors for one text.",
						space.name,
						embedded.len()
					),
				});
			}

			vectors.insert(space.name.clone(), embedded.swap_remove(0));
		}

		Ok(vectors)
	}

	/// Deletes every indexed product. Returns how many points were removed.
	pub async fn purge_index(&self) -> Result<u64> {
		let removed = self.backends.index.purge_all(self.cfg.sync.page_size.max(1)).await?;

		self.known_products().clear();
		tracing::info!(removed, "Index purged.");

		Ok(removed)
	}

	/// Drops and recreates the collection, then indexes the whole source of record.
	pub async fn rebuild_index(&self) -> Result<SyncReport> {
		self.backends.index.recreate().await?;
		self.known_products().clear();
		tracing::info!("Index recreated. Reindexing the catalog.");

		self.sync_catalog().await
	}

	pub async fn catalog_status(&self) -> Result<CatalogStatus> {
		let source_count = self.backends.catalog.count().await?;
		let index_count = self.backends.index.count().await?;

		Ok(CatalogStatus { source_count, index_count, in_sync: source_count == index_count })
	}
}

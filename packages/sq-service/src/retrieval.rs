use std::collections::HashMap;

use sq_config::EmbeddingSpace;
use sq_domain::{Candidate, QuerySpec};
use sq_storage::qdrant::HybridQuery;

use crate::{SmartQuoteService, cmp_f32_desc};

impl SmartQuoteService {
	/// Runs one query against every active space and merges the hits.
	///
	/// A space whose embedding or search fails is skipped. When every space fails the result is
	/// empty, which callers treat like a query with no matches.
	pub async fn retrieve(
		&self,
		query: &QuerySpec,
		spaces: &[&EmbeddingSpace],
		limit: u32,
	) -> Vec<Candidate> {
		let mut hits = Vec::new();
		let texts = [query.query_text.clone()];

		for space in spaces {
			let vector = match self
				.providers
				.embedding
				.embed(&self.cfg.providers.embedding, space, &texts)
				.await
			{
				Ok(mut vectors) if !vectors.is_empty() => vectors.swap_remove(0),
				Ok(_) => {
					tracing::warn!(
						query_id = %query.id,
						space = %space.name,
						"Embedding provider returned no vector. Skipping space."
					);

					continue;
				},
				Err(err) => {
					tracing::warn!(
						error = %err,
						query_id = %query.id,
						space = %space.name,
						"Query embedding failed. Skipping space."
					);

					continue;
				},
			};
			let search = HybridQuery {
				space: space.name.as_str(),
				vector: &vector,
				text: query.query_text.as_str(),
				filters: &query.filters,
				limit,
			};

			match self.backends.index.hybrid_search(search).await {
				Ok(results) => {
					tracing::debug!(
						query_id = %query.id,
						space = %space.name,
						hits = results.len(),
						"Space search finished."
					);

					hits.extend(
						results
							.into_iter()
							.map(|hit| Candidate::from_product(hit.product, hit.score)),
					);
				},
				Err(err) => {
					tracing::warn!(
						error = %err,
						query_id = %query.id,
						space = %space.name,
						"Hybrid search failed. Skipping space."
					);
				},
			}
		}

		dedupe_candidates(hits)
	}
}

/// Collapses hits sharing `(name, category)`, keeping the best score, then sorts by score.
///
/// Equal scores keep the first-seen hit, and the final sort is stable, so space order breaks ties.
pub fn dedupe_candidates(hits: Vec<Candidate>) -> Vec<Candidate> {
	let mut positions: HashMap<(String, String), usize> = HashMap::new();
	let mut out: Vec<Candidate> = Vec::with_capacity(hits.len());

	for hit in hits {
		let key = (hit.name.clone(), hit.category.clone());

		match positions.get(&key) {
			Some(&position) =>
				if hit.score > out[position].score {
					out[position] = hit;
				},
			None => {
				positions.insert(key, out.len());
				out.push(hit);
			},
		}
	}

	out.sort_by(|a, b| cmp_f32_desc(a.score, b.score));

	out
}

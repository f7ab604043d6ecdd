use std::collections::BTreeMap;

use serde::Serialize;

use sq_domain::{Origin, Phase, PhaseMetrics, Provenance, QuerySpec, SelectionOutcome};

use crate::{SmartQuoteService, selection::JudgeContext};

/// Outcome of both retrieval phases over a batch of queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhaseRun {
	pub results: BTreeMap<String, SelectionOutcome>,
	/// Query ids still without an accepted candidate, in query order.
	pub unresolved: Vec<String>,
	pub metrics: PhaseMetrics,
}
impl PhaseRun {
	pub fn outcome(&self, query_id: &str) -> Option<&SelectionOutcome> {
		self.results.get(query_id)
	}

	/// Phase that produced the final outcome of `query_id`.
	pub fn final_phase(&self, query_id: &str) -> Phase {
		match self.results.get(query_id).and_then(SelectionOutcome::candidate) {
			Some(candidate) if candidate.provenance == Provenance::Cache => Phase::Cache,
			Some(_) => Phase::Local,
			None if self.metrics.attempted(Phase::Cache, query_id) => Phase::Cache,
			None => Phase::Local,
		}
	}
}

impl SmartQuoteService {
	/// Local catalog first; queries it cannot settle are retried against external products.
	pub async fn run_phases(
		&self,
		queries: &[QuerySpec],
		limit: u32,
		use_multilingual: bool,
	) -> PhaseRun {
		let spaces = self.cfg.active_spaces(use_multilingual);
		let mut run = PhaseRun::default();

		for query in queries {
			let local = query.with_origin(Origin::Local);
			let outcome =
				self.run_query(&local, &spaces, limit, Phase::Local, &mut run.metrics).await;

			if !outcome.is_accepted() {
				run.unresolved.push(query.id.clone());
			}

			run.results.insert(query.id.clone(), outcome);
		}

		if run.unresolved.is_empty() {
			tracing::info!(
				queries = queries.len(),
				"Every query resolved locally. Skipping cache phase."
			);

			return run;
		}

		tracing::info!(
			unresolved = run.unresolved.len(),
			"Searching external products for unresolved queries."
		);

		let pending = run.unresolved.clone();

		for query in queries.iter().filter(|query| pending.contains(&query.id)) {
			let external = query.with_origin(Origin::External);
			let outcome =
				self.run_query(&external, &spaces, limit, Phase::Cache, &mut run.metrics).await;
			let SelectionOutcome::Accepted { mut candidate, index, report } = outcome else {
				continue;
			};

			candidate.provenance = Provenance::Cache;

			run.results
				.insert(query.id.clone(), SelectionOutcome::Accepted { candidate, index, report });
			run.unresolved.retain(|id| id != &query.id);
		}

		run
	}

	async fn run_query(
		&self,
		query: &QuerySpec,
		spaces: &[&sq_config::EmbeddingSpace],
		limit: u32,
		phase: Phase,
		metrics: &mut PhaseMetrics,
	) -> SelectionOutcome {
		let candidates = self.retrieve(query, spaces, limit).await;
		let found = candidates.len();
		let context = JudgeContext {
			query_id: &query.id,
			query_text: &query.query_text,
			filters: &query.filters,
			cost_benefit_hint: query.cost_benefit_hint.as_ref(),
			rigor_hint: query.rigor_hint.as_ref(),
		};
		let outcome = self.choose(context, candidates).await;

		tracing::info!(
			query_id = %query.id,
			phase = phase.as_str(),
			candidates = found,
			status = outcome.status().as_str(),
			"Query judged."
		);
		metrics.record(phase, &query.id, found, &outcome);

		outcome
	}
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::selection::{JudgeReport, OutcomeStatus, SelectionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
	Local,
	Cache,
}
impl Phase {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Local => "local",
			Self::Cache => "cache",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeAnalysis {
	pub status: OutcomeStatus,
	pub report: JudgeReport,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseStats {
	pub queries_run: usize,
	pub queries_resolved: usize,
	/// Deduplicated candidates retrieved before judging, summed over queries.
	pub candidates_found: usize,
	pub query_ids: Vec<String>,
	pub analyses: BTreeMap<String, JudgeAnalysis>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseMetrics {
	pub local: PhaseStats,
	pub cache: PhaseStats,
}
impl PhaseMetrics {
	pub fn phase(&self, phase: Phase) -> &PhaseStats {
		match phase {
			Phase::Local => &self.local,
			Phase::Cache => &self.cache,
		}
	}

	pub fn record(
		&mut self,
		phase: Phase,
		query_id: &str,
		candidates_found: usize,
		outcome: &SelectionOutcome,
	) {
		let stats = match phase {
			Phase::Local => &mut self.local,
			Phase::Cache => &mut self.cache,
		};

		stats.queries_run += 1;
		stats.candidates_found += candidates_found;

		if outcome.is_accepted() {
			stats.queries_resolved += 1;
		}

		stats.query_ids.push(query_id.to_string());
		stats.analyses.insert(
			query_id.to_string(),
			JudgeAnalysis { status: outcome.status(), report: outcome.report().clone() },
		);
	}

	pub fn attempted(&self, phase: Phase, query_id: &str) -> bool {
		self.phase(phase).query_ids.iter().any(|id| id == query_id)
	}

	pub fn analysis(&self, phase: Phase, query_id: &str) -> Option<&JudgeAnalysis> {
		self.phase(phase).analyses.get(query_id)
	}
}

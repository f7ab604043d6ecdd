use serde_json::Value;

use sq_domain::{Candidate, JudgeReport, QueryFilters, SelectionOutcome};
use sq_providers::judge::{JudgeCandidate, JudgeRequest};

use crate::SmartQuoteService;

/// Judge verdict after validation. `index` is `-1` when nothing was picked.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeVerdict {
	pub index: i64,
	pub report: JudgeReport,
}
impl JudgeVerdict {
	pub fn none() -> Self {
		Self { index: -1, report: JudgeReport::default() }
	}

	/// Reads `{ "index": <int>, "report": {...} }`. Any other `index` shape maps to `None`.
	fn parse(raw: Value) -> (Option<i64>, JudgeReport) {
		let Value::Object(mut map) = raw else {
			return (None, JudgeReport::default());
		};
		let index = map.get("index").and_then(Value::as_i64);
		let report = JudgeReport::from_value(map.remove("report").unwrap_or(Value::Null));

		(index, report)
	}
}

/// What one query asks the judge besides the candidates.
#[derive(Debug, Clone, Copy)]
pub struct JudgeContext<'a> {
	pub query_id: &'a str,
	pub query_text: &'a str,
	pub filters: &'a QueryFilters,
	pub cost_benefit_hint: Option<&'a Value>,
	pub rigor_hint: Option<&'a Value>,
}

impl SmartQuoteService {
	/// Asks the judge to pick one candidate. Never fails: judge errors become "no pick".
	pub async fn choose(
		&self,
		context: JudgeContext<'_>,
		candidates: Vec<Candidate>,
	) -> SelectionOutcome {
		if candidates.is_empty() {
			return SelectionOutcome::NoCandidates { report: JudgeReport::default() };
		}

		let request = JudgeRequest {
			query: context.query_text.to_string(),
			filters: serde_json::to_value(context.filters).unwrap_or(Value::Null),
			cost_benefit: context.cost_benefit_hint.cloned(),
			rigor: context.rigor_hint.cloned(),
			candidates: candidates
				.iter()
				.enumerate()
				.map(|(index, candidate)| JudgeCandidate {
					index,
					name: candidate.name.clone(),
					category: candidate.category.clone(),
					price: candidate.price,
					score: candidate.score,
					description: candidate.description.clone(),
				})
				.collect(),
		};
		let raw = match self.providers.judge.judge(&self.cfg.providers.judge, &request).await {
			Ok(raw) => raw,
			Err(err) => {
				tracing::warn!(
					error = %err,
					query_id = %context.query_id,
					candidates = candidates.len(),
					"Judge call failed. Treating the query as unmatched."
				);

				return interpret_verdict(context.query_id, JudgeVerdict::none(), candidates);
			},
		};
		let (index, report) = JudgeVerdict::parse(raw);
		let verdict = match index {
			Some(index) if index == -1 || (0..candidates.len() as i64).contains(&index) =>
				JudgeVerdict { index, report },
			other => {
				tracing::warn!(
					query_id = %context.query_id,
					index = ?other,
					candidates = candidates.len(),
					"Judge returned an invalid index. Treating it as no pick."
				);

				JudgeVerdict { index: -1, report }
			},
		};

		interpret_verdict(context.query_id, verdict, candidates)
	}
}

/// Maps a validated verdict onto the candidate list.
pub fn interpret_verdict(
	query_id: &str,
	verdict: JudgeVerdict,
	mut candidates: Vec<Candidate>,
) -> SelectionOutcome {
	let JudgeVerdict { index, report } = verdict;

	if let Ok(position) = usize::try_from(index)
		&& position < candidates.len()
	{
		let candidate = candidates.swap_remove(position);

		return SelectionOutcome::Accepted { candidate, index: position, report };
	}
	if !candidates.is_empty() && !report.is_empty() {
		return SelectionOutcome::Rejected {
			query_id: query_id.to_string(),
			report,
			rejected_candidates_present: true,
		};
	}

	SelectionOutcome::NoCandidates { report }
}

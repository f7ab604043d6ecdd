use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use sq_domain::{
	Brief, Candidate, Phase, PhaseMetrics, QueryFilters, QueryKind, QuerySpec, SelectionOutcome,
};

use crate::{
	Error, Result, SmartQuoteService,
	phases::PhaseRun,
	quotation::{QuotationInput, QuotationOutcome},
	sync::SyncReport,
};

/// A free-text procurement request plus whatever the caller knows about its origin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcurementRequest {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default, alias = "request_text")]
	pub text: String,
	#[serde(default)]
	pub client: Value,
	#[serde(default)]
	pub source: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessRequest {
	pub request: ProcurementRequest,
	#[serde(default)]
	pub limit: Option<Value>,
	#[serde(default = "default_true")]
	pub use_multilingual: bool,
	/// Falls back to `quotation.enabled` when absent.
	#[serde(default)]
	pub create_quotation: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
	pub query_id: String,
	pub kind: QueryKind,
	pub query_text: String,
	pub phase: Phase,
	#[serde(flatten)]
	pub outcome: SelectionOutcome,
}

/// Follow-up search task for a query the catalog could not satisfy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingItemTask {
	pub id: String,
	pub kind: QueryKind,
	pub name: Option<String>,
	pub category: Option<String>,
	pub cost_benefit: Option<Value>,
	pub keywords: Vec<String>,
	pub quantity: i64,
	pub suggested_query: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResponse {
	pub request_id: Option<String>,
	#[serde(serialize_with = "crate::time_serde::serialize")]
	pub processed_at: OffsetDateTime,
	pub limit: u32,
	pub brief: Value,
	pub queries: Vec<QuerySpec>,
	pub results: Vec<QueryResult>,
	pub unresolved: Vec<String>,
	pub missing: Vec<MissingItemTask>,
	pub metrics: PhaseMetrics,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sync: Option<SyncReport>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub quotation: Option<QuotationOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HybridSearchRequest {
	pub query: String,
	#[serde(default)]
	pub filters: QueryFilters,
	#[serde(default)]
	pub limit: Option<Value>,
	#[serde(default = "default_true")]
	pub use_multilingual: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HybridSearchResponse {
	pub query: String,
	pub limit: u32,
	pub spaces: Vec<String>,
	pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
	pub status: &'static str,
	pub index: bool,
	pub source_of_record: bool,
	pub embedding_configured: bool,
	pub judge_configured: bool,
	pub decomposer_configured: bool,
}

impl SmartQuoteService {
	/// Request text to judged results, follow-up tasks, and optionally a quotation.
	pub async fn process_request(&self, req: ProcessRequest) -> Result<ProcessResponse> {
		let text = req.request.text.trim();

		if text.is_empty() {
			return Err(Error::InvalidRequest {
				message: "request.text must be non-empty.".to_string(),
			});
		}

		let limit = self.cfg.resolve_limit(parse_limit(req.limit.as_ref())?);
		let sync = self.sync_before_search().await;
		let brief_value = self
			.providers
			.decomposer
			.decompose(&self.cfg.providers.decomposer, text)
			.await
			.map_err(|err| Error::Provider { message: format!("Decomposition failed: {err:#}") })?;
		let brief: Brief = serde_json::from_value(brief_value.clone()).map_err(|err| {
			Error::Provider { message: format!("Decomposer returned an unreadable brief: {err}.") }
		})?;
		let queries = self.query_builder.build(&brief);

		tracing::info!(
			request_id = ?req.request.id,
			queries = queries.len(),
			limit,
			"Brief decomposed into queries."
		);

		let run = self.run_phases(&queries, limit, req.use_multilingual).await;
		let missing = missing_item_tasks(&queries, &run);
		let quotation = if req.create_quotation.unwrap_or(self.cfg.quotation.enabled) {
			let input = QuotationInput {
				request_text: text,
				brief: &brief_value,
				client: &req.request.client,
				source: &req.request.source,
				queries: &queries,
				run: &run,
			};

			Some(self.materialize_quotation(input).await)
		} else {
			None
		};
		let results = queries
			.iter()
			.filter_map(|query| {
				let outcome = run.outcome(&query.id)?.clone();

				Some(QueryResult {
					query_id: query.id.clone(),
					kind: query.kind,
					query_text: query.query_text.clone(),
					phase: run.final_phase(&query.id),
					outcome,
				})
			})
			.collect();

		Ok(ProcessResponse {
			request_id: req.request.id,
			processed_at: OffsetDateTime::now_utc(),
			limit,
			brief: brief_value,
			queries,
			results,
			unresolved: run.unresolved.clone(),
			missing,
			metrics: run.metrics,
			sync,
			quotation,
		})
	}

	/// One query against the active spaces, no judging. Results are capped at `limit`.
	pub async fn hybrid_search(&self, req: HybridSearchRequest) -> Result<HybridSearchResponse> {
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		let limit = self.cfg.resolve_limit(parse_limit(req.limit.as_ref())?);
		let spaces = self.cfg.active_spaces(req.use_multilingual);
		let spec = QuerySpec {
			id: "search".to_string(),
			kind: QueryKind::Item,
			query_text: query.to_string(),
			filters: req.filters,
			cost_benefit_hint: None,
			rigor_hint: None,
			quantity: 1,
			source_ref: Default::default(),
		};
		let mut candidates = self.retrieve(&spec, &spaces, limit).await;

		candidates.truncate(limit as usize);

		Ok(HybridSearchResponse {
			query: spec.query_text,
			limit,
			spaces: spaces.iter().map(|space| space.name.clone()).collect(),
			candidates,
		})
	}

	pub async fn health(&self) -> HealthReport {
		let index = match self.backends.index.count().await {
			Ok(_) => true,
			Err(err) => {
				tracing::warn!(error = %err, "Index health check failed.");

				false
			},
		};
		let source_of_record = match self.backends.catalog.count().await {
			Ok(_) => true,
			Err(err) => {
				tracing::warn!(error = %err, "Source of record health check failed.");

				false
			},
		};
		let providers = &self.cfg.providers;

		HealthReport {
			status: if index && source_of_record { "ok" } else { "degraded" },
			index,
			source_of_record,
			embedding_configured: !providers.embedding.api_base.is_empty()
				&& !providers.embedding.spaces.is_empty(),
			judge_configured: !providers.judge.api_base.is_empty(),
			decomposer_configured: !providers.decomposer.api_base.is_empty(),
		}
	}

	async fn sync_before_search(&self) -> Option<SyncReport> {
		if !self.cfg.sync.sync_before_search {
			return None;
		}

		match self.sync_catalog().await {
			Ok(report) => Some(report),
			Err(err) => {
				tracing::warn!(error = %err, "Catalog sync before search failed. Searching anyway.");

				None
			},
		}
	}
}

/// `None` for an absent limit; integers pass through for range checks; anything else is rejected.
pub fn parse_limit(raw: Option<&Value>) -> Result<Option<u32>> {
	let Some(raw) = raw else {
		return Ok(None);
	};

	match raw {
		Value::Null => Ok(None),
		Value::Number(number) =>
			if let Some(value) = number.as_u64() {
				Ok(Some(u32::try_from(value).unwrap_or(u32::MAX)))
			} else if number.as_i64().is_some() {
				Ok(Some(0))
			} else {
				Err(Error::InvalidRequest { message: "limit must be an integer.".to_string() })
			},
		_ => Err(Error::InvalidRequest { message: "limit must be an integer.".to_string() }),
	}
}

/// Follow-up tasks for unresolved item queries, rejected or empty alike.
pub fn missing_item_tasks(queries: &[QuerySpec], run: &PhaseRun) -> Vec<MissingItemTask> {
	queries
		.iter()
		.filter(|query| query.kind == QueryKind::Item && run.unresolved.contains(&query.id))
		.map(|query| MissingItemTask {
			id: query.id.clone(),
			kind: query.kind,
			name: source_name(query).map(str::to_string),
			category: query.filters.category().map(str::to_string),
			cost_benefit: query.cost_benefit_hint.clone(),
			keywords: trimmed_keywords(query),
			quantity: query.effective_quantity(),
			suggested_query: suggested_query(query),
		})
		.collect()
}

/// Search text for sourcing a query elsewhere: name, category and keywords, else the query text.
pub fn suggested_query(query: &QuerySpec) -> Option<String> {
	let keywords = trimmed_keywords(query);
	let base = source_name(query)
		.into_iter()
		.chain(query.filters.category())
		.chain(keywords.iter().map(String::as_str))
		.collect::<Vec<_>>()
		.join(" ");
	let suggested = if base.is_empty() { query.query_text.trim() } else { base.as_str() };

	(!suggested.is_empty()).then(|| suggested.to_string())
}

pub(crate) fn source_name(query: &QuerySpec) -> Option<&str> {
	query.source_ref.name.as_deref().map(str::trim).filter(|name| !name.is_empty())
}

fn trimmed_keywords(query: &QuerySpec) -> Vec<String> {
	query
		.filters
		.keywords
		.iter()
		.map(|keyword| keyword.trim())
		.filter(|keyword| !keyword.is_empty())
		.map(str::to_string)
		.collect()
}

fn default_true() -> bool {
	true
}

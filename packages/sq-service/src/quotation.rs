use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};

use sq_domain::{Phase, QueryKind, QuerySpec, SelectionOutcome};
use sq_storage::models::{
	NewPrompt, NewQuotation, NewQuotationItem, QuotationItem, QuotationStatus,
};

use crate::{
	Result, SmartQuoteService,
	phases::PhaseRun,
	pipeline::{source_name, suggested_query},
};

const MISSING_ITEM_NAME: &str = "Item not found";
const QUOTATION_NOTES: &str = "Main quotation (automatic).";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterializeStatus {
	Created,
	Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotationOutcome {
	pub status: MaterializeStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub prompt_id: Option<i64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub quotation_id: Option<i64>,
	pub items_added: usize,
	pub missing_inserted: usize,
	pub total: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub quotation_status: Option<QuotationStatus>,
}
impl QuotationOutcome {
	fn failed(reason: &str, prompt_id: Option<i64>) -> Self {
		Self {
			status: MaterializeStatus::Error,
			reason: Some(reason.to_string()),
			prompt_id,
			quotation_id: None,
			items_added: 0,
			missing_inserted: 0,
			total: 0.0,
			quotation_status: None,
		}
	}
}

/// Everything the materializer records about the originating request.
#[derive(Debug, Clone, Copy)]
pub struct QuotationInput<'a> {
	pub request_text: &'a str,
	pub brief: &'a Value,
	pub client: &'a Value,
	pub source: &'a Value,
	pub queries: &'a [QuerySpec],
	pub run: &'a PhaseRun,
}

impl SmartQuoteService {
	/// Writes a prompt, a quotation, one line and one report entry per query in scope, then the
	/// totals.
	///
	/// Store failures are reported in the outcome rather than failing the request.
	pub async fn materialize_quotation(&self, input: QuotationInput<'_>) -> QuotationOutcome {
		let store = &self.backends.quotations;
		let prompt = NewPrompt {
			request_text: input.request_text.to_string(),
			brief: input.brief.clone(),
			client: input.client.clone(),
			source: input.source.clone(),
		};
		let prompt_id = match store.create_prompt(&prompt).await {
			Ok(prompt_id) => prompt_id,
			Err(err) => {
				tracing::error!(error = %err, "Failed to create prompt. Skipping quotation.");

				return QuotationOutcome::failed("invalid_prompt", None);
			},
		};
		let quotation = NewQuotation {
			prompt_id,
			notes: QUOTATION_NOTES.to_string(),
			currency: self.cfg.quotation.currency.clone(),
			valid_until: OffsetDateTime::now_utc()
				+ Duration::days(self.cfg.quotation.validity_days),
		};
		let quotation_id = match store.create_quotation(&quotation).await {
			Ok(quotation_id) => quotation_id,
			Err(err) => {
				tracing::error!(error = %err, prompt_id, "Failed to create quotation.");

				return QuotationOutcome::failed("quotation_not_created", Some(prompt_id));
			},
		};
		let mut added = HashSet::new();
		let mut outcome = QuotationOutcome {
			status: MaterializeStatus::Created,
			reason: None,
			prompt_id: Some(prompt_id),
			quotation_id: Some(quotation_id),
			items_added: 0,
			missing_inserted: 0,
			total: 0.0,
			quotation_status: None,
		};

		for query in quotation_scope(input.queries, input.run) {
			let Some(result) = input.run.outcome(&query.id) else {
				continue;
			};
			let item = match result.candidate() {
				Some(candidate) => {
					if added.contains(&candidate.product_id) {
						continue;
					}

					match store.item_exists(quotation_id, candidate.product_id).await {
						Ok(true) => {
							added.insert(candidate.product_id);

							continue;
						},
						Ok(false) => {},
						Err(err) => tracing::warn!(
							error = %err,
							quotation_id,
							product_id = candidate.product_id,
							"Item existence check failed. Relying on the insert conflict guard."
						),
					}

					NewQuotationItem {
						quotation_id,
						query_id: query.id.clone(),
						product_id: Some(candidate.product_id),
						name: candidate.name.clone(),
						description: candidate.description.clone(),
						tags: candidate.tags.clone(),
						price: Some(candidate.price),
						currency: self.cfg.quotation.currency.clone(),
						quantity: query.effective_quantity(),
						origin: candidate.origin.as_str().to_string(),
						available: true,
						request_text: query.query_text.clone(),
						analysis: Some(line_analysis(query, result, input.run)),
					}
				},
				None => self.placeholder_item(quotation_id, query, result, input.run),
			};

			if let Some(analysis) = &item.analysis {
				self.record_analysis(quotation_id, analysis).await;
			}

			match store.insert_item(&item).await {
				Ok(true) => match item.product_id {
					Some(product_id) => {
						added.insert(product_id);
						outcome.items_added += 1;
					},
					None => outcome.missing_inserted += 1,
				},
				Ok(false) => {
					tracing::debug!(quotation_id, query_id = %query.id, "Item already quoted.");
				},
				Err(err) => {
					tracing::warn!(
						error = %err,
						quotation_id,
						query_id = %query.id,
						"Failed to insert quotation item."
					);
				},
			}
		}

		match self.finalize_quotation(quotation_id).await {
			Ok((total, status)) => {
				outcome.total = total;
				outcome.quotation_status = Some(status);
			},
			Err(err) => {
				tracing::error!(error = %err, quotation_id, "Failed to update quotation totals.");

				outcome.status = MaterializeStatus::Error;
				outcome.reason = Some("totals_not_updated".to_string());
			},
		}

		tracing::info!(
			quotation_id,
			items_added = outcome.items_added,
			missing_inserted = outcome.missing_inserted,
			total = outcome.total,
			"Quotation materialized."
		);

		outcome
	}

	fn placeholder_item(
		&self,
		quotation_id: i64,
		query: &QuerySpec,
		result: &SelectionOutcome,
		run: &PhaseRun,
	) -> NewQuotationItem {
		let status = result.status().as_str();
		let phase = run.final_phase(&query.id);
		let origin = match phase {
			Phase::Local => "local",
			Phase::Cache => "external",
		};
		let description = match result {
			SelectionOutcome::Rejected { .. } => "Candidates found but rejected by the judge.",
			_ => "No matching product was found.",
		};
		let name = source_name(query)
			.or_else(|| query.filters.category())
			.unwrap_or(MISSING_ITEM_NAME);

		NewQuotationItem {
			quotation_id,
			query_id: query.id.clone(),
			product_id: None,
			name: name.to_string(),
			description: description.to_string(),
			tags: vec!["missing".to_string(), status.to_string()],
			price: None,
			currency: self.cfg.quotation.currency.clone(),
			quantity: query.effective_quantity(),
			origin: origin.to_string(),
			available: false,
			request_text: suggested_query(query).unwrap_or_default(),
			analysis: Some(line_analysis(query, result, run)),
		}
	}

	async fn record_analysis(&self, quotation_id: i64, analysis: &Value) {
		if let Err(err) = self.backends.quotations.append_report(quotation_id, analysis).await {
			tracing::warn!(
				error = %err,
				quotation_id,
				query_id = ?analysis.get("query_id"),
				"Failed to record quotation report entry."
			);
		}
	}

	async fn finalize_quotation(&self, quotation_id: i64) -> Result<(f64, QuotationStatus)> {
		let items = self.backends.quotations.list_items(quotation_id).await?;
		let (total, status) = quotation_totals(&items);

		self.backends.quotations.update_quotation(quotation_id, total, status).await?;

		Ok((total, status))
	}
}

/// Per-query analysis stored with the line and appended to the quotation report.
///
/// Accepted picks keep the judge report that chose them. Unresolved queries also keep both
/// phase analyses.
pub fn line_analysis(query: &QuerySpec, result: &SelectionOutcome, run: &PhaseRun) -> Value {
	let phase = run.final_phase(&query.id);

	match result.candidate() {
		Some(candidate) => json!({
			"query_id": query.id,
			"status": result.status().as_str(),
			"phase": phase.as_str(),
			"product_id": candidate.product_id,
			"score": candidate.score,
			"report": result.report().to_value(),
		}),
		None => json!({
			"query_id": query.id,
			"status": result.status().as_str(),
			"phase": phase.as_str(),
			"score": 0.0,
			"report": result.report().to_value(),
			"local": run.metrics.analysis(Phase::Local, &query.id),
			"cache": run.metrics.analysis(Phase::Cache, &query.id),
		}),
	}
}

/// Queries that get a quotation line: everything when the root query surfaced candidates, else
/// items only.
///
/// A root rejected by the judge still counts. A root with no candidates does not.
pub fn quotation_scope<'a>(queries: &'a [QuerySpec], run: &PhaseRun) -> Vec<&'a QuerySpec> {
	let root_present = queries.iter().any(|query| {
		query.kind == QueryKind::Root
			&& run
				.outcome(&query.id)
				.is_some_and(|outcome| !matches!(outcome, SelectionOutcome::NoCandidates { .. }))
	});

	queries.iter().filter(|query| root_present || query.kind == QueryKind::Item).collect()
}

/// Sum of `price × quantity`; incomplete while any line is a placeholder.
pub fn quotation_totals(items: &[QuotationItem]) -> (f64, QuotationStatus) {
	let total =
		items.iter().map(|item| item.price.unwrap_or_default() * item.quantity as f64).sum::<f64>();
	let status = if items.iter().any(|item| item.product_id.is_none() || !item.available) {
		QuotationStatus::Incomplete
	} else {
		QuotationStatus::Complete
	};

	(total, status)
}

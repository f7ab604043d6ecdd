use serde_json::{Map, Value};

use sq_domain::{Brief, QueryFilters, QueryKind, QuerySpec, SourceRef};

pub const ROOT_QUERY_ID: &str = "Q0";

/// Turns a brief into the queries that get searched. Must be deterministic.
pub trait QueryBuilder
where
	Self: Send + Sync,
{
	fn build(&self, brief: &Brief) -> Vec<QuerySpec>;
}

/// `Q0` for the main solution, then `Q1..QN` for the listed items in brief order.
#[derive(Debug, Clone, Copy, Default)]
pub struct BriefQueryBuilder;

impl QueryBuilder for BriefQueryBuilder {
	fn build(&self, brief: &Brief) -> Vec<QuerySpec> {
		let mut queries = Vec::with_capacity(brief.items.len() + 1);

		if let Some(solution) = &brief.main_solution {
			let parts = QueryParts {
				name: &solution.name,
				search_text: solution.search_text(),
				category: solution.category.as_deref(),
				keywords: &solution.keywords,
			};

			if let Some(query_text) = parts.query_text() {
				queries.push(QuerySpec {
					id: ROOT_QUERY_ID.to_string(),
					kind: QueryKind::Root,
					query_text,
					filters: parts.filters(),
					cost_benefit_hint: solution.cost_benefit.clone(),
					rigor_hint: solution.rigor.clone(),
					quantity: 1,
					source_ref: parts.source_ref("main_solution"),
				});
			}
		}

		for (position, item) in brief.items.iter().enumerate() {
			let parts = QueryParts {
				name: &item.name,
				search_text: item.search_text(),
				category: item.category.as_deref(),
				keywords: &item.keywords,
			};
			let Some(query_text) = parts.query_text() else {
				tracing::warn!(position, "Brief item has nothing to search for. Skipping it.");

				continue;
			};

			queries.push(QuerySpec {
				id: format!("Q{}", position + 1),
				kind: QueryKind::Item,
				query_text,
				filters: parts.filters(),
				cost_benefit_hint: item.cost_benefit.clone(),
				rigor_hint: item.rigor.clone(),
				quantity: item.quantity,
				source_ref: parts.source_ref("item"),
			});
		}

		queries
	}
}

struct QueryParts<'a> {
	name: &'a str,
	search_text: String,
	category: Option<&'a str>,
	keywords: &'a [String],
}
impl QueryParts<'_> {
	/// Name and description, falling back to category and keywords when both are blank.
	fn query_text(&self) -> Option<String> {
		if !self.search_text.is_empty() {
			return Some(self.search_text.clone());
		}

		let fallback = self
			.category
			.into_iter()
			.chain(self.keywords.iter().map(String::as_str))
			.map(str::trim)
			.filter(|part| !part.is_empty())
			.collect::<Vec<_>>()
			.join(" ");

		if fallback.is_empty() { None } else { Some(fallback) }
	}

	fn filters(&self) -> QueryFilters {
		QueryFilters {
			origin: None,
			category: self.category.map(str::to_string),
			keywords: self.keywords.to_vec(),
			extra: Map::new(),
		}
	}

	fn source_ref(&self, element: &str) -> SourceRef {
		let name = self.name.trim();
		let mut extra = Map::new();

		extra.insert("element".to_string(), Value::String(element.to_string()));

		SourceRef {
			name: if name.is_empty() { None } else { Some(name.to_string()) },
			category: self.category.map(str::to_string),
			extra,
		}
	}
}

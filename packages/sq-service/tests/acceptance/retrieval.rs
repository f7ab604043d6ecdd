use sq_domain::{Origin, QueryFilters, QueryKind, QuerySpec, SourceRef};
use sq_service::HybridSearchRequest;

use super::{PRIMARY_SPACE, SECONDARY_SPACE, product, scored};

fn desk_query() -> QuerySpec {
	QuerySpec {
		id: "Q1".to_string(),
		kind: QueryKind::Item,
		query_text: "Desk".to_string(),
		filters: QueryFilters { origin: Some(Origin::Local), ..QueryFilters::default() },
		cost_benefit_hint: None,
		rigor_hint: None,
		quantity: 1,
		source_ref: SourceRef::default(),
	}
}

#[tokio::test]
async fn duplicate_hits_across_spaces_keep_the_best_score() {
	let h = super::harness(Vec::new(), serde_json::json!({}));
	let desk = product(1, "Desk", "Furniture");
	let lamp = product(2, "Lamp", "Lighting");

	h.index.script_hits(
		PRIMARY_SPACE,
		Some(Origin::Local),
		vec![scored(desk.clone(), 0.4), scored(lamp.clone(), 0.5)],
	);
	h.index.script_hits(SECONDARY_SPACE, Some(Origin::Local), vec![scored(desk, 0.9)]);

	let spaces = h.service.cfg.active_spaces(true);
	let candidates = h.service.retrieve(&desk_query(), &spaces, 4).await;

	assert_eq!(candidates.len(), 2);
	assert_eq!(candidates[0].name, "Desk");
	assert_eq!(candidates[0].score, 0.9);
	assert_eq!(candidates[1].name, "Lamp");
	assert_eq!(h.embedding.calls_for(PRIMARY_SPACE), 1);
	assert_eq!(h.embedding.calls_for(SECONDARY_SPACE), 1);
}

#[tokio::test]
async fn failing_space_is_skipped() {
	let h = super::harness(Vec::new(), serde_json::json!({}));

	h.index.fail_space(PRIMARY_SPACE);
	h.index.script_hits(
		SECONDARY_SPACE,
		Some(Origin::Local),
		vec![scored(product(1, "Desk", "Furniture"), 0.7)],
	);

	let spaces = h.service.cfg.active_spaces(true);
	let candidates = h.service.retrieve(&desk_query(), &spaces, 4).await;

	assert_eq!(candidates.len(), 1);
	assert_eq!(h.index.searches(), 2);
}

#[tokio::test]
async fn every_space_failing_yields_no_candidates() {
	let h = super::harness(Vec::new(), serde_json::json!({}));

	h.embedding.fail_space(PRIMARY_SPACE);
	h.index.fail_space(SECONDARY_SPACE);

	let spaces = h.service.cfg.active_spaces(true);
	let candidates = h.service.retrieve(&desk_query(), &spaces, 4).await;

	assert!(candidates.is_empty());
	assert_eq!(h.index.searches(), 1);
}

#[tokio::test]
async fn monolingual_search_uses_only_the_primary_space() {
	let h = super::harness(Vec::new(), serde_json::json!({}));

	h.index.script_hits(
		PRIMARY_SPACE,
		None,
		vec![
			scored(product(1, "Desk", "Furniture"), 0.9),
			scored(product(2, "Desk lamp", "Lighting"), 0.8),
			scored(product(3, "Desk mat", "Office"), 0.7),
		],
	);

	let response = h
		.service
		.hybrid_search(HybridSearchRequest {
			query: "desk".to_string(),
			filters: QueryFilters::default(),
			limit: Some(serde_json::json!(2)),
			use_multilingual: false,
		})
		.await
		.expect("Search failed.");

	assert_eq!(response.spaces, vec![PRIMARY_SPACE.to_string()]);
	assert_eq!(response.candidates.len(), 2);
	assert_eq!(h.embedding.calls_for(SECONDARY_SPACE), 0);
	assert_eq!(h.judge.calls(), 0);
}

#[tokio::test]
async fn direct_search_rejects_malformed_limit() {
	let h = super::harness(Vec::new(), serde_json::json!({}));
	let result = h
		.service
		.hybrid_search(HybridSearchRequest {
			query: "desk".to_string(),
			filters: QueryFilters::default(),
			limit: Some(serde_json::json!("many")),
			use_multilingual: true,
		})
		.await;

	assert!(matches!(result, Err(sq_service::Error::InvalidRequest { .. })));
	assert_eq!(h.index.searches(), 0);
}

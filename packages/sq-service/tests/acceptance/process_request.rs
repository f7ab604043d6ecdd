use serde_json::{Value, json};

use sq_domain::{Origin, OutcomeStatus, Phase, QueryKind};
use sq_service::{Error, ProcessRequest, ProcurementRequest};

use super::{PRIMARY_SPACE, office_brief, product, scored};

fn request(text: &str, limit: Option<Value>) -> ProcessRequest {
	ProcessRequest {
		request: ProcurementRequest { text: text.to_string(), ..ProcurementRequest::default() },
		limit,
		use_multilingual: true,
		create_quotation: None,
	}
}

#[tokio::test]
async fn blank_request_text_is_rejected_before_any_call() {
	let h = super::harness(Vec::new(), office_brief());
	let result = h.service.process_request(request("   ", None)).await;

	assert!(matches!(result, Err(Error::InvalidRequest { .. })));
	assert_eq!(h.decomposer.calls(), 0);
	assert_eq!(h.embedding.calls(), 0);
}

#[tokio::test]
async fn malformed_limit_is_rejected() {
	let h = super::harness(Vec::new(), office_brief());

	for limit in [json!("ten"), json!(2.5), json!([4])] {
		let result = h.service.process_request(request("Office furniture", Some(limit))).await;

		assert!(matches!(result, Err(Error::InvalidRequest { .. })));
	}

	assert_eq!(h.decomposer.calls(), 0);
}

#[tokio::test]
async fn out_of_range_limit_falls_back_to_the_default() {
	let h = super::harness(Vec::new(), office_brief());

	for limit in [json!(-3), json!(0), json!(500)] {
		let response = h
			.service
			.process_request(request("Office furniture", Some(limit)))
			.await
			.expect("Processing failed.");

		assert_eq!(response.limit, 4);
	}

	let response = h
		.service
		.process_request(request("Office furniture", Some(json!(7))))
		.await
		.expect("Processing failed.");

	assert_eq!(response.limit, 7);
}

#[tokio::test]
async fn decomposer_failure_is_a_provider_error() {
	let h = super::harness(Vec::new(), office_brief());

	h.decomposer.fail();

	let err = h
		.service
		.process_request(request("Office furniture", None))
		.await
		.expect_err("Decomposer failure must fail the request.");

	match err {
		Error::Provider { message } => assert!(message.starts_with("Decomposition failed")),
		other => panic!("Expected a provider error, got {other:?}."),
	}

	assert_eq!(h.embedding.calls(), 0);
}

#[tokio::test]
async fn unreadable_brief_is_a_provider_error() {
	let h = super::harness(Vec::new(), json!({ "items": "not a list" }));
	let result = h.service.process_request(request("Office furniture", None)).await;

	assert!(matches!(result, Err(Error::Provider { .. })));
}

#[tokio::test]
async fn resolved_request_reports_every_query() {
	let h = super::harness(Vec::new(), office_brief());

	h.index.script_hits(
		PRIMARY_SPACE,
		Some(Origin::Local),
		vec![scored(product(1, "Desk", "Furniture"), 0.9)],
	);

	let response = h
		.service
		.process_request(request("Office furniture", None))
		.await
		.expect("Processing failed.");
	let ids = response.results.iter().map(|result| result.query_id.as_str()).collect::<Vec<_>>();

	assert_eq!(ids, vec!["Q0", "Q1", "Q2"]);
	assert_eq!(response.queries[0].kind, QueryKind::Root);
	assert!(response.results.iter().all(|result| result.phase == Phase::Local));
	assert!(response.unresolved.is_empty());
	assert!(response.missing.is_empty());
	assert!(response.sync.is_none());
	assert_eq!(h.decomposer.calls(), 1);

	let body = serde_json::to_value(&response).expect("Response must serialize.");

	assert_eq!(body["results"][0]["status"], "accepted");
	assert_eq!(body["results"][0]["candidate"]["product_id"], 1);
	assert!(body["processed_at"].is_string());
}

#[tokio::test]
async fn unresolved_items_become_missing_item_tasks() {
	let h = super::harness(Vec::new(), office_brief());
	let response = h
		.service
		.process_request(request("Office furniture", None))
		.await
		.expect("Processing failed.");

	assert_eq!(response.unresolved, vec!["Q0", "Q1", "Q2"]);
	assert!(
		response
			.results
			.iter()
			.all(|result| result.outcome.status() == OutcomeStatus::NoCandidatesFound)
	);
	// The root query is reported as unresolved but gets no follow-up task.
	assert_eq!(response.missing.len(), 2);

	let chair = &response.missing[1];

	assert_eq!(chair.id, "Q2");
	assert_eq!(chair.name.as_deref(), Some("Chair"));
	assert_eq!(chair.category.as_deref(), Some("Furniture"));
	assert_eq!(chair.keywords, vec!["mesh".to_string()]);
	assert_eq!(chair.quantity, 4);
	assert_eq!(chair.suggested_query.as_deref(), Some("Chair Furniture mesh"));
	assert_eq!(response.metrics.cache.queries_run, 3);
	assert_eq!(h.judge.calls(), 0);
}

#[tokio::test]
async fn configured_presync_runs_before_searching() {
	let mut cfg = sq_testkit::test_config();

	cfg.sync.sync_before_search = true;

	let h = super::harness_with(
		cfg,
		vec![product(1, "Desk", "Furniture"), product(2, "Chair", "Furniture")],
		office_brief(),
	);
	let response = h
		.service
		.process_request(request("Office furniture", None))
		.await
		.expect("Processing failed.");
	let sync = response.sync.expect("Sync must be reported.");

	assert_eq!(sync.inserted, 2);
	assert_eq!(h.catalog.snapshots.load(std::sync::atomic::Ordering::SeqCst), 1);
	assert_eq!(h.index.inserts.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn presync_failure_does_not_fail_the_request() {
	let mut cfg = sq_testkit::test_config();

	cfg.sync.sync_before_search = true;

	let h = super::harness_with(cfg, Vec::new(), office_brief());

	h.catalog.fail();

	let response = h
		.service
		.process_request(request("Office furniture", None))
		.await
		.expect("Processing failed.");

	assert!(response.sync.is_none());
	assert_eq!(response.results.len(), 3);
}

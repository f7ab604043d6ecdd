use serde_json::{Value, json};

use sq_domain::Origin;
use sq_service::{MaterializeStatus, ProcessRequest, ProcurementRequest, QuotationOutcome};
use sq_storage::models::QuotationStatus;

use super::{Harness, PRIMARY_SPACE, office_brief, product, scored};

fn request() -> ProcessRequest {
	ProcessRequest {
		request: ProcurementRequest {
			id: Some("req-7".to_string()),
			text: "We need desks and chairs for the new office.".to_string(),
			client: json!({ "name": "Acme" }),
			source: json!({ "channel": "email" }),
		},
		limit: None,
		use_multilingual: true,
		create_quotation: Some(true),
	}
}

fn office_harness() -> Harness {
	harness_for(office_brief())
}

/// Desk 0.9, Chair 0.7, Lamp 0.6, all priced at 100.
fn harness_for(brief: Value) -> Harness {
	let h = super::harness(Vec::new(), brief);

	h.index.script_hits(
		PRIMARY_SPACE,
		Some(Origin::Local),
		vec![
			scored(product(1, "Desk", "Furniture"), 0.9),
			scored(product(2, "Chair", "Furniture"), 0.7),
			scored(product(3, "Lamp", "Lighting"), 0.6),
		],
	);

	h
}

async fn quote(h: &Harness) -> QuotationOutcome {
	let response = h.service.process_request(request()).await.expect("Processing failed.");

	response.quotation.expect("A quotation must be attempted.")
}

#[tokio::test]
async fn resolved_request_produces_a_complete_quotation() {
	let h = office_harness();

	h.judge.script("Office setup", json!({ "index": 2, "report": { "why": "lights the room" } }));
	h.judge.script("Desk", json!({ "index": 0, "report": { "why": "right size" } }));
	h.judge.script("Chair", json!({ "index": 1, "report": { "why": "ergonomic" } }));

	let outcome = quote(&h).await;
	let quotation_id = outcome.quotation_id.expect("Quotation id must be set.");

	assert_eq!(outcome.status, MaterializeStatus::Created);
	assert_eq!(outcome.items_added, 3);
	assert_eq!(outcome.missing_inserted, 0);
	// Lamp once, two desks, four chairs.
	assert_eq!(outcome.total, 700.0);
	assert_eq!(outcome.quotation_status, Some(QuotationStatus::Complete));
	assert_eq!(h.quotations.totals(quotation_id), Some((700.0, QuotationStatus::Complete)));

	let prompts = h.quotations.prompts();

	assert_eq!(prompts.len(), 1);
	assert_eq!(prompts[0].request_text, "We need desks and chairs for the new office.");
	assert_eq!(prompts[0].client["name"], "Acme");
	assert_eq!(prompts[0].brief, office_brief());

	let quotations = h.quotations.quotations();

	assert_eq!(quotations[0].currency, "AOA");
	assert_eq!(quotations[0].notes, "Main quotation (automatic).");

	let items = h.quotations.items(quotation_id);
	let reasons = items
		.iter()
		.map(|item| {
			let analysis = item.analysis.as_ref().expect("Accepted line must carry the analysis.");

			assert_eq!(analysis["status"], "accepted");
			assert_eq!(analysis["phase"], "local");
			assert_eq!(analysis["product_id"], json!(item.product_id));

			analysis["report"]["why"].as_str().unwrap_or_default().to_string()
		})
		.collect::<Vec<_>>();

	assert_eq!(reasons, vec!["lights the room", "right size", "ergonomic"]);

	let report = h.quotations.report(quotation_id);

	assert_eq!(report.len(), 3);
	assert_eq!(report[1]["query_id"], "Q1");
	assert_eq!(report[1]["score"], json!(0.9_f32));
	assert_eq!(report[1]["report"]["why"], "right size");
}

#[tokio::test]
async fn unresolved_items_become_placeholders() {
	let h = office_harness();
	let rejection = json!({ "reason": "no mesh chairs" });

	h.judge.script("Office setup", json!({ "index": 2, "report": {} }));
	h.judge.script("Desk", json!({ "index": 0, "report": {} }));
	h.judge.script("Chair", json!({ "index": -1, "report": rejection }));

	let outcome = quote(&h).await;
	let quotation_id = outcome.quotation_id.expect("Quotation id must be set.");

	assert_eq!(outcome.status, MaterializeStatus::Created);
	assert_eq!(outcome.items_added, 2);
	assert_eq!(outcome.missing_inserted, 1);
	assert_eq!(outcome.total, 300.0);
	assert_eq!(outcome.quotation_status, Some(QuotationStatus::Incomplete));

	let items = h.quotations.items(quotation_id);
	let placeholder = items
		.iter()
		.find(|item| item.query_id == "Q2")
		.expect("Q2 must have a placeholder line.");

	assert_eq!(placeholder.product_id, None);
	assert_eq!(placeholder.name, "Chair");
	assert_eq!(placeholder.request_text, "Chair Furniture mesh");
	assert_eq!(placeholder.tags, vec!["missing".to_string(), "rejected_by_judge".to_string()]);
	assert_eq!(placeholder.price, None);
	assert_eq!(placeholder.quantity, 4);
	assert!(!placeholder.available);
	// The external phase ran and found nothing.
	assert_eq!(placeholder.origin, "external");

	let analysis = placeholder.analysis.as_ref().expect("Placeholder must carry the analysis.");

	assert_eq!(analysis["status"], "rejected_by_judge");
	assert_eq!(analysis["report"], rejection);
	assert_eq!(analysis["local"]["report"], rejection);
	assert_eq!(analysis["cache"]["status"], "no_candidates_found");

	let report = h.quotations.report(quotation_id);
	let statuses = report.iter().map(|entry| entry["status"].clone()).collect::<Vec<_>>();

	assert_eq!(statuses, vec![json!("accepted"), json!("accepted"), json!("rejected_by_judge")]);
	assert_eq!(report[2]["query_id"], "Q2");
	assert_eq!(report[2]["report"], rejection);
}

#[tokio::test]
async fn nameless_placeholder_falls_back_to_its_category() {
	let h = harness_for(json!({
		"main_solution": { "name": "Office setup", "category": "Furniture" },
		"items": [{ "name": "", "category": "Lighting", "keywords": ["led"], "quantity": 3 }]
	}));

	h.judge.script("Office setup", json!({ "index": 0, "report": {} }));
	h.judge.script("Lighting led", json!({ "index": -1, "report": { "reason": "no led lamps" } }));

	let outcome = quote(&h).await;
	let quotation_id = outcome.quotation_id.expect("Quotation id must be set.");
	let items = h.quotations.items(quotation_id);
	let placeholder = items
		.iter()
		.find(|item| item.query_id == "Q1")
		.expect("Q1 must have a placeholder line.");

	assert_eq!(placeholder.name, "Lighting");
	assert_eq!(placeholder.request_text, "Lighting led");
	assert_eq!(placeholder.quantity, 3);
}

#[tokio::test]
async fn rejected_root_stays_in_scope() {
	let h = office_harness();
	let rejection = json!({ "reason": "no bundle fits" });

	h.judge.script("Office setup", json!({ "index": -1, "report": rejection }));
	h.judge.script("Desk", json!({ "index": 0, "report": {} }));
	h.judge.script("Chair", json!({ "index": 1, "report": {} }));

	let outcome = quote(&h).await;
	let quotation_id = outcome.quotation_id.expect("Quotation id must be set.");
	let items = h.quotations.items(quotation_id);
	let root = items
		.iter()
		.find(|item| item.query_id == "Q0")
		.expect("A rejected root must still get a line.");

	assert_eq!(items.len(), 3);
	assert_eq!(root.product_id, None);
	assert_eq!(root.name, "Office setup");
	assert_eq!(outcome.items_added, 2);
	assert_eq!(outcome.missing_inserted, 1);
	assert_eq!(outcome.total, 600.0);
	assert_eq!(outcome.quotation_status, Some(QuotationStatus::Incomplete));
	assert_eq!(h.quotations.report(quotation_id)[0]["report"], rejection);
}

#[tokio::test]
async fn report_failures_do_not_block_the_quotation() {
	let h = office_harness();

	h.quotations.fail_reports();
	h.judge.script("Office setup", json!({ "index": 2, "report": {} }));
	h.judge.script("Desk", json!({ "index": 0, "report": {} }));
	h.judge.script("Chair", json!({ "index": 1, "report": {} }));

	let outcome = quote(&h).await;
	let quotation_id = outcome.quotation_id.expect("Quotation id must be set.");

	assert_eq!(outcome.status, MaterializeStatus::Created);
	assert_eq!(outcome.items_added, 3);
	assert!(h.quotations.report(quotation_id).is_empty());
}

#[tokio::test]
async fn unresolved_root_is_left_out() {
	let h = office_harness();

	h.judge.script("Office setup", json!({ "index": -1, "report": {} }));
	h.judge.script("Desk", json!({ "index": 0, "report": {} }));
	h.judge.script("Chair", json!({ "index": 1, "report": {} }));

	let outcome = quote(&h).await;
	let quotation_id = outcome.quotation_id.expect("Quotation id must be set.");
	let items = h.quotations.items(quotation_id);

	assert_eq!(items.len(), 2);
	assert!(items.iter().all(|item| item.query_id != "Q0"));
	assert_eq!(outcome.total, 600.0);
	assert_eq!(outcome.quotation_status, Some(QuotationStatus::Complete));
}

#[tokio::test]
async fn product_chosen_twice_is_quoted_once() {
	let h = office_harness();

	// Every query picks the desk.
	let outcome = quote(&h).await;
	let quotation_id = outcome.quotation_id.expect("Quotation id must be set.");
	let items = h.quotations.items(quotation_id);

	assert_eq!(items.len(), 1);
	assert_eq!(items[0].product_id, Some(1));
	assert_eq!(items[0].query_id, "Q0");
	assert_eq!(outcome.items_added, 1);
	assert_eq!(outcome.total, 100.0);
}

#[tokio::test]
async fn prompt_failure_aborts_the_quotation() {
	let h = office_harness();

	h.quotations.fail_prompts();

	let outcome = quote(&h).await;

	assert_eq!(outcome.status, MaterializeStatus::Error);
	assert_eq!(outcome.reason.as_deref(), Some("invalid_prompt"));
	assert_eq!(outcome.quotation_id, None);
	assert!(h.quotations.quotations().is_empty());
}

#[tokio::test]
async fn quotation_is_skipped_unless_requested() {
	let h = office_harness();
	let mut req = request();

	req.create_quotation = None;

	let response = h.service.process_request(req).await.expect("Processing failed.");

	assert!(response.quotation.is_none());
	assert!(h.quotations.prompts().is_empty());
}

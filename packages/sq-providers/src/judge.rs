use color_eyre::Result;
use serde::Serialize;
use serde_json::Value;

use sq_config::LlmProviderConfig;

const SYSTEM_PROMPT: &str = "You are a procurement analyst. Given a purchase query and a numbered \
list of catalog candidates, pick the single candidate that genuinely satisfies the query, honoring \
its filters, cost-benefit preference, and rigor level. Reply with a JSON object \
{\"index\": <integer>, \"report\": {...}}. `index` is the zero-based position of the chosen \
candidate, or -1 when no candidate fits. `report` must explain the decision, including why \
rejected candidates were discarded.";

/// Payload shown to the judge for one query.
#[derive(Debug, Clone, Serialize)]
pub struct JudgeRequest {
	pub query: String,
	pub filters: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cost_benefit: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rigor: Option<Value>,
	pub candidates: Vec<JudgeCandidate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JudgeCandidate {
	pub index: usize,
	pub name: String,
	pub category: String,
	pub price: f64,
	pub score: f32,
	pub description: String,
}

/// Returns the judge's raw JSON verdict. Interpreting `index` is left to the caller.
pub async fn judge(cfg: &LlmProviderConfig, request: &JudgeRequest) -> Result<Value> {
	let messages = build_messages(request)?;

	crate::chat::complete_json(cfg, &messages).await
}

fn build_messages(request: &JudgeRequest) -> Result<Vec<Value>> {
	let user = serde_json::to_string(request)?;

	Ok(vec![
		serde_json::json!({ "role": "system", "content": SYSTEM_PROMPT }),
		serde_json::json!({ "role": "user", "content": user }),
	])
}

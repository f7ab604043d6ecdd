use color_eyre::Result;
use serde_json::Value;

use sq_config::LlmProviderConfig;

const SYSTEM_PROMPT: &str = "You turn free-text procurement requests into a structured brief. \
Reply with a JSON object of the form {\"main_solution\": {\"name\", \"description\", \"category\", \
\"keywords\": [...], \"cost_benefit\", \"rigor\"}, \"items\": [{\"name\", \"description\", \
\"category\", \"keywords\": [...], \"quantity\", \"cost_benefit\", \"rigor\"}]}. Use one item per \
distinct product the request needs. Omit fields you cannot infer; never invent quantities.";

/// Decomposes a request into the brief JSON. Shape validation happens in the caller.
pub async fn decompose(cfg: &LlmProviderConfig, request_text: &str) -> Result<Value> {
	let messages = vec![
		serde_json::json!({ "role": "system", "content": SYSTEM_PROMPT }),
		serde_json::json!({ "role": "user", "content": request_text }),
	];

	crate::chat::complete_json(cfg, &messages).await
}

use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

use sq_config::LlmProviderConfig;

const MAX_ATTEMPTS: usize = 3;

/// Runs a chat completion that must answer with a JSON object.
///
/// Replies whose content is not valid JSON are retried up to three times; transport and HTTP
/// errors are returned immediately.
pub async fn complete_json(cfg: &LlmProviderConfig, messages: &[Value]) -> Result<Value> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"response_format": { "type": "json_object" },
		"messages": messages,
	});

	for attempt in 1..=MAX_ATTEMPTS {
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json = crate::read_json(res, "Chat completion").await?;

		match parse_chat_json(json) {
			Ok(parsed) => return Ok(parsed),
			Err(err) => tracing::warn!(
				provider = %cfg.provider_id,
				attempt,
				error = %err,
				"Chat completion returned unusable content."
			),
		}
	}

	Err(eyre::eyre!("Chat completion response is not valid JSON."))
}

fn parse_chat_json(json: Value) -> Result<Value> {
	if let Some(content) = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
	{
		let parsed: Value = serde_json::from_str(strip_code_fence(content))
			.map_err(|_| eyre::eyre!("Chat content is not valid JSON."))?;

		if !parsed.is_object() {
			return Err(eyre::eyre!("Chat content must be a JSON object."));
		}

		return Ok(parsed);
	}
	if json.get("choices").is_none() && json.is_object() {
		return Ok(json);
	}

	Err(eyre::eyre!("Chat response is missing JSON content."))
}

fn strip_code_fence(content: &str) -> &str {
	let trimmed = content.trim();
	let Some(inner) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let inner = inner.strip_prefix("json").unwrap_or(inner);

	inner.strip_suffix("```").unwrap_or(inner).trim()
}

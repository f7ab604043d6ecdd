//! OpenAI-compatible HTTP clients for embeddings and chat-completion judges.

pub mod chat;
pub mod decomposer;
pub mod embedding;
pub mod judge;

use color_eyre::{Result, eyre};
use reqwest::{
	Response,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(eyre::eyre!("Default header values must be strings."));
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

/// Turns non-success statuses into errors that keep the numeric code in the message.
async fn read_json(res: Response, label: &str) -> Result<Value> {
	let status = res.status();

	if !status.is_success() {
		let body = res.text().await.unwrap_or_default();
		let snippet: String = body.chars().take(200).collect();

		return Err(eyre::eyre!("{label} request failed with HTTP {}: {snippet}", status.as_u16()));
	}

	Ok(res.json().await?)
}

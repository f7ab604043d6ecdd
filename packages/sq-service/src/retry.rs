use std::time::Duration;

use color_eyre::eyre;

use crate::EmbeddingProvider;
use sq_config::{CatalogSync, EmbeddingProviderConfig, EmbeddingSpace};

const TRANSIENT_MARKERS: [&str; 15] = [
	"timeout",
	"timed out",
	"connection",
	"handshake",
	"reset",
	"refused",
	"aborted",
	"temporarily unavailable",
	"temporary failure",
	"max retries",
	"http 429",
	"http 502",
	"http 503",
	"http 504",
	"too many requests",
];

/// Bounded retry budget for embedding calls made while indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub base: Duration,
	pub cap: Duration,
	pub attempt_timeout: Duration,
}
impl RetryPolicy {
	pub fn from_config(cfg: &CatalogSync) -> Self {
		Self {
			max_attempts: cfg.max_retries.max(1),
			base: Duration::from_millis(cfg.backoff_ms),
			cap: Duration::from_millis(cfg.max_backoff_ms),
			attempt_timeout: Duration::from_millis(cfg.attempt_timeout_ms),
		}
	}

	/// Sleep after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`, capped.
	pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
		let exp = attempt.max(1).saturating_sub(1).min(16);

		self.base.saturating_mul(1 << exp).min(self.cap)
	}
}

/// True when any error in the chain reads like a network hiccup or an overloaded upstream.
pub fn is_transient(err: &eyre::Report) -> bool {
	err.chain().any(|cause| {
		let message = cause.to_string().to_lowercase();

		TRANSIENT_MARKERS.iter().any(|marker| message.contains(marker))
	})
}

/// Embeds `texts` in one space, retrying transient failures with exponential backoff.
pub async fn embed_with_retry(
	provider: &dyn EmbeddingProvider,
	cfg: &EmbeddingProviderConfig,
	space: &EmbeddingSpace,
	texts: &[String],
	policy: RetryPolicy,
) -> color_eyre::Result<Vec<Vec<f32>>> {
	let mut attempt = 0;

	loop {
		attempt += 1;

		let result =
			match tokio::time::timeout(policy.attempt_timeout, provider.embed(cfg, space, texts))
				.await
			{
				Ok(result) => result,
				Err(_) => Err(eyre::eyre!(
					"Embedding attempt timed out after {} ms.",
					policy.attempt_timeout.as_millis()
				)),
			};
		let err = match result {
			Ok(vectors) => return Ok(vectors),
			Err(err) => err,
		};

		if !is_transient(&err) {
			return Err(err);
		}
		if attempt >= policy.max_attempts {
			return Err(err.wrap_err(format!(
				"Embedding in space {} failed after {attempt} attempts.",
				space.name
			)));
		}

		let backoff = policy.backoff_for_attempt(attempt);

		tracing::warn!(
			error = %err,
			space = %space.name,
			attempt,
			backoff_ms = backoff.as_millis() as u64,
			"Transient embedding failure. Retrying."
		);
		tokio::time::sleep(backoff).await;
	}
}

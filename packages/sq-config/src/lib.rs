mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	CatalogSync, Config, EmbeddingProviderConfig, EmbeddingSpace, LlmProviderConfig, Postgres,
	Providers, Qdrant, Quotation, Search, Service, Storage,
};

use std::{collections::HashSet, fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if !is_sql_identifier(&cfg.storage.postgres.products_table) {
		return Err(Error::Validation {
			message: "storage.postgres.products_table must be a plain SQL identifier.".to_string(),
		});
	}

	validate_spaces(cfg)?;

	if cfg.search.default_limit == 0 {
		return Err(Error::Validation {
			message: "search.default_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.search.default_limit > cfg.search.max_limit {
		return Err(Error::Validation {
			message: "search.default_limit must be less than or equal to search.max_limit."
				.to_string(),
		});
	}
	if !matches!(cfg.search.fusion.as_str(), "rrf" | "dbsf") {
		return Err(Error::Validation {
			message: "search.fusion must be one of rrf or dbsf.".to_string(),
		});
	}
	if cfg.sync.max_retries == 0 {
		return Err(Error::Validation {
			message: "sync.max_retries must be greater than zero.".to_string(),
		});
	}
	if cfg.sync.backoff_ms > cfg.sync.max_backoff_ms {
		return Err(Error::Validation {
			message: "sync.backoff_ms must be less than or equal to sync.max_backoff_ms."
				.to_string(),
		});
	}
	if cfg.sync.attempt_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "sync.attempt_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.sync.page_size == 0 {
		return Err(Error::Validation {
			message: "sync.page_size must be greater than zero.".to_string(),
		});
	}
	if cfg.quotation.currency.trim().is_empty() {
		return Err(Error::Validation {
			message: "quotation.currency must be non-empty.".to_string(),
		});
	}
	if cfg.quotation.validity_days <= 0 {
		return Err(Error::Validation {
			message: "quotation.validity_days must be greater than zero.".to_string(),
		});
	}

	for (label, temperature) in [
		("judge", cfg.providers.judge.temperature),
		("decomposer", cfg.providers.decomposer.temperature),
	] {
		if !temperature.is_finite() || temperature < 0.0 {
			return Err(Error::Validation {
				message: format!(
					"providers.{label}.temperature must be a finite number zero or greater."
				),
			});
		}
	}
	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("judge", &cfg.providers.judge.api_key),
		("decomposer", &cfg.providers.decomposer.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn validate_spaces(cfg: &Config) -> Result<()> {
	let spaces = &cfg.providers.embedding.spaces;

	if spaces.is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.spaces must be non-empty.".to_string(),
		});
	}

	let mut seen = HashSet::new();

	for space in spaces {
		if space.name.is_empty() || space.model.trim().is_empty() {
			return Err(Error::Validation {
				message: "providers.embedding.spaces entries must have a name and a model."
					.to_string(),
			});
		}
		// Reserved for the lexical sparse vector.
		if space.name == "bm25" {
			return Err(Error::Validation {
				message: "providers.embedding.spaces name bm25 is reserved.".to_string(),
			});
		}
		if space.dimensions == 0 {
			return Err(Error::Validation {
				message: format!(
					"providers.embedding.spaces.{}.dimensions must be greater than zero.",
					space.name
				),
			});
		}
		if !seen.insert(space.name.as_str()) {
			return Err(Error::Validation {
				message: format!("providers.embedding.spaces name {} is duplicated.", space.name),
			});
		}
	}

	if let Some(primary) = cfg.search.primary_space.as_deref()
		&& !seen.contains(primary)
	{
		return Err(Error::Validation {
			message: "search.primary_space must name a configured embedding space.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.storage.qdrant.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.storage.qdrant.api_key = None;
	}
	if cfg.search.primary_space.as_deref().map(|name| name.trim().is_empty()).unwrap_or(false) {
		cfg.search.primary_space = None;
	}

	for space in &mut cfg.providers.embedding.spaces {
		space.name = space.name.trim().to_string();
	}

	cfg.search.fusion = cfg.search.fusion.trim().to_ascii_lowercase();
}

fn is_sql_identifier(raw: &str) -> bool {
	let mut chars = raw.chars();

	match chars.next() {
		Some(first) if first.is_ascii_alphabetic() || first == '_' =>
			chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_'),
		_ => false,
	}
}

mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Ingest, Jobs, LlmProviderConfig, Providers, Qdrant, Reports,
	Search, Security, Service, Storage,
};

use std::{fs, path::Path};

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
		return Err(Error::validation("service.http_bind must be non-empty."));
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::validation("storage.qdrant.collection must be non-empty."));
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::validation(
			"providers.embedding.dimensions must be greater than zero.",
		));
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::validation(
			"providers.embedding.dimensions must match storage.qdrant.vector_dim.",
		));
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("scorer", &cfg.providers.scorer.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::validation(format!("Provider {label} api_key must be non-empty.")));
		}
	}

	if !cfg.providers.scorer.temperature.is_finite() {
		return Err(Error::validation("providers.scorer.temperature must be a finite number."));
	}
	if cfg.storage.reports.signing_key.trim().is_empty() {
		return Err(Error::validation("storage.reports.signing_key must be non-empty."));
	}
	if cfg.storage.reports.public_base_url.trim().is_empty() {
		return Err(Error::validation("storage.reports.public_base_url must be non-empty."));
	}
	if cfg.storage.reports.signed_url_ttl_seconds == 0 {
		return Err(Error::validation(
			"storage.reports.signed_url_ttl_seconds must be greater than zero.",
		));
	}
	if cfg.ingest.state_file.trim().is_empty() {
		return Err(Error::validation("ingest.state_file must be non-empty."));
	}
	if cfg.ingest.extensions.is_empty() {
		return Err(Error::validation("ingest.extensions must list at least one extension."));
	}

	for (label, value) in [
		("ingest.batch_size", cfg.ingest.batch_size),
		("ingest.checkpoint_interval", cfg.ingest.checkpoint_interval),
		("ingest.max_embed_chars", cfg.ingest.max_embed_chars),
		("search.default_top_k", cfg.search.default_top_k),
		("search.scorer_concurrency", cfg.search.scorer_concurrency),
		("search.description_max_chars", cfg.search.description_max_chars),
	] {
		if value == 0 {
			return Err(Error::validation(format!("{label} must be greater than zero.")));
		}
	}

	if cfg.search.default_top_k > cfg.search.max_top_k {
		return Err(Error::validation("search.default_top_k must not exceed search.max_top_k."));
	}
	if cfg.jobs.search_url.trim().is_empty() {
		return Err(Error::validation("jobs.search_url must be non-empty."));
	}
	if cfg.jobs.dispatch_timeout_ms == 0 {
		return Err(Error::validation("jobs.dispatch_timeout_ms must be greater than zero."));
	}
	if cfg.security.internal_auth_token.trim().is_empty() {
		return Err(Error::validation("security.internal_auth_token must be non-empty."));
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.ingest.extensions = cfg
		.ingest
		.extensions
		.iter()
		.map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
		.filter(|ext| !ext.is_empty())
		.collect();

	let base = cfg.storage.reports.public_base_url.trim().trim_end_matches('/').to_string();

	cfg.storage.reports.public_base_url = base;
}

mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Config, EmbeddingProviderConfig, LlmProviderConfig, Postgres, ProviderConfig, Providers,
	Qdrant, Search, Service, SparseEncoderConfig, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::Read { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::Parse { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::invalid("service.http_bind must be non-empty."));
	}
	if cfg.storage.postgres.product_table.trim().is_empty() {
		return Err(Error::invalid("storage.postgres.product_table must be non-empty."));
	}
	if !is_sql_identifier(&cfg.storage.postgres.product_table) {
		return Err(Error::invalid("storage.postgres.product_table must be a plain identifier."));
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::invalid("storage.qdrant.collection must be non-empty."));
	}
	if cfg.storage.qdrant.vector_dim == 0 {
		return Err(Error::invalid("storage.qdrant.vector_dim must be greater than zero."));
	}
	if cfg.storage.qdrant.meta_doc_id.trim().is_empty() {
		return Err(Error::invalid("storage.qdrant.meta_doc_id must be non-empty."));
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::invalid("providers.embedding.dimensions must be greater than zero."));
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::invalid(
			"providers.embedding.dimensions must match storage.qdrant.vector_dim.",
		));
	}
	if cfg.providers.sparse.artifact_path.as_os_str().is_empty() {
		return Err(Error::invalid("providers.sparse.artifact_path must be non-empty."));
	}
	if cfg.search.top_k_per_field == 0 {
		return Err(Error::invalid("search.top_k_per_field must be greater than zero."));
	}
	if !cfg.search.rrf_k.is_finite() || cfg.search.rrf_k <= 0.0 {
		return Err(Error::invalid("search.rrf_k must be a positive finite number."));
	}
	if cfg.search.max_rerank_candidates == 0 {
		return Err(Error::invalid("search.max_rerank_candidates must be greater than zero."));
	}
	if cfg.search.max_parallel_routes == 0 {
		return Err(Error::invalid("search.max_parallel_routes must be greater than zero."));
	}
	if cfg.cache.response_ttl_secs == 0 {
		return Err(Error::invalid("cache.response_ttl_secs must be greater than zero."));
	}
	if cfg.cache.response_max_entries == 0 {
		return Err(Error::invalid("cache.response_max_entries must be greater than zero."));
	}
	if cfg.cache.route_memo_max_entries == 0 {
		return Err(Error::invalid("cache.route_memo_max_entries must be greater than zero."));
	}
	if cfg.cache.catalog_ttl_secs == 0 {
		return Err(Error::invalid("cache.catalog_ttl_secs must be greater than zero."));
	}
	if cfg.cache.freshness_ttl_secs == 0 {
		return Err(Error::invalid("cache.freshness_ttl_secs must be greater than zero."));
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("rerank", &cfg.providers.rerank.api_key),
		("extractor", &cfg.providers.extractor.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::invalid(format!("Provider {label} api_key must be non-empty.")));
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.storage.postgres.product_table = cfg.storage.postgres.product_table.trim().to_string();
	cfg.storage.qdrant.collection = cfg.storage.qdrant.collection.trim().to_string();
	cfg.storage.qdrant.meta_doc_id = cfg.storage.qdrant.meta_doc_id.trim().to_string();
}

fn is_sql_identifier(name: &str) -> bool {
	!name.is_empty()
		&& name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
		&& !name.starts_with(|ch: char| ch.is_ascii_digit())
}

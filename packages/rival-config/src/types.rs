use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub search: Search,
	pub cache: Cache,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
	pub product_table: String,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
	#[serde(default = "default_meta_doc_id")]
	pub meta_doc_id: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
	pub extractor: LlmProviderConfig,
	pub sparse: SparseEncoderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct SparseEncoderConfig {
	pub artifact_path: std::path::PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	#[serde(default = "default_top_k_per_field")]
	pub top_k_per_field: u32,
	#[serde(default = "default_rrf_k")]
	pub rrf_k: f64,
	#[serde(default = "default_max_rerank_candidates")]
	pub max_rerank_candidates: u32,
	#[serde(default = "default_max_parallel_routes")]
	pub max_parallel_routes: u32,
}

#[derive(Debug, Deserialize)]
pub struct Cache {
	#[serde(default = "default_response_ttl_secs")]
	pub response_ttl_secs: u64,
	#[serde(default = "default_response_max_entries")]
	pub response_max_entries: u64,
	#[serde(default = "default_route_memo_max_entries")]
	pub route_memo_max_entries: u64,
	#[serde(default = "default_catalog_ttl_secs")]
	pub catalog_ttl_secs: u64,
	#[serde(default = "default_freshness_ttl_secs")]
	pub freshness_ttl_secs: u64,
}

fn default_meta_doc_id() -> String {
	"__meta__#latest".to_string()
}

fn default_top_k_per_field() -> u32 {
	80
}

fn default_rrf_k() -> f64 {
	60.0
}

fn default_max_rerank_candidates() -> u32 {
	100
}

fn default_max_parallel_routes() -> u32 {
	8
}

fn default_response_ttl_secs() -> u64 {
	7_200
}

fn default_response_max_entries() -> u64 {
	20_000
}

fn default_route_memo_max_entries() -> u64 {
	8_192
}

fn default_catalog_ttl_secs() -> u64 {
	600
}

fn default_freshness_ttl_secs() -> u64 {
	60
}

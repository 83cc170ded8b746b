//! In-memory fakes and fixtures for exercising the search core without
//! Postgres, Qdrant or any HTTP provider.
//!
//! The fakes are deterministic: embeddings are seeded from the input text,
//! sparse vectors hash the same tokenizer output the real encoder consumes,
//! and rerank scores come from token overlap with the query. Call counters
//! let tests assert which backends a request touched.

use std::{
	collections::{BTreeMap, HashSet},
	sync::atomic::{AtomicUsize, Ordering},
};

use serde_json::Map;

use rival_config::{
	Cache, Config, EmbeddingProviderConfig, LlmProviderConfig, Postgres, ProviderConfig, Providers,
	Qdrant, Search, Service, SparseEncoderConfig, Storage,
};
use rival_domain::{
	text::{TEXT_FIELDS, normalize_field_text},
	vector::l2_normalize,
};
use rival_providers::sparse::tokenize;
use rival_service::{
	BoxFuture, Catalog, EmbeddingProvider, FieldExtractor, RerankProvider, SparseEncoderProvider,
	VectorIndex,
};
use rival_storage::{
	index::{IndexHit, MetaDoc, RouteQuery},
	models::ProductRecord,
};

pub const TEST_VECTOR_DIM: usize = 8;

/// Deterministic pseudo-embedding of `text`.
pub fn embed_text(text: &str, dim: usize) -> Vec<f32> {
	let mut state = fnv1a(text.as_bytes()) as u64 | 1;
	let mut out = Vec::with_capacity(dim);

	for _ in 0..dim {
		// Plain xorshift; quality does not matter, determinism does.
		state ^= state << 13;
		state ^= state >> 7;
		state ^= state << 17;

		out.push(((state % 2_000) as f32 / 1_000.0) - 1.0);
	}

	out
}

/// Hash-indexed sparse encoding over the shared tokenizer.
pub fn sparse_encode(text: &str) -> Vec<(u32, f32)> {
	let mut values: BTreeMap<u32, f32> = BTreeMap::new();

	for token in tokenize(text) {
		*values.entry(fnv1a(token.as_bytes())).or_insert(0.0) += 1.0;
	}

	values.into_iter().collect()
}

fn fnv1a(bytes: &[u8]) -> u32 {
	let mut hash: u32 = 0x811C_9DC5;

	for byte in bytes {
		hash ^= u32::from(*byte);
		hash = hash.wrapping_mul(0x0100_0193);
	}

	hash
}

fn overlap_score(query: &str, doc: &str) -> f32 {
	let query_tokens: HashSet<String> = tokenize(query).into_iter().collect();

	if query_tokens.is_empty() {
		return 0.0;
	}

	let doc_tokens: HashSet<String> = tokenize(doc).into_iter().collect();
	let shared = query_tokens.intersection(&doc_tokens).count();

	shared as f32 / query_tokens.len() as f32
}

#[derive(Default)]
pub struct FakeEmbedding {
	pub calls: AtomicUsize,
}

impl EmbeddingProvider for FakeEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, rival_providers::Result<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let vectors =
			texts.iter().map(|text| embed_text(text, cfg.dimensions as usize)).collect();

		Box::pin(async move { Ok(vectors) })
	}
}

#[derive(Default)]
pub struct FakeSparse {
	pub calls: AtomicUsize,
}

impl SparseEncoderProvider for FakeSparse {
	fn encode(&self, text: &str) -> rival_providers::Result<Vec<(u32, f32)>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Ok(sparse_encode(text))
	}
}

#[derive(Default)]
pub struct FakeRerank {
	pub calls: AtomicUsize,
}

impl RerankProvider for FakeRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, rival_providers::Result<Vec<Option<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let scores = docs.iter().map(|doc| Some(overlap_score(query, doc))).collect();

		Box::pin(async move { Ok(scores) })
	}
}

/// Stands in for the LLM field extractor: the whole description lands in
/// `features`, every other field stays empty.
#[derive(Default)]
pub struct FakeExtractor {
	pub calls: AtomicUsize,
}

impl FieldExtractor for FakeExtractor {
	fn extract_fields<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		product_info: &'a str,
	) -> BoxFuture<'a, rival_providers::Result<BTreeMap<String, String>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let mut fields: BTreeMap<String, String> =
			TEXT_FIELDS.iter().map(|field| (field.to_string(), String::new())).collect();

		fields.insert("features".to_string(), product_info.to_string());

		Box::pin(async move { Ok(fields) })
	}
}

#[derive(Clone, Debug)]
pub struct FakeDoc {
	pub doc_id: String,
	pub product_id: Option<String>,
	pub field: String,
	pub track: String,
	pub company: String,
	pub channel: String,
	pub dense: Vec<f32>,
	pub sparse: Vec<(u32, f32)>,
}

/// In-memory hybrid index: dense dot product plus sparse overlap.
#[derive(Default)]
pub struct FakeIndex {
	pub docs: Vec<FakeDoc>,
	pub meta: Option<MetaDoc>,
	pub fail_fields: HashSet<String>,
	pub query_calls: AtomicUsize,
	pub meta_calls: AtomicUsize,
}

impl FakeIndex {
	pub fn with_meta(docs: Vec<FakeDoc>) -> Self {
		Self { docs, meta: Some(sample_meta()), ..Default::default() }
	}

	fn score(doc: &FakeDoc, route: &RouteQuery) -> f32 {
		let dense: f32 = doc
			.dense
			.iter()
			.zip(route.dense.iter())
			.map(|(a, b)| a * b)
			.sum();
		let sparse: f32 = route
			.sparse
			.iter()
			.map(|(index, value)| {
				doc.sparse
					.iter()
					.find(|(doc_index, _)| doc_index == index)
					.map(|(_, doc_value)| value.min(*doc_value))
					.unwrap_or(0.0)
			})
			.sum();

		dense + sparse
	}
}

impl VectorIndex for FakeIndex {
	fn query_route<'a>(
		&'a self,
		route: RouteQuery,
	) -> BoxFuture<'a, rival_storage::Result<Vec<IndexHit>>> {
		self.query_calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			if self.fail_fields.contains(&route.field) {
				return Err(rival_storage::Error::NotFound(format!(
					"simulated outage for field {}",
					route.field
				)));
			}

			let mut scored: Vec<(f32, &FakeDoc)> = self
				.docs
				.iter()
				.filter(|doc| doc.track == route.track && doc.field == route.field)
				.filter(|doc| {
					route.companies.is_empty() || route.companies.contains(&doc.company)
				})
				.filter(|doc| {
					route.channels.is_empty() || route.channels.contains(&doc.channel)
				})
				.map(|doc| (Self::score(doc, &route), doc))
				.collect();

			scored.sort_by(|a, b| b.0.total_cmp(&a.0));
			scored.truncate(route.top_k as usize);

			Ok(scored
				.into_iter()
				.map(|(score, doc)| IndexHit {
					doc_id: doc.doc_id.clone(),
					product_id: doc.product_id.clone(),
					score,
				})
				.collect())
		})
	}

	fn latest_meta<'a>(&'a self) -> BoxFuture<'a, rival_storage::Result<Option<MetaDoc>>> {
		self.meta_calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move { Ok(self.meta.clone()) })
	}
}

#[derive(Default)]
pub struct FakeCatalog {
	pub rows: Vec<ProductRecord>,
	pub load_calls: AtomicUsize,
}

impl FakeCatalog {
	pub fn new(rows: Vec<ProductRecord>) -> Self {
		Self { rows, load_calls: AtomicUsize::new(0) }
	}
}

impl Catalog for FakeCatalog {
	fn load_products<'a>(&'a self) -> BoxFuture<'a, rival_storage::Result<Vec<ProductRecord>>> {
		self.load_calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move { Ok(self.rows.clone()) })
	}
}

pub fn sample_meta() -> MetaDoc {
	MetaDoc {
		ingest_dt: Some("2026-02-01 09:00:00".to_string()),
		build_id: Some("build-0001".to_string()),
		data_version: Some("v1".to_string()),
		row_count: Some(3),
		doc_count: Some(21),
	}
}

pub fn product_record(
	product_id: &str,
	company: &str,
	channel: &str,
	track: &str,
	labels: &str,
	features: &str,
) -> ProductRecord {
	ProductRecord {
		product_id: product_id.to_string(),
		company: Some(company.to_string()),
		channel: Some(channel.to_string()),
		product_name: Some(format!("产品{product_id}")),
		track: Some(track.to_string()),
		labels: Some(labels.to_string()),
		features: Some(features.to_string()),
		..Default::default()
	}
}

/// One index document per non-empty text field, embedded and sparse-encoded
/// exactly the way the fakes embed queries.
pub fn index_docs_for(record: &ProductRecord) -> Vec<FakeDoc> {
	let mut docs = Vec::new();

	for (field, raw) in record.text_fields() {
		let text = normalize_field_text(&field, &raw);

		if text.trim().is_empty() {
			continue;
		}

		docs.push(FakeDoc {
			doc_id: format!("{}#{}", record.product_id, field),
			product_id: Some(record.product_id.clone()),
			field,
			track: record.track().to_string(),
			company: record.company().to_string(),
			channel: record.channel().to_string(),
			dense: l2_normalize(embed_text(&text, TEST_VECTOR_DIM)),
			sparse: sparse_encode(&text),
		});
	}

	docs
}

pub fn test_config() -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
		},
		storage: Storage {
			postgres: Postgres {
				dsn: "postgres://unused".to_string(),
				pool_max_conns: 1,
				product_table: "competitor_products".to_string(),
			},
			qdrant: Qdrant {
				url: "http://127.0.0.1:6334".to_string(),
				collection: "competitor_products_test".to_string(),
				vector_dim: TEST_VECTOR_DIM as u32,
				meta_doc_id: "__meta__#latest".to_string(),
			},
		},
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "fake".to_string(),
				api_base: "http://127.0.0.1:0".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "fake-embedding".to_string(),
				dimensions: TEST_VECTOR_DIM as u32,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			rerank: ProviderConfig {
				provider_id: "fake".to_string(),
				api_base: "http://127.0.0.1:0".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/rerank".to_string(),
				model: "fake-rerank".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			extractor: LlmProviderConfig {
				provider_id: "fake".to_string(),
				api_base: "http://127.0.0.1:0".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/chat/completions".to_string(),
				model: "fake-llm".to_string(),
				temperature: 0.0,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			sparse: SparseEncoderConfig { artifact_path: "./unused.json".into() },
		},
		search: Search {
			top_k_per_field: 80,
			rrf_k: 60.0,
			max_rerank_candidates: 100,
			max_parallel_routes: 8,
		},
		cache: Cache {
			response_ttl_secs: 7_200,
			response_max_entries: 128,
			route_memo_max_entries: 128,
			catalog_ttl_secs: 600,
			freshness_ttl_secs: 60,
		},
	}
}

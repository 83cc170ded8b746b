pub mod error;
pub mod fields;
pub mod freshness;
pub mod search;
pub mod status;

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc, time::Duration};

use moka::future::Cache;

use rival_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use rival_providers::{embedding, extractor, rerank, sparse::SparseEncoder};
use rival_storage::{
	catalog::PgCatalog,
	index::{IndexHit, MetaDoc, QdrantIndex, RouteQuery},
	models::ProductRecord,
};

pub use error::{ServiceError, ServiceResult};
pub use search::{
	CompetitorQuery, Evidence, QueryDetail, ResponseContent, ResponseDetail, ResponseEnvelope,
	ResultItem, RouteContribution, SearchStatus,
};
pub use status::IndexStatus;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, rival_providers::Result<Vec<Vec<f32>>>>;
}

pub trait SparseEncoderProvider
where
	Self: Send + Sync,
{
	fn encode(&self, text: &str) -> rival_providers::Result<Vec<(u32, f32)>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, rival_providers::Result<Vec<Option<f32>>>>;
}

pub trait FieldExtractor
where
	Self: Send + Sync,
{
	fn extract_fields<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		product_info: &'a str,
	) -> BoxFuture<'a, rival_providers::Result<std::collections::BTreeMap<String, String>>>;
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn query_route<'a>(
		&'a self,
		route: RouteQuery,
	) -> BoxFuture<'a, rival_storage::Result<Vec<IndexHit>>>;

	fn latest_meta<'a>(&'a self) -> BoxFuture<'a, rival_storage::Result<Option<MetaDoc>>>;
}

pub trait Catalog
where
	Self: Send + Sync,
{
	fn load_products<'a>(&'a self) -> BoxFuture<'a, rival_storage::Result<Vec<ProductRecord>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub sparse: Arc<dyn SparseEncoderProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	pub extractor: Arc<dyn FieldExtractor>,
}

impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		sparse: Arc<dyn SparseEncoderProvider>,
		rerank: Arc<dyn RerankProvider>,
		extractor: Arc<dyn FieldExtractor>,
	) -> Self {
		Self { embedding, sparse, rerank, extractor }
	}

	/// HTTP-backed providers plus a pre-loaded sparse encoder.
	pub fn with_sparse_encoder(encoder: SparseEncoder) -> Self {
		let http = Arc::new(HttpProviders);

		Self {
			embedding: http.clone(),
			sparse: Arc::new(encoder),
			rerank: http.clone(),
			extractor: http,
		}
	}
}

struct HttpProviders;

impl EmbeddingProvider for HttpProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, rival_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl RerankProvider for HttpProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, rival_providers::Result<Vec<Option<f32>>>> {
		Box::pin(rerank::rerank(cfg, query, docs))
	}
}

impl FieldExtractor for HttpProviders {
	fn extract_fields<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		product_info: &'a str,
	) -> BoxFuture<'a, rival_providers::Result<std::collections::BTreeMap<String, String>>> {
		Box::pin(extractor::extract_fields(cfg, product_info))
	}
}

impl SparseEncoderProvider for SparseEncoder {
	fn encode(&self, text: &str) -> rival_providers::Result<Vec<(u32, f32)>> {
		Ok(SparseEncoder::encode(self, text))
	}
}

impl VectorIndex for QdrantIndex {
	fn query_route<'a>(
		&'a self,
		route: RouteQuery,
	) -> BoxFuture<'a, rival_storage::Result<Vec<IndexHit>>> {
		Box::pin(self.query(route))
	}

	fn latest_meta<'a>(&'a self) -> BoxFuture<'a, rival_storage::Result<Option<MetaDoc>>> {
		Box::pin(QdrantIndex::latest_meta(self))
	}
}

impl Catalog for PgCatalog {
	fn load_products<'a>(&'a self) -> BoxFuture<'a, rival_storage::Result<Vec<ProductRecord>>> {
		Box::pin(PgCatalog::load_products(self))
	}
}

/// Immutable product-id keyed view of one catalog read.
///
/// A snapshot never changes under an in-flight request; expiry swaps in a
/// whole new snapshot for later requests.
pub struct CatalogSnapshot {
	by_id: HashMap<String, ProductRecord>,
}

impl CatalogSnapshot {
	pub fn new(rows: Vec<ProductRecord>) -> Self {
		let mut by_id = HashMap::with_capacity(rows.len());

		for row in rows {
			let product_id = row.product_id.trim().to_string();

			if product_id.is_empty() {
				continue;
			}

			by_id.insert(product_id, row);
		}

		Self { by_id }
	}

	pub fn get(&self, product_id: &str) -> Option<&ProductRecord> {
		self.by_id.get(product_id)
	}

	pub fn len(&self) -> usize {
		self.by_id.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_id.is_empty()
	}
}

pub struct SearchService {
	pub cfg: Arc<Config>,
	pub index: Arc<dyn VectorIndex>,
	pub catalog: Arc<dyn Catalog>,
	pub providers: Providers,
	response_cache: Cache<String, ResponseEnvelope>,
	route_memo: Cache<search::recall::RouteMemoKey, Arc<Vec<search::recall::RouteCandidate>>>,
	catalog_cache: Cache<(), Arc<CatalogSnapshot>>,
	freshness_cache: Cache<(), freshness::Freshness>,
}

impl SearchService {
	pub fn new(
		cfg: Config,
		index: Arc<dyn VectorIndex>,
		catalog: Arc<dyn Catalog>,
		providers: Providers,
	) -> Self {
		let response_cache = Cache::builder()
			.max_capacity(cfg.cache.response_max_entries)
			.time_to_live(Duration::from_secs(cfg.cache.response_ttl_secs))
			.build();
		let route_memo = Cache::builder().max_capacity(cfg.cache.route_memo_max_entries).build();
		let catalog_cache = Cache::builder()
			.max_capacity(2)
			.time_to_live(Duration::from_secs(cfg.cache.catalog_ttl_secs))
			.build();
		let freshness_cache = Cache::builder()
			.max_capacity(4)
			.time_to_live(Duration::from_secs(cfg.cache.freshness_ttl_secs))
			.build();

		Self {
			cfg: Arc::new(cfg),
			index,
			catalog,
			providers,
			response_cache,
			route_memo,
			catalog_cache,
			freshness_cache,
		}
	}

	pub(crate) async fn catalog_snapshot(&self) -> ServiceResult<Arc<CatalogSnapshot>> {
		self.catalog_cache
			.try_get_with((), async {
				let rows = self.catalog.load_products().await.map_err(ServiceError::from)?;
				let snapshot = CatalogSnapshot::new(rows);

				tracing::debug!(products = snapshot.len(), "Catalog snapshot refreshed.");

				Ok::<_, ServiceError>(Arc::new(snapshot))
			})
			.await
			.map_err(|err| (*err).clone())
	}
}

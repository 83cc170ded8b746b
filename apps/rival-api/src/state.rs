use std::sync::Arc;

use rival_providers::sparse::SparseEncoder;
use rival_service::{Providers, SearchService};
use rival_storage::{catalog::PgCatalog, index::QdrantIndex};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<SearchService>,
}

impl AppState {
	/// Wires real backends. Unreachable Postgres/Qdrant or a missing sparse
	/// artifact is fatal here, at startup.
	pub async fn new(config: rival_config::Config) -> color_eyre::Result<Self> {
		let catalog = PgCatalog::connect(&config.storage.postgres).await?;
		let index = QdrantIndex::new(&config.storage.qdrant)?;
		let encoder = SparseEncoder::load(&config.providers.sparse.artifact_path)?;

		tracing::info!(vocab = encoder.vocab_len(), "Sparse encoder loaded.");

		let providers = Providers::with_sparse_encoder(encoder);
		let service =
			SearchService::new(config, Arc::new(index), Arc::new(catalog), providers);

		Ok(Self { service: Arc::new(service) })
	}

	pub fn with_service(service: SearchService) -> Self {
		Self { service: Arc::new(service) }
	}
}

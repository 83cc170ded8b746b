pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Qdrant error: {0}")]
	Qdrant(#[from] qdrant_client::QdrantError),
	#[error("Not found: {0}")]
	NotFound(String),
}

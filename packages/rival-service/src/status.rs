use crate::{SearchService, ServiceError, ServiceResult};

/// Latest index-build report, read from the meta document.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct IndexStatus {
	pub task_status: String,
	pub latest_finished_at: String,
	pub task_id: Option<String>,
	pub collection: String,
	pub data_version: Option<String>,
	pub row_count: Option<i64>,
	pub doc_count: Option<i64>,
}

impl SearchService {
	pub async fn index_status(&self) -> ServiceResult<IndexStatus> {
		let meta = self.index.latest_meta().await.map_err(ServiceError::from)?;
		let Some(meta) = meta else {
			return Err(ServiceError::NotFound {
				message: "Index build marker not found.".to_string(),
			});
		};
		let latest_finished_at = meta.ingest_dt.unwrap_or_default();
		let task_status = if latest_finished_at.is_empty() { "unknown" } else { "ready" };

		Ok(IndexStatus {
			task_status: task_status.to_string(),
			latest_finished_at,
			task_id: meta.build_id,
			collection: self.cfg.storage.qdrant.collection.clone(),
			data_version: meta.data_version,
			row_count: meta.row_count,
			doc_count: meta.doc_count,
		})
	}
}

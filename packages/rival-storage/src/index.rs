//! Qdrant adapter for the competitor-product index.
//!
//! Index documents are one point per `(product, text field)` pair. Point ids
//! are UUIDv5 digests of the `doc_id` payload (`<product_id>#<field>`), which
//! is also how the `__meta__#latest` build marker is fetched. The payload
//! carries the product metadata the search core filters on.

use std::collections::HashMap;

use qdrant_client::qdrant::{
	Condition, Filter, Fusion, GetPointsBuilder, PointId, PrefetchQueryBuilder, Query,
	QueryPointsBuilder, Value, VectorInput, point_id::PointIdOptions, value::Kind,
};
use uuid::Uuid;

use crate::Result;

pub const DENSE_VECTOR_NAME: &str = "dense";
pub const SPARSE_VECTOR_NAME: &str = "sparse";

/// One hybrid route query, scoped to a single text field.
#[derive(Debug, Clone)]
pub struct RouteQuery {
	pub field: String,
	pub track: String,
	pub companies: Vec<String>,
	pub channels: Vec<String>,
	pub dense: Vec<f32>,
	pub sparse: Vec<(u32, f32)>,
	pub top_k: u32,
}

/// A scored index hit with the payload subset the search core consumes.
#[derive(Debug, Clone)]
pub struct IndexHit {
	pub doc_id: String,
	pub product_id: Option<String>,
	pub score: f32,
}

/// Build metadata stored on the meta document.
#[derive(Debug, Clone, Default)]
pub struct MetaDoc {
	pub ingest_dt: Option<String>,
	pub build_id: Option<String>,
	pub data_version: Option<String>,
	pub row_count: Option<i64>,
	pub doc_count: Option<i64>,
}

pub struct QdrantIndex {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
	meta_doc_id: String,
}

impl QdrantIndex {
	pub fn new(cfg: &rival_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			collection: cfg.collection.clone(),
			vector_dim: cfg.vector_dim,
			meta_doc_id: cfg.meta_doc_id.clone(),
		})
	}

	/// Runs one hybrid query. Dense and sparse prefetches are fused
	/// server-side; cross-field fusion happens in the search core.
	pub async fn query(&self, route: RouteQuery) -> Result<Vec<IndexHit>> {
		let filter = route_filter(&route.track, &route.field, &route.companies, &route.channels);
		let mut search = QueryPointsBuilder::new(self.collection.clone());
		let dense_prefetch = PrefetchQueryBuilder::default()
			.query(Query::new_nearest(route.dense))
			.using(DENSE_VECTOR_NAME)
			.filter(filter.clone())
			.limit(route.top_k as u64);

		search = search.add_prefetch(dense_prefetch);

		// Queries with no in-vocabulary token carry an empty sparse vector;
		// the route degrades to dense-only instead of erroring out.
		if !route.sparse.is_empty() {
			let (indices, values): (Vec<u32>, Vec<f32>) = route.sparse.into_iter().unzip();
			let sparse_prefetch = PrefetchQueryBuilder::default()
				.query(Query::new_nearest(VectorInput::new_sparse(indices, values)))
				.using(SPARSE_VECTOR_NAME)
				.filter(filter.clone())
				.limit(route.top_k as u64);

			search = search.add_prefetch(sparse_prefetch);
		}

		let search = search.with_payload(true).query(Fusion::Rrf).limit(route.top_k as u64);
		let response = self.client.query(search).await?;
		let mut hits = Vec::with_capacity(response.result.len());

		for point in response.result {
			let doc_id = payload_str(&point.payload, "doc_id")
				.or_else(|| point.id.as_ref().and_then(point_id_text))
				.unwrap_or_default();

			hits.push(IndexHit {
				doc_id,
				product_id: payload_str(&point.payload, "product_id"),
				score: point.score,
			});
		}

		Ok(hits)
	}

	/// Fetches the latest build marker. `Ok(None)` means the marker document
	/// does not exist; the caller decides how stale to report.
	pub async fn latest_meta(&self) -> Result<Option<MetaDoc>> {
		let point_id = PointId {
			point_id_options: Some(PointIdOptions::Uuid(doc_point_id(&self.meta_doc_id).to_string())),
		};
		let response = self
			.client
			.get_points(
				GetPointsBuilder::new(self.collection.clone(), vec![point_id]).with_payload(true),
			)
			.await?;
		let Some(point) = response.result.into_iter().next() else {
			return Ok(None);
		};

		Ok(Some(MetaDoc {
			ingest_dt: payload_str(&point.payload, "ingest_dt"),
			build_id: payload_str(&point.payload, "build_id"),
			data_version: payload_str(&point.payload, "data_version"),
			row_count: payload_i64(&point.payload, "row_count"),
			doc_count: payload_i64(&point.payload, "doc_count"),
		}))
	}
}

/// Deterministic point id for a document id string.
pub fn doc_point_id(doc_id: &str) -> Uuid {
	Uuid::new_v5(&Uuid::NAMESPACE_URL, doc_id.as_bytes())
}

/// Conjunction of: not a meta document, exact track, exact field, and the
/// optional company/channel allow-list disjunctions.
pub fn route_filter(track: &str, field: &str, companies: &[String], channels: &[String]) -> Filter {
	let mut must = vec![
		Condition::matches("track", track.to_string()),
		Condition::matches("field", field.to_string()),
	];

	if !companies.is_empty() {
		must.push(Condition::matches("company", companies.to_vec()));
	}
	if !channels.is_empty() {
		must.push(Condition::matches("channel", channels.to_vec()));
	}

	Filter {
		must,
		should: Vec::new(),
		must_not: vec![Condition::matches("is_meta", true)],
		min_should: None,
	}
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => {
			let trimmed = text.trim();

			if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
		},
		_ => None,
	}
}

fn payload_i64(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::IntegerValue(value)) => Some(*value),
		Some(Kind::DoubleValue(value)) if value.fract() == 0.0 => Some(*value as i64),
		_ => None,
	}
}

fn point_id_text(point_id: &PointId) -> Option<String> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Some(id.clone()),
		Some(PointIdOptions::Num(id)) => Some(id.to_string()),
		None => None,
	}
}

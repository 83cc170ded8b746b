//! Per-field recall fan-out against the vector index.

use std::{
	collections::{BTreeMap, HashSet},
	sync::Arc,
};

use moka::future::Cache;
use tokio::{sync::Semaphore, task::JoinSet};

use rival_config::Config;
use rival_domain::{text::TEXT_FIELDS, vector::l2_normalize};
use rival_storage::index::{IndexHit, RouteQuery};

use crate::{
	EmbeddingProvider, SearchService, ServiceError, ServiceResult, SparseEncoderProvider,
	VectorIndex, search::NormalizedQuery,
};

/// Memo key for one route query. Filter lists are sorted so equivalent
/// allow-lists share an entry.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub(crate) struct RouteMemoKey {
	field: String,
	track: String,
	query_text: String,
	top_k: u32,
	companies: String,
	channels: String,
}

impl RouteMemoKey {
	fn new(
		field: &str,
		track: &str,
		query_text: &str,
		top_k: u32,
		companies: &[String],
		channels: &[String],
	) -> Self {
		Self {
			field: field.to_string(),
			track: track.to_string(),
			query_text: query_text.to_string(),
			top_k,
			companies: joined_sorted(companies),
			channels: joined_sorted(channels),
		}
	}
}

#[derive(Clone, Debug)]
pub(crate) struct RouteCandidate {
	pub product_id: String,
	pub score: f32,
}

struct RouteContext {
	cfg: Arc<Config>,
	index: Arc<dyn VectorIndex>,
	embedding: Arc<dyn EmbeddingProvider>,
	sparse: Arc<dyn SparseEncoderProvider>,
	memo: Cache<RouteMemoKey, Arc<Vec<RouteCandidate>>>,
	track: String,
	companies: Vec<String>,
	channels: Vec<String>,
}

impl SearchService {
	/// Issues one hybrid route per non-empty text field and waits for all of
	/// them. A failed route contributes nothing; its reason goes to the log.
	/// Returns route-name-sorted `(route, candidates)` pairs.
	pub(crate) async fn recall_routes(
		&self,
		query: &NormalizedQuery,
		normalized_fields: &BTreeMap<String, String>,
	) -> Vec<(String, Vec<RouteCandidate>)> {
		let jobs: Vec<(String, String, String)> = TEXT_FIELDS
			.iter()
			.filter_map(|field| {
				let text = normalized_fields.get(*field).map(String::as_str).unwrap_or("");
				let text = text.trim();

				// An empty field produces no route and no backend call.
				(!text.is_empty())
					.then(|| (field.to_string(), format!("{field}_hybrid"), text.to_string()))
			})
			.collect();

		if jobs.is_empty() {
			return Vec::new();
		}

		let permits = (self.cfg.search.max_parallel_routes as usize).min(jobs.len()).max(1);
		let semaphore = Arc::new(Semaphore::new(permits));
		let context = Arc::new(RouteContext {
			cfg: self.cfg.clone(),
			index: self.index.clone(),
			embedding: self.providers.embedding.clone(),
			sparse: self.providers.sparse.clone(),
			memo: self.route_memo.clone(),
			track: query.product_track.clone(),
			companies: query.selected_company.clone(),
			channels: query.selected_channel.clone(),
		});
		let mut tasks = JoinSet::new();

		for (field, route_name, text) in jobs {
			let context = context.clone();
			let semaphore = semaphore.clone();

			tasks.spawn(async move {
				let result = async {
					let _permit = semaphore.acquire_owned().await.map_err(|_| {
						ServiceError::Internal { message: "Route scheduler shut down.".to_string() }
					})?;

					run_route(&context, &field, &text).await
				}
				.await;

				(route_name, result)
			});
		}

		let mut routes = Vec::new();

		while let Some(joined) = tasks.join_next().await {
			match joined {
				Ok((route_name, Ok(candidates))) =>
					if candidates.is_empty() {
						tracing::debug!(route = %route_name, "Recall route returned no hits.");
					} else {
						routes.push((route_name, candidates));
					},
				Ok((route_name, Err(err))) => {
					tracing::warn!(route = %route_name, error = %err, "Recall route failed; dropping it.");
				},
				Err(err) => {
					tracing::warn!(error = %err, "Recall route task aborted.");
				},
			}
		}

		routes.sort_by(|a, b| a.0.cmp(&b.0));

		routes
	}
}

async fn run_route(
	context: &RouteContext,
	field: &str,
	text: &str,
) -> ServiceResult<Vec<RouteCandidate>> {
	let key = RouteMemoKey::new(
		field,
		&context.track,
		text,
		context.cfg.search.top_k_per_field,
		&context.companies,
		&context.channels,
	);
	let candidates = context
		.memo
		.try_get_with(key, search_route(context, field, text))
		.await
		.map_err(|err| (*err).clone())?;

	Ok(candidates.as_ref().clone())
}

async fn search_route(
	context: &RouteContext,
	field: &str,
	text: &str,
) -> ServiceResult<Arc<Vec<RouteCandidate>>> {
	let query_text = text.to_string();
	let embedded = context
		.embedding
		.embed(&context.cfg.providers.embedding, std::slice::from_ref(&query_text))
		.await?;
	let Some(dense) = embedded.into_iter().next() else {
		return Err(ServiceError::Dependency {
			message: "Embedding backend returned no vectors.".to_string(),
		});
	};

	if dense.len() != context.cfg.storage.qdrant.vector_dim as usize {
		return Err(ServiceError::Dependency {
			message: "Embedding vector dimension mismatch.".to_string(),
		});
	}

	let dense = l2_normalize(dense);
	let sparse = context.sparse.encode(text)?;
	let hits = context
		.index
		.query_route(RouteQuery {
			field: field.to_string(),
			track: context.track.clone(),
			companies: context.companies.clone(),
			channels: context.channels.clone(),
			dense,
			sparse,
			top_k: context.cfg.search.top_k_per_field,
		})
		.await?;

	Ok(Arc::new(dedupe_hits(hits)))
}

/// First occurrence per product wins; the id falls back to the document id
/// with its `#<field>` suffix stripped.
pub(crate) fn dedupe_hits(hits: Vec<IndexHit>) -> Vec<RouteCandidate> {
	let mut seen = HashSet::new();
	let mut out = Vec::with_capacity(hits.len());

	for hit in hits {
		let product_id = match hit.product_id {
			Some(product_id) => product_id,
			None => hit.doc_id.split('#').next().unwrap_or_default().trim().to_string(),
		};

		if product_id.is_empty() {
			continue;
		}
		if !seen.insert(product_id.clone()) {
			continue;
		}

		out.push(RouteCandidate { product_id, score: hit.score });
	}

	out
}

fn joined_sorted(items: &[String]) -> String {
	let mut sorted: Vec<&str> = items.iter().map(String::as_str).collect();

	sorted.sort_unstable();

	sorted.join("|")
}

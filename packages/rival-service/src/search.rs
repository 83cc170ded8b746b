//! Competitor search: validation, recall fan-out, fusion, assembly, rerank
//! and the response envelope.

pub(crate) mod assemble;
pub(crate) mod fusion;
pub(crate) mod recall;

use std::collections::BTreeMap;

use rival_domain::text::{TEXT_FIELDS, combined_text, normalize_field_text};

use crate::{
	SearchService, ServiceError, ServiceResult,
	freshness::Freshness,
	search::assemble::{AssembleArgs, CandidateItem},
};

pub const DEFAULT_RERANK_THRESHOLD: f32 = 0.30;
pub const DEFAULT_MAX_RESULTS: u32 = 20;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CompetitorQuery {
	#[serde(default)]
	pub product_id: String,
	#[serde(default)]
	pub product_name: String,
	#[serde(default)]
	pub product_track: String,
	#[serde(default)]
	pub product_info: String,
	#[serde(default)]
	pub selected_company: Vec<String>,
	#[serde(default)]
	pub selected_channel: Vec<String>,
	#[serde(default = "default_rerank_threshold")]
	pub rerank_threshold: f32,
	#[serde(default = "default_max_results")]
	pub max_results: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchStatus {
	Success,
	Fail,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ResponseEnvelope {
	pub status: SearchStatus,
	#[serde(rename = "failCause")]
	pub fail_cause: String,
	pub content: ResponseContent,
	pub detail: ResponseDetail,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ResponseContent {
	pub product_list: Vec<String>,
	pub biz_dt: String,
	pub warnings: Vec<String>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct ResponseDetail {
	pub query: Option<QueryDetail>,
	pub candidates: Vec<ResultItem>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct QueryDetail {
	pub product_id: Option<String>,
	pub product_name: String,
	pub product_track: String,
	pub product_info: String,
	pub selected_company: Vec<String>,
	pub selected_channel: Vec<String>,
	pub effective_pid: Option<String>,
	pub parsed_fields: BTreeMap<String, String>,
	pub rerank_query_text: String,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ResultItem {
	pub product_id: String,
	pub company: String,
	pub channel: String,
	pub product_name: String,
	pub product_track: String,
	pub rerank_score: f32,
	pub rrf_score: f64,
	pub routes: Vec<RouteContribution>,
	pub evidence: Evidence,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RouteContribution {
	pub route: String,
	pub rank: u32,
	pub score_raw: f32,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Evidence {
	pub combined_text: String,
	pub fields: BTreeMap<String, String>,
}

#[derive(Clone, Debug)]
pub(crate) struct NormalizedQuery {
	pub product_id: Option<String>,
	pub product_name: String,
	pub product_track: String,
	pub product_info: String,
	pub selected_company: Vec<String>,
	pub selected_channel: Vec<String>,
	pub rerank_threshold: f32,
	pub max_results: u32,
}

impl SearchService {
	/// Full competitor search. Always answers with an envelope; validation
	/// failures and pipeline errors become FAIL envelopes, never panics or
	/// transport-level errors.
	pub async fn search_competitors(&self, query: CompetitorQuery) -> ResponseEnvelope {
		let freshness = self.resolve_freshness().await;
		let normalized = match validate_query(&query) {
			Ok(normalized) => normalized,
			Err(err) => {
				tracing::info!(error = %err, "Rejected malformed competitor query.");

				return fail_envelope(&freshness.biz_dt, err.to_string());
			},
		};
		let cache_key = response_cache_key(&normalized, &freshness.biz_dt);

		if let Some(cached) = self.response_cache.get(&cache_key).await {
			tracing::debug!("Competitor search served from the response cache.");

			return cached;
		}

		let envelope = match self.run_pipeline(&normalized, &freshness).await {
			Ok(envelope) => envelope,
			Err(err) => {
				tracing::error!(error = %err, "Competitor search failed.");

				fail_envelope(&freshness.biz_dt, err.to_string())
			},
		};

		self.response_cache.insert(cache_key, envelope.clone()).await;

		envelope
	}

	async fn run_pipeline(
		&self,
		query: &NormalizedQuery,
		freshness: &Freshness,
	) -> ServiceResult<ResponseEnvelope> {
		let snapshot = self.catalog_snapshot().await?;
		let source = self.resolve_source_fields(query, &snapshot).await?;
		let mut normalized_fields = BTreeMap::new();

		for field in TEXT_FIELDS {
			let raw = source.fields.get(field).map(String::as_str).unwrap_or("");

			normalized_fields.insert(field.to_string(), normalize_field_text(field, raw));
		}

		let rerank_query_text = combined_text(&source.fields);
		let query_detail = QueryDetail {
			product_id: query.product_id.clone(),
			product_name: query.product_name.clone(),
			product_track: query.product_track.clone(),
			product_info: query.product_info.clone(),
			selected_company: query.selected_company.clone(),
			selected_channel: query.selected_channel.clone(),
			effective_pid: source.effective_pid.clone(),
			parsed_fields: source.fields.clone(),
			rerank_query_text: rerank_query_text.clone(),
		};
		let routes = self.recall_routes(query, &normalized_fields).await;

		if routes.is_empty() {
			tracing::info!(track = %query.product_track, "Competitor recall produced no routes.");

			return Ok(success_envelope(
				freshness,
				Vec::new(),
				ResponseDetail { query: Some(query_detail), candidates: Vec::new() },
			));
		}

		let (fused, route_details) = fusion::fuse(&routes, self.cfg.search.rrf_k);
		let candidates = assemble::assemble(AssembleArgs {
			fused: &fused,
			route_details: &route_details,
			snapshot: &snapshot,
			companies: &query.selected_company,
			channels: &query.selected_channel,
			exclude_pid: source.effective_pid.as_deref(),
			limit: self.cfg.search.max_rerank_candidates as usize,
		});

		tracing::info!(
			routes = routes.len(),
			fused = fused.len(),
			candidates = candidates.len(),
			"Competitor recall complete."
		);

		if candidates.is_empty() {
			return Ok(success_envelope(
				freshness,
				Vec::new(),
				ResponseDetail { query: Some(query_detail), candidates: Vec::new() },
			));
		}

		let docs: Vec<String> =
			candidates.iter().map(|candidate| candidate.combined_text.clone()).collect();
		let scores = self
			.providers
			.rerank
			.rerank(&self.cfg.providers.rerank, &rerank_query_text, &docs)
			.await?;
		let items =
			apply_rerank(candidates, &scores, query.rerank_threshold, query.max_results as usize);
		let product_list = items.iter().map(|item| item.product_id.clone()).collect();

		Ok(success_envelope(
			freshness,
			product_list,
			ResponseDetail { query: Some(query_detail), candidates: items },
		))
	}
}

pub(crate) fn validate_query(query: &CompetitorQuery) -> ServiceResult<NormalizedQuery> {
	for (name, value) in [
		("product_name", &query.product_name),
		("product_track", &query.product_track),
		("product_info", &query.product_info),
	] {
		if value.trim().is_empty() {
			return Err(ServiceError::Validation {
				message: format!("Required field {name} is missing or empty."),
			});
		}
	}

	if !(0.0..=1.0).contains(&query.rerank_threshold) || !query.rerank_threshold.is_finite() {
		return Err(ServiceError::Validation {
			message: "rerank_threshold must be within [0, 1].".to_string(),
		});
	}
	if !(1..=100).contains(&query.max_results) {
		return Err(ServiceError::Validation {
			message: "max_results must be within [1, 100].".to_string(),
		});
	}

	let product_id = query.product_id.trim();

	Ok(NormalizedQuery {
		product_id: (!product_id.is_empty()).then(|| product_id.to_string()),
		product_name: query.product_name.trim().to_string(),
		product_track: query.product_track.trim().to_string(),
		product_info: query.product_info.trim().to_string(),
		selected_company: norm_str_list(&query.selected_company),
		selected_channel: norm_str_list(&query.selected_channel),
		rerank_threshold: query.rerank_threshold,
		max_results: query.max_results,
	})
}

/// Applies the rerank cutoff and the final ordering.
///
/// Unscored candidates are dropped alongside below-threshold ones; ties keep
/// the assembled (fused) order through the stable sort.
pub(crate) fn apply_rerank(
	candidates: Vec<CandidateItem>,
	scores: &[Option<f32>],
	threshold: f32,
	max_results: usize,
) -> Vec<ResultItem> {
	let mut items = Vec::new();

	for (idx, candidate) in candidates.into_iter().enumerate() {
		let Some(score) = scores.get(idx).copied().flatten() else {
			continue;
		};

		if score < threshold {
			continue;
		}

		let mut evidence_fields = BTreeMap::new();

		for field in TEXT_FIELDS {
			let raw = candidate.fields_map.get(field).map(String::as_str).unwrap_or("");

			evidence_fields.insert(field.to_string(), normalize_field_text(field, raw));
		}

		items.push(ResultItem {
			product_id: candidate.product_id,
			company: candidate.company,
			channel: candidate.channel,
			product_name: candidate.product_name,
			product_track: candidate.product_track,
			rerank_score: score,
			rrf_score: candidate.rrf_score,
			routes: candidate.routes,
			evidence: Evidence {
				combined_text: candidate.combined_text,
				fields: evidence_fields,
			},
		});
	}

	items.sort_by(|a, b| b.rerank_score.total_cmp(&a.rerank_score));
	items.truncate(max_results);

	items
}

fn norm_str_list(items: &[String]) -> Vec<String> {
	items.iter().map(|item| item.trim().to_string()).filter(|item| !item.is_empty()).collect()
}

fn response_cache_key(query: &NormalizedQuery, biz_dt: &str) -> String {
	let payload = serde_json::json!({
		"product_id": query.product_id,
		"product_name": query.product_name,
		"product_track": query.product_track,
		"product_info": query.product_info,
		"selected_company": query.selected_company,
		"selected_channel": query.selected_channel,
		"rerank_threshold": query.rerank_threshold,
		"max_results": query.max_results,
		"biz_dt": biz_dt,
	});

	blake3::hash(payload.to_string().as_bytes()).to_hex().to_string()
}

fn success_envelope(
	freshness: &Freshness,
	product_list: Vec<String>,
	detail: ResponseDetail,
) -> ResponseEnvelope {
	ResponseEnvelope {
		status: SearchStatus::Success,
		fail_cause: String::new(),
		content: ResponseContent {
			product_list,
			biz_dt: freshness.biz_dt.clone(),
			warnings: freshness.warnings.clone(),
		},
		detail,
	}
}

fn fail_envelope(biz_dt: &str, cause: String) -> ResponseEnvelope {
	let fail_cause = if cause.trim().is_empty() { "unknown_error".to_string() } else { cause };

	ResponseEnvelope {
		status: SearchStatus::Fail,
		fail_cause,
		content: ResponseContent {
			product_list: Vec::new(),
			biz_dt: biz_dt.to_string(),
			warnings: Vec::new(),
		},
		detail: ResponseDetail::default(),
	}
}

fn default_rerank_threshold() -> f32 {
	DEFAULT_RERANK_THRESHOLD
}

fn default_max_results() -> u32 {
	DEFAULT_MAX_RESULTS
}

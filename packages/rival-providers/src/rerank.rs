use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// Scores `docs` against `query` via the external rerank backend.
///
/// The returned vector is index-aligned with `docs`; entries the backend did
/// not score stay `None` so the caller can tell "unscored" from "scored 0".
pub async fn rerank(
	cfg: &rival_config::ProviderConfig,
	query: &str,
	docs: &[String],
) -> Result<Vec<Option<f32>>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({ "model": cfg.model, "query": query, "documents": docs });
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_rerank_response(json, docs.len())
}

fn parse_rerank_response(json: Value, doc_count: usize) -> Result<Vec<Option<f32>>> {
	let mut scores = vec![None; doc_count];
	let results = json
		.get("results")
		.or_else(|| json.get("data"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| Error::malformed("Rerank response is missing results array."))?;

	for item in results {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.ok_or_else(|| Error::malformed("Rerank result missing index."))? as usize;
		let score = item
			.get("relevance_score")
			.or_else(|| item.get("score"))
			.and_then(|v| v.as_f64())
			.ok_or_else(|| Error::malformed("Rerank result missing score."))? as f32;

		if index < scores.len() {
			scores[index] = Some(score);
		}
	}

	Ok(scores)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn aligns_scores_by_index() {
		let json = serde_json::json!({
			"results": [
				{ "index": 1, "relevance_score": 0.2 },
				{ "index": 0, "relevance_score": 0.9 }
			]
		});
		let scores = parse_rerank_response(json, 2).expect("parse failed");

		assert_eq!(scores, vec![Some(0.9), Some(0.2)]);
	}

	#[test]
	fn unscored_documents_stay_none() {
		let json = serde_json::json!({
			"results": [
				{ "index": 2, "score": 0.4 }
			]
		});
		let scores = parse_rerank_response(json, 3).expect("parse failed");

		assert_eq!(scores, vec![None, None, Some(0.4)]);
	}

	#[test]
	fn out_of_range_indices_are_ignored() {
		let json = serde_json::json!({
			"results": [
				{ "index": 9, "score": 0.4 }
			]
		});
		let scores = parse_rerank_response(json, 1).expect("parse failed");

		assert_eq!(scores, vec![None]);
	}
}

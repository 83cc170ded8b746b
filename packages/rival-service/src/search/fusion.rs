//! Reciprocal-rank fusion of per-route candidate lists.

use std::collections::HashMap;

use crate::search::{RouteContribution, recall::RouteCandidate};

#[derive(Clone, Debug)]
pub(crate) struct FusedCandidate {
	pub product_id: String,
	pub score: f64,
}

/// Fuses route rankings into one ordering.
///
/// Each route contributes `1 / (rrf_k + rank)` per product, rank 1-based on
/// the route's raw scores. RRF is deliberately the only cross-route
/// treatment: it is invariant to each route's raw score scale. Exact score
/// ties order lexicographically by product id so the result never depends on
/// map iteration order.
pub(crate) fn fuse(
	routes: &[(String, Vec<RouteCandidate>)],
	rrf_k: f64,
) -> (Vec<FusedCandidate>, HashMap<String, Vec<RouteContribution>>) {
	let mut aggregate: HashMap<String, f64> = HashMap::new();
	let mut details: HashMap<String, Vec<RouteContribution>> = HashMap::new();

	for (route_name, candidates) in routes {
		let mut ordered: Vec<&RouteCandidate> = candidates.iter().collect();

		ordered.sort_by(|a, b| b.score.total_cmp(&a.score));

		for (position, candidate) in ordered.iter().enumerate() {
			let rank = position as u32 + 1;

			*aggregate.entry(candidate.product_id.clone()).or_insert(0.0) +=
				1.0 / (rrf_k + f64::from(rank));
			details.entry(candidate.product_id.clone()).or_default().push(RouteContribution {
				route: route_name.clone(),
				rank,
				score_raw: candidate.score,
			});
		}
	}

	let mut fused: Vec<FusedCandidate> = aggregate
		.into_iter()
		.map(|(product_id, score)| FusedCandidate { product_id, score })
		.collect();

	fused.sort_by(|a, b| {
		b.score.total_cmp(&a.score).then_with(|| a.product_id.cmp(&b.product_id))
	});

	(fused, details)
}

#[cfg(test)]
mod tests {
	use super::*;

	const K: f64 = 60.0;

	fn route(name: &str, candidates: &[(&str, f32)]) -> (String, Vec<RouteCandidate>) {
		(
			name.to_string(),
			candidates
				.iter()
				.map(|(product_id, score)| RouteCandidate {
					product_id: product_id.to_string(),
					score: *score,
				})
				.collect(),
		)
	}

	#[test]
	fn ranks_follow_raw_scores_within_a_route() {
		let routes = vec![route("labels_hybrid", &[("low", 0.1), ("high", 0.9)])];
		let (fused, details) = fuse(&routes, K);

		assert_eq!(fused[0].product_id, "high");
		assert_eq!(details["high"][0].rank, 1);
		assert_eq!(details["low"][0].rank, 2);
	}

	#[test]
	fn appearing_in_more_routes_always_scores_higher() {
		// "both" is ranked at or below "solo" in the shared route, yet the
		// extra route keeps its fused score strictly higher.
		let routes = vec![
			route("labels_hybrid", &[("solo", 0.9), ("both", 0.8)]),
			route("features_hybrid", &[("both", 0.5)]),
		];
		let (fused, _) = fuse(&routes, K);

		assert_eq!(fused[0].product_id, "both");
		assert!(fused[0].score > fused[1].score);
	}

	#[test]
	fn better_ranks_in_the_same_routes_never_score_lower() {
		let routes = vec![
			route("labels_hybrid", &[("a", 0.9), ("b", 0.8)]),
			route("features_hybrid", &[("a", 0.7), ("b", 0.6)]),
		];
		let (fused, _) = fuse(&routes, K);

		assert_eq!(fused[0].product_id, "a");
	}

	#[test]
	fn exact_ties_break_lexicographically_by_product_id() {
		let routes = vec![
			route("labels_hybrid", &[("zzz", 0.9)]),
			route("features_hybrid", &[("aaa", 0.9)]),
		];
		let (fused, _) = fuse(&routes, K);
		let ids: Vec<&str> = fused.iter().map(|c| c.product_id.as_str()).collect();

		assert_eq!(ids, vec!["aaa", "zzz"]);
	}

	#[test]
	fn contributions_record_route_rank_and_raw_score() {
		let routes = vec![route("labels_hybrid", &[("p", 0.42)])];
		let (_, details) = fuse(&routes, K);
		let contribution = &details["p"][0];

		assert_eq!(contribution.route, "labels_hybrid");
		assert_eq!(contribution.rank, 1);
		assert_eq!(contribution.score_raw, 0.42);
	}

	#[test]
	fn fused_score_matches_the_rrf_formula() {
		let routes = vec![
			route("labels_hybrid", &[("p", 0.9)]),
			route("features_hybrid", &[("x", 0.9), ("p", 0.1)]),
		];
		let (fused, _) = fuse(&routes, K);
		let p = fused.iter().find(|c| c.product_id == "p").expect("p must be fused");
		let expected = 1.0 / (K + 1.0) + 1.0 / (K + 2.0);

		assert!((p.score - expected).abs() < 1e-12);
	}
}

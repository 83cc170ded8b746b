//! Joins fused candidates against the catalog snapshot.

use std::collections::{BTreeMap, HashMap};

use rival_domain::text::combined_text;

use crate::{
	CatalogSnapshot,
	search::{RouteContribution, fusion::FusedCandidate},
};

#[derive(Clone, Debug)]
pub(crate) struct CandidateItem {
	pub product_id: String,
	pub company: String,
	pub channel: String,
	pub product_name: String,
	pub product_track: String,
	pub combined_text: String,
	pub fields_map: BTreeMap<String, String>,
	pub rrf_score: f64,
	pub routes: Vec<RouteContribution>,
}

pub(crate) struct AssembleArgs<'a> {
	pub fused: &'a [FusedCandidate],
	pub route_details: &'a HashMap<String, Vec<RouteContribution>>,
	pub snapshot: &'a CatalogSnapshot,
	pub companies: &'a [String],
	pub channels: &'a [String],
	pub exclude_pid: Option<&'a str>,
	pub limit: usize,
}

/// Walks the fused ordering and materializes rerank-ready candidates.
///
/// Ids missing from the catalog are skipped, not errors; the index may
/// briefly outrun the catalog snapshot between builds. Empty allow-lists
/// filter nothing, and candidates with no text to rerank against are
/// dropped.
pub(crate) fn assemble(args: AssembleArgs<'_>) -> Vec<CandidateItem> {
	let mut out = Vec::new();

	for fused in args.fused {
		if out.len() >= args.limit {
			break;
		}
		if args.exclude_pid.is_some_and(|pid| pid == fused.product_id) {
			continue;
		}

		let Some(record) = args.snapshot.get(&fused.product_id) else {
			continue;
		};
		let company = record.company();
		let channel = record.channel();

		if !args.companies.is_empty() && !args.companies.iter().any(|allowed| allowed == company) {
			continue;
		}
		if !args.channels.is_empty() && !args.channels.iter().any(|allowed| allowed == channel) {
			continue;
		}

		let fields_map = record.text_fields();
		let text = combined_text(&fields_map);

		if text.trim().is_empty() {
			continue;
		}

		out.push(CandidateItem {
			product_id: fused.product_id.clone(),
			company: company.to_string(),
			channel: channel.to_string(),
			product_name: record.product_name().to_string(),
			product_track: record.track().to_string(),
			combined_text: text,
			fields_map,
			rrf_score: fused.score,
			routes: args.route_details.get(&fused.product_id).cloned().unwrap_or_default(),
		});
	}

	out
}

#[cfg(test)]
mod tests {
	use rival_storage::models::ProductRecord;

	use super::*;

	fn record(product_id: &str, company: &str, channel: &str) -> ProductRecord {
		ProductRecord {
			product_id: product_id.to_string(),
			company: Some(company.to_string()),
			channel: Some(channel.to_string()),
			product_name: Some(format!("产品{product_id}")),
			track: Some("医疗险".to_string()),
			labels: Some("['标签']".to_string()),
			..Default::default()
		}
	}

	fn fused(ids: &[&str]) -> Vec<FusedCandidate> {
		ids.iter()
			.enumerate()
			.map(|(i, id)| FusedCandidate {
				product_id: id.to_string(),
				score: 1.0 / (i as f64 + 1.0),
			})
			.collect()
	}

	fn args<'a>(
		fused: &'a [FusedCandidate],
		details: &'a HashMap<String, Vec<RouteContribution>>,
		snapshot: &'a CatalogSnapshot,
	) -> AssembleArgs<'a> {
		AssembleArgs {
			fused,
			route_details: details,
			snapshot,
			companies: &[],
			channels: &[],
			exclude_pid: None,
			limit: 100,
		}
	}

	#[test]
	fn keeps_fused_order_and_joins_catalog_metadata() {
		let snapshot = CatalogSnapshot::new(vec![
			record("p1", "平安", "线上"),
			record("p2", "人保", "线下"),
		]);
		let fused = fused(&["p2", "p1"]);
		let details = HashMap::new();
		let items = assemble(args(&fused, &details, &snapshot));
		let ids: Vec<&str> = items.iter().map(|item| item.product_id.as_str()).collect();

		assert_eq!(ids, vec!["p2", "p1"]);
		assert_eq!(items[0].company, "人保");
	}

	#[test]
	fn skips_the_query_product_itself() {
		let snapshot = CatalogSnapshot::new(vec![record("p1", "平安", "线上")]);
		let fused = fused(&["p1"]);
		let details = HashMap::new();
		let mut assemble_args = args(&fused, &details, &snapshot);

		assemble_args.exclude_pid = Some("p1");

		assert!(assemble(assemble_args).is_empty());
	}

	#[test]
	fn skips_ids_missing_from_the_catalog() {
		let snapshot = CatalogSnapshot::new(vec![record("p1", "平安", "线上")]);
		let fused = fused(&["ghost", "p1"]);
		let details = HashMap::new();
		let items = assemble(args(&fused, &details, &snapshot));

		assert_eq!(items.len(), 1);
		assert_eq!(items[0].product_id, "p1");
	}

	#[test]
	fn empty_allow_lists_filter_nothing() {
		let snapshot = CatalogSnapshot::new(vec![
			record("p1", "平安", "线上"),
			record("p2", "人保", "线下"),
		]);
		let fused = fused(&["p1", "p2"]);
		let details = HashMap::new();
		let items = assemble(args(&fused, &details, &snapshot));

		assert_eq!(items.len(), 2);
	}

	#[test]
	fn allow_lists_filter_on_company_and_channel() {
		let snapshot = CatalogSnapshot::new(vec![
			record("p1", "平安", "线上"),
			record("p2", "人保", "线下"),
			record("p3", "平安", "线下"),
		]);
		let fused = fused(&["p1", "p2", "p3"]);
		let details = HashMap::new();
		let companies = vec!["平安".to_string()];
		let channels = vec!["线下".to_string()];
		let mut assemble_args = args(&fused, &details, &snapshot);

		assemble_args.companies = &companies;
		assemble_args.channels = &channels;

		let items = assemble(assemble_args);

		assert_eq!(items.len(), 1);
		assert_eq!(items[0].product_id, "p3");
	}

	#[test]
	fn candidates_without_text_are_dropped() {
		let mut empty = record("p1", "平安", "线上");

		empty.labels = None;

		let snapshot = CatalogSnapshot::new(vec![empty]);
		let fused = fused(&["p1"]);
		let details = HashMap::new();

		assert!(assemble(args(&fused, &details, &snapshot)).is_empty());
	}

	#[test]
	fn stops_at_the_candidate_limit() {
		let snapshot = CatalogSnapshot::new(vec![
			record("p1", "平安", "线上"),
			record("p2", "人保", "线下"),
			record("p3", "太保", "线上"),
		]);
		let fused = fused(&["p1", "p2", "p3"]);
		let details = HashMap::new();
		let mut assemble_args = args(&fused, &details, &snapshot);

		assemble_args.limit = 2;

		assert_eq!(assemble(assemble_args).len(), 2);
	}
}

//! End-to-end pipeline behavior over in-memory fakes.

use std::sync::{Arc, atomic::Ordering};

use rival_service::{CompetitorQuery, Providers, SearchService, SearchStatus};
use rival_testkit::{
	FakeCatalog, FakeEmbedding, FakeExtractor, FakeIndex, FakeRerank, FakeSparse, index_docs_for,
	product_record, test_config,
};

struct Harness {
	service: SearchService,
	embedding: Arc<FakeEmbedding>,
	rerank: Arc<FakeRerank>,
	extractor: Arc<FakeExtractor>,
	index: Arc<FakeIndex>,
	catalog: Arc<FakeCatalog>,
}

fn harness(index: FakeIndex, catalog: FakeCatalog) -> Harness {
	let embedding = Arc::new(FakeEmbedding::default());
	let sparse = Arc::new(FakeSparse::default());
	let rerank = Arc::new(FakeRerank::default());
	let extractor = Arc::new(FakeExtractor::default());
	let index = Arc::new(index);
	let catalog = Arc::new(catalog);
	let providers = Providers::new(
		embedding.clone(),
		sparse.clone(),
		rerank.clone(),
		extractor.clone(),
	);
	let service =
		SearchService::new(test_config(), index.clone(), catalog.clone(), providers);

	Harness { service, embedding, rerank, extractor, index, catalog }
}

/// Three products in the 医疗险 track; `px` shares lexical overlap with the
/// scenario query, the other two do not.
fn medical_fixture() -> Harness {
	let records = vec![
		product_record(
			"px",
			"平安",
			"线上",
			"医疗险",
			r#"["质子重离子", "百万医疗"]"#,
			"质子重离子 百万医疗 住院垫付",
		),
		product_record("p2", "人保", "线下", "医疗险", r#"["意外保障"]"#, "骨折津贴 意外身故"),
		product_record("p3", "太保", "线上", "医疗险", r#"["定期寿险"]"#, "身故保障 定额给付"),
	];
	let docs = records.iter().flat_map(index_docs_for).collect();

	harness(FakeIndex::with_meta(docs), FakeCatalog::new(records))
}

fn scenario_query() -> CompetitorQuery {
	CompetitorQuery {
		product_id: String::new(),
		product_name: "新产品".to_string(),
		product_track: "医疗险".to_string(),
		product_info: "质子重离子 百万医疗".to_string(),
		selected_company: Vec::new(),
		selected_channel: Vec::new(),
		rerank_threshold: 0.3,
		max_results: 5,
	}
}

#[tokio::test]
async fn lexical_overlap_scenario_finds_the_matching_product() {
	let harness = medical_fixture();
	let envelope = harness.service.search_competitors(scenario_query()).await;

	assert_eq!(envelope.status, SearchStatus::Success);
	assert!(envelope.content.product_list.len() <= 5);
	assert!(envelope.content.product_list.contains(&"px".to_string()));
	assert_eq!(envelope.content.biz_dt, "2026-02-01 09:00:00");

	let scores: Vec<f32> =
		envelope.detail.candidates.iter().map(|item| item.rerank_score).collect();
	let mut sorted = scores.clone();

	sorted.sort_by(|a, b| b.total_cmp(a));

	assert_eq!(scores, sorted);

	for item in &envelope.detail.candidates {
		assert!(item.rerank_score >= 0.3);
		assert!(!item.routes.is_empty());
	}
}

#[tokio::test]
async fn unknown_track_yields_an_empty_success() {
	let harness = medical_fixture();
	let mut query = scenario_query();

	query.product_track = "养老险".to_string();

	let envelope = harness.service.search_competitors(query).await;

	assert_eq!(envelope.status, SearchStatus::Success);
	assert!(envelope.content.product_list.is_empty());
	assert!(envelope.detail.candidates.is_empty());
}

#[tokio::test]
async fn missing_product_name_fails_without_touching_the_pipeline() {
	let harness = medical_fixture();
	let mut query = scenario_query();

	query.product_name = String::new();

	let envelope = harness.service.search_competitors(query).await;

	assert_eq!(envelope.status, SearchStatus::Fail);
	assert!(envelope.fail_cause.contains("product_name"));
	assert_eq!(harness.embedding.calls.load(Ordering::SeqCst), 0);
	assert_eq!(harness.rerank.calls.load(Ordering::SeqCst), 0);
	assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 0);
	assert_eq!(harness.index.query_calls.load(Ordering::SeqCst), 0);
	assert_eq!(harness.catalog.load_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn catalog_product_id_bypasses_the_field_extractor() {
	let harness = medical_fixture();
	let mut query = scenario_query();

	query.product_id = "px".to_string();
	query.rerank_threshold = 0.0;

	let envelope = harness.service.search_competitors(query).await;

	assert_eq!(envelope.status, SearchStatus::Success);
	assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 0);

	let detail = envelope.detail.query.expect("query detail must be present");

	assert_eq!(detail.effective_pid.as_deref(), Some("px"));
	assert!(detail.parsed_fields.get("labels").is_some_and(|labels| !labels.is_empty()));
}

#[tokio::test]
async fn a_product_never_appears_in_its_own_results() {
	let harness = medical_fixture();
	let mut query = scenario_query();

	// Even with no threshold, the query's own product is excluded.
	query.product_id = "px".to_string();
	query.rerank_threshold = 0.0;

	let envelope = harness.service.search_competitors(query).await;

	assert_eq!(envelope.status, SearchStatus::Success);
	assert!(!envelope.content.product_list.contains(&"px".to_string()));

	for item in &envelope.detail.candidates {
		assert_ne!(item.product_id, "px");
	}
}

#[tokio::test]
async fn unknown_product_id_falls_back_to_the_extractor() {
	let harness = medical_fixture();
	let mut query = scenario_query();

	query.product_id = "ghost".to_string();

	let envelope = harness.service.search_competitors(query).await;

	assert_eq!(envelope.status, SearchStatus::Success);
	assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 1);
	assert_eq!(
		envelope.detail.query.expect("query detail must be present").effective_pid,
		None
	);
}

#[tokio::test]
async fn empty_allow_lists_filter_nothing() {
	let harness = medical_fixture();
	let unfiltered = harness.service.search_competitors(scenario_query()).await;
	let mut query = scenario_query();

	query.selected_company =
		vec!["平安".to_string(), "人保".to_string(), "太保".to_string()];

	let all_allowed = harness.service.search_competitors(query).await;

	assert_eq!(unfiltered.content.product_list, all_allowed.content.product_list);
}

#[tokio::test]
async fn company_allow_list_excludes_other_companies() {
	let harness = medical_fixture();
	let mut query = scenario_query();

	query.selected_company = vec!["人保".to_string()];

	let envelope = harness.service.search_competitors(query).await;

	assert_eq!(envelope.status, SearchStatus::Success);
	assert!(!envelope.content.product_list.contains(&"px".to_string()));
}

#[tokio::test]
async fn max_results_caps_the_product_list() {
	let harness = medical_fixture();
	let mut query = scenario_query();

	query.rerank_threshold = 0.0;
	query.max_results = 1;

	let envelope = harness.service.search_competitors(query).await;

	assert_eq!(envelope.status, SearchStatus::Success);
	assert_eq!(envelope.content.product_list.len(), 1);
}

#[tokio::test]
async fn identical_requests_are_served_from_the_response_cache() {
	let harness = medical_fixture();
	let first = harness.service.search_competitors(scenario_query()).await;
	let embed_calls = harness.embedding.calls.load(Ordering::SeqCst);
	let query_calls = harness.index.query_calls.load(Ordering::SeqCst);
	let rerank_calls = harness.rerank.calls.load(Ordering::SeqCst);
	let second = harness.service.search_competitors(scenario_query()).await;

	assert_eq!(
		serde_json::to_value(&first).expect("first envelope must serialize"),
		serde_json::to_value(&second).expect("second envelope must serialize"),
	);
	assert_eq!(harness.embedding.calls.load(Ordering::SeqCst), embed_calls);
	assert_eq!(harness.index.query_calls.load(Ordering::SeqCst), query_calls);
	assert_eq!(harness.rerank.calls.load(Ordering::SeqCst), rerank_calls);
}

#[tokio::test]
async fn route_memo_skips_repeated_index_queries() {
	let harness = medical_fixture();
	let first = harness.service.search_competitors(scenario_query()).await;

	assert_eq!(first.status, SearchStatus::Success);

	let query_calls = harness.index.query_calls.load(Ordering::SeqCst);
	let mut query = scenario_query();

	// Different response-cache key, identical route query.
	query.max_results = 7;

	let second = harness.service.search_competitors(query).await;

	assert_eq!(second.status, SearchStatus::Success);
	assert_eq!(harness.index.query_calls.load(Ordering::SeqCst), query_calls);
	assert_eq!(harness.rerank.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn a_failing_route_degrades_to_partial_results() {
	let records = vec![
		product_record(
			"px",
			"平安",
			"线上",
			"医疗险",
			r#"["质子重离子", "百万医疗"]"#,
			"质子重离子 百万医疗 住院垫付",
		),
		product_record("p2", "人保", "线下", "医疗险", r#"["意外保障"]"#, "骨折津贴"),
	];
	let docs = records.iter().flat_map(index_docs_for).collect::<Vec<_>>();
	let mut index = FakeIndex::with_meta(docs);

	index.fail_fields.insert("labels".to_string());

	let harness = harness(index, FakeCatalog::new(records));
	let mut query = scenario_query();

	// Catalog-sourced fields give a labels route (which fails) plus a
	// features route (which works).
	query.product_id = "px".to_string();
	query.rerank_threshold = 0.0;

	let envelope = harness.service.search_competitors(query).await;

	assert_eq!(envelope.status, SearchStatus::Success);
	assert_eq!(harness.index.query_calls.load(Ordering::SeqCst), 2);
	assert!(envelope.content.product_list.contains(&"p2".to_string()));
}

#[tokio::test]
async fn all_routes_failing_yields_an_empty_success() {
	let records = vec![product_record(
		"px",
		"平安",
		"线上",
		"医疗险",
		r#"["质子重离子"]"#,
		"质子重离子",
	)];
	let docs = records.iter().flat_map(index_docs_for).collect::<Vec<_>>();
	let mut index = FakeIndex::with_meta(docs);

	index.fail_fields.insert("labels".to_string());
	index.fail_fields.insert("features".to_string());

	let harness = harness(index, FakeCatalog::new(records));
	let mut query = scenario_query();

	query.product_id = "px".to_string();

	let envelope = harness.service.search_competitors(query).await;

	assert_eq!(envelope.status, SearchStatus::Success);
	assert!(envelope.content.product_list.is_empty());
	assert_eq!(harness.rerank.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_build_marker_degrades_to_a_warning() {
	let records = vec![product_record(
		"px",
		"平安",
		"线上",
		"医疗险",
		r#"["质子重离子"]"#,
		"质子重离子",
	)];
	let docs = records.iter().flat_map(index_docs_for).collect::<Vec<_>>();
	let index = FakeIndex { docs, meta: None, ..Default::default() };
	let harness = harness(index, FakeCatalog::new(records));
	let envelope = harness.service.search_competitors(scenario_query()).await;

	assert_eq!(envelope.status, SearchStatus::Success);
	assert!(!envelope.content.biz_dt.is_empty());
	assert!(
		envelope
			.content
			.warnings
			.iter()
			.any(|warning| warning == "meta_doc_not_found")
	);
}

#[tokio::test]
async fn index_status_reports_the_latest_build() {
	let harness = medical_fixture();
	let status = harness.service.index_status().await.expect("status must resolve");

	assert_eq!(status.task_status, "ready");
	assert_eq!(status.latest_finished_at, "2026-02-01 09:00:00");
	assert_eq!(status.task_id.as_deref(), Some("build-0001"));
	assert_eq!(status.row_count, Some(3));
}

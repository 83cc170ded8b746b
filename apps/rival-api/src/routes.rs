use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	routing::{get, post},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use rival_service::{CompetitorQuery, IndexStatus, ResponseEnvelope};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/search_competitors", post(search_competitors))
		.route("/v1/index/status", get(index_status))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

/// The search operation itself never errors; every outcome, including
/// validation failures, travels in the envelope.
async fn search_competitors(
	State(state): State<AppState>,
	Json(query): Json<CompetitorQuery>,
) -> Json<ResponseEnvelope> {
	Json(state.service.search_competitors(query).await)
}

#[derive(Debug, Serialize)]
pub struct StatusEnvelope {
	pub status: &'static str,
	#[serde(rename = "failCause")]
	pub fail_cause: String,
	pub content: Option<IndexStatus>,
}

async fn index_status(State(state): State<AppState>) -> Json<StatusEnvelope> {
	match state.service.index_status().await {
		Ok(content) => Json(StatusEnvelope {
			status: "SUCCESS",
			fail_cause: String::new(),
			content: Some(content),
		}),
		Err(err) => {
			tracing::warn!(error = %err, "Index status read failed.");

			Json(StatusEnvelope { status: "FAIL", fail_cause: err.to_string(), content: None })
		},
	}
}

//! Index freshness marker (`biz_dt`) resolution.
//!
//! Freshness is best-effort: an unreadable or missing marker degrades to the
//! current wall-clock time plus a warning and never blocks a search.

use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::SearchService;

const BIZ_DT_FORMAT: &[BorrowedFormatItem<'static>] =
	format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

#[derive(Clone, Debug)]
pub struct Freshness {
	pub biz_dt: String,
	pub warnings: Vec<String>,
}

pub(crate) fn now_biz_dt() -> String {
	OffsetDateTime::now_utc().format(&BIZ_DT_FORMAT).unwrap_or_default()
}

impl SearchService {
	pub(crate) async fn resolve_freshness(&self) -> Freshness {
		self.freshness_cache.get_with((), self.read_freshness()).await
	}

	async fn read_freshness(&self) -> Freshness {
		let mut warnings = Vec::new();
		let mut biz_dt = now_biz_dt();

		match self.index.latest_meta().await {
			Ok(Some(meta)) => match meta.ingest_dt {
				Some(ingest_dt) if !ingest_dt.trim().is_empty() => {
					biz_dt = ingest_dt.trim().to_string();
				},
				_ => warnings.push("meta_missing_ingest_dt".to_string()),
			},
			Ok(None) => warnings.push("meta_doc_not_found".to_string()),
			Err(err) => {
				tracing::warn!(error = %err, "Failed to read the index build marker.");
				warnings.push(format!("meta_read_failed:{err}"));
			},
		}

		Freshness { biz_dt, warnings }
	}
}

//! Source text-field resolution for a query.

use std::collections::BTreeMap;

use rival_domain::text::TEXT_FIELDS;

use crate::{CatalogSnapshot, SearchService, ServiceResult, search::NormalizedQuery};

pub(crate) struct SourceFields {
	/// The catalog id of the query's own product, when it resolved.
	pub effective_pid: Option<String>,
	pub fields: BTreeMap<String, String>,
}

impl SearchService {
	/// Fields come verbatim from the catalog when `product_id` resolves;
	/// they were parsed once at ingestion time and are not re-derived from
	/// free text. Only unresolved queries hit the field extractor.
	pub(crate) async fn resolve_source_fields(
		&self,
		query: &NormalizedQuery,
		snapshot: &CatalogSnapshot,
	) -> ServiceResult<SourceFields> {
		if let Some(product_id) = query.product_id.as_deref()
			&& let Some(record) = snapshot.get(product_id)
		{
			return Ok(SourceFields {
				effective_pid: Some(record.product_id.clone()),
				fields: record.text_fields(),
			});
		}

		let mut fields = self
			.providers
			.extractor
			.extract_fields(&self.cfg.providers.extractor, &query.product_info)
			.await?;

		for field in TEXT_FIELDS {
			fields.entry(field.to_string()).or_default();
		}

		Ok(SourceFields { effective_pid: None, fields })
	}
}

use std::collections::BTreeMap;

use rival_domain::text::TEXT_FIELDS;

/// One catalog row. Immutable per index build; everything except the key may
/// be missing in the backing table.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct ProductRecord {
	pub product_id: String,
	pub company: Option<String>,
	pub channel: Option<String>,
	pub product_name: Option<String>,
	pub track: Option<String>,
	pub labels: Option<String>,
	pub features: Option<String>,
	pub summary_coverage: Option<String>,
	pub summary_liability: Option<String>,
	pub summary_exclusions: Option<String>,
	pub summary_provisions: Option<String>,
	pub summary_services: Option<String>,
}

impl ProductRecord {
	pub fn company(&self) -> &str {
		trimmed(&self.company)
	}

	pub fn channel(&self) -> &str {
		trimmed(&self.channel)
	}

	pub fn product_name(&self) -> &str {
		trimmed(&self.product_name)
	}

	pub fn track(&self) -> &str {
		trimmed(&self.track)
	}

	/// Raw text fields keyed by field name, in the shape the normalizer and
	/// extractor output share.
	pub fn text_fields(&self) -> BTreeMap<String, String> {
		let mut fields = BTreeMap::new();

		for field in TEXT_FIELDS {
			let value = match field {
				"labels" => &self.labels,
				"features" => &self.features,
				"summary_coverage" => &self.summary_coverage,
				"summary_liability" => &self.summary_liability,
				"summary_exclusions" => &self.summary_exclusions,
				"summary_provisions" => &self.summary_provisions,
				"summary_services" => &self.summary_services,
				_ => &None,
			};

			fields.insert(field.to_string(), value.clone().unwrap_or_default());
		}

		fields
	}
}

fn trimmed(value: &Option<String>) -> &str {
	value.as_deref().unwrap_or("").trim()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn text_fields_cover_every_field() {
		let record = ProductRecord {
			product_id: "p1".to_string(),
			labels: Some("['a']".to_string()),
			..Default::default()
		};
		let fields = record.text_fields();

		assert_eq!(fields.len(), TEXT_FIELDS.len());
		assert_eq!(fields.get("labels").map(String::as_str), Some("['a']"));
		assert_eq!(fields.get("summary_services").map(String::as_str), Some(""));
	}

	#[test]
	fn accessors_trim_missing_values_to_empty() {
		let record = ProductRecord {
			product_id: "p1".to_string(),
			company: Some("  平安  ".to_string()),
			..Default::default()
		};

		assert_eq!(record.company(), "平安");
		assert_eq!(record.channel(), "");
	}
}

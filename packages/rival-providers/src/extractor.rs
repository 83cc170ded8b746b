use std::{collections::BTreeMap, time::Duration};

use reqwest::Client;
use serde_json::Value;

use rival_domain::text::TEXT_FIELDS;

use crate::{Error, Result};

/// Synthesizes the product text-field set from free text via the LLM backend.
///
/// Used only when a query carries no resolvable `product_id`; catalog rows
/// already store these fields from ingestion time.
pub async fn extract_fields(
	cfg: &rival_config::LlmProviderConfig,
	product_info: &str,
) -> Result<BTreeMap<String, String>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": build_extraction_messages(product_info),
	});

	for _ in 0..3 {
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		if let Ok(fields) = parse_extractor_response(json) {
			return Ok(fields);
		}
	}

	Err(Error::malformed("Extractor response is not valid JSON."))
}

fn build_extraction_messages(product_info: &str) -> Vec<Value> {
	let schema = serde_json::json!({
		"labels": ["string"],
		"features": ["string"],
		"summary_coverage": "string",
		"summary_liability": "string",
		"summary_exclusions": "string",
		"summary_provisions": "string",
		"summary_services": "string"
	});
	let schema_text = serde_json::to_string_pretty(&schema).unwrap_or_else(|_| schema.to_string());
	let system_prompt = "You are an insurance product analyst. \
Extract the requested fields from the product description. \
Output must be valid JSON only and must match the provided schema exactly. \
Do not add explanations or extra fields.";
	let user_prompt = format!(
		"Return JSON matching this exact schema:\n{schema_text}\nProduct description:\n{product_info}"
	);

	vec![
		serde_json::json!({ "role": "system", "content": system_prompt }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}

fn parse_extractor_response(json: Value) -> Result<BTreeMap<String, String>> {
	if let Some(content) = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
	{
		let parsed: Value = serde_json::from_str(content)
			.map_err(|_| Error::malformed("Extractor content is not valid JSON."))?;

		return Ok(fields_from_value(&parsed));
	}

	if json.is_object() {
		return Ok(fields_from_value(&json));
	}

	Err(Error::malformed("Extractor response is missing JSON content."))
}

/// Flattens extractor output to one string per known text field.
///
/// Arrays are re-serialized as JSON so the downstream list parser sees the
/// same shape catalog rows carry; unknown keys are dropped.
fn fields_from_value(value: &Value) -> BTreeMap<String, String> {
	let mut fields = BTreeMap::new();

	for field in TEXT_FIELDS {
		let raw = match value.get(field) {
			Some(Value::String(text)) => text.trim().to_string(),
			Some(Value::Array(items)) =>
				serde_json::to_string(items).unwrap_or_default(),
			Some(Value::Null) | None => String::new(),
			Some(other) => other.to_string(),
		};

		fields.insert(field.to_string(), raw);
	}

	fields
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_choice_content_json() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "{\"labels\": [\"a\"], \"summary_coverage\": \" x \"}" } }
			]
		});
		let fields = parse_extractor_response(json).expect("parse failed");

		assert_eq!(fields.get("labels").map(String::as_str), Some("[\"a\"]"));
		assert_eq!(fields.get("summary_coverage").map(String::as_str), Some("x"));
		assert_eq!(fields.get("features").map(String::as_str), Some(""));
	}

	#[test]
	fn every_text_field_is_present_in_output() {
		let fields = fields_from_value(&serde_json::json!({}));

		for field in TEXT_FIELDS {
			assert_eq!(fields.get(field).map(String::as_str), Some(""));
		}
	}

	#[test]
	fn non_json_content_is_rejected() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "not json" } }
			]
		});

		assert!(parse_extractor_response(json).is_err());
	}
}

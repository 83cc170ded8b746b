//! Normalization rules for the per-field product texts.
//!
//! Catalog rows and extractor output both carry raw field values; everything
//! downstream (sparse queries, rerank evidence) goes through these functions
//! so the two sources normalize identically.

use std::collections::BTreeMap;

use unicode_script::{Script, UnicodeScript};

/// Text fields of a product, in the fixed order used for combined text.
pub const TEXT_FIELDS: [&str; 7] = [
	"labels",
	"features",
	"summary_coverage",
	"summary_liability",
	"summary_exclusions",
	"summary_provisions",
	"summary_services",
];

/// Joiner for combined text. Full-width so CJK sentence boundaries survive.
pub const FIELD_JOINER: char = '。';

pub fn is_list_field(field: &str) -> bool {
	matches!(field, "labels" | "features")
}

/// Canonical query/evidence text for one field.
pub fn normalize_field_text(field: &str, raw: &str) -> String {
	if is_list_field(field) { parse_list_like(raw) } else { raw.trim().to_string() }
}

/// Flattens a textual list representation into a space-joined string.
///
/// Parsers are tried in priority order: JSON array, quoted literal list,
/// bracket/quote-stripped comma split. A value that never looked like a list,
/// or defeats every parser, comes back trimmed as-is.
pub fn parse_list_like(raw: &str) -> String {
	let trimmed = raw.trim();

	if trimmed.is_empty() {
		return String::new();
	}
	if !trimmed.starts_with('[') && !trimmed.starts_with('(') {
		return trimmed.to_string();
	}

	parse_json_list(trimmed)
		.or_else(|| parse_literal_list(trimmed))
		.or_else(|| parse_stripped_list(trimmed))
		.unwrap_or_else(|| trimmed.to_string())
}

/// Concatenates all non-empty normalized text fields in fixed field order.
pub fn combined_text(fields: &BTreeMap<String, String>) -> String {
	let mut parts = Vec::new();

	for field in TEXT_FIELDS {
		let value = fields.get(field).map(String::as_str).unwrap_or("");
		let normalized = normalize_field_text(field, value);

		if !normalized.is_empty() {
			parts.push(normalized);
		}
	}

	let mut out = String::new();

	for (i, part) in parts.iter().enumerate() {
		if i > 0 {
			out.push(FIELD_JOINER);
		}

		out.push_str(part);
	}

	out
}

pub fn is_han(ch: char) -> bool {
	ch.script() == Script::Han
}

fn parse_json_list(raw: &str) -> Option<String> {
	let value: serde_json::Value = serde_json::from_str(raw).ok()?;
	let items = value.as_array()?;
	let mut parts = Vec::with_capacity(items.len());

	for item in items {
		match item {
			serde_json::Value::String(text) => {
				let trimmed = text.trim();

				if !trimmed.is_empty() {
					parts.push(trimmed.to_string());
				}
			},
			serde_json::Value::Null => {},
			other => parts.push(other.to_string()),
		}
	}

	Some(parts.join(" "))
}

/// Parses `['a', 'b']` / `("a", "b")` style literal lists.
fn parse_literal_list(raw: &str) -> Option<String> {
	let mut chars = raw.chars().peekable();
	let open = chars.next()?;
	let close = match open {
		'[' => ']',
		'(' => ')',
		_ => return None,
	};
	let mut parts = Vec::new();
	let mut closed = false;

	loop {
		while matches!(chars.peek(), Some(ch) if ch.is_whitespace()) {
			chars.next();
		}

		match chars.peek() {
			None => return None,
			Some(&ch) if ch == close => {
				chars.next();

				closed = true;

				break;
			},
			Some(&quote) if quote == '\'' || quote == '"' => {
				chars.next();

				let mut item = String::new();
				let mut terminated = false;

				for ch in chars.by_ref() {
					if ch == quote {
						terminated = true;

						break;
					}

					item.push(ch);
				}

				if !terminated {
					return None;
				}

				let item = item.trim();

				if !item.is_empty() {
					parts.push(item.to_string());
				}
			},
			// Unquoted elements are not literal-list syntax; let the
			// stripped-split fallback have a go instead.
			Some(_) => return None,
		}

		while matches!(chars.peek(), Some(ch) if ch.is_whitespace()) {
			chars.next();
		}

		match chars.peek() {
			Some(',') => {
				chars.next();
			},
			Some(&ch) if ch == close => {},
			_ => {},
		}
	}

	if !closed || chars.next().is_some() {
		return None;
	}

	Some(parts.join(" "))
}

/// Last resort: strip brackets and quotes, split on commas.
fn parse_stripped_list(raw: &str) -> Option<String> {
	let inner = raw
		.trim_start_matches(['[', '('])
		.trim_end_matches([']', ')']);
	let parts: Vec<String> = inner
		.split(',')
		.map(|part| part.trim_matches(['\'', '"', ' ']).to_string())
		.filter(|part| !part.is_empty())
		.collect();

	if parts.is_empty() { None } else { Some(parts.join(" ")) }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn json_list_takes_priority() {
		assert_eq!(parse_list_like(r#"["重疾", "百万医疗"]"#), "重疾 百万医疗");
		assert_eq!(parse_list_like(r#"[1, 2]"#), "1 2");
	}

	#[test]
	fn literal_list_handles_single_quotes() {
		assert_eq!(parse_list_like("['质子重离子', '绿通服务']"), "质子重离子 绿通服务");
		assert_eq!(parse_list_like("('a', 'b')"), "a b");
	}

	#[test]
	fn stripped_split_handles_unquoted_elements() {
		assert_eq!(parse_list_like("[质子重离子, 百万医疗]"), "质子重离子 百万医疗");
	}

	#[test]
	fn non_list_values_pass_through_trimmed() {
		assert_eq!(parse_list_like("  免赔额1万  "), "免赔额1万");
		assert_eq!(parse_list_like(""), "");
	}

	#[test]
	fn unterminated_list_is_salvaged_by_stripped_split() {
		assert_eq!(parse_list_like("['a', 'b'"), "a b");
	}

	#[test]
	fn unparseable_bracket_soup_falls_back_to_raw() {
		assert_eq!(parse_list_like("[["), "[[");
	}

	#[test]
	fn scalar_fields_trim_only() {
		assert_eq!(normalize_field_text("summary_coverage", "  覆盖100种重疾  "), "覆盖100种重疾");
		assert_eq!(normalize_field_text("labels", "['a']"), "a");
	}

	#[test]
	fn combined_text_skips_empty_fields_and_keeps_order() {
		let mut fields = BTreeMap::new();

		fields.insert("labels".to_string(), r#"["a", "b"]"#.to_string());
		fields.insert("features".to_string(), String::new());
		fields.insert("summary_coverage".to_string(), "覆盖".to_string());

		assert_eq!(combined_text(&fields), "a b。覆盖");
	}

	#[test]
	fn combined_text_of_empty_map_is_empty() {
		assert_eq!(combined_text(&BTreeMap::new()), "");
	}
}

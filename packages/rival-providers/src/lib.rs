mod error;
pub mod embedding;
pub mod extractor;
pub mod rerank;
pub mod sparse;

pub use error::{Error, Result};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde_json::{Map, Value};

pub(crate) fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();
	let auth = format!("Bearer {api_key}")
		.parse()
		.map_err(|_| Error::Header { message: "api_key is not a valid header value.".to_string() })?;

	headers.insert(AUTHORIZATION, auth);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::Header {
				message: format!("Default header {key} must be a string."),
			});
		};
		let name = HeaderName::from_bytes(key.as_bytes())
			.map_err(|_| Error::Header { message: format!("Invalid header name {key}.") })?;
		let value = raw
			.parse()
			.map_err(|_| Error::Header { message: format!("Invalid value for header {key}.") })?;

		headers.insert(name, value);
	}

	Ok(headers)
}

//! File-backed BM25-style sparse encoder.
//!
//! The encoder is loaded once from a pre-trained artifact (vocabulary with
//! per-token vector indices and weights) and used read-only on the query
//! path. Training the artifact happens offline in the index-build pipeline.

use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;

use rival_domain::text::is_han;

use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct Artifact {
	tokens: HashMap<String, SparseTerm>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct SparseTerm {
	index: u32,
	weight: f32,
}

#[derive(Debug)]
pub struct SparseEncoder {
	tokens: HashMap<String, SparseTerm>,
}

impl SparseEncoder {
	pub fn load(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path)
			.map_err(|err| Error::Artifact { path: path.to_path_buf(), source: err })?;
		let artifact: Artifact = serde_json::from_str(&raw)
			.map_err(|err| Error::ArtifactFormat { path: path.to_path_buf(), source: err })?;

		Ok(Self { tokens: artifact.tokens })
	}

	/// Encodes a query into index-sorted `(index, value)` pairs.
	///
	/// Value is term frequency times the artifact weight; tokens outside the
	/// vocabulary contribute nothing. Index collisions between distinct
	/// tokens sum.
	pub fn encode(&self, text: &str) -> Vec<(u32, f32)> {
		let mut values: HashMap<u32, f32> = HashMap::new();

		for token in tokenize(text) {
			if let Some(term) = self.tokens.get(&token) {
				*values.entry(term.index).or_insert(0.0) += term.weight;
			}
		}

		let mut out: Vec<(u32, f32)> = values.into_iter().collect();

		out.sort_by_key(|(index, _)| *index);

		out
	}

	pub fn vocab_len(&self) -> usize {
		self.tokens.len()
	}
}

/// Lowercased ASCII alphanumeric words plus Han bigrams.
///
/// Runs of Han characters emit overlapping bigrams; a run of length one
/// emits the bare character.
pub fn tokenize(text: &str) -> Vec<String> {
	let mut out = Vec::new();
	let mut word = String::new();
	let mut han_run: Vec<char> = Vec::new();

	let flush_word = |word: &mut String, out: &mut Vec<String>| {
		if !word.is_empty() {
			out.push(std::mem::take(word));
		}
	};
	let flush_han = |run: &mut Vec<char>, out: &mut Vec<String>| {
		match run.len() {
			0 => {},
			1 => out.push(run[0].to_string()),
			_ =>
				for pair in run.windows(2) {
					out.push(pair.iter().collect());
				},
		}

		run.clear();
	};

	for ch in text.chars() {
		if ch.is_ascii_alphanumeric() {
			flush_han(&mut han_run, &mut out);
			word.push(ch.to_ascii_lowercase());
		} else if is_han(ch) {
			flush_word(&mut word, &mut out);
			han_run.push(ch);
		} else {
			flush_word(&mut word, &mut out);
			flush_han(&mut han_run, &mut out);
		}
	}

	flush_word(&mut word, &mut out);
	flush_han(&mut han_run, &mut out);

	out
}

#[cfg(test)]
mod tests {
	use std::{env, fs, path::PathBuf};

	use super::*;

	fn write_artifact(payload: &str) -> PathBuf {
		use std::sync::atomic::{AtomicU64, Ordering};

		static COUNTER: AtomicU64 = AtomicU64::new(0);

		let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
		let mut path = env::temp_dir();

		path.push(format!("rival_sparse_test_{}_{ordinal}.json", std::process::id()));
		fs::write(&path, payload).expect("Failed to write test artifact.");

		path
	}

	#[test]
	fn tokenizes_words_and_han_bigrams() {
		assert_eq!(tokenize("BM25 重离子"), vec!["bm25", "重离", "离子"]);
		assert_eq!(tokenize("险"), vec!["险"]);
		assert_eq!(tokenize("a-b"), vec!["a", "b"]);
	}

	#[test]
	fn encodes_known_tokens_and_skips_unknown() {
		let path = write_artifact(
			r#"{"tokens": {"重离": {"index": 3, "weight": 2.0}, "离子": {"index": 1, "weight": 1.5}}}"#,
		);
		let encoder = SparseEncoder::load(&path).expect("Artifact must load.");

		fs::remove_file(&path).expect("Failed to remove test artifact.");

		let encoded = encoder.encode("重离子 unknown");

		assert_eq!(encoded, vec![(1, 1.5), (3, 2.0)]);
	}

	#[test]
	fn repeated_tokens_accumulate() {
		let path = write_artifact(r#"{"tokens": {"险": {"index": 7, "weight": 0.5}}}"#);
		let encoder = SparseEncoder::load(&path).expect("Artifact must load.");

		fs::remove_file(&path).expect("Failed to remove test artifact.");

		assert_eq!(encoder.encode("险 险"), vec![(7, 1.0)]);
	}

	#[test]
	fn bad_artifact_reports_format_error() {
		let path = write_artifact("not json");
		let result = SparseEncoder::load(&path);

		fs::remove_file(&path).expect("Failed to remove test artifact.");

		assert!(matches!(result, Err(Error::ArtifactFormat { .. })));
	}
}

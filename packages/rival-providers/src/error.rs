pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Provider request failed: {0}")]
	Http(#[from] reqwest::Error),
	#[error("Invalid provider header: {message}")]
	Header { message: String },
	#[error("Malformed provider response: {message}")]
	Malformed { message: String },
	#[error("Failed to read sparse encoder artifact at {path:?}.")]
	Artifact { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to parse sparse encoder artifact at {path:?}.")]
	ArtifactFormat { path: std::path::PathBuf, source: serde_json::Error },
}

impl Error {
	pub fn malformed(message: impl Into<String>) -> Self {
		Self::Malformed { message: message.into() }
	}
}

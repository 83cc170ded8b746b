pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read config at {path:?}.")]
	Read { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to parse config at {path:?}.")]
	Parse { path: std::path::PathBuf, source: toml::de::Error },
	#[error("Invalid config: {message}")]
	Validation { message: String },
}

impl Error {
	pub(crate) fn invalid(message: impl Into<String>) -> Self {
		Self::Validation { message: message.into() }
	}
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure taxonomy of the search core.
///
/// `Clone` so a memoized route failure can be rethrown to every waiter
/// without ever being cached as a result.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ServiceError {
	#[error("Invalid query: {message}")]
	Validation { message: String },
	#[error("Dependency error: {message}")]
	Dependency { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Internal error: {message}")]
	Internal { message: String },
}

impl From<rival_providers::Error> for ServiceError {
	fn from(err: rival_providers::Error) -> Self {
		Self::Dependency { message: err.to_string() }
	}
}

impl From<rival_storage::Error> for ServiceError {
	fn from(err: rival_storage::Error) -> Self {
		match err {
			rival_storage::Error::NotFound(message) => Self::NotFound { message },
			other => Self::Dependency { message: other.to_string() },
		}
	}
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Forbidden: {message}")]
	Forbidden { message: String },
	#[error("Embedding error: {message}")]
	Embedding { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Index error: {message}")]
	Index { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Internal error: {message}")]
	Internal { message: String },
}
impl From<priorart_storage::Error> for Error {
	fn from(err: priorart_storage::Error) -> Self {
		match err {
			priorart_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			priorart_storage::Error::NotFound(message) => Self::NotFound { message },
			priorart_storage::Error::Signature(message) => Self::Forbidden { message },
			priorart_storage::Error::Qdrant(inner) => Self::Index { message: inner.to_string() },
			priorart_storage::Error::Io(inner) => Self::Storage { message: inner.to_string() },
			priorart_storage::Error::SerdeJson(inner) =>
				Self::Storage { message: inner.to_string() },
		}
	}
}

impl From<color_eyre::Report> for Error {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

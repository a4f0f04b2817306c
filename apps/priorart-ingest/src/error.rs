use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read {path:?}: {source}")]
	ReadFile { path: PathBuf, source: std::io::Error },
	#[error("Failed to write state file {path:?}: {source}")]
	WriteState { path: PathBuf, source: std::io::Error },
	#[error(transparent)]
	Storage(#[from] priorart_storage::Error),
	#[error(transparent)]
	Service(#[from] priorart_service::Error),
	#[error(transparent)]
	Domain(#[from] priorart_domain::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
}

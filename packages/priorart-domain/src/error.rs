pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Xml(#[from] roxmltree::Error),
	#[error("Patent document has no application or publication number.")]
	MissingId,
	#[error("Malformed CSV at line {line}: {message}")]
	Csv { line: usize, message: String },
	#[error("Invalid payload: {message}")]
	Payload { message: String },
}

//! Durable object storage for finished reports.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::fs;

use crate::{BoxFuture, Error, Result, signing::UrlSigner};

const META_DIR: &str = ".meta";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
	pub key: String,
	/// Size in bytes.
	pub size: u64,
	pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
	pub metadata: ObjectMetadata,
	pub bytes: Vec<u8>,
}

pub trait ObjectStore
where
	Self: Send + Sync,
{
	/// Writes are all-or-nothing; readers never observe a partial object.
	fn put<'a>(
		&'a self,
		key: &'a str,
		bytes: Vec<u8>,
		content_type: &'a str,
	) -> BoxFuture<'a, Result<()>>;

	fn metadata<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<ObjectMetadata>>>;

	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<StoredObject>>>;

	/// Time-limited download link for `key`.
	fn signed_url(&self, key: &str, now: OffsetDateTime) -> Result<String>;

	fn verify_signature(
		&self,
		key: &str,
		expires: i64,
		signature: &str,
		now: OffsetDateTime,
	) -> Result<()>;
}

/// Filesystem-backed store; objects live flat under `root`.
#[derive(Debug)]
pub struct LocalObjectStore {
	root: PathBuf,
	public_base_url: String,
	ttl_seconds: u64,
	signer: UrlSigner,
}
impl LocalObjectStore {
	pub fn new(cfg: &priorart_config::Reports) -> Self {
		Self {
			root: cfg.root.clone(),
			public_base_url: cfg.public_base_url.trim_end_matches('/').to_string(),
			ttl_seconds: cfg.signed_url_ttl_seconds,
			signer: UrlSigner::new(&cfg.signing_key),
		}
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn object_path(&self, key: &str) -> PathBuf {
		self.root.join(key)
	}

	fn meta_path(&self, key: &str) -> PathBuf {
		self.root.join(META_DIR).join(format!("{key}.json"))
	}

	async fn write_object(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
		validate_key(key)?;

		fs::create_dir_all(self.root.join(META_DIR)).await?;

		let metadata = ObjectMetadata {
			key: key.to_string(),
			size: bytes.len() as u64,
			content_type: content_type.to_string(),
		};

		// Sidecar first so a visible object always has its content type.
		write_atomic(&self.meta_path(key), &serde_json::to_vec(&metadata)?).await?;
		write_atomic(&self.object_path(key), &bytes).await?;

		tracing::debug!(key, size = metadata.size, "Object stored.");

		Ok(())
	}

	async fn read_metadata(&self, key: &str) -> Result<Option<ObjectMetadata>> {
		validate_key(key)?;

		let size = match fs::metadata(self.object_path(key)).await {
			Ok(meta) if meta.is_file() => meta.len(),
			Ok(_) => return Ok(None),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(err) => return Err(err.into()),
		};
		let content_type = match fs::read(self.meta_path(key)).await {
			Ok(raw) => serde_json::from_slice::<ObjectMetadata>(&raw)?.content_type,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound =>
				DEFAULT_CONTENT_TYPE.to_string(),
			Err(err) => return Err(err.into()),
		};

		Ok(Some(ObjectMetadata { key: key.to_string(), size, content_type }))
	}

	async fn read_object(&self, key: &str) -> Result<Option<StoredObject>> {
		let Some(metadata) = self.read_metadata(key).await? else {
			return Ok(None);
		};
		let bytes = match fs::read(self.object_path(key)).await {
			Ok(bytes) => bytes,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(err) => return Err(err.into()),
		};

		let metadata = ObjectMetadata { size: bytes.len() as u64, ..metadata };

		Ok(Some(StoredObject { metadata, bytes }))
	}
}
impl ObjectStore for LocalObjectStore {
	fn put<'a>(
		&'a self,
		key: &'a str,
		bytes: Vec<u8>,
		content_type: &'a str,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.write_object(key, bytes, content_type))
	}

	fn metadata<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<ObjectMetadata>>> {
		Box::pin(self.read_metadata(key))
	}

	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<StoredObject>>> {
		Box::pin(self.read_object(key))
	}

	fn signed_url(&self, key: &str, now: OffsetDateTime) -> Result<String> {
		validate_key(key)?;

		let (expires, signature) = self.signer.sign_for(key, now, self.ttl_seconds);

		Ok(format!(
			"{}/reports/{key}?expires={expires}&signature={signature}",
			self.public_base_url
		))
	}

	fn verify_signature(
		&self,
		key: &str,
		expires: i64,
		signature: &str,
		now: OffsetDateTime,
	) -> Result<()> {
		validate_key(key)?;

		self.signer.verify(key, expires, signature, now)
	}
}

/// Keys are flat file names: ASCII alphanumerics plus `.`, `_`, `-`, never starting with `.`.
pub fn validate_key(key: &str) -> Result<()> {
	if key.is_empty() {
		return Err(Error::InvalidArgument("object key must be non-empty".to_string()));
	}
	if key.starts_with('.') || key.contains("..") {
		return Err(Error::InvalidArgument(format!("object key {key:?} is not allowed")));
	}
	if !key.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-')) {
		return Err(Error::InvalidArgument(format!("object key {key:?} has invalid characters")));
	}

	Ok(())
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
	let file_name = path
		.file_name()
		.and_then(|name| name.to_str())
		.ok_or_else(|| Error::InvalidArgument(format!("invalid object path {path:?}")))?;
	let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

	fs::write(&tmp, bytes).await?;

	if let Err(err) = fs::rename(&tmp, path).await {
		let _ = fs::remove_file(&tmp).await;

		return Err(err.into());
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_traversal_and_hidden_keys() {
		assert!(validate_key("3f0c_report.csv").is_ok());
		assert!(validate_key("").is_err());
		assert!(validate_key(".meta").is_err());
		assert!(validate_key("a..b").is_err());
		assert!(validate_key("../etc/passwd").is_err());
		assert!(validate_key("dir/file.csv").is_err());
		assert!(validate_key("spa ce.csv").is_err());
	}
}

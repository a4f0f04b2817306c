mod error;

pub use error::{Error, Result};

use std::{
	collections::HashMap,
	env,
	path::{Path, PathBuf},
	sync::{
		Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use qdrant_client::{Qdrant, qdrant::CollectionExistsRequest};
use serde_json::{Map, Value};
use tokio::time;
use uuid::Uuid;

use priorart_storage::{
	BoxFuture,
	index::{IndexPoint, Metric, ScoredPayload, VectorIndex},
};

pub const TEST_VECTOR_DIM: u32 = 4;
pub const TEST_AUTH_TOKEN: &str = "test-internal-token";

/// Temporary directory removed on drop.
pub struct ScratchDir {
	path: PathBuf,
}
impl ScratchDir {
	pub fn new(prefix: &str) -> Result<Self> {
		let path = env::temp_dir().join(format!("{prefix}-{}", Uuid::new_v4().simple()));

		std::fs::create_dir_all(&path)?;

		Ok(Self { path })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
		self.path.join(relative)
	}

	/// Writes `contents` to `relative`, creating parent directories.
	pub fn write(&self, relative: impl AsRef<Path>, contents: &str) -> Result<PathBuf> {
		let path = self.path.join(relative);

		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}

		std::fs::write(&path, contents)?;

		Ok(path)
	}
}
impl Drop for ScratchDir {
	fn drop(&mut self) {
		if let Err(err) = std::fs::remove_dir_all(&self.path) {
			eprintln!("Scratch dir cleanup failed for {:?}: {err}.", self.path);
		}
	}
}

#[derive(Debug, Clone)]
struct StoredPoint {
	vector: Vec<f32>,
	payload: Map<String, Value>,
}

/// In-process [`VectorIndex`] with cosine ranking and call counters.
#[derive(Debug, Default)]
pub struct MemoryIndex {
	collections: Mutex<HashMap<String, (u32, HashMap<String, StoredPoint>)>>,
	upsert_calls: AtomicUsize,
	pass_upserts: AtomicUsize,
	fail_upserts: AtomicUsize,
}
impl MemoryIndex {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn upsert_calls(&self) -> usize {
		self.upsert_calls.load(Ordering::SeqCst)
	}

	/// Makes the next `count` upserts fail.
	pub fn fail_next_upserts(&self, count: usize) {
		self.fail_upserts_after(0, count);
	}

	/// Lets `pass` upserts through, then fails the following `count`.
	pub fn fail_upserts_after(&self, pass: usize, count: usize) {
		self.pass_upserts.store(pass, Ordering::SeqCst);
		self.fail_upserts.store(count, Ordering::SeqCst);
	}

	pub fn point_count(&self, collection: &str) -> usize {
		let collections = self.collections.lock().unwrap_or_else(|err| err.into_inner());

		collections.get(collection).map(|(_, points)| points.len()).unwrap_or(0)
	}

	pub fn payload(&self, collection: &str, key: &str) -> Option<Map<String, Value>> {
		let collections = self.collections.lock().unwrap_or_else(|err| err.into_inner());

		collections.get(collection)?.1.get(key).map(|point| point.payload.clone())
	}

	/// Seeds a point directly, bypassing the upsert counter.
	pub fn insert(&self, collection: &str, point: IndexPoint) {
		let mut collections = self.collections.lock().unwrap_or_else(|err| err.into_inner());
		let dim = point.vector.len() as u32;
		let (_, points) =
			collections.entry(collection.to_string()).or_insert_with(|| (dim, HashMap::new()));

		points.insert(point.key, StoredPoint { vector: point.vector, payload: point.payload });
	}

	fn take_failure(&self) -> bool {
		if self.fail_upserts.load(Ordering::SeqCst) == 0 {
			return false;
		}
		if self
			.pass_upserts
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
			.is_ok()
		{
			return false;
		}

		self.fail_upserts
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
			.is_ok()
	}
}
impl VectorIndex for MemoryIndex {
	fn collection_exists<'a>(
		&'a self,
		collection: &'a str,
	) -> BoxFuture<'a, priorart_storage::Result<bool>> {
		let exists = self
			.collections
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.contains_key(collection);

		Box::pin(async move { Ok(exists) })
	}

	fn create_collection<'a>(
		&'a self,
		collection: &'a str,
		dim: u32,
		_metric: Metric,
	) -> BoxFuture<'a, priorart_storage::Result<()>> {
		self.collections
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.insert(collection.to_string(), (dim, HashMap::new()));

		Box::pin(async move { Ok(()) })
	}

	fn delete_collection<'a>(
		&'a self,
		collection: &'a str,
	) -> BoxFuture<'a, priorart_storage::Result<()>> {
		self.collections.lock().unwrap_or_else(|err| err.into_inner()).remove(collection);

		Box::pin(async move { Ok(()) })
	}

	fn upsert<'a>(
		&'a self,
		collection: &'a str,
		points: Vec<IndexPoint>,
	) -> BoxFuture<'a, priorart_storage::Result<()>> {
		self.upsert_calls.fetch_add(1, Ordering::SeqCst);

		let result = if self.take_failure() {
			Err(priorart_storage::Error::InvalidArgument("Injected upsert failure.".to_string()))
		} else {
			let mut collections = self.collections.lock().unwrap_or_else(|err| err.into_inner());

			match collections.get_mut(collection) {
				Some((dim, stored)) => {
					let mut result = Ok(());

					for point in points {
						if point.vector.len() != *dim as usize {
							result = Err(priorart_storage::Error::InvalidArgument(format!(
								"Vector for {} has dimension {}, expected {dim}.",
								point.key,
								point.vector.len()
							)));

							break;
						}

						stored.insert(
							point.key,
							StoredPoint { vector: point.vector, payload: point.payload },
						);
					}

					result
				},
				None => Err(priorart_storage::Error::NotFound(format!(
					"Collection {collection} does not exist."
				))),
			}
		};

		Box::pin(async move { result })
	}

	fn search<'a>(
		&'a self,
		collection: &'a str,
		vector: Vec<f32>,
		limit: u64,
	) -> BoxFuture<'a, priorart_storage::Result<Vec<ScoredPayload>>> {
		let collections = self.collections.lock().unwrap_or_else(|err| err.into_inner());
		let mut hits: Vec<ScoredPayload> = collections
			.get(collection)
			.map(|(_, points)| {
				points
					.values()
					.map(|point| ScoredPayload {
						payload: point.payload.clone(),
						score: cosine(&vector, &point.vector),
					})
					.collect()
			})
			.unwrap_or_default();

		drop(collections);

		hits.sort_by(|a, b| b.score.total_cmp(&a.score));
		hits.truncate(limit as usize);

		Box::pin(async move { Ok(hits) })
	}
}

/// Fully populated config for tests; no network endpoint in it is expected to answer.
pub fn sample_config(reports_root: &Path, corpus_root: &Path) -> priorart_config::Config {
	use priorart_config::{
		Config, EmbeddingProviderConfig, Ingest, Jobs, LlmProviderConfig, Providers, Qdrant,
		Reports, Search, Security, Service, Storage,
	};

	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage {
			qdrant: Qdrant {
				url: "http://127.0.0.1:6334".to_string(),
				collection: "uspto_patents_test".to_string(),
				vector_dim: TEST_VECTOR_DIM,
			},
			reports: Reports {
				root: reports_root.to_path_buf(),
				public_base_url: "http://127.0.0.1:8080".to_string(),
				signing_key: "test-signing-key".to_string(),
				signed_url_ttl_seconds: 3_600,
			},
		},
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "test-embedding".to_string(),
				dimensions: TEST_VECTOR_DIM,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			scorer: LlmProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/chat/completions".to_string(),
				model: "test-scorer".to_string(),
				temperature: 0.0,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		ingest: Ingest {
			corpus_root: corpus_root.to_path_buf(),
			state_file: ".ingestion-state.json".to_string(),
			extensions: vec!["xml".to_string()],
			batch_size: 50,
			checkpoint_interval: 100,
			max_embed_chars: 5_000,
			embedding_retries: 0,
			progress_every: 500,
		},
		search: Search::default(),
		jobs: Jobs {
			search_url: "http://127.0.0.1:9/search".to_string(),
			dispatch_timeout_ms: 1_000,
		},
		security: Security { internal_auth_token: TEST_AUTH_TOKEN.to_string() },
	}
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("PRIORART_QDRANT_URL").ok().filter(|value| !value.trim().is_empty())
}

pub fn unique_collection_name(prefix: &str) -> String {
	format!("{prefix}_{}", Uuid::new_v4().simple())
}

/// Best-effort removal of a test collection, retrying with backoff.
pub async fn cleanup_qdrant_collection(qdrant_url: &str, collection: &str) -> Result<()> {
	let client = Qdrant::from_url(qdrant_url)
		.build()
		.map_err(|err| Error::Message(format!("Failed to build Qdrant client: {err}.")))?;
	let max_attempts = 4;
	let mut backoff = Duration::from_millis(100);

	for attempt in 1..=max_attempts {
		let request = CollectionExistsRequest { collection_name: collection.to_string() };

		if !client.collection_exists(request).await? {
			return Ok(());
		}

		match client.delete_collection(collection.to_string()).await {
			Ok(_) => return Ok(()),
			Err(err) if attempt == max_attempts => return Err(err.into()),
			Err(_) => {},
		}

		time::sleep(backoff).await;

		backoff = backoff.saturating_mul(2);
	}

	Ok(())
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

	if norm_a == 0.0 || norm_b == 0.0 { 0.0 } else { dot / (norm_a * norm_b) }
}

#[cfg(test)]
mod tests {
	use super::*;

	fn point(key: &str, vector: Vec<f32>) -> IndexPoint {
		let mut payload = Map::new();

		payload.insert("id".to_string(), Value::String(key.to_string()));

		IndexPoint { key: key.to_string(), vector, payload }
	}

	#[tokio::test]
	async fn memory_index_ranks_by_cosine_and_overwrites_by_key() {
		let index = MemoryIndex::new();

		index.create_collection("c", 2, Metric::Cosine).await.expect("create failed");
		index
			.upsert("c", vec![point("a", vec![1.0, 0.0]), point("b", vec![0.0, 1.0])])
			.await
			.expect("upsert failed");
		index.upsert("c", vec![point("a", vec![1.0, 0.0])]).await.expect("upsert failed");

		assert_eq!(index.point_count("c"), 2);
		assert_eq!(index.upsert_calls(), 2);

		let hits = index.search("c", vec![0.9, 0.1], 1).await.expect("search failed");

		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].payload.get("id"), Some(&Value::String("a".to_string())));
	}

	#[tokio::test]
	async fn injected_failures_are_consumed() {
		let index = MemoryIndex::new();

		index.create_collection("c", 2, Metric::Cosine).await.expect("create failed");
		index.fail_next_upserts(1);

		assert!(index.upsert("c", vec![point("a", vec![1.0, 0.0])]).await.is_err());
		assert!(index.upsert("c", vec![point("a", vec![1.0, 0.0])]).await.is_ok());

		index.fail_upserts_after(1, 1);

		assert!(index.upsert("c", vec![point("b", vec![0.0, 1.0])]).await.is_ok());
		assert!(index.upsert("c", vec![point("c", vec![1.0, 1.0])]).await.is_err());
		assert!(index.upsert("c", vec![point("c", vec![1.0, 1.0])]).await.is_ok());
		assert_eq!(index.point_count("c"), 3);
	}
}

pub mod embedder;
pub mod jobs;
pub mod report;
pub mod search;

mod error;

pub use embedder::Embedder;
pub use error::{Error, Result};
pub use jobs::{CreateJobRequest, CreateJobResponse, JobState, JobStatus, StatusRequest};
pub use search::{SearchRequest, SearchResponse};

use std::{future::Future, pin::Pin, sync::Arc};

use reqwest::Client;

use priorart_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use priorart_providers::{embedding, scorer};
use priorart_storage::{index::VectorIndex, object::ObjectStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait ScorerProvider
where
	Self: Send + Sync,
{
	/// Raw completion text for a single-turn prompt.
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		prompt: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub scorer: Arc<dyn ScorerProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, scorer: Arc<dyn ScorerProvider>) -> Self {
		Self { embedding, scorer }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), scorer: provider }
	}
}

/// Process-wide context for the serve-time path.
pub struct PriorArtService {
	pub cfg: Config,
	pub index: Arc<dyn VectorIndex>,
	pub reports: Arc<dyn ObjectStore>,
	pub providers: Providers,
	pub embedder: Embedder,
	/// Shared by every job dispatch; timeouts are set per request.
	pub dispatch_client: Client,
}
impl PriorArtService {
	pub fn new(cfg: Config, index: Arc<dyn VectorIndex>, reports: Arc<dyn ObjectStore>) -> Self {
		Self::with_providers(cfg, index, reports, Providers::default())
	}

	pub fn with_providers(
		cfg: Config,
		index: Arc<dyn VectorIndex>,
		reports: Arc<dyn ObjectStore>,
		providers: Providers,
	) -> Self {
		let embedder = Embedder::new(providers.embedding.clone(), &cfg);

		Self { cfg, index, reports, providers, embedder, dispatch_client: Client::new() }
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}
impl ScorerProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		prompt: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(scorer::generate(cfg, prompt))
	}
}

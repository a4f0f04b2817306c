use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub ingest: Ingest,
	#[serde(default)]
	pub search: Search,
	pub jobs: Jobs,
	pub security: Security,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
	pub reports: Reports,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

/// Durable report storage. Reports double as the job-status ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct Reports {
	pub root: PathBuf,
	/// Base URL that signed download links are minted against, e.g. "http://127.0.0.1:8080".
	pub public_base_url: String,
	pub signing_key: String,
	#[serde(default = "default_signed_url_ttl_seconds")]
	pub signed_url_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub scorer: LlmProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ingest {
	pub corpus_root: PathBuf,
	#[serde(default = "default_state_file")]
	pub state_file: String,
	#[serde(default = "default_extensions")]
	pub extensions: Vec<String>,
	#[serde(default = "default_batch_size")]
	pub batch_size: u32,
	#[serde(default = "default_checkpoint_interval")]
	pub checkpoint_interval: u32,
	#[serde(default = "default_max_embed_chars")]
	pub max_embed_chars: u32,
	#[serde(default = "default_embedding_retries")]
	pub embedding_retries: u32,
	#[serde(default = "default_progress_every")]
	pub progress_every: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	pub default_top_k: u32,
	pub max_top_k: u32,
	/// Upper bound on in-flight scorer calls for one search.
	pub scorer_concurrency: u32,
	pub description_max_chars: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			default_top_k: 100,
			max_top_k: 500,
			scorer_concurrency: 4,
			description_max_chars: 1_000,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Jobs {
	/// Endpoint that receives fire-and-forget search triggers, e.g. "http://127.0.0.1:8080/search".
	pub search_url: String,
	#[serde(default = "default_dispatch_timeout_ms")]
	pub dispatch_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Security {
	pub internal_auth_token: String,
}

fn default_signed_url_ttl_seconds() -> u64 {
	3_600
}

fn default_state_file() -> String {
	".ingestion-state.json".to_string()
}

fn default_extensions() -> Vec<String> {
	vec!["xml".to_string()]
}

fn default_batch_size() -> u32 {
	50
}

fn default_checkpoint_interval() -> u32 {
	100
}

fn default_max_embed_chars() -> u32 {
	5_000
}

fn default_embedding_retries() -> u32 {
	3
}

fn default_progress_every() -> u64 {
	500
}

fn default_dispatch_timeout_ms() -> u64 {
	600_000
}

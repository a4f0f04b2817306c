use std::sync::Arc;

use priorart_service::PriorArtService;
use priorart_storage::{object::LocalObjectStore, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<PriorArtService>,
}
impl AppState {
	/// Connects collaborators and refuses to start if the embedder is unreachable.
	pub async fn new(config: priorart_config::Config) -> color_eyre::Result<Self> {
		let index = QdrantStore::new(&config.storage.qdrant)?;
		let reports = LocalObjectStore::new(&config.storage.reports);

		tokio::fs::create_dir_all(reports.root()).await?;

		let service = PriorArtService::new(config, Arc::new(index), Arc::new(reports));

		service.embedder.probe().await?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: PriorArtService) -> Self {
		Self { service: Arc::new(service) }
	}
}

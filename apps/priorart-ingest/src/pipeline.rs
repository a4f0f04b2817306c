//! Corpus walk, extraction, embedding, and upsert with checkpointed progress.

use std::{
	future::Future,
	path::{Path, PathBuf},
	sync::Arc,
};

use serde::Serialize;
use time::OffsetDateTime;
use walkdir::WalkDir;

use priorart_config::Config;
use priorart_domain::{PatentRecord, extract};
use priorart_service::Embedder;
use priorart_storage::index::{IndexPoint, Metric, VectorIndex};

use crate::{Error, Result, checkpoint::IngestionState};

/// Process-wide context for one ingestion run.
pub struct IngestContext {
	pub cfg: Config,
	pub index: Arc<dyn VectorIndex>,
	pub embedder: Embedder,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
	pub files_seen: usize,
	/// Already checkpointed by an earlier run.
	pub files_skipped: usize,
	pub files_processed: usize,
	pub files_failed: usize,
	pub records_upserted: u64,
	/// Documents or records the extractor could not parse.
	pub records_skipped: u64,
	pub interrupted: bool,
}

struct FileOutcome {
	records_upserted: u64,
	records_skipped: u64,
}

#[derive(Default)]
struct Progress {
	records: u64,
	next_log: u64,
}

impl IngestContext {
	pub fn new(cfg: Config, index: Arc<dyn VectorIndex>, embedder: Embedder) -> Self {
		Self { cfg, index, embedder }
	}

	pub fn state_path(&self) -> PathBuf {
		self.cfg.ingest.corpus_root.join(&self.cfg.ingest.state_file)
	}

	/// Runs until every pending file is attempted or `shutdown` resolves. On shutdown the state is
	/// flushed as of the last completed file and the in-flight file stays pending.
	pub async fn run<F>(&self, fresh: bool, shutdown: F) -> Result<IngestReport>
	where
		F: Future<Output = ()>,
	{
		let state_path = self.state_path();
		let now = OffsetDateTime::now_utc();
		let mut state = if fresh {
			tracing::info!(path = %state_path.display(), "Discarding previous ingestion state.");

			IngestionState::new(now)
		} else {
			IngestionState::load(&state_path, now)
		};

		self.ensure_collection(&mut state, &state_path).await?;

		let files = enumerate_files(
			&self.cfg.ingest.corpus_root,
			&self.cfg.ingest.extensions,
			&self.cfg.ingest.state_file,
		);
		let mut report = IngestReport { files_seen: files.len(), ..IngestReport::default() };
		let pending: Vec<String> =
			files.into_iter().filter(|file| !state.is_processed(file)).collect();

		report.files_skipped = report.files_seen - pending.len();

		tracing::info!(
			files_seen = report.files_seen,
			files_skipped = report.files_skipped,
			pending = pending.len(),
			"Starting ingestion."
		);

		let checkpoint_interval = self.cfg.ingest.checkpoint_interval.max(1) as usize;
		let mut since_checkpoint = 0_usize;
		let mut progress = Progress {
			records: 0,
			next_log: self.cfg.ingest.progress_every.max(1),
		};

		tokio::pin!(shutdown);

		for file in pending {
			let outcome = tokio::select! {
				biased;
				_ = &mut shutdown => {
					tracing::warn!(file = %file, "Shutdown requested. Flushing checkpoint.");

					report.interrupted = true;

					break;
				},
				outcome = self.process_file(&file, &mut progress) => outcome,
			};

			match outcome {
				Ok(outcome) => {
					state.mark_processed(&file, outcome.records_upserted);

					report.files_processed += 1;
					report.records_upserted += outcome.records_upserted;
					report.records_skipped += outcome.records_skipped;
					since_checkpoint += 1;

					if since_checkpoint >= checkpoint_interval {
						state.save(&state_path, OffsetDateTime::now_utc())?;

						since_checkpoint = 0;
					}
				},
				Err(err) => {
					tracing::error!(file = %file, error = %err, "File failed. It stays pending.");

					report.files_failed += 1;
				},
			}
		}

		state.save(&state_path, OffsetDateTime::now_utc())?;

		tracing::info!(
			files_processed = report.files_processed,
			files_failed = report.files_failed,
			records_upserted = report.records_upserted,
			records_skipped = report.records_skipped,
			total_records = state.total_records_processed,
			interrupted = report.interrupted,
			"Ingestion finished."
		);

		Ok(report)
	}

	/// Recreates the collection unless an earlier run already did.
	async fn ensure_collection(
		&self,
		state: &mut IngestionState,
		state_path: &Path,
	) -> Result<()> {
		let collection = &self.cfg.storage.qdrant.collection;

		if state.collection_initialized {
			tracing::info!(collection = %collection, "Reusing initialized collection.");

			return Ok(());
		}

		self.index.delete_collection(collection).await?;
		self.index
			.create_collection(collection, self.cfg.storage.qdrant.vector_dim, Metric::Cosine)
			.await?;

		state.reset_progress();
		state.collection_initialized = true;
		state.save(state_path, OffsetDateTime::now_utc())?;

		tracing::info!(collection = %collection, "Collection initialized.");

		Ok(())
	}

	async fn process_file(&self, file: &str, progress: &mut Progress) -> Result<FileOutcome> {
		let path = self.cfg.ingest.corpus_root.join(file);
		let bytes = tokio::fs::read(&path)
			.await
			.map_err(|source| Error::ReadFile { path: path.clone(), source })?;
		let content = String::from_utf8_lossy(&bytes);
		let extraction = extract::extract_records(&content);
		let batch_size = self.cfg.ingest.batch_size.max(1) as usize;
		let mut upserted = 0_u64;

		for batch in extraction.records.chunks(batch_size) {
			self.upsert_batch(batch).await?;

			upserted += batch.len() as u64;
			progress.records += batch.len() as u64;

			if progress.records >= progress.next_log {
				tracing::info!(records = progress.records, file = %file, "Ingestion progress.");

				while progress.next_log <= progress.records {
					progress.next_log += self.cfg.ingest.progress_every.max(1);
				}
			}
		}

		tracing::debug!(
			file = %file,
			records = upserted,
			skipped = extraction.skipped,
			"File ingested."
		);

		Ok(FileOutcome {
			records_upserted: upserted,
			records_skipped: extraction.skipped as u64,
		})
	}

	async fn upsert_batch(&self, batch: &[PatentRecord]) -> Result<()> {
		let texts: Vec<String> = batch.iter().map(PatentRecord::embedding_text).collect();
		let vectors = self.embedder.embed_batch(&texts).await?;
		let mut points = Vec::with_capacity(batch.len());

		for (record, vector) in batch.iter().zip(vectors) {
			let payload = record.to_payload()?;

			points.push(IndexPoint { key: record.id.clone(), vector, payload });
		}

		self.index.upsert(&self.cfg.storage.qdrant.collection, points).await?;

		Ok(())
	}
}

/// Corpus-relative paths (with `/` separators) of matching files, sorted.
pub fn enumerate_files(root: &Path, extensions: &[String], state_file: &str) -> Vec<String> {
	let mut files = Vec::new();

	for entry in WalkDir::new(root).follow_links(true) {
		let entry = match entry {
			Ok(entry) => entry,
			Err(err) => {
				tracing::warn!(error = %err, "Skipping unreadable corpus entry.");

				continue;
			},
		};

		if !entry.file_type().is_file() {
			continue;
		}

		let matches = entry
			.path()
			.extension()
			.and_then(|ext| ext.to_str())
			.is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)));

		if !matches {
			continue;
		}

		let Ok(relative) = entry.path().strip_prefix(root) else {
			continue;
		};
		let relative = relative
			.components()
			.map(|part| part.as_os_str().to_string_lossy().into_owned())
			.collect::<Vec<_>>()
			.join("/");

		if relative != state_file {
			files.push(relative);
		}
	}

	files.sort();

	files
}

//! Durable, resumable ingestion progress.

use std::{
	collections::BTreeSet,
	path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionState {
	/// Corpus-relative paths whose records were all upserted.
	pub processed_files: BTreeSet<String>,
	pub last_processed_file: Option<String>,
	pub total_records_processed: u64,
	pub collection_initialized: bool,
	#[serde(with = "rfc3339")]
	pub start_time: OffsetDateTime,
	#[serde(default, with = "rfc3339::option")]
	pub last_checkpoint_time: Option<OffsetDateTime>,
}
impl IngestionState {
	pub fn new(now: OffsetDateTime) -> Self {
		Self {
			processed_files: BTreeSet::new(),
			last_processed_file: None,
			total_records_processed: 0,
			collection_initialized: false,
			start_time: now,
			last_checkpoint_time: None,
		}
	}

	/// Missing or unreadable state starts over from an empty state.
	pub fn load(path: &Path, now: OffsetDateTime) -> Self {
		let raw = match std::fs::read(path) {
			Ok(raw) => raw,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Self::new(now),
			Err(err) => {
				tracing::warn!(
					path = %path.display(),
					error = %err,
					"State file unreadable. Starting fresh."
				);

				return Self::new(now);
			},
		};

		match serde_json::from_slice(&raw) {
			Ok(state) => state,
			Err(err) => {
				tracing::warn!(
					path = %path.display(),
					error = %err,
					"State file corrupt. Starting fresh."
				);

				Self::new(now)
			},
		}
	}

	/// Stamps the checkpoint time and replaces `path` atomically.
	pub fn save(&mut self, path: &Path, now: OffsetDateTime) -> Result<()> {
		self.last_checkpoint_time = Some(now);

		let encoded = serde_json::to_vec_pretty(self)?;
		let tmp = tmp_path(path);
		let write_err = |source| Error::WriteState { path: path.to_path_buf(), source };

		std::fs::write(&tmp, encoded).map_err(write_err)?;

		if let Err(err) = std::fs::rename(&tmp, path) {
			let _ = std::fs::remove_file(&tmp);

			return Err(write_err(err));
		}

		tracing::debug!(
			path = %path.display(),
			files = self.processed_files.len(),
			records = self.total_records_processed,
			"Checkpoint saved."
		);

		Ok(())
	}

	pub fn is_processed(&self, file: &str) -> bool {
		self.processed_files.contains(file)
	}

	pub fn mark_processed(&mut self, file: &str, records: u64) {
		self.processed_files.insert(file.to_string());
		self.last_processed_file = Some(file.to_string());
		self.total_records_processed += records;
	}

	/// Forgets per-file progress; used when the collection is recreated.
	pub fn reset_progress(&mut self) {
		self.processed_files.clear();
		self.last_processed_file = None;
		self.total_records_processed = 0;
	}
}

fn tmp_path(path: &Path) -> PathBuf {
	let name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();

	path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
}

mod rfc3339 {
	use serde::{Deserialize, Deserializer, Serializer};
	use time::{OffsetDateTime, format_description::well_known::Rfc3339};

	pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;

		serializer.serialize_str(&formatted)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		OffsetDateTime::parse(&raw, &Rfc3339).map_err(serde::de::Error::custom)
	}

	pub mod option {
		use serde::{Deserialize, Deserializer, Serializer};
		use time::{OffsetDateTime, format_description::well_known::Rfc3339};

		pub fn serialize<S>(
			value: &Option<OffsetDateTime>,
			serializer: S,
		) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			match value {
				Some(value) => super::serialize(value, serializer),
				None => serializer.serialize_none(),
			}
		}

		pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
		where
			D: Deserializer<'de>,
		{
			Option::<String>::deserialize(deserializer)?
				.map(|raw| OffsetDateTime::parse(&raw, &Rfc3339).map_err(serde::de::Error::custom))
				.transpose()
		}
	}
}

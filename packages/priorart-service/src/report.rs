use uuid::Uuid;

use priorart_domain::{ScoredCandidate, report};

use crate::{PriorArtService, Result};

pub const REPORT_CONTENT_TYPE: &str = "text/csv";

/// Object key of the report a job produces. Its presence is the job's completion signal.
pub fn report_key(job_id: Uuid) -> String {
	format!("{job_id}_report.csv")
}

impl PriorArtService {
	/// Serializes `candidates` and stores them under the job's report key.
	pub async fn write_report(&self, job_id: Uuid, candidates: &[ScoredCandidate]) -> Result<u64> {
		let key = report_key(job_id);
		let csv = report::to_csv(candidates);
		let size = csv.len() as u64;

		self.reports.put(&key, csv.into_bytes(), REPORT_CONTENT_TYPE).await?;

		tracing::info!(job_id = %job_id, key = %key, size, rows = candidates.len(), "Report written.");

		Ok(size)
	}
}

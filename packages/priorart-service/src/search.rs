//! Embed the description, retrieve nearest patents, and score each one for prior-art risk.

use std::{sync::Arc, time::Instant};

use futures::future;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Semaphore;
use uuid::Uuid;

use priorart_domain::{PatentRecord, RiskLevel, ScoredCandidate, report, text};

use crate::{Error, PriorArtService, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
	pub user_description: String,
	pub top_k: Option<u32>,
	/// When set, the scored results are also written as this job's report.
	pub job_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
	pub results: Vec<ScoredCandidate>,
	pub count: usize,
	pub duration_ms: u64,
}

/// Parsed scorer verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
	pub score: f64,
	pub level: RiskLevel,
	pub reason: String,
}

impl PriorArtService {
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let description = req.user_description.trim();

		if description.is_empty() {
			return Err(Error::InvalidRequest {
				message: "userDescription must be non-empty.".to_string(),
			});
		}

		let top_k = self.resolve_top_k(req.top_k)?;
		let job_id = req.job_id.as_deref().map(parse_job_id).transpose()?;
		let started = Instant::now();
		let vector = self.embedder.embed_one(description).await?;
		let hits = self
			.index
			.search(&self.cfg.storage.qdrant.collection, vector, u64::from(top_k))
			.await?;
		let mut records = Vec::with_capacity(hits.len());

		for hit in hits {
			match PatentRecord::from_payload(hit.payload) {
				Ok(record) => records.push(record),
				Err(err) => {
					tracing::warn!(error = %err, "Skipping index hit with unreadable payload.");
				},
			}
		}

		tracing::info!(candidates = records.len(), top_k, "Retrieved candidates. Scoring.");

		let mut results = self.score_candidates(description, records).await;

		report::sort_by_score(&mut results);

		if let Some(job_id) = job_id {
			self.write_report(job_id, &results).await?;
		}

		let duration_ms = started.elapsed().as_millis() as u64;

		tracing::info!(count = results.len(), duration_ms, "Search completed.");

		Ok(SearchResponse { count: results.len(), results, duration_ms })
	}

	/// Runs [`Self::search`] on its own task, so dropping the returned future (for example when
	/// the triggering connection closes) does not cancel scoring or the report write.
	pub async fn search_detached(self: &Arc<Self>, req: SearchRequest) -> Result<SearchResponse> {
		let service = Arc::clone(self);
		let job_id = req.job_id.clone();
		let handle = tokio::spawn(async move { service.search(req).await });

		handle.await.map_err(|err| {
			tracing::error!(job_id = ?job_id, error = %err, "Search task did not finish.");

			Error::Internal { message: format!("Search task did not finish: {err}.") }
		})?
	}

	fn resolve_top_k(&self, requested: Option<u32>) -> Result<u32> {
		let top_k = requested.unwrap_or(self.cfg.search.default_top_k);

		if top_k == 0 || top_k > self.cfg.search.max_top_k {
			return Err(Error::InvalidRequest {
				message: format!("topK must be between 1 and {}.", self.cfg.search.max_top_k),
			});
		}

		Ok(top_k)
	}

	/// Scores every record; one result per record, in input order.
	async fn score_candidates(
		&self,
		description: &str,
		records: Vec<PatentRecord>,
	) -> Vec<ScoredCandidate> {
		let permits = Arc::new(Semaphore::new(self.cfg.search.scorer_concurrency.max(1) as usize));
		let description =
			text::truncate_chars(description, self.cfg.search.description_max_chars as usize);
		let tasks = records.into_iter().map(|record| {
			let permits = permits.clone();

			async move {
				let Ok(_permit) = permits.acquire().await else {
					return ScoredCandidate::failed(record);
				};

				self.score_one(description, record).await
			}
		});

		future::join_all(tasks).await
	}

	async fn score_one(&self, description: &str, record: PatentRecord) -> ScoredCandidate {
		let prompt = build_prompt(description, &record);
		let reply = self.providers.scorer.generate(&self.cfg.providers.scorer, &prompt).await;
		let verdict = match reply {
			Ok(raw) => parse_verdict(&raw),
			Err(err) => {
				tracing::warn!(error = %err, record_id = %record.id, "Scorer call failed.");

				return ScoredCandidate::failed(record);
			},
		};

		match verdict {
			Some(Verdict { score, level, reason }) =>
				ScoredCandidate::scored(record, score, level, reason),
			None => {
				tracing::warn!(record_id = %record.id, "Scorer reply was not a usable verdict.");

				ScoredCandidate::failed(record)
			},
		}
	}
}

pub fn parse_job_id(raw: &str) -> Result<Uuid> {
	let raw = raw.trim();

	if raw.is_empty() {
		return Err(Error::InvalidRequest { message: "jobId must be non-empty.".to_string() });
	}

	Uuid::parse_str(raw)
		.map_err(|_| Error::InvalidRequest { message: "jobId must be a UUID.".to_string() })
}

pub fn build_prompt(description: &str, record: &PatentRecord) -> String {
	format!(
		"Analyze prior art risk (0-100) of the patent below against the user's invention.\n\
		 USER: {description}\n\
		 PATENT: {title}\n\
		 ABSTRACT: {summary}\n\n\
		 Reply with JSON only: {{\"score\": 85, \"level\": \"High\", \"reason\": \"...\"}}",
		title = record.title,
		summary = record.r#abstract,
	)
}

/// Reads `{score, level, reason}` from a reply that may be wrapped in a Markdown code fence.
/// Scores outside 0..=100 are rejected.
pub fn parse_verdict(raw: &str) -> Option<Verdict> {
	let json: Value = serde_json::from_str(strip_code_fence(raw)).ok()?;
	let score = match json.get("score")? {
		Value::Number(number) => number.as_f64()?,
		Value::String(text) => text.trim().parse::<f64>().ok()?,
		_ => return None,
	};

	if !(0.0..=100.0).contains(&score) {
		return None;
	}

	let level = json.get("level").and_then(Value::as_str).map(RiskLevel::parse_lenient);
	let reason = json.get("reason").and_then(Value::as_str).unwrap_or_default().to_string();

	Some(Verdict { score, level: level.unwrap_or(RiskLevel::Unknown), reason })
}

fn strip_code_fence(raw: &str) -> &str {
	let trimmed = raw.trim();
	let Some(rest) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	// Drop the info string ("json") on the opening fence line.
	let body = match rest.find('\n') {
		Some(idx) => &rest[idx + 1..],
		None => rest.trim_start_matches("json"),
	};

	body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

//! Asynchronous job protocol. The report object in durable storage is the only job state.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use priorart_storage::object::StoredObject;

use crate::{Error, PriorArtService, Result, report, search};

pub const INTERNAL_AUTH_HEADER: &str = "X-Internal-Auth-Token";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
	pub user_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
	pub success: bool,
	pub job_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
	pub job_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
	Pending,
	Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
	pub status: JobState,
	pub message: String,
	pub file_name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub download_url: Option<String>,
	/// Report size in bytes.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub file_size: Option<u64>,
}

/// Body of the fire-and-forget search trigger.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct DispatchBody {
	user_description: String,
	top_k: u32,
	job_id: Uuid,
}

impl PriorArtService {
	/// Mints a job id and triggers the search without waiting for it.
	pub async fn create_job(&self, req: CreateJobRequest) -> Result<CreateJobResponse> {
		let description = req.user_description.trim();

		if description.is_empty() {
			return Err(Error::InvalidRequest {
				message: "userDescription must be non-empty.".to_string(),
			});
		}

		let job_id = Uuid::new_v4();
		let body = DispatchBody {
			user_description: description.to_string(),
			top_k: self.cfg.search.default_top_k,
			job_id,
		};
		let client = self.dispatch_client.clone();
		let url = self.cfg.jobs.search_url.clone();
		let token = self.cfg.security.internal_auth_token.clone();
		let timeout = Duration::from_millis(self.cfg.jobs.dispatch_timeout_ms);

		tokio::spawn(async move {
			if let Err(err) = dispatch(&client, &url, &token, timeout, &body).await {
				tracing::error!(job_id = %job_id, error = %err, "Search dispatch failed.");
			}
		});

		tracing::info!(job_id = %job_id, "Job created. Search dispatched.");

		Ok(CreateJobResponse { success: true, job_id })
	}

	/// Pure read: pending until the job's report exists.
	pub async fn get_status(&self, req: StatusRequest) -> Result<JobStatus> {
		let job_id = search::parse_job_id(&req.job_id)?;
		let file_name = report::report_key(job_id);

		match self.reports.metadata(&file_name).await? {
			Some(meta) => {
				let download_url = self.reports.signed_url(&file_name, OffsetDateTime::now_utc())?;

				Ok(JobStatus {
					status: JobState::Completed,
					message: "Search complete. Your report is ready to download.".to_string(),
					file_name,
					download_url: Some(download_url),
					file_size: Some(meta.size),
				})
			},
			None => Ok(JobStatus {
				status: JobState::Pending,
				message: "Search is still running. Check back shortly.".to_string(),
				file_name,
				download_url: None,
				file_size: None,
			}),
		}
	}

	/// Serves a stored report to the holder of a valid signed link.
	pub async fn fetch_report(
		&self,
		key: &str,
		expires: i64,
		signature: &str,
	) -> Result<StoredObject> {
		self.reports.verify_signature(key, expires, signature, OffsetDateTime::now_utc())?;

		self.reports
			.get(key)
			.await?
			.ok_or_else(|| Error::NotFound { message: format!("Report {key} does not exist.") })
	}
}

async fn dispatch(
	client: &Client,
	url: &str,
	token: &str,
	timeout: Duration,
	body: &DispatchBody,
) -> color_eyre::Result<()> {
	client
		.post(url)
		.timeout(timeout)
		.header(INTERNAL_AUTH_HEADER, token)
		.json(body)
		.send()
		.await?
		.error_for_status()?;

	tracing::info!(job_id = %body.job_id, "Dispatched search finished.");

	Ok(())
}

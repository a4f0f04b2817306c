use axum::{
	Json, Router,
	extract::{
		Path, Query, State,
		rejection::{JsonRejection, QueryRejection},
	},
	http::{HeaderMap, HeaderValue, StatusCode, header},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use priorart_service::{
	CreateJobResponse, JobStatus, SearchRequest, SearchResponse, StatusRequest,
	jobs::{CreateJobRequest, INTERNAL_AUTH_HEADER},
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/search", post(search))
		.route("/jobs", post(create_job))
		.route("/status", get(status))
		.route("/reports/{key}", get(download_report))
		.with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthBody {
	status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody {
	success: bool,
	#[serde(flatten)]
	response: SearchResponse,
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
	expires: i64,
	signature: String,
}

async fn health() -> Json<HealthBody> {
	Json(HealthBody { status: "ready" })
}

async fn search(
	State(state): State<AppState>,
	headers: HeaderMap,
	payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchBody>, ApiError> {
	authorize(&headers, &state.service.cfg.security.internal_auth_token)?;

	let Json(payload) = payload.map_err(json_rejection)?;
	// A job's search must outlive the dispatcher's connection.
	let response = if payload.job_id.is_some() {
		state.service.search_detached(payload).await?
	} else {
		state.service.search(payload).await?
	};

	Ok(Json(SearchBody { success: true, response }))
}

async fn create_job(
	State(state): State<AppState>,
	payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> Result<Json<CreateJobResponse>, ApiError> {
	let Json(payload) = payload.map_err(json_rejection)?;
	let response = state.service.create_job(payload).await?;

	Ok(Json(response))
}

async fn status(
	State(state): State<AppState>,
	query: Result<Query<StatusRequest>, QueryRejection>,
) -> Result<Json<JobStatus>, ApiError> {
	let Query(query) = query.map_err(|err| {
		json_error(
			StatusCode::BAD_REQUEST,
			"invalid_request",
			err.body_text(),
			Some(vec!["$.jobId".to_string()]),
		)
	})?;
	let response = state.service.get_status(query).await?;

	Ok(Json(response))
}

async fn download_report(
	State(state): State<AppState>,
	Path(key): Path<String>,
	query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
	let Query(query) = query.map_err(|_| {
		json_error(StatusCode::FORBIDDEN, "forbidden", "Download link is not signed.", None)
	})?;
	let object = state.service.fetch_report(&key, query.expires, &query.signature).await?;
	let content_type = HeaderValue::from_str(&object.metadata.content_type)
		.unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
	let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{key}\""))
		.unwrap_or_else(|_| HeaderValue::from_static("attachment"));

	Ok((
		[(header::CONTENT_TYPE, content_type), (header::CONTENT_DISPOSITION, disposition)],
		object.bytes,
	)
		.into_response())
}

fn authorize(headers: &HeaderMap, expected: &str) -> Result<(), ApiError> {
	let provided = headers.get(INTERNAL_AUTH_HEADER).and_then(|value| value.to_str().ok());

	match provided {
		Some(token) if token == expected => Ok(()),
		_ => Err(json_error(
			StatusCode::UNAUTHORIZED,
			"unauthorized",
			"Missing or invalid internal auth token.",
			None,
		)),
	}
}

fn json_rejection(err: JsonRejection) -> ApiError {
	json_error(StatusCode::BAD_REQUEST, "invalid_request", err.body_text(), None)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}
impl From<priorart_service::Error> for ApiError {
	fn from(err: priorart_service::Error) -> Self {
		use priorart_service::Error;

		match err {
			Error::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message, None),
			Error::NotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "not_found", message, None),
			Error::Forbidden { message } =>
				json_error(StatusCode::FORBIDDEN, "forbidden", message, None),
			Error::Embedding { message } =>
				json_error(StatusCode::BAD_GATEWAY, "embedding_failed", message, None),
			Error::Provider { message } =>
				json_error(StatusCode::BAD_GATEWAY, "provider_error", message, None),
			Error::Index { message } =>
				json_error(StatusCode::BAD_GATEWAY, "index_error", message, None),
			Error::Storage { message } =>
				json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message, None),
			Error::Internal { message } =>
				json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message, None),
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		if self.status.is_server_error() {
			tracing::error!(
				error_code = %self.error_code,
				message = %self.message,
				"Request failed."
			);
		}

		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}

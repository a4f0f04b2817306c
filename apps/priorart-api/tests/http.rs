use std::{sync::Arc, time::Duration};

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode, header},
};
use color_eyre::eyre;
use serde_json::Value;
use tokio::net::TcpListener;
use tower::util::ServiceExt;

use priorart_api::{routes, state::AppState};
use priorart_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use priorart_domain::PatentRecord;
use priorart_service::{BoxFuture, EmbeddingProvider, PriorArtService, Providers, ScorerProvider};
use priorart_storage::{index::IndexPoint, object::LocalObjectStore};
use priorart_testkit::{MemoryIndex, ScratchDir, TEST_AUTH_TOKEN};

struct StubEmbedding;
impl EmbeddingProvider for StubEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		let vectors = texts.iter().map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect();

		Box::pin(async move { Ok(vectors) })
	}
}

/// Scores "Title US001" and refuses everything else, after `delay`.
#[derive(Default)]
struct StubScorer {
	delay: Duration,
}
impl ScorerProvider for StubScorer {
	fn generate<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		prompt: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		let reply = if prompt.contains("PATENT: Title US001") {
			Ok(r#"{"score": 72, "level": "High", "reason": "Same rake."}"#.to_string())
		} else {
			Err(eyre::eyre!("scorer unavailable"))
		};
		let delay = self.delay;

		Box::pin(async move {
			tokio::time::sleep(delay).await;

			reply
		})
	}
}

fn build_app(dir: &ScratchDir, tweak: impl FnOnce(&mut Config)) -> Router {
	build_app_with_scorer(dir, StubScorer::default(), tweak)
}

fn build_app_with_scorer(
	dir: &ScratchDir,
	scorer: StubScorer,
	tweak: impl FnOnce(&mut Config),
) -> Router {
	let mut cfg = priorart_testkit::sample_config(&dir.join("reports"), &dir.join("corpus"));

	tweak(&mut cfg);

	let index = Arc::new(MemoryIndex::new());

	let seeds = [("US001", vec![1.0, 0.0, 0.0, 0.0]), ("US002", vec![0.5, 0.5, 0.0, 0.0])];

	for (id, vector) in seeds {
		let record = PatentRecord {
			id: id.to_string(),
			title: format!("Title {id}"),
			r#abstract: format!("Abstract {id}"),
			claims: String::new(),
			filing_date: "20190101".to_string(),
		};

		index.insert(&cfg.storage.qdrant.collection, IndexPoint {
			key: record.id.clone(),
			vector,
			payload: record.to_payload().expect("payload"),
		});
	}

	let reports = Arc::new(LocalObjectStore::new(&cfg.storage.reports));
	let providers = Providers::new(Arc::new(StubEmbedding), Arc::new(scorer));
	let service = PriorArtService::with_providers(cfg, index, reports, providers);

	routes::router(AppState::from_service(service))
}

fn scratch() -> ScratchDir {
	ScratchDir::new("priorart-api").expect("Failed to create scratch dir.")
}

async fn json_body(response: axum::response::Response) -> Value {
	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");

	serde_json::from_slice(&bytes).expect("Failed to parse response body.")
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
	let mut builder = Request::builder()
		.method("POST")
		.uri(uri)
		.header(header::CONTENT_TYPE, "application/json");

	if let Some(token) = token {
		builder = builder.header("X-Internal-Auth-Token", token);
	}

	builder.body(Body::from(body.to_string())).expect("Failed to build request.")
}

fn get(uri: &str) -> Request<Body> {
	Request::builder().uri(uri).body(Body::empty()).expect("Failed to build request.")
}

async fn poll_until_completed(app: &Router, job_id: &str) -> Value {
	let mut status = Value::Null;

	for _ in 0..100 {
		let response = app
			.clone()
			.oneshot(get(&format!("/status?jobId={job_id}")))
			.await
			.expect("Failed to call /status.");

		assert_eq!(response.status(), StatusCode::OK);

		status = json_body(response).await;

		if status["status"] == "completed" {
			break;
		}

		assert_eq!(status["status"], "pending");
		assert!(status.get("downloadUrl").is_none());

		tokio::time::sleep(Duration::from_millis(50)).await;
	}

	status
}

async fn create_job(app: &Router) -> String {
	let response = app
		.clone()
		.oneshot(post_json("/jobs", None, serde_json::json!({ "userDescription": "litter box" })))
		.await
		.expect("Failed to call /jobs.");

	assert_eq!(response.status(), StatusCode::OK);

	let created = json_body(response).await;

	assert_eq!(created["success"], true);

	created["jobId"].as_str().expect("jobId").to_string()
}

#[tokio::test]
async fn health_ok() {
	let dir = scratch();
	let app = build_app(&dir, |_| {});
	let response = app.oneshot(get("/health")).await.expect("Failed to call /health.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(json_body(response).await, serde_json::json!({ "status": "ready" }));
}

#[tokio::test]
async fn search_requires_internal_token() {
	let dir = scratch();
	let app = build_app(&dir, |_| {});
	let body = serde_json::json!({ "userDescription": "litter box" });

	for token in [None, Some("wrong-token")] {
		let response = app
			.clone()
			.oneshot(post_json("/search", token, body.clone()))
			.await
			.expect("Failed to call /search.");

		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(json_body(response).await["error_code"], "unauthorized");
	}
}

#[tokio::test]
async fn search_returns_ranked_results() {
	let dir = scratch();
	let app = build_app(&dir, |_| {});
	let body = serde_json::json!({ "userDescription": "litter box", "topK": 5 });
	let response = app
		.oneshot(post_json("/search", Some(TEST_AUTH_TOKEN), body))
		.await
		.expect("Failed to call /search.");

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;

	assert_eq!(json["success"], true);
	assert_eq!(json["count"], 2);
	assert!(json["durationMs"].is_u64());
	assert_eq!(json["results"][0]["id"], "US001");
	assert_eq!(json["results"][0]["score"], 72.0);
	assert_eq!(json["results"][0]["level"], "High");
	assert_eq!(json["results"][1]["score"], Value::Null);
	assert_eq!(json["results"][1]["level"], "Unknown");
	assert_eq!(json["results"][1]["reason"], "Failed");
}

#[tokio::test]
async fn invalid_input_is_a_client_error() {
	let dir = scratch();
	let app = build_app(&dir, |_| {});
	let cases = [
		post_json("/search", Some(TEST_AUTH_TOKEN), serde_json::json!({ "userDescription": "" })),
		post_json("/search", Some(TEST_AUTH_TOKEN), serde_json::json!({ "topK": 3 })),
		post_json(
			"/search",
			Some(TEST_AUTH_TOKEN),
			serde_json::json!({ "userDescription": "x", "topK": 0 }),
		),
		post_json("/jobs", None, serde_json::json!({ "userDescription": "  " })),
		get("/status?jobId=not-a-uuid"),
		get("/status"),
	];

	for request in cases {
		let uri = request.uri().to_string();
		let response = app.clone().oneshot(request).await.expect("Failed to call route.");

		assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
		assert_eq!(json_body(response).await["error_code"], "invalid_request", "{uri}");
	}
}

#[tokio::test]
async fn unsigned_or_forged_downloads_are_forbidden() {
	let dir = scratch();
	let app = build_app(&dir, |_| {});

	let uris = ["/reports/x_report.csv", "/reports/x_report.csv?expires=99999999999&signature=00"];

	for uri in uris {
		let response = app.clone().oneshot(get(uri)).await.expect("Failed to call /reports.");

		assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
	}
}

#[tokio::test]
async fn job_completes_through_dispatch_and_report_downloads() {
	let dir = scratch();
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind listener.");
	let addr = listener.local_addr().expect("Failed to read listener address.");
	let app = build_app(&dir, |cfg| {
		cfg.jobs.search_url = format!("http://{addr}/search");
		cfg.jobs.dispatch_timeout_ms = 10_000;
	});
	let server = tokio::spawn(axum::serve(listener, app.clone()).into_future());
	let job_id = create_job(&app).await;
	let status = poll_until_completed(&app, &job_id).await;

	assert_eq!(status["status"], "completed");
	assert_eq!(status["fileName"], format!("{job_id}_report.csv"));

	let url = status["downloadUrl"].as_str().expect("downloadUrl");
	let path = url.strip_prefix("http://127.0.0.1:8080").expect("URL uses the public base.");
	let response = app.clone().oneshot(get(path)).await.expect("Failed to download report.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");

	let bytes = body::to_bytes(response.into_body(), usize::MAX).await.expect("Failed to read.");
	let csv = String::from_utf8(bytes.to_vec()).expect("utf-8");

	assert_eq!(status["fileSize"], bytes.len() as u64);
	assert!(csv.starts_with("Risk Score,Risk Level,Title,Abstract,Filing Date,Reasoning\n"));
	assert!(csv.contains("\"72\",\"High\",\"Title US001\""));

	server.abort();
}

#[tokio::test]
async fn job_completes_when_dispatch_times_out_before_scoring_ends() {
	let dir = scratch();
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind listener.");
	let addr = listener.local_addr().expect("Failed to read listener address.");
	let scorer = StubScorer { delay: Duration::from_millis(400) };
	let app = build_app_with_scorer(&dir, scorer, |cfg| {
		cfg.jobs.search_url = format!("http://{addr}/search");
		cfg.jobs.dispatch_timeout_ms = 100;
		cfg.search.scorer_concurrency = 1;
	});
	let server = tokio::spawn(axum::serve(listener, app.clone()).into_future());
	let job_id = create_job(&app).await;

	// The dispatcher gives up after 100 ms and closes its connection; scoring takes 800 ms.
	tokio::time::sleep(Duration::from_millis(300)).await;

	let status = poll_until_completed(&app, &job_id).await;

	assert_eq!(status["status"], "completed");
	assert!(status["fileSize"].as_u64().is_some_and(|size| size > 0));

	server.abort();
}

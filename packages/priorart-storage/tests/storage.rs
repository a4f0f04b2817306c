use std::{path::PathBuf, sync::Arc};

use serde_json::{Map, Value};
use time::OffsetDateTime;

use priorart_storage::{
	index::{IndexPoint, Metric, VectorIndex},
	object::{LocalObjectStore, ObjectStore},
	qdrant::QdrantStore,
};
use priorart_testkit::ScratchDir;

fn scratch() -> ScratchDir {
	ScratchDir::new("priorart-storage").expect("Failed to create scratch dir.")
}

fn reports_config(root: PathBuf) -> priorart_config::Reports {
	priorart_config::Reports {
		root,
		public_base_url: "http://127.0.0.1:8080/".to_string(),
		signing_key: "test-signing-key".to_string(),
		signed_url_ttl_seconds: 3_600,
	}
}

#[tokio::test]
async fn put_then_read_back_with_metadata() {
	let dir = scratch();
	let store = LocalObjectStore::new(&reports_config(dir.path().to_path_buf()));

	assert!(store.metadata("job_report.csv").await.expect("metadata failed").is_none());

	store
		.put("job_report.csv", b"Risk Score\n".to_vec(), "text/csv")
		.await
		.expect("put failed");

	let meta = store.metadata("job_report.csv").await.expect("metadata failed").expect("present");

	assert_eq!(meta.size, 11);
	assert_eq!(meta.content_type, "text/csv");

	let object = store.get("job_report.csv").await.expect("get failed").expect("present");

	assert_eq!(object.bytes, b"Risk Score\n");

	let leftovers: Vec<_> = std::fs::read_dir(dir.path())
		.expect("read_dir failed")
		.filter_map(|entry| entry.ok())
		.filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
		.collect();

	assert!(leftovers.is_empty());
}

#[tokio::test]
async fn overwriting_replaces_content() {
	let dir = scratch();
	let store = LocalObjectStore::new(&reports_config(dir.path().to_path_buf()));

	store.put("a.csv", b"one".to_vec(), "text/csv").await.expect("put failed");
	store.put("a.csv", b"second".to_vec(), "text/csv").await.expect("put failed");

	let object = store.get("a.csv").await.expect("get failed").expect("present");

	assert_eq!(object.bytes, b"second");
	assert_eq!(object.metadata.size, 6);
}

#[tokio::test]
async fn rejects_unsafe_keys() {
	let dir = scratch();
	let store = LocalObjectStore::new(&reports_config(dir.path().to_path_buf()));

	assert!(store.put("../escape.csv", b"x".to_vec(), "text/csv").await.is_err());
	assert!(store.get(".meta").await.is_err());
}

#[test]
fn signed_url_verifies_against_the_same_store() {
	let dir = scratch();
	let store = LocalObjectStore::new(&reports_config(dir.path().to_path_buf()));
	let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("Valid timestamp.");
	let url = store.signed_url("job_report.csv", now).expect("sign failed");
	let prefix = "http://127.0.0.1:8080/reports/job_report.csv?expires=1700003600&signature=";

	assert!(url.starts_with(prefix), "unexpected url {url}");

	let signature = &url[prefix.len()..];

	assert!(store.verify_signature("job_report.csv", 1_700_003_600, signature, now).is_ok());
	assert!(store.verify_signature("other_report.csv", 1_700_003_600, signature, now).is_err());
}

#[tokio::test]
#[ignore = "Requires external Qdrant. Set PRIORART_QDRANT_URL to run."]
async fn qdrant_upsert_is_idempotent_and_searchable() {
	let Some(url) = priorart_testkit::env_qdrant_url() else {
		eprintln!("Skipping qdrant test; set PRIORART_QDRANT_URL to run this test.");

		return;
	};
	let cfg = priorart_config::Qdrant {
		url: url.clone(),
		collection: priorart_testkit::unique_collection_name("priorart_test"),
		vector_dim: 3,
	};
	let store: Arc<dyn VectorIndex> = Arc::new(QdrantStore::new(&cfg).expect("client failed"));
	let point = |key: &str, vector: Vec<f32>| {
		let mut payload = Map::new();

		payload.insert("id".to_string(), Value::String(key.to_string()));

		IndexPoint { key: key.to_string(), vector, payload }
	};

	store.delete_collection(&cfg.collection).await.expect("delete failed");
	store.create_collection(&cfg.collection, 3, Metric::Cosine).await.expect("create failed");
	store
		.upsert(&cfg.collection, vec![point("US001", vec![1.0, 0.0, 0.0])])
		.await
		.expect("upsert failed");
	store
		.upsert(&cfg.collection, vec![
			point("US001", vec![1.0, 0.0, 0.0]),
			point("US002", vec![0.0, 1.0, 0.0]),
		])
		.await
		.expect("upsert failed");

	let hits = store.search(&cfg.collection, vec![1.0, 0.0, 0.0], 10).await.expect("search failed");

	assert_eq!(hits.len(), 2);
	assert_eq!(hits[0].payload.get("id"), Some(&Value::String("US001".to_string())));

	priorart_testkit::cleanup_qdrant_collection(&url, &cfg.collection)
		.await
		.expect("Failed to clean up Qdrant collection.");
}

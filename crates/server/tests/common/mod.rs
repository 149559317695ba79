//! Common test utilities and fixtures.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use templar_core::config::AppConfig;
use templar_metadata::{MetadataStore, SqliteStore};
use templar_server::{AppState, JobQueue, create_router};
use templar_storage::{LocalBackend, LruPolicy, ObjectStore, SyncStore, TieredStore};
use tower::ServiceExt;
use uuid::Uuid;

/// Full server wired over real filesystem tiers and a temp SQLite catalog.
pub struct TestServer {
    pub router: Router,
    #[allow(dead_code)]
    pub metadata: Arc<SqliteStore>,
    pub cache_root: PathBuf,
    pub primary_root: PathBuf,
    _temp: tempfile::TempDir,
}

impl TestServer {
    /// Build a server with eviction disabled.
    pub async fn new() -> Self {
        Self::with_cache_budget(0).await
    }

    /// Build a server whose cache tier has the given byte budget.
    pub async fn with_cache_budget(max_size_bytes: i64) -> Self {
        let temp = tempfile::tempdir().unwrap();
        let cache_root = temp.path().join("cache");
        let primary_root = temp.path().join("primary");

        let cache = LocalBackend::new(&cache_root).await.unwrap();
        let primary = LocalBackend::new(&primary_root).await.unwrap();
        let tiered = TieredStore::new(cache, primary, LruPolicy::new(max_size_bytes));
        let store: Arc<dyn ObjectStore> = Arc::new(SyncStore::new(tiered));

        let metadata = Arc::new(
            SqliteStore::new(temp.path().join("metadata.db"))
                .await
                .unwrap(),
        );
        let meta_dyn: Arc<dyn MetadataStore> = metadata.clone();
        let (jobs, _worker) = JobQueue::new(4, meta_dyn.clone());

        let config = AppConfig::for_testing(temp.path().join("cache"));
        let state = AppState::new(config, store, meta_dyn, jobs);

        Self {
            router: create_router(state),
            metadata,
            cache_root,
            primary_root,
            _temp: temp,
        }
    }

    /// Issue a JSON (or empty-body) request and decode the response body.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Push an artifact through the multipart endpoint.
    pub async fn push(
        &self,
        template_id: Uuid,
        version: i64,
        content: &[u8],
    ) -> (StatusCode, Value) {
        let boundary = "templar-test-boundary";
        let mut body = Vec::new();
        for (name, value) in [
            ("template_id", template_id.to_string()),
            ("version", version.to_string()),
        ] {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"artifact.bin\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/push")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Pull an artifact, returning status, headers, and raw body bytes.
    pub async fn pull(
        &self,
        template_id: Uuid,
        version: i64,
    ) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let body = serde_json::json!({
            "template_id": template_id.to_string(),
            "version": version,
        });
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/pull")
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, bytes.to_vec())
    }

    /// Poll the jobs endpoint until the job for `(template_id, version)`
    /// reaches a terminal state, returning its row.
    pub async fn wait_for_job(&self, template_id: Uuid, version: i64) -> Value {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let (status, body) = self.request("GET", "/api/v1/jobs?limit=100", None).await;
            assert_eq!(status, StatusCode::OK);

            let job = body["data"].as_array().and_then(|jobs| {
                jobs.iter()
                    .find(|j| {
                        j["template_id"] == template_id.to_string().as_str()
                            && j["version_number"] == version
                    })
                    .cloned()
            });
            if let Some(job) = job {
                let state = job["status"].as_str().unwrap_or_default();
                if state == "completed" || state == "error" {
                    return job;
                }
            }

            if tokio::time::Instant::now() > deadline {
                panic!("job for {template_id} v{version} did not finish");
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Whether the cache tier currently holds the object for a version.
    pub fn cache_has(&self, template_id: Uuid, version: i64) -> bool {
        self.cache_root
            .join(format!("templates/{template_id}/{version}"))
            .exists()
    }

    /// Whether the primary tier currently holds the object for a version.
    pub fn primary_has(&self, template_id: Uuid, version: i64) -> bool {
        self.primary_root
            .join(format!("templates/{template_id}/{version}"))
            .exists()
    }
}

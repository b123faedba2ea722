//! Common test utilities for in-process API testing with mocks.
//!
//! This module provides a test fixture that builds the router over a real
//! SQLite job store and artifact directory, with the dispatcher's external
//! collaborators replaced by mocks.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use groovio_core::{
    testing::{MockAcquisitionPipeline, MockMetadataProvider},
    ArtifactStore, Dispatcher, JobRecord, JobStatus, JobStore, SqliteJobStore, TrackSummary,
    WorkerPool,
};
use groovio_server::AppState;

/// Re-export fixtures for test convenience
pub use groovio_core::testing::fixtures;

/// Test fixture for API testing.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_queue() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture
///         .post("/api/queue-track", json!({ "spotify_track_id": "abc" }))
///         .await;
///
///     assert_eq!(response.status, StatusCode::OK);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Job store shared with the router
    pub store: Arc<SqliteJobStore>,
    /// Artifact directory shared with the router
    pub artifacts: ArtifactStore,
    /// Dispatcher (not started; drive it with `tick`)
    pub dispatcher: Arc<Dispatcher>,
    /// Mock acquisition pipeline used by the dispatcher
    pub pipeline: Arc<MockAcquisitionPipeline>,
    /// Mock metadata provider used by the dispatcher
    pub metadata: Arc<MockMetadataProvider>,
    /// Temporary directory for the database and artifacts
    pub temp_dir: TempDir,
}

/// Response from a test request, parsed as JSON
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Response from a test request, kept as raw bytes
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Bytes written by the mock pipeline for every acquired track.
pub const MOCK_AUDIO: &[u8] = b"ID3\x03\x00mock-audio-payload";

impl TestFixture {
    /// Create a new test fixture.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = fixtures::config_in(temp_dir.path());

        let store = Arc::new(
            SqliteJobStore::new(&config.database.path).expect("Failed to create job store"),
        );
        let artifacts = ArtifactStore::new(&config.storage.artifact_dir)
            .expect("Failed to create artifact store");

        let metadata = Arc::new(MockMetadataProvider::new());
        let pipeline = Arc::new(
            MockAcquisitionPipeline::new().with_artifact_store(artifacts.clone(), MOCK_AUDIO),
        );
        let dispatcher = Arc::new(Dispatcher::new(
            config.dispatcher.clone(),
            Arc::clone(&store) as Arc<dyn JobStore>,
            Arc::clone(&metadata) as Arc<dyn groovio_core::MetadataProvider>,
            Arc::clone(&pipeline) as Arc<dyn groovio_core::AcquisitionPipeline>,
            Arc::new(WorkerPool::new(config.dispatcher.max_concurrent_jobs)),
        ));

        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&store) as Arc<dyn JobStore>,
            artifacts.clone(),
            Some(Arc::clone(&dispatcher)),
        ));

        let router = groovio_server::create_router(state);

        Self {
            router,
            store,
            artifacts,
            dispatcher,
            pipeline,
            metadata,
            temp_dir,
        }
    }

    /// Run dispatcher ticks until no job is queued or downloading.
    pub async fn drain_queue(&self) {
        for _ in 0..100 {
            self.dispatcher.tick().await;
            self.dispatcher.wait_idle().await;
            let open = self.store.count(Some(JobStatus::Queued)).unwrap()
                + self.store.count(Some(JobStatus::Downloading)).unwrap();
            if open == 0 {
                return;
            }
        }
        panic!("queue did not drain");
    }

    /// Insert a completed job whose artifact holds `content`.
    pub async fn completed_track(&self, track_id: &str, content: &[u8]) -> JobRecord {
        let job = self.store.create_if_absent(track_id).unwrap();
        assert!(self
            .store
            .compare_and_set_status(&job.id, JobStatus::Queued, JobStatus::Downloading)
            .unwrap());

        let reference = format!("{}.mp3", job.id);
        let path = self.artifacts.path_for(&reference).unwrap();
        tokio::fs::write(&path, content).await.unwrap();

        let summary = TrackSummary {
            title: format!("Song {}", track_id),
            artists: "Test Artist".to_string(),
            album: "Test Album".to_string(),
            duration_ms: 180_000,
        };
        assert!(self.store.complete(&job.id, &reference, &summary).unwrap());
        self.store.get(&job.id).unwrap().unwrap()
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let raw = self.send(request).await;
        TestResponse {
            status: raw.status,
            body: parse_json(&raw.body),
        }
    }

    /// Send a GET request with extra headers and keep the raw body.
    pub async fn get_raw(&self, path: &str, headers: &[(&str, &str)]) -> RawResponse {
        let mut builder = Request::builder().method("GET").uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Send a GET request and hand back the response with its body unread.
    pub async fn get_streaming(&self, path: &str, headers: &[(&str, &str)]) -> Response {
        let mut builder = Request::builder().method("GET").uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .expect("Failed to send request")
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let raw = self.send(request_builder.body(body).unwrap()).await;
        TestResponse {
            status: raw.status,
            body: parse_json(&raw.body),
        }
    }

    async fn send(&self, request: Request<Body>) -> RawResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        RawResponse {
            status,
            headers,
            body,
        }
    }
}

fn parse_json(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(bytes).unwrap_or(Value::Null)
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

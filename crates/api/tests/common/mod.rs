#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use imgbatch_api::config::ServerConfig;
use imgbatch_api::router::build_app_router;
use imgbatch_api::state::AppState;
use imgbatch_core::registry::JobRegistry;
use imgbatch_pipeline::{BatchEngine, HttpFetcher, PipelineConfig};

pub const BOUNDARY: &str = "imgbatch-test-boundary";

/// A router wired to scratch directories that live as long as the value.
pub struct TestApp {
    pub router: Router,
    pub dir: TempDir,
}

impl TestApp {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Build a test `ServerConfig` rooted at `root`.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default),
/// a 30-second request timeout and a small target width to keep tests fast.
pub fn test_config(root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 64 * 1024,
        upload_dir: root.join("uploads"),
        pipeline: PipelineConfig {
            images_dir: root.join("images"),
            tables_dir: root.join("tables"),
            target_width: 32,
            ..PipelineConfig::default()
        },
    }
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    for d in [
        &config.upload_dir,
        &config.pipeline.images_dir,
        &config.pipeline.tables_dir,
    ] {
        std::fs::create_dir_all(d).unwrap();
    }

    let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
    let engine = BatchEngine::new(
        &config.pipeline,
        Arc::new(JobRegistry::new()),
        Arc::new(fetcher),
    );
    let state = AppState::new(config.clone(), engine);

    TestApp {
        router: build_app_router(state, &config),
        dir,
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

/// POST a multipart body with a single file field.
pub async fn upload(app: &TestApp, field: &str, file_name: &str, contents: &str) -> Response<Body> {
    let body = multipart_body(field, file_name, contents);
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

pub fn multipart_body(field: &str, file_name: &str, contents: &str) -> String {
    format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: text/csv\r\n\
         \r\n\
         {contents}\r\n\
         --{BOUNDARY}--\r\n"
    )
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Poll the status endpoint until the job leaves `processing`.
pub async fn wait_for_job(app: &TestApp, request_id: &str) -> serde_json::Value {
    let uri = format!("/api/v1/status/{request_id}");
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let response = get(app, &uri).await;
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            if json["data"]["status"] != "processing" {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("job did not finish in time")
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Write a solid `width` x `height` PNG under the app's scratch dir.
pub fn write_png(app: &TestApp, name: &str, width: u32, height: u32) -> PathBuf {
    let path = app.path().join(name);
    image::RgbImage::from_pixel(width, height, image::Rgb([20, 120, 200]))
        .save(&path)
        .unwrap();
    path
}

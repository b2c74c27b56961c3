//! HTTP server for the product catalog store.
//!
//! Accepts multipart publish rounds at `POST /{database_id}?save=...`,
//! answers each with the files still missing, and serves stored files at
//! `GET /{database_id}/{file_name}`.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::PcatServer;
pub use state::AppState;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use pcat_types::PublishResponse;
    use serde_json::json;
    use tower::util::ServiceExt;

    const DB: &str = "6e6a2b4c-1f0d-4c8e-9e2b-2b6f0f8d9a11";
    const BOUNDARY: &str = "pcat-test-boundary";

    fn app(root: &std::path::Path) -> Router {
        let config = ServerConfig {
            storage_root: root.to_path_buf(),
            ..Default::default()
        };
        PcatServer::new(config).router()
    }

    fn object(refs: &[&str]) -> String {
        let refs: serde_json::Map<String, serde_json::Value> = refs
            .iter()
            .enumerate()
            .map(|(i, name)| (i.to_string(), json!(name)))
            .collect();
        json!({ "data": {}, "refs": refs }).to_string()
    }

    fn multipart(files: &[(&str, String)]) -> String {
        let mut body = String::new();
        for (name, content) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/json\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    async fn publish(app: &Router, query: &str, files: &[(&str, String)]) -> (StatusCode, serde_json::Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/{DB}{query}"))
                    .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
                    .body(Body::from(multipart(files)))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn download(app: &Router, name: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/{DB}/{name}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn health_endpoint() {
        let tmp = tempfile::tempdir().unwrap();
        let response = app(tmp.path())
            .oneshot(
                Request::builder()
                    .uri("/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn publish_in_rounds_until_nothing_is_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app(tmp.path());
        let root = object(&["release_aaa.json"]);

        let (status, body) = publish(&app, "?save=ifcomplete", &[("root.json", root.clone())]).await;
        assert_eq!(status, StatusCode::OK);
        let response: PublishResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.missing_files, vec!["release_aaa.json"]);
        assert_eq!(download(&app, "root.json").await.0, StatusCode::NOT_FOUND);

        // only the missing file; the staged root from the first round is reused
        let (status, body) = publish(&app, "?save=ifcomplete", &[("release_aaa.json", object(&[]))]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "missingFiles": [] }));

        let (status, bytes) = download(&app, "root.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, root.as_bytes());

        let mut on_disk: Vec<String> = std::fs::read_dir(tmp.path().join(DB))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        on_disk.sort();
        assert_eq!(on_disk, vec!["release_aaa.json", "root.json"]);
    }

    #[tokio::test]
    async fn direct_upload_lower_cases_names() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app(tmp.path());

        let (status, body) = publish(&app, "", &[("Release_AAA.json", object(&["blob_ff"]))]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "missingFiles": ["blob_ff"] }));
        assert_eq!(download(&app, "release_aaa.json").await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn dry_run_stores_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app(tmp.path());

        let (_, body) = publish(&app, "?save=no", &[("root.json", object(&[]))]).await;
        assert_eq!(body, json!({ "missingFiles": [] }));
        assert_eq!(download(&app, "root.json").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_file_parts_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app(tmp.path());

        let (status, body) = publish(
            &app,
            "?save=ifcomplete",
            &[("root.json", object(&[])), ("Root.json", object(&["release_aaa.json"]))],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("root.json"));
        assert!(!tmp.path().join(DB).exists());
    }

    #[tokio::test]
    async fn invalid_database_id_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let response = app(tmp.path())
            .oneshot(
                Request::builder()
                    .uri("/not-a-uuid/root.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn file_names_cannot_escape_the_database() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app(tmp.path());
        let (status, _) = publish(&app, "", &[("..", object(&[]))]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

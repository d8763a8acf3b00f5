//! Router-level tests. No external engine is ever started: every request here
//! either fails before dispatch or only reads the upload tree.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use doc2pages::{router, AppState, Converter, JobManifest, ServerConfig, UploadedFile};
use serde_json::Value;
use std::path::Path;
use tower::ServiceExt;

fn app(root: &Path) -> (Router, ServerConfig) {
    let config = ServerConfig::builder().upload_root(root).build().unwrap();
    let converter = Converter::new(config.clone());
    (router(AppState { converter }), config)
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn multipart_upload(field: &str, file_name: &str, mime: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--BOUNDARY\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: {mime}\r\n\r\n\
         {content}\r\n\
         --BOUNDARY--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/fileConverter")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn health_check() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app(dir.path());

    let (status, json) = send(app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["code"], 200);
    assert_eq!(json["message"], "Server is running successfully.");
}

#[tokio::test]
async fn unsupported_upload_is_400_and_only_stored() {
    let dir = tempfile::tempdir().unwrap();
    let (app, config) = app(dir.path());

    let req = multipart_upload("file", "notes.txt", "text/plain", "hello");
    let (status, json) = send(app, req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Unsupported file format");
    assert!(config.pdf_images_dir().join("notes.txt").exists());
    assert!(!config.pdf_images_dir().join("notes.pdf").exists());
    assert!(!config.pdf_images_dir().join("notes").exists());
}

#[tokio::test]
async fn excel_mime_is_stored_under_excel() {
    let dir = tempfile::tempdir().unwrap();
    let (app, config) = app(dir.path());

    // Unsupported extension, so nothing runs after the upload is stored.
    let req = multipart_upload("file", "legacy.csv", "application/vnd.ms-excel", "a,b");
    let (status, _) = send(app, req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(config.excel_dir().join("legacy.csv").exists());
}

#[tokio::test]
async fn upload_without_file_field_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app(dir.path());

    let req = multipart_upload("attachment", "memo.pdf", "application/pdf", "%PDF");
    let (status, json) = send(app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No file uploaded");
}

#[tokio::test]
async fn non_multipart_post_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app(dir.path());

    let req = Request::builder()
        .method("POST")
        .uri("/fileConverter")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No file uploaded");
}

#[tokio::test]
async fn path_components_in_file_name_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let (app, config) = app(dir.path());

    let req = multipart_upload("file", "../../escape.txt", "text/plain", "x");
    let (status, _) = send(app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(config.pdf_images_dir().join("escape.txt").exists());
    assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
}

#[tokio::test]
async fn images_404_when_absent() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app(dir.path());

    let (status, json) = send(app, get("/fileConverter/report")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "No images found");
}

#[tokio::test]
async fn images_listed_in_page_order() {
    let dir = tempfile::tempdir().unwrap();
    let (app, config) = app(dir.path());
    let set = config.pdf_images_dir().join("report");
    std::fs::create_dir_all(&set).unwrap();
    for page in [3, 1, 2] {
        std::fs::write(set.join(format!("report_page_{page}.png")), b"png").unwrap();
    }

    let (status, json) = send(app, get("/fileConverter/report.xlsx")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(
        json["images"],
        serde_json::json!([
            "/uploads/pdf-images/report/report_page_1.png",
            "/uploads/pdf-images/report/report_page_2.png",
            "/uploads/pdf-images/report/report_page_3.png",
        ])
    );
}

#[tokio::test]
async fn get_pdf_404_then_200() {
    let dir = tempfile::tempdir().unwrap();
    let (app, config) = app(dir.path());

    let (status, json) = send(app.clone(), get("/get-pdf/memo")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "PDF file not found");

    std::fs::create_dir_all(config.pdf_images_dir()).unwrap();
    std::fs::write(config.pdf_images_dir().join("memo.pdf"), b"%PDF-1.7").unwrap();

    let (status, json) = send(app, get("/get-pdf/memo")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["pdfUrl"], "/uploads/pdf-images/memo.pdf");
}

#[tokio::test]
async fn generated_files_are_served_statically() {
    let dir = tempfile::tempdir().unwrap();
    let (app, config) = app(dir.path());
    std::fs::create_dir_all(config.pdf_images_dir()).unwrap();
    std::fs::write(config.pdf_images_dir().join("memo.pdf"), b"%PDF-1.7").unwrap();

    let resp = app
        .oneshot(get("/uploads/pdf-images/memo.pdf"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"%PDF-1.7");
}

#[tokio::test]
async fn job_manifest_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let (app, config) = app(dir.path());

    let (status, json) = send(app.clone(), get("/jobs/not-a-job")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Job not found");

    let upload = UploadedFile {
        original_name: "memo.docx".into(),
        stored_path: config.pdf_images_dir().join("memo.docx"),
        mime_type: "application/msword".into(),
        extension: ".docx".into(),
    };
    let manifest = JobManifest::new(uuid::Uuid::new_v4(), &upload);
    manifest.save(&config).await.unwrap();

    let (status, json) = send(app, get(&format!("/jobs/{}", manifest.job_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["originalName"], "memo.docx");
    assert_eq!(json["stages"]["upload"], "done");
}

#[tokio::test]
async fn extensionless_upload_does_not_look_like_a_page_set() {
    let dir = tempfile::tempdir().unwrap();
    let (app, config) = app(dir.path());

    let req = multipart_upload("file", "report", "application/octet-stream", "x");
    let (status, _) = send(app.clone(), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(config.pdf_images_dir().join("report").is_file());

    let (status, json) = send(app, get("/fileConverter/report")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "No images found");
}

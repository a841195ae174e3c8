//! HTTP upload service tests. Requests go straight into the router via
//! `tower::ServiceExt::oneshot`; no socket is opened except in the bind test.

#![cfg(feature = "server")]

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::{media_boxes, synthetic_pdf, SolidRasterizer};
use pdfshrink::{router, OptimizeConfig, Pipeline, Server, ServerConfig};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "pdfshrink-test-boundary";

fn app_with(rasterizer: SolidRasterizer) -> Router {
    let pipeline = Pipeline::with_rasterizer(OptimizeConfig::default(), Arc::new(rasterizer));
    router(Arc::new(pipeline), &ServerConfig::default())
}

fn app() -> Router {
    app_with(SolidRasterizer::new([20, 90, 160]))
}

/// One-part multipart body.
fn multipart_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(path: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

#[tokio::test]
async fn valid_upload_returns_the_optimised_pdf() {
    let body = multipart_body("file", "report.pdf", "application/pdf", &synthetic_pdf(1));
    let (status, headers, bytes) = send(app(), upload_request("/optimize", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"optimized-report.pdf\""
    );
    assert!(headers.get("x-skipped-pages").is_none());
    assert_eq!(media_boxes(&bytes).len(), 1);
}

#[tokio::test]
async fn skipped_pages_are_listed_in_a_header() {
    let app = app_with(SolidRasterizer::new([0, 0, 0]).with_empty_pages(&[2, 4]));
    let body = multipart_body("file", "doc.pdf", "application/pdf", &synthetic_pdf(4));
    let (status, headers, bytes) = send(app, upload_request("/optimize", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-skipped-pages"], "2,4");
    assert_eq!(media_boxes(&bytes).len(), 2);
}

#[tokio::test]
async fn non_pdf_upload_is_rejected() {
    let body = multipart_body("file", "notes.txt", "text/plain", b"hello");
    let (status, _, bytes) = send(app(), upload_request("/optimize", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(bytes, b"Only PDF files are supported");
}

#[tokio::test]
async fn upload_under_another_field_name_counts_as_missing() {
    let body = multipart_body("document", "doc.pdf", "application/pdf", &synthetic_pdf(1));
    let (status, _, bytes) = send(app(), upload_request("/optimize", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(bytes, b"No file uploaded");
}

#[tokio::test]
async fn non_multipart_body_counts_as_missing() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/optimize")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, _, bytes) = send(app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(bytes, b"No file uploaded");
}

#[tokio::test]
async fn processing_failure_is_a_generic_500() {
    let app = app_with(SolidRasterizer::new([0, 0, 0]).failing_on(1));
    let body = multipart_body("file", "doc.pdf", "application/pdf", &synthetic_pdf(2));
    let (status, _, bytes) = send(app, upload_request("/optimize", body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(bytes, b"Error processing file");
}

#[tokio::test]
async fn unparsable_pdf_is_a_500() {
    let body = multipart_body("file", "broken.pdf", "application/pdf", b"garbage");
    let (status, _, _) = send(app(), upload_request("/optimize", body)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn get_is_method_not_allowed() {
    for path in ["/optimize", "/", "/anything"] {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let (status, _, bytes) = send(app(), request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "GET {path}");
        assert_eq!(bytes, b"Method not allowed");
    }
}

#[tokio::test]
async fn post_to_unknown_path_is_not_found() {
    let body = multipart_body("file", "doc.pdf", "application/pdf", &synthetic_pdf(1));
    let (status, _, bytes) = send(app(), upload_request("/compress", body)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(bytes, b"Not found");
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let pipeline = Pipeline::with_rasterizer(
        OptimizeConfig::default(),
        Arc::new(SolidRasterizer::new([0, 0, 0])),
    );
    let config = ServerConfig {
        max_upload_bytes: 256,
        ..ServerConfig::default()
    };
    let app = router(Arc::new(pipeline), &config);

    let body = multipart_body("file", "big.pdf", "application/pdf", &vec![b'x'; 4096]);
    let (status, _, _) = send(app, upload_request("/optimize", body)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn server_binds_an_ephemeral_port() {
    let pipeline = Pipeline::with_rasterizer(
        OptimizeConfig::default(),
        Arc::new(SolidRasterizer::new([0, 0, 0])),
    );
    let config = ServerConfig {
        bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        ..ServerConfig::default()
    };

    let server = Server::bind(&config, Arc::new(pipeline)).await.unwrap();
    let addr = server.local_addr().unwrap();
    assert_eq!(addr.ip(), Ipv4Addr::LOCALHOST);
    assert_ne!(addr.port(), 0);
}

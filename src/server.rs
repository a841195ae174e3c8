//! HTTP upload service.
//!
//! One route:
//! - POST /optimize - multipart upload (field `file`, `application/pdf`),
//!   responds with the rasterised PDF as an attachment
//!
//! Every other request gets a plain-text 405 (non-POST) or 404 (POST to any
//! other path). Each request runs its own pipeline call on the blocking pool;
//! nothing is shared between requests except the immutable [`Pipeline`].

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::convert::{convert, Pipeline};
use crate::error::ShrinkError;

/// Multipart field that carries the upload.
pub const FILE_FIELD: &str = "file";

/// The only accepted upload content type.
pub const PDF_MIME: &str = "application/pdf";

/// Response header listing pages that rendered to nothing.
pub const SKIPPED_PAGES_HEADER: &str = "x-skipped-pages";

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

// ============================================================================
// Router
// ============================================================================

/// Build the service router.
pub fn router(pipeline: Arc<Pipeline>, config: &ServerConfig) -> Router {
    Router::new()
        .route("/optimize", post(optimize).fallback(fallback))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { pipeline })
}

fn plain(status: StatusCode, message: &'static str) -> Response {
    (status, message).into_response()
}

/// Anything that is not `POST /optimize`.
async fn fallback(method: Method) -> Response {
    if method != Method::POST {
        plain(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        plain(StatusCode::NOT_FOUND, "Not found")
    }
}

// ============================================================================
// Handlers
// ============================================================================

struct Upload {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// Find the `file` part of the form. `Ok(None)` when there is none.
async fn read_upload(multipart: &mut Multipart) -> Result<Option<Upload>, Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("Malformed multipart body: {}", e);
                return Err(read_failure(e.status()));
            }
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        // A part without a filename is a plain form value, not a file.
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            return Ok(None);
        };
        let content_type = field.content_type().map(str::to_owned);

        let bytes = field.bytes().await.map_err(|e| {
            warn!("Failed to read upload '{}': {}", file_name, e);
            read_failure(e.status())
        })?;

        return Ok(Some(Upload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }
}

/// Body-read errors: 413 past the upload limit, 400 otherwise.
fn read_failure(status: StatusCode) -> Response {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        plain(status, "File too large")
    } else {
        plain(StatusCode::BAD_REQUEST, "Malformed multipart body")
    }
}

/// POST /optimize
async fn optimize(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => {
            warn!("Rejected upload: {}", rejection);
            return plain(StatusCode::BAD_REQUEST, "No file uploaded");
        }
    };

    let upload = match read_upload(&mut multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return plain(StatusCode::BAD_REQUEST, "No file uploaded"),
        Err(response) => return response,
    };

    if upload.content_type.as_deref() != Some(PDF_MIME) {
        return plain(StatusCode::BAD_REQUEST, "Only PDF files are supported");
    }

    info!(
        file_name = %upload.file_name,
        size = upload.bytes.len(),
        "Optimising upload"
    );

    let output = match convert(Arc::clone(&state.pipeline), upload.bytes).await {
        Ok(output) => output,
        Err(e) => {
            error!(file_name = %upload.file_name, "Error processing file: {}", e);
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "Error processing file");
        }
    };

    info!(
        file_name = %upload.file_name,
        pages = output.stats.rendered_pages,
        skipped = output.stats.skipped_pages.len(),
        input_bytes = output.stats.input_bytes,
        output_bytes = output.stats.output_bytes,
        "Upload optimised"
    );

    let disposition = format!(
        "attachment; filename=\"optimized-{}\"",
        sanitize_file_name(&upload.file_name)
    );

    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, PDF_MIME.to_string())],
        output.pdf,
    )
        .into_response();

    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }
    if output.stats.is_partial() {
        let pages = output
            .stats
            .skipped_pages
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");
        if let Ok(value) = HeaderValue::from_str(&pages) {
            response.headers_mut().insert(SKIPPED_PAGES_HEADER, value);
        }
    }

    response
}

/// Replace characters that cannot appear inside a quoted header value.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}

// ============================================================================
// Server handle
// ============================================================================

/// A bound listener plus the router it serves.
pub struct Server {
    listener: TcpListener,
    app: Router,
}

impl Server {
    /// Bind the listening socket. The socket stays open until [`Server::run`]
    /// returns.
    pub async fn bind(config: &ServerConfig, pipeline: Arc<Pipeline>) -> Result<Self, ShrinkError> {
        let listener = TcpListener::bind(config.bind)
            .await
            .map_err(|e| ShrinkError::Server {
                addr: config.bind.to_string(),
                source: e,
            })?;
        Ok(Self {
            listener,
            app: router(pipeline, config),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ShrinkError> {
        self.listener
            .local_addr()
            .map_err(|e| ShrinkError::Internal(e.to_string()))
    }

    /// Serve until Ctrl-C.
    pub async fn run(self) -> Result<(), ShrinkError> {
        let addr = self.local_addr()?;
        info!("Server running on {}", addr);

        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ShrinkError::Server {
                addr: addr.to_string(),
                source: e,
            })?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

//! Mock reporting backend
//!
//! Local stand-in for the posture reporting service, for development and
//! manual end-to-end runs.
//!
//! Endpoints (all POST):
//! - /main/identify-camera/        form {email, password} -> "user identified"
//! - /main/my-endpoint/            form {email, password, alert} -> "success"
//! - /main/user-incorrect-postures/ multipart {email, password, image} -> 200
//! - /main/video-data/             form {email, password, start_time, end_time,
//!                                 total_alerts, incorrect_postures} -> "success"
//!
//! Usage:
//!   cargo run --bin mock-backend -- --port 8000 --email me@example.com --password secret

use bytes::Bytes;
use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mock-backend")]
#[command(about = "Mock posture reporting backend for local runs")]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Only accept this account email (any non-empty email when unset)
    #[arg(long)]
    email: Option<String>,

    /// Only accept this account password
    #[arg(long)]
    password: Option<String>,

    /// Answer every image upload with HTTP 500
    #[arg(long)]
    fail_uploads: bool,

    /// Save uploaded images here
    #[arg(long)]
    upload_dir: Option<PathBuf>,
}

struct MockState {
    email: Option<String>,
    password: Option<String>,
    fail_uploads: bool,
    upload_dir: Option<PathBuf>,
    alerts: AtomicU64,
    uploads: AtomicU64,
    sessions: AtomicU64,
}

impl MockState {
    fn authorized(&self, fields: &HashMap<String, String>) -> bool {
        let email = fields.get("email").map(String::as_str).unwrap_or("");
        let password = fields.get("password").map(String::as_str).unwrap_or("");
        if email.is_empty() {
            return false;
        }
        self.email.as_deref().map_or(true, |e| e == email)
            && self.password.as_deref().map_or(true, |p| p == password)
    }
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn status_response(status: &str) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, serde_json::json!({ "status": status }))
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Decode an application/x-www-form-urlencoded body
fn parse_form(body: &[u8]) -> Result<HashMap<String, String>, serde_urlencoded::de::Error> {
    serde_urlencoded::from_bytes(body)
}

/// Text fields and file parts of a multipart/form-data body
#[derive(Debug, Default)]
struct MultipartBody {
    fields: HashMap<String, String>,
    files: Vec<(String, Bytes)>,
}

async fn parse_multipart(body: Bytes, boundary: String) -> Result<MultipartBody, multer::Error> {
    let stream = Full::new(body).into_data_stream();
    let mut multipart = multer::Multipart::new(stream, boundary);
    let mut parsed = MultipartBody::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(filename) => parsed.files.push((filename, field.bytes().await?)),
            None => {
                parsed.fields.insert(name, field.text().await?);
            }
        }
    }
    Ok(parsed)
}

fn boundary(req: &Request<hyper::body::Incoming>) -> Option<String> {
    let content_type = req.headers().get(CONTENT_TYPE)?.to_str().ok()?;
    multer::parse_boundary(content_type).ok()
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<MockState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::POST {
        return Ok(empty_response(StatusCode::METHOD_NOT_ALLOWED));
    }
    let path = req.uri().path().to_string();
    let multipart_boundary = boundary(&req);

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(path = %path, error = %e, "mock_body_read_failed");
            return Ok(empty_response(StatusCode::BAD_REQUEST));
        }
    };

    let form = || match parse_form(&body) {
        Ok(fields) => Some(fields),
        Err(e) => {
            warn!(path = %path, error = %e, "mock_form_invalid");
            None
        }
    };

    let response = match path.as_str() {
        "/main/identify-camera/" => {
            let Some(fields) = form() else {
                return Ok(empty_response(StatusCode::BAD_REQUEST));
            };
            if state.authorized(&fields) {
                info!(email = %fields.get("email").map_or("", |s| s.as_str()), "mock_identified");
                status_response("user identified")
            } else {
                json_response(
                    StatusCode::OK,
                    serde_json::json!({ "status": "user not identified", "message": "invalid credentials" }),
                )
            }
        }
        "/main/my-endpoint/" => {
            let Some(fields) = form() else {
                return Ok(empty_response(StatusCode::BAD_REQUEST));
            };
            let alert = fields.get("alert").map(String::as_str).unwrap_or("");
            if state.authorized(&fields) && matches!(alert, "neck" | "back") {
                let total = state.alerts.fetch_add(1, Ordering::Relaxed) + 1;
                info!(alert = %alert, total = %total, "mock_alert_received");
                status_response("success")
            } else {
                status_response("failed")
            }
        }
        "/main/user-incorrect-postures/" => {
            let Some(boundary) = multipart_boundary else {
                return Ok(empty_response(StatusCode::BAD_REQUEST));
            };
            let MultipartBody { fields, files } = match parse_multipart(body.clone(), boundary).await {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(path = %path, error = %e, "mock_multipart_invalid");
                    return Ok(empty_response(StatusCode::BAD_REQUEST));
                }
            };
            if !state.authorized(&fields) {
                empty_response(StatusCode::UNAUTHORIZED)
            } else if state.fail_uploads {
                warn!(files = %files.len(), "mock_upload_rejected");
                empty_response(StatusCode::INTERNAL_SERVER_ERROR)
            } else if files.is_empty() {
                empty_response(StatusCode::BAD_REQUEST)
            } else {
                for (filename, bytes) in &files {
                    let n = state.uploads.fetch_add(1, Ordering::Relaxed);
                    if let Some(dir) = &state.upload_dir {
                        let target = dir.join(format!("{}-{}", n, filename));
                        if let Err(e) = tokio::fs::write(&target, bytes).await {
                            error!(path = %target.display(), error = %e, "mock_upload_save_failed");
                        }
                    }
                    info!(filename = %filename, bytes = %bytes.len(), "mock_image_received");
                }
                json_response(StatusCode::OK, serde_json::json!({ "status": "success" }))
            }
        }
        "/main/video-data/" => {
            let Some(fields) = form() else {
                return Ok(empty_response(StatusCode::BAD_REQUEST));
            };
            let postures: Option<Vec<String>> = fields
                .get("incorrect_postures")
                .and_then(|raw| serde_json::from_str(raw).ok());
            match postures {
                Some(postures) if state.authorized(&fields) => {
                    let n = state.sessions.fetch_add(1, Ordering::Relaxed) + 1;
                    info!(
                        session = %n,
                        start_time = %fields.get("start_time").map_or("", |s| s.as_str()),
                        end_time = %fields.get("end_time").map_or("", |s| s.as_str()),
                        total_alerts = %fields.get("total_alerts").map_or("", |s| s.as_str()),
                        incorrect_postures = ?postures,
                        "mock_session_received"
                    );
                    status_response("success")
                }
                _ => status_response("failed"),
            }
        }
        _ => empty_response(StatusCode::NOT_FOUND),
    };
    Ok(response)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    if let Some(dir) = &args.upload_dir {
        tokio::fs::create_dir_all(dir).await?;
    }

    let state = Arc::new(MockState {
        email: args.email,
        password: args.password,
        fail_uploads: args.fail_uploads,
        upload_dir: args.upload_dir,
        alerts: AtomicU64::new(0),
        uploads: AtomicU64::new(0),
        sessions: AtomicU64::new(0),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(addr).await?;
    info!(port = %args.port, fail_uploads = %state.fail_uploads, "mock_backend_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let state = state.clone();
                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let state = state.clone();
                                async move { handle_request(req, state).await }
                            });
                            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                                error!(error = %e, "mock_http_error");
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "mock_accept_error"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!(
                    alerts = %state.alerts.load(Ordering::Relaxed),
                    uploads = %state.uploads.load(Ordering::Relaxed),
                    sessions = %state.sessions.load(Ordering::Relaxed),
                    "mock_backend_shutdown"
                );
                return Ok(());
            }
        }
    }
}

//! Purpose: Serve the UI entry and files under the data root over HTTP.
//! Exports: `router`, `serve_until`.
//! Role: Axum router plus the graceful serve loop driven by the lifecycle controller.
//! Invariants: Only files whose canonical path lies under the data root are served.
//! Invariants: `/`, `/ui/` and `/<ui file name>` always map to the UI entry.
//! Invariants: Non-GET methods get 405; HEAD is answered like GET without a body.

use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::future::IntoFuture;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::core::config::ServerConfig;
use crate::core::error::{Error, ErrorKind};
use crate::core::resolve::{RequestPathError, resolve_request_path};

#[derive(Debug)]
struct AppState {
    data_root: PathBuf,
    ui_entry: PathBuf,
    ui_name: Option<String>,
}

pub(crate) fn router(config: &ServerConfig) -> Router {
    let state = Arc::new(AppState {
        data_root: config.data_root().to_path_buf(),
        ui_entry: config.ui_entry().to_path_buf(),
        ui_name: config.ui_name().map(str::to_string),
    });

    Router::new()
        .route("/", get(ui_entry).fallback(method_not_allowed))
        .route("/ui/", get(ui_entry).fallback(method_not_allowed))
        .route("/*path", get(data_file).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the server on an already-bound listener until `shutdown` fires.
///
/// On shutdown, in-flight requests get `drain_timeout` to finish; after that the
/// listener and remaining connections are dropped.
pub(crate) async fn serve_until(
    listener: std::net::TcpListener,
    app: Router,
    shutdown: oneshot::Receiver<()>,
    drain_timeout: Duration,
) -> Result<(), Error> {
    let listener = tokio::net::TcpListener::from_std(listener).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to register listener")
            .with_source(err)
    })?;
    if let Ok(addr) = listener.local_addr() {
        info!("listening on http://{addr}");
    }

    let (drain_tx, drain_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = drain_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown => {
            let _ = drain_tx.send(());
            match tokio::time::timeout(drain_timeout, &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    warn!(
                        timeout_ms = drain_timeout.as_millis() as u64,
                        "drain timed out, forcing close"
                    );
                }
            }
        }
    };
    Ok(())
}

async fn ui_entry(State(state): State<Arc<AppState>>) -> Response {
    serve_ui(&state).await
}

async fn data_file(
    State(state): State<Arc<AppState>>,
    AxumPath(path): AxumPath<String>,
) -> Response {
    let request = path.trim_start_matches('/').to_string();
    if state.ui_name.as_deref() == Some(request.as_str()) {
        return serve_ui(&state).await;
    }

    let root = state.data_root.clone();
    let lookup = request.clone();
    let result = tokio::task::spawn_blocking(move || {
        let file = resolve_request_path(&root, &lookup)?;
        let bytes = std::fs::read(&file).map_err(|_| RequestPathError::NotFound)?;
        Ok::<_, RequestPathError>((file, bytes))
    })
    .await;

    match result {
        Ok(Ok((file, bytes))) => {
            debug!(path = %request, bytes = bytes.len(), "serving data file");
            file_response(&file, bytes)
        }
        Ok(Err(RequestPathError::Traversal)) => {
            warn!(path = %request, "rejected request outside the data root");
            error_response(StatusCode::FORBIDDEN, "path is outside the data root")
        }
        Ok(Err(RequestPathError::NotFound)) => {
            error_response(StatusCode::NOT_FOUND, "no such file")
        }
        Err(err) => {
            error!("file read task failed: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

async fn serve_ui(state: &AppState) -> Response {
    match tokio::fs::read(&state.ui_entry).await {
        Ok(bytes) => file_response(&state.ui_entry, bytes),
        Err(err) => {
            warn!(path = %state.ui_entry.display(), "ui entry unreadable: {err}");
            error_response(StatusCode::NOT_FOUND, "ui entry is unavailable")
        }
    }
}

async fn method_not_allowed() -> Response {
    let mut response =
        error_response(StatusCode::METHOD_NOT_ALLOWED, "only GET requests are served");
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
    response
}

async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "no such file")
}

fn file_response(path: &Path, bytes: Vec<u8>) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let mut response = Response::new(Body::from(bytes));
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let kind = match status {
        StatusCode::FORBIDDEN => "Forbidden",
        StatusCode::NOT_FOUND => "NotFound",
        StatusCode::METHOD_NOT_ALLOWED => "MethodNotAllowed",
        _ => "Internal",
    };
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind,
            message: message.to_string(),
        },
    };
    (status, Json(body)).into_response()
}

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Request, State};
use axum::http::header::{CONNECTION, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::any;
use log::{debug, info, warn};
use reqwest::Url;
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeFile;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::engine::models::Platform;
use crate::storage::DOWNLOAD_PAGE;
use crate::util::escape_html;

/// Static file server over the downloads tree.
pub struct ArtifactServer {
    root: PathBuf,
    listener: TcpListener,
}

#[derive(Clone)]
struct ServerState {
    root: Arc<PathBuf>,
}

impl ArtifactServer {
    pub async fn bind(root: impl Into<PathBuf>, addr: SocketAddr) -> Result<Self, String> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| format!("unable to bind {addr}: {e}"))?;
        Ok(Self {
            root: root.into(),
            listener,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, String> {
        self.listener
            .local_addr()
            .map_err(|e| format!("unable to read listener address: {e}"))
    }

    pub fn root(&self) -> &FsPath {
        &self.root
    }

    /// Serve until Ctrl-C is pressed, then let open responses finish.
    pub async fn serve_until_interrupted(self) -> Result<(), String> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    /// Serve until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<(), String>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(
            "server: serving {} on {}",
            self.root.display(),
            self.local_addr()?
        );
        axum::serve(self.listener, router(self.root))
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| format!("server error: {e}"))
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("server: unable to listen for Ctrl-C: {err}");
        return;
    }
    info!("server: interrupted, shutting down");
}

/// Every response carries `Access-Control-Allow-Origin: *` and closes its connection.
pub fn router(root: PathBuf) -> Router {
    let state = ServerState {
        root: Arc::new(root),
    };
    Router::new()
        .route("/", any(serve_root))
        .route("/{*path}", any(serve_path))
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            CONNECTION,
            HeaderValue::from_static("close"),
        ))
        .layer(CorsLayer::permissive())
}

async fn serve_root(State(state): State<ServerState>, req: Request) -> Response {
    respond(&state, "", req).await
}

async fn serve_path(
    State(state): State<ServerState>,
    Path(path): Path<String>,
    req: Request,
) -> Response {
    respond(&state, &path, req).await
}

async fn respond(state: &ServerState, path: &str, req: Request) -> Response {
    let method = req.method().clone();
    let uri_path = req.uri().path().to_owned();
    let response = if method == Method::GET || method == Method::HEAD {
        resolve(state, path, &uri_path, req).await
    } else {
        (StatusCode::NOT_IMPLEMENTED, "501 Not Implemented\n").into_response()
    };
    info!(
        "server: {} {} -> {}",
        method,
        uri_path,
        response.status().as_u16()
    );
    response
}

async fn resolve(state: &ServerState, path: &str, uri_path: &str, req: Request) -> Response {
    let Some(relative) = resolve_relative(path) else {
        return not_found();
    };
    let target = state.root.join(relative);
    let Ok(meta) = tokio::fs::metadata(&target).await else {
        return not_found();
    };
    if !meta.is_dir() {
        return serve_file(&target, req).await;
    }

    if !uri_path.ends_with('/') {
        return (
            StatusCode::MOVED_PERMANENTLY,
            [(LOCATION, format!("{uri_path}/"))],
        )
            .into_response();
    }
    let index = target.join(DOWNLOAD_PAGE);
    if tokio::fs::metadata(&index)
        .await
        .is_ok_and(|meta| meta.is_file())
    {
        return serve_file(&index, req).await;
    }
    match render_listing(&target, &format!("/{path}")).await {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            warn!("server: {err}");
            not_found()
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 Not Found\n").into_response()
}

/// Streams the file; artifacts are always labelled as opaque binaries.
async fn serve_file(path: &FsPath, req: Request) -> Response {
    let mut response = match ServeFile::new(path).oneshot(req).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    };
    if is_artifact(path) && response.status().is_success() {
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
    }
    debug!("server: {} -> {}", path.display(), response.status());
    response
}

fn is_artifact(path: &FsPath) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            Platform::ALL
                .iter()
                .any(|platform| ext.eq_ignore_ascii_case(platform.extension()))
        })
}

/// Map a decoded URL path onto a path relative to the root.
///
/// Any `..` segment, or a segment that could be read as a separator or
/// drive prefix, rejects the whole path.
fn resolve_relative(decoded: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains(['\\', ':', '\0']) => return None,
            s => relative.push(s),
        }
    }
    Some(relative)
}

/// Percent-encoded relative link for one directory entry.
fn listing_href(name: &str) -> String {
    let Ok(mut url) = Url::parse("http://localhost/") else {
        return name.to_owned();
    };
    match url.path_segments_mut() {
        Ok(mut segments) => {
            segments.clear().push(name);
        }
        Err(()) => return name.to_owned(),
    }
    url.path().trim_start_matches('/').to_owned()
}

async fn render_listing(dir: &FsPath, url_path: &str) -> Result<String, String> {
    let mut reader = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| format!("unable to list {}: {e}", dir.display()))?;
    let mut names = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| format!("unable to list {}: {e}", dir.display()))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type().await.is_ok_and(|kind| kind.is_dir());
        names.push((name, is_dir));
    }
    names.sort();

    let title = escape_html(url_path);
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Index of {title}</title>\n</head>\n<body>\n<h1>Index of {title}</h1>\n<hr>\n<ul>\n"
    );
    if url_path != "/" {
        html.push_str("<li><a href=\"../\">../</a></li>\n");
    }
    for (name, is_dir) in &names {
        let slash = if *is_dir { "/" } else { "" };
        html.push_str(&format!(
            "<li><a href=\"{}{slash}\">{}{slash}</a></li>\n",
            escape_html(&listing_href(name)),
            escape_html(name)
        ));
    }
    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    Ok(html)
}

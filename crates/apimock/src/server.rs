//! HTTP dispatcher: routing table, fallbacks and the hyper accept loop.

use std::convert::Infallible;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderMap, HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use percent_encoding::percent_decode_str;
use tokio::net::TcpListener;

use apimock_router::{RouteMatch, Router};
use apimock_telemetry::{log_listening, log_request_completed};
use apimock_validator::ErrorResponse;

use crate::config::DEFAULT_MAX_BODY_SIZE;
use crate::error::HandlerError;

/// How long open connections may keep running after shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub type HandlerResult = Result<Response<Full<Bytes>>, HandlerError>;

/// A registered request handler.
pub type Handler = Arc<dyn Fn(RouteRequest) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Wrap an async function as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// A matched request, with its body fully read.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    /// Percent-decoded path parameters, in pattern order.
    pub params: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RouteRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

/// Build a response with the given status, content type and body.
pub fn body_response(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Build a JSON response.
pub fn json_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    body_response(status, "application/json", body)
}

/// Build the 404 fallback response.
pub fn not_found_response() -> Response<Full<Bytes>> {
    json_response(StatusCode::NOT_FOUND, ErrorResponse::not_found().to_json())
}

/// Routes requests to registered handlers and answers everything else with
/// the JSON fallbacks.
pub struct Dispatcher {
    router: Router<Handler>,
    dev_mode: bool,
    max_body_size: usize,
}

impl Dispatcher {
    /// In dev mode, 500 responses carry the error's source chain.
    pub fn new(dev_mode: bool) -> Self {
        Self {
            router: Router::new(),
            dev_mode,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Reject request bodies larger than `limit` bytes with 413.
    pub fn with_max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }

    /// Register a handler under an express-style pattern (`/pets/:id`).
    ///
    /// Returns the handler previously registered for the same method and
    /// pattern shape, if any.
    pub fn route(&mut self, method: &str, pattern: &str, handler: Handler) -> Option<Handler> {
        self.router.insert(pattern, method, handler)
    }

    /// Serve files below `dir` for `GET {prefix}/<relative path>`.
    pub fn mount_static(&mut self, prefix: &str, dir: impl Into<PathBuf>) -> Option<Handler> {
        let root = Arc::new(dir.into());
        let pattern = format!("{}/*path", prefix.trim_end_matches('/'));
        let serve = handler(move |req: RouteRequest| {
            let root = Arc::clone(&root);
            async move { serve_file(&root, req.param("path").unwrap_or_default()).await }
        });
        self.route("GET", &pattern, serve)
    }

    /// Number of registered (method, pattern) pairs.
    pub fn route_count(&self) -> usize {
        self.router.len()
    }

    /// Look up a route; `HEAD` falls back to the `GET` handler.
    fn lookup(&self, path: &str, method: &Method) -> RouteMatch<'_, Handler> {
        let found = self.router.lookup(path, method.as_str());
        if *method == Method::HEAD && !matches!(found, RouteMatch::Found { .. }) {
            return self.router.lookup(path, Method::GET.as_str());
        }
        found
    }

    /// Handle one HTTP request. Never fails: errors become JSON responses.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let started = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let response = match self.lookup(&path, &method) {
            RouteMatch::Found { handler, params } => {
                let handler = Arc::clone(handler);
                let query = req.uri().query().map(str::to_string);
                let (parts, body) = req.into_parts();

                match Limited::new(body, self.max_body_size).collect().await {
                    Ok(collected) => {
                        let request = RouteRequest {
                            method: method.clone(),
                            path: path.clone(),
                            query,
                            params: decode_params(params),
                            headers: parts.headers,
                            body: collected.to_bytes(),
                        };
                        match handler(request).await {
                            Ok(response) => response,
                            Err(err) => self.error_response(&err),
                        }
                    }
                    Err(e) if e.is::<LengthLimitError>() => {
                        self.error_response(&HandlerError::BodyTooLarge(self.max_body_size))
                    }
                    Err(e) => self.error_response(&HandlerError::Body(e.to_string())),
                }
            }
            RouteMatch::MethodNotAllowed { allowed } => {
                let mut response = not_found_response();
                if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                    response.headers_mut().insert(ALLOW, value);
                }
                response
            }
            RouteMatch::NotFound => not_found_response(),
        };

        log_request_completed!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            duration_ms = started.elapsed().as_millis() as u64
        );
        response
    }

    /// Build the error fallback for a failed handler.
    fn error_response(&self, err: &HandlerError) -> Response<Full<Bytes>> {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!(error = %err, status = status.as_u16(), "request failed");
        }

        let mut payload = ErrorResponse::new(err.to_string());
        if self.dev_mode {
            payload = payload.with_stack(&err.stack());
        }
        json_response(status, payload.to_json())
    }

    /// Accept connections until `shutdown` resolves, then wait for open
    /// connections to finish.
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = listener.local_addr()?;
        let graceful = GracefulShutdown::new();
        tokio::pin!(shutdown);

        log_listening!(addr = %addr, routes = self.route_count());

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };

                    let dispatcher = Arc::clone(&self);
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req| {
                        let dispatcher = Arc::clone(&dispatcher);
                        async move { Ok::<_, Infallible>(dispatcher.handle(req).await) }
                    });

                    let conn = graceful.watch(http1::Builder::new().serve_connection(io, service));
                    tokio::spawn(async move {
                        if let Err(e) = conn.await {
                            tracing::debug!(peer = %peer, error = %e, "connection error");
                        }
                    });
                }
                _ = &mut shutdown => break,
            }
        }

        drop(listener);
        tokio::select! {
            _ = graceful.shutdown() => {}
            _ = tokio::time::sleep(SHUTDOWN_GRACE) => {
                tracing::warn!("timed out waiting for connections to close");
            }
        }
        Ok(())
    }
}

fn decode_params(params: Vec<(String, String)>) -> Vec<(String, String)> {
    params
        .into_iter()
        .map(|(name, raw)| {
            let value = percent_decode_str(&raw).decode_utf8_lossy().into_owned();
            (name, value)
        })
        .collect()
}

/// Join `relative` onto `root`, refusing anything that could escape it.
fn safe_join(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => path.push(part),
            _ => return None,
        }
    }
    Some(path)
}

async fn serve_file(root: &Path, relative: &str) -> HandlerResult {
    let Some(path) = safe_join(root, relative) else {
        return Ok(not_found_response());
    };

    let is_file = tokio::fs::metadata(&path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file {
        return Ok(not_found_response());
    }

    let contents = tokio::fs::read(&path)
        .await
        .map_err(|source| HandlerError::Asset {
            path: path.clone(),
            source,
        })?;

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let mut response = Response::new(Full::new(Bytes::from(contents)));
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    Ok(response)
}

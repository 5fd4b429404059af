//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Request bodies are
//! buffered (up to `max_body_bytes`) before routing so every handler works
//! on a plain `Request<Bytes>`.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::routes::{self, error_response, not_found_response, FullBody};
use crate::services::{
    AccountService, AnswerService, ModerationService, NotificationService, QuestionService,
};
use crate::store::ForumStore;
use crate::types::ForumError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Backing document store (MongoDB or in-memory)
    pub store: Arc<dyn ForumStore>,
    pub accounts: AccountService,
    pub questions: QuestionService,
    pub answers: AnswerService,
    pub notifications: NotificationService,
    pub moderation: ModerationService,
    /// Server start time, reported as uptime by /health
    pub started_at: Instant,
}

impl AppState {
    /// Wire every service onto one store
    pub fn new(args: Args, store: Arc<dyn ForumStore>, jwt: JwtValidator) -> Self {
        Self {
            accounts: AccountService::new(store.clone(), jwt),
            questions: QuestionService::new(store.clone()),
            answers: AnswerService::new(store.clone()),
            notifications: NotificationService::new(store.clone()),
            moderation: ModerationService::new(store.clone()),
            store,
            args,
            started_at: Instant::now(),
        }
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), ForumError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Agora listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - using the built-in JWT secret");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Buffer the body, then hand off to [`route`]
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    info!("[{}] {} {}", addr, req.method(), req.uri().path());

    let (parts, body) = req.into_parts();
    let body = match Limited::new(body, state.args.max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            debug!("[{}] body over {} bytes", addr, state.args.max_body_bytes);
            return Ok(to_boxed(error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large",
                Some("PAYLOAD_TOO_LARGE"),
            )));
        }
        Err(e) => {
            warn!("[{}] failed to read request body: {}", addr, e);
            return Ok(to_boxed(error_response(
                StatusCode::BAD_REQUEST,
                "Could not read request body",
                Some("BAD_REQUEST"),
            )));
        }
    };

    let response = route(state, Request::from_parts(parts, body)).await;
    Ok(to_boxed(response))
}

/// True when `path` is `prefix` or below it
fn under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Dispatch a buffered request to its handler
pub async fn route(state: Arc<AppState>, req: Request<Bytes>) -> Response<FullBody> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (method, path.as_str()) {
        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(),

        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        // Readiness probe - 200 only if the store answers
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            routes::readiness_check(Arc::clone(&state)).await
        }

        (_, p) if under(p, "/auth") => routes::handle_auth_request(req, state, &path).await,
        (_, p) if under(p, "/questions") => {
            routes::handle_questions_request(req, state, &path).await
        }
        (_, p) if under(p, "/answers") => routes::handle_answers_request(req, state, &path).await,
        (_, p) if under(p, "/notifications") => {
            routes::handle_notifications_request(req, state, &path).await
        }
        (_, p) if under(p, "/admin") => routes::handle_admin_request(req, state, &path).await,

        _ => not_found_response(&path),
    };

    with_cors(response)
}

fn with_cors(mut response: Response<FullBody>) -> Response<FullBody> {
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Headers", "Authorization, Content-Type")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header("Access-Control-Max-Age", "86400")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_matches_whole_segments() {
        assert!(under("/auth", "/auth"));
        assert!(under("/auth/login", "/auth"));
        assert!(!under("/authors", "/auth"));
        assert!(!under("/", "/auth"));
    }

    #[test]
    fn test_preflight_allows_forum_methods() {
        let resp = with_cors(preflight_response());
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let methods = resp.headers()["Access-Control-Allow-Methods"].to_str().unwrap();
        assert!(methods.contains("DELETE"));
        assert_eq!(resp.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}

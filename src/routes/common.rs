//! Shared helpers for route handlers
//!
//! The server buffers each request body before routing, so handlers take a
//! `Request<Bytes>` and return a fully built `Response<FullBody>`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE};
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::auth::{extract_token_from_cookie, extract_token_from_header, TOKEN_COOKIE};
use crate::server::AppState;
use crate::services::Actor;
use crate::store::{Pagination, DEFAULT_PAGE_SIZE};
use crate::types::{ForumError, Result};
use crate::voting::VoteDirection;

pub type FullBody = Full<Bytes>;

/// Body of `POST /questions/{id}/vote` and `POST /answers/{id}/vote`
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    #[serde(rename = "type")]
    pub direction: VoteDirection,
}

/// Generic acknowledgement body
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

/// Error body returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

pub fn error_response(status: StatusCode, error: &str, code: Option<&str>) -> Response<FullBody> {
    json_response(
        status,
        &ErrorResponse {
            error: error.to_string(),
            code: code.map(|c| c.to_string()),
        },
    )
}

/// Map a service error onto its HTTP response
pub fn forum_error_response(err: ForumError) -> Response<FullBody> {
    let status = err.status_code();
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        debug!("Request rejected: {}", err);
    }
    error_response(status, &err.public_message(), Some(err.code()))
}

/// Collapse a handler result into a response
pub fn respond(result: Result<Response<FullBody>>) -> Response<FullBody> {
    result.unwrap_or_else(forum_error_response)
}

pub fn not_found_response(path: &str) -> Response<FullBody> {
    error_response(
        StatusCode::NOT_FOUND,
        &format!("No route for {}", path),
        Some("NOT_FOUND"),
    )
}

/// Decode a JSON request body
pub fn read_json<T: DeserializeOwned>(req: &Request<Bytes>) -> Result<T> {
    let body = req.body();
    if body.is_empty() {
        return Err(ForumError::BadRequest("Missing request body".into()));
    }
    serde_json::from_slice(body)
        .map_err(|e| ForumError::BadRequest(format!("Invalid JSON body: {}", e)))
}

/// Split the part of `path` after `prefix` into non-empty segments
pub fn segments<'a>(path: &'a str, prefix: &str) -> Vec<&'a str> {
    path.strip_prefix(prefix)
        .unwrap_or("")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

/// Decoded `key=value` pairs of a query string
pub fn query_pairs(query: Option<&str>) -> Vec<(String, String)> {
    let Some(query) = query else {
        return Vec::new();
    };

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = value.replace('+', " ");
            let value = urlencoding::decode(&value)
                .map(|v| v.into_owned())
                .unwrap_or(value);
            (key.to_string(), value)
        })
        .collect()
}

/// `page`/`limit` query parameters, clamped
pub fn pagination_from(pairs: &[(String, String)]) -> Pagination {
    let mut page = 1;
    let mut limit = DEFAULT_PAGE_SIZE;
    for (key, value) in pairs {
        match key.as_str() {
            "page" => page = value.parse().unwrap_or(1),
            "limit" => limit = value.parse().unwrap_or(DEFAULT_PAGE_SIZE),
            _ => {}
        }
    }
    Pagination::new(page, limit)
}

/// Bearer header first, then the `token` cookie
pub fn request_token(req: &Request<Bytes>) -> Option<&str> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if let Some(token) = extract_token_from_header(header) {
        return Some(token);
    }

    let cookie = req.headers().get(COOKIE).and_then(|v| v.to_str().ok());
    extract_token_from_cookie(cookie, TOKEN_COOKIE)
}

/// Resolve the signed-in member or fail with 401
pub async fn authenticate(req: &Request<Bytes>, state: &AppState) -> Result<Actor> {
    let token = request_token(req)
        .ok_or_else(|| ForumError::Unauthorized("No token provided".into()))?;

    let result = state.accounts.jwt().verify_token(token);
    let claims = match result.claims {
        Some(claims) if result.valid => claims,
        _ => {
            return Err(ForumError::Unauthorized(
                result.error.unwrap_or_else(|| "Invalid token".into()),
            ))
        }
    };

    state.accounts.resolve(&claims).await
}

/// Like [`authenticate`], but anonymous callers and stale tokens yield `None`
pub async fn optional_actor(req: &Request<Bytes>, state: &AppState) -> Option<Actor> {
    request_token(req)?;
    match authenticate(req, state).await {
        Ok(actor) => Some(actor),
        Err(e) => {
            debug!("Ignoring credentials on public route: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs_decodes() {
        let pairs = query_pairs(Some("search=async+rust%3F&tag=tokio&empty"));
        assert_eq!(
            pairs,
            vec![
                ("search".to_string(), "async rust?".to_string()),
                ("tag".to_string(), "tokio".to_string()),
                ("empty".to_string(), String::new()),
            ]
        );
        assert!(query_pairs(None).is_empty());
    }

    #[test]
    fn test_segments() {
        assert_eq!(segments("/questions/abc/vote", "/questions"), vec!["abc", "vote"]);
        assert!(segments("/questions/", "/questions").is_empty());
    }

    #[test]
    fn test_vote_request_uses_type_field() {
        let req: VoteRequest = serde_json::from_str(r#"{"type":"up"}"#).unwrap();
        assert_eq!(req.direction, VoteDirection::Up);
        assert!(serde_json::from_str::<VoteRequest>(r#"{"type":"sideways"}"#).is_err());
    }

    #[test]
    fn test_pagination_from_defaults_and_clamps() {
        let p = pagination_from(&query_pairs(Some("page=0&limit=abc")));
        assert_eq!(p, Pagination::new(1, DEFAULT_PAGE_SIZE));

        let p = pagination_from(&query_pairs(Some("page=3&limit=1000")));
        assert_eq!(p.page, 3);
        assert_eq!(p.limit, crate::store::MAX_PAGE_SIZE);
    }

    #[test]
    fn test_request_token_prefers_header() {
        let req = Request::builder()
            .header(AUTHORIZATION, "Bearer from-header")
            .header(COOKIE, "token=from-cookie")
            .body(Bytes::new())
            .unwrap();
        assert_eq!(request_token(&req), Some("from-header"));

        let req = Request::builder()
            .header(COOKIE, "theme=dark; token=from-cookie")
            .body(Bytes::new())
            .unwrap();
        assert_eq!(request_token(&req), Some("from-cookie"));
    }

    #[test]
    fn test_error_body_hides_internal_detail() {
        let resp = forum_error_response(ForumError::Database("connection reset".into()));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

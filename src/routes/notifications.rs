//! HTTP routes for the member inbox
//!
//! - GET  /notifications            - Newest first; `?unread=true` filters
//! - POST /notifications/{id}/read  - Mark one read
//! - POST /notifications/read-all   - Mark all read

use bytes::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use super::common::{
    authenticate, json_response, not_found_response, query_pairs, respond, segments, FullBody,
    SuccessResponse,
};
use super::views::NotificationView;
use crate::server::AppState;
use crate::services::parse_id;
use crate::types::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxResponse {
    pub notifications: Vec<NotificationView>,
    pub unread_count: u64,
}

#[derive(Debug, Serialize)]
pub struct ReadAllResponse {
    pub updated: u64,
}

/// Main handler for /notifications/* routes
pub async fn handle_notifications_request(
    req: Request<Bytes>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();

    let result = match (method, segments(path, "/notifications").as_slice()) {
        (Method::GET, []) => handle_list(&req, &state).await,
        (Method::POST, ["read-all"]) => handle_read_all(&req, &state).await,
        (Method::POST, [id, "read"]) => handle_read(&req, &state, id).await,
        _ => return not_found_response(path),
    };

    respond(result)
}

async fn handle_list(req: &Request<Bytes>, state: &AppState) -> Result<Response<FullBody>> {
    let actor = authenticate(req, state).await?;
    let unread_only = query_pairs(req.uri().query())
        .iter()
        .any(|(key, value)| key == "unread" && (value == "true" || value == "1"));

    let inbox = state.notifications.inbox(&actor, unread_only).await?;
    Ok(json_response(
        StatusCode::OK,
        &InboxResponse {
            notifications: inbox.items.iter().map(NotificationView::from).collect(),
            unread_count: inbox.unread_count,
        },
    ))
}

async fn handle_read(
    req: &Request<Bytes>,
    state: &AppState,
    id: &str,
) -> Result<Response<FullBody>> {
    let actor = authenticate(req, state).await?;
    let id = parse_id(id, "notification")?;
    state.notifications.mark_read(&actor, &id).await?;

    Ok(json_response(
        StatusCode::OK,
        &SuccessResponse {
            success: true,
            message: "Notification marked as read".into(),
        },
    ))
}

async fn handle_read_all(req: &Request<Bytes>, state: &AppState) -> Result<Response<FullBody>> {
    let actor = authenticate(req, state).await?;
    let updated = state.notifications.mark_all_read(&actor).await?;
    Ok(json_response(StatusCode::OK, &ReadAllResponse { updated }))
}

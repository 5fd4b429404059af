//! Admin API endpoints for moderation
//!
//! ## Endpoints
//!
//! - `GET /admin/users` - List users with pagination, search, `isActive` filter
//! - `PUT /admin/users/{id}/status` - Ban or unban a user
//! - `POST /admin/moderation/bulk` - Bulk delete content or ban/unban users
//! - `GET /admin/stats` - Forum counters
//!
//! ## Authentication
//!
//! All endpoints require Admin permission level via JWT token.

use bytes::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::common::{
    authenticate, json_response, not_found_response, pagination_from, query_pairs, read_json,
    respond, segments, FullBody,
};
use super::views::{PageView, UserView};
use crate::auth::PermissionLevel;
use crate::server::AppState;
use crate::services::{parse_id, Actor, BulkAction};
use crate::store::UserQuery;
use crate::types::{ForumError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub action: BulkAction,
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub action: BulkAction,
    pub requested: usize,
    pub affected: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub users: u64,
    pub active_users: u64,
    pub banned_users: u64,
    pub questions: u64,
    pub answers: u64,
}

fn user_query(query: Option<&str>) -> UserQuery {
    let pairs = query_pairs(query);
    let mut params = UserQuery {
        pagination: pagination_from(&pairs),
        ..Default::default()
    };

    for (key, value) in pairs {
        match key.as_str() {
            "search" if !value.trim().is_empty() => {
                params.search = Some(value.trim().to_string());
            }
            "isActive" | "is_active" => params.is_active = value.parse().ok(),
            _ => {}
        }
    }

    params
}

async fn require_admin(req: &Request<Bytes>, state: &AppState) -> Result<Actor> {
    let actor = authenticate(req, state).await?;
    if actor.permission_level < PermissionLevel::Admin {
        return Err(ForumError::Forbidden("Admin permission required".into()));
    }
    Ok(actor)
}

/// Main handler for /admin/* routes
pub async fn handle_admin_request(
    req: Request<Bytes>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();

    let result = match (method, segments(path, "/admin").as_slice()) {
        (Method::GET, ["users"]) => handle_list_users(&req, &state).await,
        (Method::PUT, ["users", id, "status"]) => handle_update_status(&req, &state, id).await,
        (Method::POST, ["moderation", "bulk"]) => handle_bulk(&req, &state).await,
        (Method::GET, ["stats"]) => handle_stats(&req, &state).await,
        _ => return not_found_response(path),
    };

    respond(result)
}

/// GET /admin/users
async fn handle_list_users(req: &Request<Bytes>, state: &AppState) -> Result<Response<FullBody>> {
    let admin = require_admin(req, state).await?;
    let query = user_query(req.uri().query());
    let page = state.moderation.list_users(&admin, &query).await?;

    let view = PageView::new(page, query.pagination, |user| UserView::from(&user));
    Ok(json_response(StatusCode::OK, &view))
}

/// PUT /admin/users/{id}/status
async fn handle_update_status(
    req: &Request<Bytes>,
    state: &AppState,
    user_id: &str,
) -> Result<Response<FullBody>> {
    let admin = require_admin(req, state).await?;
    let user_id = parse_id(user_id, "user")?;
    let body: UpdateStatusRequest = read_json(req)?;

    let user = state
        .moderation
        .set_user_status(&admin, &user_id, body.is_active)
        .await?;
    Ok(json_response(StatusCode::OK, &UserView::from(&user)))
}

/// POST /admin/moderation/bulk
async fn handle_bulk(req: &Request<Bytes>, state: &AppState) -> Result<Response<FullBody>> {
    let admin = require_admin(req, state).await?;
    let body: BulkRequest = read_json(req)?;

    let outcome = state.moderation.bulk(&admin, body.action, &body.ids).await?;
    Ok(json_response(
        StatusCode::OK,
        &BulkResponse {
            action: outcome.action,
            requested: outcome.requested,
            affected: outcome.affected,
        },
    ))
}

/// GET /admin/stats
async fn handle_stats(req: &Request<Bytes>, state: &AppState) -> Result<Response<FullBody>> {
    let admin = require_admin(req, state).await?;
    let stats = state.moderation.stats(&admin).await?;

    Ok(json_response(
        StatusCode::OK,
        &StatsResponse {
            users: stats.users,
            active_users: stats.users.saturating_sub(stats.banned_users),
            banned_users: stats.banned_users,
            questions: stats.questions,
            answers: stats.answers,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_query_parsing() {
        let q = user_query(Some("search=ada&isActive=false&limit=5"));
        assert_eq!(q.search.as_deref(), Some("ada"));
        assert_eq!(q.is_active, Some(false));
        assert_eq!(q.pagination.limit, 5);

        let q = user_query(Some("isActive=maybe"));
        assert_eq!(q.is_active, None);
    }

    #[test]
    fn test_bulk_request_shape() {
        let body: BulkRequest =
            serde_json::from_str(r#"{"action":"ban_users","ids":["a","b"]}"#).unwrap();
        assert_eq!(body.action, BulkAction::BanUsers);
        assert_eq!(body.ids.len(), 2);
    }
}

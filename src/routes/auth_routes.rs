//! HTTP routes for member accounts
//!
//! - POST /auth/register - Create an account and get a JWT
//! - POST /auth/login    - Authenticate with username or email
//! - GET  /auth/me       - Profile of the token's owner

use bytes::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use super::common::{
    authenticate, json_response, not_found_response, read_json, respond, FullBody,
};
use super::views::{AuthView, UserView};
use crate::server::AppState;
use crate::services::{AuthSession, Registration};
use crate::types::Result;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email
    pub identifier: String,
    pub password: String,
}

fn auth_view(session: AuthSession) -> AuthView {
    AuthView {
        user: UserView::from(&session.user),
        token: session.token,
        expires_in: session.expires_in,
    }
}

/// Main handler for /auth/* routes
pub async fn handle_auth_request(
    req: Request<Bytes>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let subpath = path.strip_prefix("/auth").unwrap_or("");

    match (method, subpath) {
        (Method::POST, "/register") => respond(handle_register(&req, &state).await),
        (Method::POST, "/login") => respond(handle_login(&req, &state).await),
        (Method::GET, "/me") => respond(handle_me(&req, &state).await),
        _ => not_found_response(path),
    }
}

async fn handle_register(req: &Request<Bytes>, state: &AppState) -> Result<Response<FullBody>> {
    let body: RegisterRequest = read_json(req)?;
    let session = state
        .accounts
        .register(Registration {
            username: body.username,
            email: body.email,
            password: body.password,
        })
        .await?;

    Ok(json_response(StatusCode::CREATED, &auth_view(session)))
}

async fn handle_login(req: &Request<Bytes>, state: &AppState) -> Result<Response<FullBody>> {
    let body: LoginRequest = read_json(req)?;
    let session = state.accounts.login(&body.identifier, &body.password).await?;
    Ok(json_response(StatusCode::OK, &auth_view(session)))
}

async fn handle_me(req: &Request<Bytes>, state: &AppState) -> Result<Response<FullBody>> {
    let actor = authenticate(req, state).await?;
    let user = state.accounts.me(&actor).await?;
    Ok(json_response(StatusCode::OK, &UserView::from(&user)))
}

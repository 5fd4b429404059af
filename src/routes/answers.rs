//! HTTP routes for answers
//!
//! - POST   /questions/{id}/answers - Answer a question
//! - PUT    /answers/{id}           - Edit (author only)
//! - DELETE /answers/{id}           - Remove (author or admin)
//! - POST   /answers/{id}/vote      - Vote `{type: "up" | "down"}`
//! - POST   /answers/{id}/accept    - Toggle acceptance (question author only)

use bytes::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::common::{
    authenticate, json_response, not_found_response, read_json, respond, segments, FullBody,
    SuccessResponse, VoteRequest,
};
use super::views::AnswerView;
use crate::server::AppState;
use crate::services::{parse_id, AcceptOutcome};
use crate::types::Result;

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptResponse {
    pub accepted: bool,
    pub accepted_answer_id: Option<String>,
}

impl From<AcceptOutcome> for AcceptResponse {
    fn from(outcome: AcceptOutcome) -> Self {
        Self {
            accepted: outcome.accepted,
            accepted_answer_id: outcome.accepted_answer_id.map(|id| id.to_hex()),
        }
    }
}

/// Main handler for /answers/* routes
pub async fn handle_answers_request(
    req: Request<Bytes>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();

    let result = match (method, segments(path, "/answers").as_slice()) {
        (Method::PUT, [id]) => handle_edit(&req, &state, id).await,
        (Method::DELETE, [id]) => handle_delete(&req, &state, id).await,
        (Method::POST, [id, "vote"]) => handle_vote(&req, &state, id).await,
        (Method::POST, [id, "accept"]) => handle_accept(&req, &state, id).await,
        _ => return not_found_response(path),
    };

    respond(result)
}

/// POST /questions/{id}/answers
pub(super) async fn handle_post_answer(
    req: &Request<Bytes>,
    state: &AppState,
    question_id: &str,
) -> Result<Response<FullBody>> {
    let actor = authenticate(req, state).await?;
    let question_id = parse_id(question_id, "question")?;
    let body: AnswerRequest = read_json(req)?;

    let answer = state.answers.post(&actor, &question_id, &body.body).await?;
    Ok(json_response(
        StatusCode::CREATED,
        &AnswerView::new(&answer, Some(&actor.id)),
    ))
}

async fn handle_edit(
    req: &Request<Bytes>,
    state: &AppState,
    id: &str,
) -> Result<Response<FullBody>> {
    let actor = authenticate(req, state).await?;
    let id = parse_id(id, "answer")?;
    let body: AnswerRequest = read_json(req)?;

    let answer = state.answers.edit(&actor, &id, &body.body).await?;
    Ok(json_response(
        StatusCode::OK,
        &AnswerView::new(&answer, Some(&actor.id)),
    ))
}

async fn handle_delete(
    req: &Request<Bytes>,
    state: &AppState,
    id: &str,
) -> Result<Response<FullBody>> {
    let actor = authenticate(req, state).await?;
    let id = parse_id(id, "answer")?;
    state.answers.delete(&actor, &id).await?;

    Ok(json_response(
        StatusCode::OK,
        &SuccessResponse {
            success: true,
            message: "Answer deleted".into(),
        },
    ))
}

async fn handle_vote(
    req: &Request<Bytes>,
    state: &AppState,
    id: &str,
) -> Result<Response<FullBody>> {
    let actor = authenticate(req, state).await?;
    let id = parse_id(id, "answer")?;
    let body: VoteRequest = read_json(req)?;

    let outcome = state.answers.vote(&actor, &id, body.direction).await?;
    Ok(json_response(StatusCode::OK, &outcome))
}

async fn handle_accept(
    req: &Request<Bytes>,
    state: &AppState,
    id: &str,
) -> Result<Response<FullBody>> {
    let actor = authenticate(req, state).await?;
    let id = parse_id(id, "answer")?;

    let outcome = state.answers.toggle_accept(&actor, &id).await?;
    Ok(json_response(StatusCode::OK, &AcceptResponse::from(outcome)))
}

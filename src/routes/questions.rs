//! HTTP routes for questions
//!
//! - GET    /questions              - List (page, limit, tag, search, sort)
//! - POST   /questions              - Ask
//! - GET    /questions/{id}         - Question with its answers
//! - PUT    /questions/{id}         - Edit (author only)
//! - DELETE /questions/{id}         - Remove (author or admin)
//! - POST   /questions/{id}/vote    - Vote `{type: "up" | "down"}`
//! - POST   /questions/{id}/answers - Answer (see `answers` routes)

use bytes::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use super::answers::handle_post_answer;
use super::common::{
    authenticate, json_response, not_found_response, optional_actor, pagination_from,
    query_pairs, read_json, respond, segments, FullBody, SuccessResponse, VoteRequest,
};
use super::views::{AnswerView, PageView, QuestionSummaryView, QuestionView, ThreadView};
use crate::server::AppState;
use crate::services::{parse_id, NewQuestion};
use crate::store::{QuestionEdit, QuestionQuery, QuestionSort};
use crate::types::{ForumError, Result};

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EditQuestionRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Parse listing filters from a query string
fn question_query(query: Option<&str>) -> Result<QuestionQuery> {
    let pairs = query_pairs(query);
    let mut params = QuestionQuery {
        pagination: pagination_from(&pairs),
        ..Default::default()
    };

    for (key, value) in pairs {
        match key.as_str() {
            "tag" if !value.trim().is_empty() => {
                params.tag = Some(value.trim().to_lowercase());
            }
            "search" if !value.trim().is_empty() => {
                params.search = Some(value.trim().to_string());
            }
            "sort" => {
                params.sort = match value.as_str() {
                    "newest" | "" => QuestionSort::Newest,
                    "score" | "votes" => QuestionSort::Score,
                    other => {
                        return Err(ForumError::BadRequest(format!(
                            "Unknown sort '{}', expected newest or score",
                            other
                        )))
                    }
                }
            }
            _ => {}
        }
    }

    Ok(params)
}

/// Main handler for /questions/* routes
pub async fn handle_questions_request(
    req: Request<Bytes>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();

    let result = match (method, segments(path, "/questions").as_slice()) {
        (Method::GET, []) => handle_list(&req, &state).await,
        (Method::POST, []) => handle_ask(&req, &state).await,
        (Method::GET, [id]) => handle_get(&req, &state, id).await,
        (Method::PUT, [id]) => handle_edit(&req, &state, id).await,
        (Method::DELETE, [id]) => handle_delete(&req, &state, id).await,
        (Method::POST, [id, "vote"]) => handle_vote(&req, &state, id).await,
        (Method::POST, [id, "answers"]) => handle_post_answer(&req, &state, id).await,
        _ => return not_found_response(path),
    };

    respond(result)
}

async fn handle_list(req: &Request<Bytes>, state: &AppState) -> Result<Response<FullBody>> {
    let query = question_query(req.uri().query())?;
    let page = state.questions.list(&query).await?;

    let view = PageView::new(page, query.pagination, |listing| {
        QuestionSummaryView::new(&listing.question, listing.answer_count)
    });
    Ok(json_response(StatusCode::OK, &view))
}

async fn handle_ask(req: &Request<Bytes>, state: &AppState) -> Result<Response<FullBody>> {
    let actor = authenticate(req, state).await?;
    let body: AskRequest = read_json(req)?;

    let question = state
        .questions
        .ask(
            &actor,
            NewQuestion {
                title: body.title,
                body: body.body,
                tags: body.tags,
            },
        )
        .await?;

    Ok(json_response(
        StatusCode::CREATED,
        &QuestionView::new(&question, Some(&actor.id)),
    ))
}

async fn handle_get(
    req: &Request<Bytes>,
    state: &AppState,
    id: &str,
) -> Result<Response<FullBody>> {
    let id = parse_id(id, "question")?;
    let viewer = optional_actor(req, state).await.map(|actor| actor.id);
    let thread = state.questions.thread(&id).await?;

    let view = ThreadView {
        question: QuestionView::new(&thread.question, viewer.as_ref()),
        answers: thread
            .answers
            .iter()
            .map(|a| AnswerView::new(a, viewer.as_ref()))
            .collect(),
    };
    Ok(json_response(StatusCode::OK, &view))
}

async fn handle_edit(
    req: &Request<Bytes>,
    state: &AppState,
    id: &str,
) -> Result<Response<FullBody>> {
    let actor = authenticate(req, state).await?;
    let id = parse_id(id, "question")?;
    let body: EditQuestionRequest = read_json(req)?;

    let question = state
        .questions
        .edit(
            &actor,
            &id,
            QuestionEdit {
                title: body.title,
                body: body.body,
                tags: body.tags,
            },
        )
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &QuestionView::new(&question, Some(&actor.id)),
    ))
}

async fn handle_delete(
    req: &Request<Bytes>,
    state: &AppState,
    id: &str,
) -> Result<Response<FullBody>> {
    let actor = authenticate(req, state).await?;
    let id = parse_id(id, "question")?;
    state.questions.delete(&actor, &id).await?;

    Ok(json_response(
        StatusCode::OK,
        &SuccessResponse {
            success: true,
            message: "Question deleted".into(),
        },
    ))
}

async fn handle_vote(
    req: &Request<Bytes>,
    state: &AppState,
    id: &str,
) -> Result<Response<FullBody>> {
    let actor = authenticate(req, state).await?;
    let id = parse_id(id, "question")?;
    let body: VoteRequest = read_json(req)?;

    let outcome = state.questions.vote(&actor, &id, body.direction).await?;
    Ok(json_response(StatusCode::OK, &outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_query_parsing() {
        let q = question_query(Some("tag=Rust&search=borrow%20checker&sort=score&page=2"))
            .unwrap();
        assert_eq!(q.tag.as_deref(), Some("rust"));
        assert_eq!(q.search.as_deref(), Some("borrow checker"));
        assert_eq!(q.sort, QuestionSort::Score);
        assert_eq!(q.pagination.page, 2);

        let q = question_query(None).unwrap();
        assert_eq!(q.sort, QuestionSort::Newest);
        assert!(q.tag.is_none());

        assert!(question_query(Some("sort=random")).is_err());
    }
}

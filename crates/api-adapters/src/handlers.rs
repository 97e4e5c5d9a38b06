//! # Handlers
//!
//! Each handler parses its input, calls exactly one engine operation and
//! shapes the JSON reply.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::{DomainError, IssuedCaptcha, ListingOrder, Post, PostId};
use serde::{Deserialize, Serialize};
use services::{BoardEngine, PostRejected, SubmitPost};
use tracing::debug;

use crate::error::{domain_message, domain_status, ApiError};
use crate::extract::{lenient_id, lenient_text, parse_page, FormOrJson};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BoardEngine>,
    /// Contact address shown in 500 responses
    pub report_to: Arc<str>,
}

impl AppState {
    pub fn new(engine: Arc<BoardEngine>, report_to: impl Into<Arc<str>>) -> Self {
        Self {
            engine,
            report_to: report_to.into(),
        }
    }

    fn fail(&self, err: DomainError) -> ApiError {
        ApiError::from_domain(err, &self.report_to)
    }
}

#[derive(Debug, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub pic: String,
    #[serde(default, deserialize_with = "lenient_id")]
    pub on_thread: Option<PostId>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub captcha_id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub captcha_solution: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<PostId>,
    #[serde(default)]
    pub delete_code: String,
}

#[derive(Serialize)]
struct Created {
    id: PostId,
    delete_code: String,
    captcha_id: String,
    captcha_svg: String,
}

/// A refused submission echoed back with a fresh challenge.
#[derive(Serialize)]
struct Retry {
    content: String,
    pic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    on_thread: Option<PostId>,
    error: String,
    captcha_id: String,
    captcha_svg: String,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: PostId,
}

/// `GET /page/{num}`, newest bump first unless `by_time=1`.
pub async fn list_page(
    State(state): State<AppState>,
    Path(num): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let page = parse_page(&num).ok_or_else(|| ApiError::BadRequest("need /page/<number>".into()))?;
    let order = match params.get("by_time").map(String::as_str) {
        Some("1") => ListingOrder::Created,
        _ => ListingOrder::Bumped,
    };
    let threads = state
        .engine
        .list_page(page, order)
        .await
        .map_err(|err| state.fail(err))?;
    Ok(Json(threads).into_response())
}

/// `GET /captcha`
pub async fn issue_captcha(State(state): State<AppState>) -> Result<Json<IssuedCaptcha>, ApiError> {
    state
        .engine
        .issue_captcha()
        .await
        .map(Json)
        .map_err(|err| state.fail(err))
}

/// `POST /post/`
pub async fn create_post(
    State(state): State<AppState>,
    FormOrJson(form): FormOrJson<PostForm>,
) -> Result<Response, ApiError> {
    let submission = SubmitPost {
        content: form.content.clone(),
        pic: form.pic.clone(),
        on_thread: form.on_thread,
        captcha_id: form.captcha_id,
        captcha_solution: form.captcha_solution,
    };

    match state.engine.create_post(submission).await {
        Ok(accepted) => Ok(Json(Created {
            id: accepted.receipt.id,
            delete_code: accepted.receipt.delete_code,
            captcha_id: accepted.next_captcha.captcha_id,
            captcha_svg: accepted.next_captcha.captcha_svg,
        })
        .into_response()),
        Err(PostRejected {
            error,
            next_captcha: Some(captcha),
        }) if !matches!(error, DomainError::Internal(_)) => {
            debug!(error = %error, "post refused, retry captcha issued");
            let body = Retry {
                content: form.content,
                pic: form.pic,
                on_thread: form.on_thread,
                error: domain_message(&error),
                captcha_id: captcha.captcha_id,
                captcha_svg: captcha.captcha_svg,
            };
            Ok((domain_status(&error), Json(body)).into_response())
        }
        Err(rejected) => Err(state.fail(rejected.error)),
    }
}

/// `POST /delete/`
pub async fn delete_post(
    State(state): State<AppState>,
    FormOrJson(form): FormOrJson<DeleteForm>,
) -> Result<Json<Deleted>, ApiError> {
    let id = form
        .id
        .ok_or_else(|| ApiError::BadRequest("invalid id".into()))?;
    if form.delete_code.is_empty() {
        return Err(ApiError::BadRequest("no delete_code received".into()));
    }
    let deleted = state
        .engine
        .delete_post(id, &form.delete_code)
        .await
        .map_err(|err| state.fail(err))?;
    Ok(Json(Deleted { deleted }))
}

/// `GET /post/{id}`: the thread with its replies, or a single reply.
pub async fn fetch_thread(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let id: PostId = raw_id
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid id".into()))?;
    match state.engine.fetch_thread(id).await {
        Ok(posts) => Ok(Json(posts).into_response()),
        Err(DomainError::NotFound(_)) => {
            Ok((StatusCode::NOT_FOUND, Json(Vec::<Post>::new())).into_response())
        }
        Err(err) => Err(state.fail(err)),
    }
}

//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! The caller is identified by the `x-user-id` header.

use std::sync::Arc;
use axum::{
  extract::{rejection::JsonRejection, State},
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::error::{GenerateError, HistoryError};
use crate::logic::{generate, record_answers, AnswerEntry, GenerateParams};
use crate::protocol::*;
use crate::state::AppState;

pub const USER_HEADER: &str = "x-user-id";

/// Transport mapping for the hard failures of `generate`.
pub struct ApiError(pub StatusCode, pub ErrorOut);

impl From<GenerateError> for ApiError {
  fn from(e: GenerateError) -> Self {
    let (status, code) = if e.is_rate_limited() {
      (StatusCode::TOO_MANY_REQUESTS, "quota_exhausted")
    } else {
      (StatusCode::BAD_REQUEST, "invalid_request")
    };
    ApiError(status, ErrorOut { error: code.into(), message: e.to_string() })
  }
}

impl From<HistoryError> for ApiError {
  fn from(e: HistoryError) -> Self {
    let (status, code) = match e {
      HistoryError::UnknownChallenge { .. } => (StatusCode::NOT_FOUND, "unknown_question"),
      HistoryError::AnswerOutOfRange { .. } => (StatusCode::BAD_REQUEST, "invalid_answer"),
      HistoryError::Empty | HistoryError::InvalidId(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
    };
    ApiError(status, ErrorOut { error: code.into(), message: e.to_string() })
  }
}

impl From<JsonRejection> for ApiError {
  fn from(r: JsonRejection) -> Self {
    ApiError(r.status(), ErrorOut { error: "invalid_body".into(), message: r.body_text() })
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.0, Json(self.1)).into_response()
  }
}

fn user_id(headers: &HeaderMap) -> Result<String, ApiError> {
  headers
    .get(USER_HEADER)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_string)
    .ok_or_else(|| {
      ApiError(
        StatusCode::BAD_REQUEST,
        ErrorOut { error: "missing_user".into(), message: format!("missing {} header", USER_HEADER) },
      )
    })
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, oracle: state.oracle.is_some() })
}

#[instrument(level = "info", skip(state, headers, body))]
pub async fn http_post_generate(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  body: Result<Json<GenerateIn>, JsonRejection>,
) -> Result<Json<GenerateOut>, ApiError> {
  let user_id = user_id(&headers)?;
  let Json(body) = body?;
  info!(target: "quizgen_backend", %user_id, language = %body.programming_language, difficulty = %body.difficulty, count = ?body.count, "HTTP generate requested");
  let params = GenerateParams {
    user_id: user_id.clone(),
    count: body.count,
    language: body.programming_language,
    difficulty: body.difficulty,
  };
  match generate(&state, params).await {
    Ok(report) => {
      info!(target: "quizgen_backend", %user_id, delivered = report.questions.len(), fallback = report.fallback, "HTTP generate served");
      Ok(Json(GenerateOut::from(&report)))
    }
    Err(e) => {
      warn!(target: "quizgen_backend", %user_id, error = %e, "HTTP generate refused");
      Err(e.into())
    }
  }
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_get_quota(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> Result<Json<QuotaOut>, ApiError> {
  let user_id = user_id(&headers)?;
  let record = state.quota.peek(&user_id).await;
  Ok(Json(quota_out(&user_id, &record)))
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_get_history(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> Result<Json<HistoryOut>, ApiError> {
  let user_id = user_id(&headers)?;
  let questions = state.store.history(&user_id).await.iter().map(to_out).collect();
  Ok(Json(HistoryOut { user_id, questions }))
}

#[instrument(level = "info", skip(state, headers, body))]
pub async fn http_post_history(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  body: Result<Json<SaveAnswersIn>, JsonRejection>,
) -> Result<Json<SaveAnswersOut>, ApiError> {
  let user_id = user_id(&headers)?;
  let Json(body) = body?;
  let entries = body
    .answers
    .into_iter()
    .map(|a| AnswerEntry { question_id: a.question_id, user_answer: a.user_answer })
    .collect();
  match record_answers(&state, &user_id, entries).await {
    Ok(updated) => Ok(Json(SaveAnswersOut { saved: updated.len(), questions: updated.iter().map(to_out).collect() })),
    Err(e) => {
      warn!(target: "quizgen_backend", %user_id, error = %e, "HTTP save answers refused");
      Err(e.into())
    }
  }
}

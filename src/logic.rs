//! Caller-facing operations.
//!
//! `generate`: quota gate → corpus lookup → workflow → fallback → persistence → quota charge.
//! `record_answers`: store the user's picks against questions already in their history.

use tracing::{info, instrument, warn};

use uuid::Uuid;

use crate::domain::{AnswerRecord, Difficulty, QuestionSource, StoredChallenge};
use crate::error::{GenerateError, HistoryError, OracleError, WorkflowError};
use crate::seeds::hard_fallback_question;
use crate::state::AppState;
use crate::workflow::{Phase, Workflow, WorkflowOutcome, WorkflowState};

#[derive(Clone, Debug)]
pub struct GenerateParams {
  pub user_id: String,
  pub count: Option<u32>,
  pub language: String,
  pub difficulty: String,
}

/// Result of one `generate` call. `error` marks partial success; `fallback`
/// means the only question is the built-in one and nothing was charged.
#[derive(Clone, Debug)]
pub struct GenerationReport {
  pub questions: Vec<StoredChallenge>,
  pub accepted: usize,
  pub retries: u32,
  pub fallback: bool,
  pub error: Option<WorkflowError>,
  pub quota_remaining: u32,
}

#[instrument(level = "info", skip(state, params), fields(user_id = %params.user_id, language = %params.language, difficulty = %params.difficulty))]
pub async fn generate(state: &AppState, params: GenerateParams) -> Result<GenerationReport, GenerateError> {
  let difficulty: Difficulty = params.difficulty.parse().map_err(GenerateError::InvalidRequest)?;
  let language = params.language.trim().to_string();
  if language.is_empty() {
    return Err(GenerateError::InvalidRequest("programming language must not be empty".into()));
  }
  let settings = &state.config.workflow;
  let asked = params.count.unwrap_or(settings.default_count).clamp(1, settings.max_count.max(1));

  let reservation = state.quota.check_and_reserve(&params.user_id).await?;
  let count = asked.min(reservation.remaining()) as usize;
  if (count as u32) < asked {
    info!(target: "quizgen_backend", asked, capped = count, "Request capped at remaining quota");
  }

  let existing = state.store.existing_titles(&language, difficulty).await;
  let outcome = match &state.oracle {
    Some(oracle) => {
      let workflow = Workflow::new(oracle.clone(), state.config.prompts.clone(), settings.clone());
      workflow.run(WorkflowState::new(language.clone(), difficulty, count, existing)).await
    }
    None => WorkflowOutcome {
      phase: Phase::Failed,
      accepted_questions: Vec::new(),
      retry_count: 0,
      error: Some(WorkflowError::OracleUnavailable(OracleError::Disabled)),
    },
  };

  let accepted = outcome.accepted_questions.len();
  let fallback = accepted == 0 && matches!(outcome.error, Some(WorkflowError::OracleUnavailable(_)));

  let questions = if fallback {
    warn!(target: "quizgen_backend", %language, %difficulty, "Oracle unavailable and nothing accepted; serving hard fallback");
    state
      .store
      .append_accepted(&[hard_fallback_question(&language)], &params.user_id, &language, difficulty, QuestionSource::Fallback)
      .await
  } else {
    state
      .store
      .append_accepted(&outcome.accepted_questions, &params.user_id, &language, difficulty, QuestionSource::Generated)
      .await
  };

  let quota = reservation.settle(accepted);
  info!(
    target: "quizgen_backend",
    accepted,
    fallback,
    complete = outcome.is_complete(),
    retries = outcome.retry_count,
    quota_remaining = quota.remaining,
    error = ?outcome.error,
    "Generation finished"
  );

  Ok(GenerationReport {
    questions,
    accepted,
    retries: outcome.retry_count,
    fallback,
    error: outcome.error,
    quota_remaining: quota.remaining,
  })
}

#[derive(Clone, Debug)]
pub struct AnswerEntry {
  pub question_id: String,
  pub user_answer: Option<usize>,
}

#[instrument(level = "info", skip(state, user_id, entries), fields(%user_id, count = entries.len()))]
pub async fn record_answers(
  state: &AppState,
  user_id: &str,
  entries: Vec<AnswerEntry>,
) -> Result<Vec<StoredChallenge>, HistoryError> {
  let answers = entries
    .into_iter()
    .map(|e| {
      Uuid::parse_str(e.question_id.trim())
        .map(|challenge_id| AnswerRecord { challenge_id, user_answer: e.user_answer })
        .map_err(|_| HistoryError::InvalidId(e.question_id))
    })
    .collect::<Result<Vec<_>, _>>()?;

  let updated = state.store.record_answers(user_id, &answers).await?;
  info!(target: "quizgen_backend", %user_id, recorded = updated.len(), "Answers saved to history");
  Ok(updated)
}

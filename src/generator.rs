//! Builds the oracle instructions for one iteration and stores the returned batch.

use std::sync::Arc;

use rand::Rng;
use tracing::{error, info, instrument, warn};

use crate::config::{Prompts, WorkflowSettings};
use crate::error::{OracleError, WorkflowError};
use crate::oracle::{GenerationRequest, OraclePrompt, QuestionOracle};
use crate::util::fill_template;
use crate::validator::{comparison_window, MIN_OPTIONS};
use crate::workflow::WorkflowState;

pub struct Generator {
  oracle: Arc<dyn QuestionOracle>,
  prompts: Prompts,
  settings: WorkflowSettings,
}

impl Generator {
  pub fn new(oracle: Arc<dyn QuestionOracle>, prompts: Prompts, settings: WorkflowSettings) -> Self {
    Self { oracle, prompts, settings }
  }

  /// Shortfall from the last pass if there was one, otherwise everything still needed.
  /// Never more than `requested_count`.
  pub fn batch_size(state: &WorkflowState) -> usize {
    if state.rejected_questions.is_empty() {
      state.requested_count
    } else {
      state.rejected_questions.len().min(state.requested_count)
    }
  }

  /// Exclusion payload: the windowed corpus followed by this run's accepted titles.
  pub fn exclusion_titles(&self, state: &WorkflowState) -> Vec<String> {
    let mut titles: Vec<String> = comparison_window(&state.existing_titles, state.difficulty, &self.settings).to_vec();
    titles.extend(state.accepted_questions.iter().map(|q| q.title.clone()));
    titles
  }

  pub fn build_request(&self, state: &WorkflowState) -> GenerationRequest {
    let count = Self::batch_size(state);
    let exclusion_titles = self.exclusion_titles(state);

    let mut rng = rand::thread_rng();
    let positions: Vec<String> = (0..count).map(|_| rng.gen_range(0..MIN_OPTIONS).to_string()).collect();

    let existing = if exclusion_titles.is_empty() {
      "(none)".to_string()
    } else {
      exclusion_titles.iter().map(|t| format!("- {}", t)).collect::<Vec<_>>().join("\n")
    };
    let count_str = count.to_string();
    let positions_str = positions.join(", ");
    let user = fill_template(
      &self.prompts.generation_user_template,
      &[
        ("count", count_str.as_str()),
        ("language", state.target_language.as_str()),
        ("difficulty", state.difficulty.as_str()),
        ("guidance", self.prompts.guidance_for(state.difficulty)),
        ("existing_titles", existing.as_str()),
        ("answer_positions", positions_str.as_str()),
      ],
    );

    GenerationRequest {
      count,
      language: state.target_language.clone(),
      difficulty: state.difficulty,
      exclusion_titles,
      prompt: OraclePrompt { system: self.prompts.generation_system.clone(), user },
    }
  }

  /// One oracle call under the per-call deadline.
  ///
  /// On failure `error` is set and the rest of the state is left as it was;
  /// the orchestrator decides what happens next.
  #[instrument(level = "info", skip(self, state), fields(
    language = %state.target_language,
    difficulty = %state.difficulty,
    retry = state.retry_count,
  ))]
  pub async fn run(&self, mut state: WorkflowState) -> WorkflowState {
    if state.retry_count >= self.settings.max_retries {
      warn!(target: "quiz", retries = state.retry_count, "Max retries reached; not calling the oracle");
      state.error = Some(WorkflowError::RetryCeilingReached { retries: state.retry_count });
      return state;
    }

    let request = self.build_request(&state);
    info!(target: "quiz", count = request.count, exclusions = request.exclusion_titles.len(), "Requesting questions");

    let start = std::time::Instant::now();
    let result = match tokio::time::timeout(self.settings.oracle_timeout(), self.oracle.generate(&request)).await {
      Ok(r) => r,
      Err(_) => Err(OracleError::Timeout(self.settings.oracle_timeout_secs)),
    };
    let elapsed = start.elapsed();

    match result {
      Ok(batch) => {
        info!(target: "quiz", ?elapsed, received = batch.len(), "Oracle batch received");
        state.generated_batch = batch;
        state.rejected_questions.clear();
      }
      Err(e) => {
        error!(target: "quiz", ?elapsed, error = %e, "Oracle call failed");
        state.error = Some(WorkflowError::OracleUnavailable(e));
      }
    }
    state
  }
}

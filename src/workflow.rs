//! Workflow orchestrator: the bounded generate → validate → route loop.
//!
//! ```text
//! GENERATING ──ok──▶ VALIDATING ──route=generate_questions──▶ GENERATING
//!     │                   │
//!  oracle error      route=end ──▶ DONE   (requested_count reached 0)
//!     ▼                   └──────▶ FAILED (retry ceiling, shortfall left)
//!   FAILED
//! ```
//!
//! One `WorkflowState` lives for exactly one run and is threaded by value
//! through every stage.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::{Prompts, WorkflowSettings};
use crate::domain::{Difficulty, Question};
use crate::error::WorkflowError;
use crate::generator::Generator;
use crate::oracle::QuestionOracle;
use crate::router::{route, Route, RouteInput};
use crate::validator::{self, RejectedQuestion};

#[derive(Clone, Debug)]
pub struct WorkflowState {
  pub target_language: String,
  pub difficulty: Difficulty,
  /// Size of the run as requested; `requested_count` counts down from here.
  pub target_count: usize,
  pub requested_count: usize,
  pub generated_batch: Vec<Question>,
  pub existing_titles: Vec<String>,
  pub accepted_questions: Vec<Question>,
  pub rejected_questions: Vec<RejectedQuestion>,
  pub retry_count: u32,
  pub error: Option<WorkflowError>,
}

impl WorkflowState {
  pub fn new(language: impl Into<String>, difficulty: Difficulty, count: usize, existing_titles: Vec<String>) -> Self {
    Self {
      target_language: language.into(),
      difficulty,
      target_count: count,
      requested_count: count,
      generated_batch: Vec::new(),
      existing_titles,
      accepted_questions: Vec::new(),
      rejected_questions: Vec::new(),
      retry_count: 0,
      error: None,
    }
  }

  fn route_input(&self, max_retries: u32) -> RouteInput {
    RouteInput {
      retry_count: self.retry_count,
      max_retries,
      requested_count: self.requested_count,
      accepted: self.accepted_questions.len(),
      target: self.target_count,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
  Generating,
  Validating,
  Done,
  Failed,
}

/// What a run delivers: everything accepted, plus an error marker on partial success.
#[derive(Clone, Debug)]
pub struct WorkflowOutcome {
  pub phase: Phase,
  pub accepted_questions: Vec<Question>,
  pub retry_count: u32,
  pub error: Option<WorkflowError>,
}

impl WorkflowOutcome {
  pub fn is_complete(&self) -> bool {
    self.phase == Phase::Done
  }
}

pub struct Workflow {
  generator: Generator,
  settings: WorkflowSettings,
}

impl Workflow {
  pub fn new(oracle: Arc<dyn QuestionOracle>, prompts: Prompts, settings: WorkflowSettings) -> Self {
    Self { generator: Generator::new(oracle, prompts, settings.clone()), settings }
  }

  #[instrument(level = "info", skip(self, state), fields(
    language = %state.target_language,
    difficulty = %state.difficulty,
    requested = state.requested_count,
    corpus = state.existing_titles.len(),
  ))]
  pub async fn run(&self, mut state: WorkflowState) -> WorkflowOutcome {
    let max_retries = self.settings.max_retries;
    let mut phase = Phase::Generating;

    while state.retry_count < max_retries {
      state = self.generator.run(state).await;
      if state.error.is_some() {
        phase = Phase::Failed;
        break;
      }

      phase = Phase::Validating;
      state = validator::validate(state, &self.settings);

      let next = route(state.route_input(max_retries));
      info!(target: "quiz", retry = state.retry_count, route = next.as_str(), "Routing");
      match next {
        Route::GenerateQuestions => phase = Phase::Generating,
        Route::End => break,
      }
    }

    if phase != Phase::Failed {
      if state.requested_count == 0 {
        phase = Phase::Done;
      } else {
        warn!(
          target: "quiz",
          retries = state.retry_count,
          accepted = state.accepted_questions.len(),
          missing = state.requested_count,
          "Retry ceiling reached; delivering partial result"
        );
        state.error = Some(WorkflowError::RetryCeilingReached { retries: state.retry_count });
        phase = Phase::Failed;
      }
    }

    info!(
      target: "quiz",
      ?phase,
      accepted = state.accepted_questions.len(),
      retries = state.retry_count,
      "Workflow finished"
    );
    WorkflowOutcome {
      phase,
      accepted_questions: state.accepted_questions,
      retry_count: state.retry_count,
      error: state.error,
    }
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use super::*;
  use crate::error::OracleError;
  use crate::oracle::testing::{question, questions, Scripted, ScriptedOracle};

  fn workflow(oracle: Arc<ScriptedOracle>) -> Workflow {
    Workflow::new(oracle, Prompts::default(), WorkflowSettings::default())
  }

  #[tokio::test]
  async fn fresh_corpus_completes_in_one_iteration() {
    let oracle = Arc::new(ScriptedOracle::new(vec![Scripted::Batch(questions("q", 10))]));
    let out = workflow(oracle.clone()).run(WorkflowState::new("python", Difficulty::Easy, 10, vec![])).await;

    assert_eq!(out.phase, Phase::Done);
    assert!(out.is_complete());
    assert_eq!(out.accepted_questions.len(), 10);
    assert_eq!(out.retry_count, 1);
    assert!(out.error.is_none());
    assert_eq!(oracle.calls(), 1);
  }

  #[tokio::test]
  async fn repeated_corpus_titles_hit_the_retry_ceiling() {
    let corpus: Vec<String> = (0..10).map(|i| format!("known #{}", i)).collect();
    let script = (0..4).map(|_| Scripted::Batch(questions("known", 10))).collect();
    let oracle = Arc::new(ScriptedOracle::new(script));
    let out = workflow(oracle.clone()).run(WorkflowState::new("python", Difficulty::Easy, 10, corpus)).await;

    assert_eq!(out.phase, Phase::Failed);
    assert_eq!(out.error, Some(WorkflowError::RetryCeilingReached { retries: 4 }));
    assert!(out.accepted_questions.is_empty());
    assert_eq!(out.retry_count, 4);
    assert_eq!(oracle.calls(), 4);
  }

  #[tokio::test]
  async fn second_iteration_requests_only_the_shortfall() {
    let corpus = vec!["dup #0".to_string(), "dup #1".to_string(), "dup #2".to_string()];
    let mut first = questions("fresh", 7);
    first.extend(questions("dup", 3));
    let oracle = Arc::new(ScriptedOracle::new(vec![
      Scripted::Batch(first),
      Scripted::Batch(questions("late", 3)),
    ]));
    let out = workflow(oracle.clone()).run(WorkflowState::new("rust", Difficulty::Easy, 10, corpus)).await;

    let requests = oracle.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].count, 10);
    assert_eq!(requests[1].count, 3);
    assert!(requests[1].exclusion_titles.iter().any(|t| t == "fresh #0"));
    assert_eq!(out.accepted_questions.len(), 10);
    assert_eq!(out.retry_count, 2);
    assert_eq!(out.phase, Phase::Done);
  }

  #[tokio::test]
  async fn oracle_failure_mid_run_keeps_partial_result() {
    let mut first = questions("ok", 2);
    let mut broken = question("broken");
    broken.options.truncate(2);
    first.push(broken);
    let oracle = Arc::new(ScriptedOracle::new(vec![
      Scripted::Batch(first),
      Scripted::Fail(OracleError::Transport("connection reset".into())),
    ]));
    let out = workflow(oracle).run(WorkflowState::new("go", Difficulty::Medium, 3, vec![])).await;

    assert_eq!(out.phase, Phase::Failed);
    assert_eq!(out.accepted_questions.len(), 2);
    assert_eq!(out.retry_count, 1);
    assert!(matches!(out.error, Some(WorkflowError::OracleUnavailable(OracleError::Transport(_)))));
  }

  #[tokio::test]
  async fn out_of_range_answer_never_reaches_the_result() {
    let mut bad = question("What is 1 + 1?");
    bad.correct_answer_id = 4;
    let oracle = Arc::new(ScriptedOracle::new(vec![
      Scripted::Batch(vec![bad, question("What is 2 + 2?")]),
      Scripted::Batch(vec![question("What is 3 + 3?")]),
    ]));
    let out = workflow(oracle.clone()).run(WorkflowState::new("python", Difficulty::Easy, 2, vec![])).await;

    assert_eq!(oracle.requests()[1].count, 1);
    let titles: Vec<&str> = out.accepted_questions.iter().map(|q| q.title.as_str()).collect();
    assert_eq!(titles, vec!["What is 2 + 2?", "What is 3 + 3?"]);
    assert!(out.is_complete());
  }

  #[tokio::test]
  async fn accepted_titles_are_unique_and_disjoint_from_the_corpus() {
    let corpus: Vec<String> = vec!["a".into(), "b".into()];
    let oracle = Arc::new(ScriptedOracle::new(vec![
      Scripted::Batch(vec![question("a"), question("c"), question("C"), question("d")]),
      Scripted::Batch(vec![question("b"), question("d"), question("e")]),
      Scripted::Batch(vec![question("f"), question("g")]),
    ]));
    let out = workflow(oracle).run(WorkflowState::new("python", Difficulty::Easy, 4, corpus.clone())).await;

    let titles: Vec<String> = out.accepted_questions.iter().map(|q| q.title.to_lowercase()).collect();
    let unique: HashSet<&String> = titles.iter().collect();
    assert_eq!(unique.len(), titles.len());
    assert!(titles.iter().all(|t| !corpus.contains(t)));
    assert_eq!(titles, vec!["c", "d", "e", "f"]);
    assert!(out.retry_count <= 4);
  }

  #[tokio::test]
  async fn zero_retry_budget_reports_the_ceiling_without_calls() {
    let oracle = Arc::new(ScriptedOracle::new(vec![Scripted::Batch(questions("q", 1))]));
    let settings = WorkflowSettings { max_retries: 0, ..WorkflowSettings::default() };
    let out = Workflow::new(oracle.clone(), Prompts::default(), settings)
      .run(WorkflowState::new("python", Difficulty::Easy, 1, vec![]))
      .await;

    assert_eq!(oracle.calls(), 0);
    assert_eq!(out.error, Some(WorkflowError::RetryCeilingReached { retries: 0 }));
  }
}

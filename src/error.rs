//! Error types for the oracle port, the workflow, the caller-facing `generate` operation and answer recording.

use thiserror::Error;
use uuid::Uuid;

/// Failure of a single oracle call. Every variant is treated as "oracle unavailable" by the workflow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
  #[error("oracle transport error: {0}")]
  Transport(String),

  #[error("oracle HTTP {status}: {message}")]
  Http { status: u16, message: String },

  #[error("oracle response violates the question schema: {0}")]
  Schema(String),

  #[error("oracle call exceeded its {0}s deadline")]
  Timeout(u64),

  #[error("oracle is not configured")]
  Disabled,
}

/// Terminal error marker attached to a workflow outcome. Never a crash; accepted questions are still delivered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
  #[error("max retries exceeded ({retries} attempts)")]
  RetryCeilingReached { retries: u32 },

  #[error("oracle unavailable: {0}")]
  OracleUnavailable(#[from] OracleError),
}

/// Hard failures of `generate`. Everything else resolves to an outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
  #[error("insufficient quota: user '{user_id}' has no remaining allowance")]
  QuotaExhausted { user_id: String },

  #[error("invalid request: {0}")]
  InvalidRequest(String),
}

/// Failures of recording answers into a user's history. Nothing is written when any entry fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
  #[error("no answers to record")]
  Empty,

  #[error("invalid question id '{0}'")]
  InvalidId(String),

  #[error("question {id} not found in this user's history")]
  UnknownChallenge { id: Uuid },

  #[error("answer {answer} for question {id} is outside its {options} options")]
  AnswerOutOfRange { id: Uuid, answer: usize, options: usize },
}

impl GenerateError {
  /// Rate-limit class, as opposed to a malformed request.
  pub fn is_rate_limited(&self) -> bool {
    matches!(self, GenerateError::QuotaExhausted { .. })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn retry_ceiling_display() {
    let e = WorkflowError::RetryCeilingReached { retries: 4 };
    assert_eq!(e.to_string(), "max retries exceeded (4 attempts)");
  }

  #[test]
  fn oracle_errors_lift_into_workflow_errors() {
    let e: WorkflowError = OracleError::Timeout(30).into();
    assert_eq!(e, WorkflowError::OracleUnavailable(OracleError::Timeout(30)));
    assert!(e.to_string().contains("30s deadline"));
  }

  #[test]
  fn only_quota_exhaustion_is_rate_limited() {
    assert!(GenerateError::QuotaExhausted { user_id: "u1".into() }.is_rate_limited());
    assert!(!GenerateError::InvalidRequest("empty language".into()).is_rate_limited());
  }
}

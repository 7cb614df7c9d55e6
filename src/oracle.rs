//! Question oracle port.
//!
//! The workflow only talks to `QuestionOracle`; the OpenAI adapter in
//! `openai.rs` is one implementation, test modules script their own.

use async_trait::async_trait;

use crate::domain::{Difficulty, Question};
use crate::error::OracleError;

/// Instruction payload for one oracle call.
#[derive(Clone, Debug)]
pub struct OraclePrompt {
  pub system: String,
  pub user: String,
}

/// One generation request.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
  pub count: usize,
  pub language: String,
  pub difficulty: Difficulty,
  pub exclusion_titles: Vec<String>,
  pub prompt: OraclePrompt,
}

#[async_trait]
pub trait QuestionOracle: Send + Sync {
  /// Produce a batch of candidates. Implementations reject payloads that do
  /// not deserialize into the question schema instead of passing them on.
  async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Question>, OracleError>;
}

#[cfg(test)]
pub mod testing {
  //! Scripted oracle shared by the workflow, service and route tests.

  use std::collections::VecDeque;
  use std::sync::Mutex;
  use std::time::Duration;

  use super::*;

  pub enum Scripted {
    Batch(Vec<Question>),
    Fail(OracleError),
    /// Sleep before answering; used to trip the per-call deadline.
    Stall(Duration),
  }

  /// Oracle that replays scripted responses in order and records every request.
  #[derive(Default)]
  pub struct ScriptedOracle {
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<GenerationRequest>>,
  }

  impl ScriptedOracle {
    pub fn new(responses: Vec<Scripted>) -> Self {
      Self { responses: Mutex::new(responses.into()), requests: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
      self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
      self.requests.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl QuestionOracle for ScriptedOracle {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Question>, OracleError> {
      self.requests.lock().unwrap().push(request.clone());
      let next = self.responses.lock().unwrap().pop_front();
      match next {
        Some(Scripted::Batch(batch)) => Ok(batch),
        Some(Scripted::Fail(e)) => Err(e),
        Some(Scripted::Stall(d)) => {
          tokio::time::sleep(d).await;
          Ok(Vec::new())
        }
        None => Err(OracleError::Transport("script exhausted".into())),
      }
    }
  }

  /// A well-formed question with the given title.
  pub fn question(title: &str) -> Question {
    Question {
      title: title.to_string(),
      options: vec!["1".into(), "2".into(), "3".into(), "4".into()],
      correct_answer_id: 1,
      explanation: format!("Because of how `{}` evaluates.", title),
    }
  }

  /// `n` well-formed questions titled `{prefix} #i`.
  pub fn questions(prefix: &str, n: usize) -> Vec<Question> {
    (0..n).map(|i| question(&format!("{} #{}", prefix, i))).collect()
  }
}

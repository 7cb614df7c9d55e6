//! Domain models: difficulty tiers, the multiple-choice question, stored challenges and quota records.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Difficulty tier requested by the caller and forwarded to the oracle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
}

impl Difficulty {
  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Easy => "easy",
      Difficulty::Medium => "medium",
      Difficulty::Hard => "hard",
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Difficulty {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "easy" => Ok(Difficulty::Easy),
      "medium" => Ok(Difficulty::Medium),
      "hard" => Ok(Difficulty::Hard),
      other => Err(format!("unknown difficulty '{}'", other)),
    }
  }
}

/// One multiple-choice coding question, exactly as the oracle schema describes it.
///
/// A well-formed question has at least four options, a `correct_answer_id`
/// inside `options`, and a non-empty title and explanation. The oracle may
/// still hand back candidates that break this; `validator::check_structure`
/// decides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
  pub title: String,
  pub options: Vec<String>,
  pub correct_answer_id: usize,
  pub explanation: String,
}

/// Where a delivered question came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
  Generated,
  Fallback,
}

/// A question persisted for a user after a successful run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredChallenge {
  pub id: Uuid,
  pub user_id: String,
  pub language: String,
  pub difficulty: Difficulty,
  pub created_at: DateTime<Utc>,
  pub source: QuestionSource,
  pub question: Question,
  /// Option index the user picked, once recorded. `None` also means skipped.
  #[serde(default)]
  pub user_answer: Option<usize>,
}

/// One answer to record against a stored challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerRecord {
  pub challenge_id: Uuid,
  pub user_answer: Option<usize>,
}

/// Per-user generation allowance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
  pub remaining: u32,
  pub last_reset: DateTime<Utc>,
}

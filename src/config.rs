//! Loading agent configuration (prompts + workflow bounds + quota policy) from TOML.
//!
//! Every section is optional; anything missing falls back to `Default`.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::Difficulty;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub workflow: WorkflowSettings,
  #[serde(default)]
  pub quota: QuotaSettings,
}

/// Prompts used to drive the question oracle.
///
/// `generation_user_template` understands the placeholders `{count}`,
/// `{language}`, `{difficulty}`, `{guidance}`, `{existing_titles}` and
/// `{answer_positions}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub generation_system: String,
  pub generation_user_template: String,
  pub easy_guidance: String,
  pub medium_guidance: String,
  pub hard_guidance: String,
}

impl Prompts {
  pub fn guidance_for(&self, difficulty: Difficulty) -> &str {
    match difficulty {
      Difficulty::Easy => &self.easy_guidance,
      Difficulty::Medium => &self.medium_guidance,
      Difficulty::Hard => &self.hard_guidance,
    }
  }
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generation_system: "You are an expert coding challenge creator. Respond ONLY with strict JSON of the form {\"questions\": [{\"title\": string, \"options\": [string, ...], \"correct_answer_id\": number, \"explanation\": string}]}.".into(),
      generation_user_template: r#"Generate {count} high-quality multiple-choice coding questions.

Programming language: {language}
Difficulty: {difficulty}
Difficulty guidance: {guidance}

Requirements:
1. The "title" field holds the full question, not a topic name. It must be self-contained: any code the question refers to MUST be inlined in the title. A question that mentions code it does not contain is invalid.
2. Every title must be distinct, complete and logical. Vary the opening phrase and the concept being tested.
3. Do NOT reuse or paraphrase any of these existing titles:
{existing_titles}
4. Each question has exactly 4 options with exactly ONE correct answer; the other options are plausible distractors.
5. "correct_answer_id" is the 0-based index of the correct option. Place the correct answers at these positions, in order: {answer_positions}.
6. "explanation" justifies the correct answer clearly and accurately."#.into(),
      easy_guidance: "Basic syntax, variables, simple loops, conditional logic, string manipulation.".into(),
      medium_guidance: "Functions, data structures (lists, maps), iteration patterns, basic algorithms.".into(),
      hard_guidance: "Recursion, time/space optimization, complex logic, advanced language features, object-oriented patterns.".into(),
    }
  }
}

/// Bounds for one workflow run.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
  /// Hard ceiling on generate/validate iterations.
  pub max_retries: u32,
  /// Count used when the caller omits one.
  pub default_count: u32,
  /// Upper clamp for a single request.
  pub max_count: u32,
  /// Deadline for a single oracle call.
  pub oracle_timeout_secs: u64,
  /// Most recent titles sent to the oracle as the exclusion list.
  pub exclusion_window: usize,
  /// Tighter window for medium/hard runs.
  pub exclusion_window_strict: usize,
  pub temperature: f32,
}

impl WorkflowSettings {
  pub fn oracle_timeout(&self) -> Duration {
    Duration::from_secs(self.oracle_timeout_secs)
  }
}

impl Default for WorkflowSettings {
  fn default() -> Self {
    Self {
      max_retries: 4,
      default_count: 10,
      max_count: 20,
      oracle_timeout_secs: 30,
      exclusion_window: 30,
      exclusion_window_strict: 10,
      temperature: 0.7,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct QuotaSettings {
  pub allowance: u32,
  pub window_hours: i64,
}

impl QuotaSettings {
  pub fn window(&self) -> chrono::Duration {
    chrono::Duration::hours(self.window_hours)
  }
}

impl Default for QuotaSettings {
  fn default() -> Self {
    Self { allowance: 50, window_hours: 24 }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "quizgen_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "quizgen_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "quizgen_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

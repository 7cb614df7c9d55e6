//! Uniqueness and completeness filter for a generated batch.
//!
//! Flow per pass:
//! 1) Every candidate gets a structural check (option count, answer index,
//!    non-empty text, inlined code). Duplicate options are collapsed and the
//!    answer index remapped before the option count is enforced.
//! 2) Titles are compared, normalized, against the corpus and against what
//!    this run already accepted. Empty corpus skips the corpus comparison.
//! 3) Survivors are appended to `accepted_questions`; the rest land in
//!    `rejected_questions` and size the next request.
//! 4) Corpus duplicates are appended to `existing_titles`.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, info, instrument};

use crate::config::WorkflowSettings;
use crate::domain::{Difficulty, Question};
use crate::util::{normalize_title, trunc_for_log};
use crate::workflow::WorkflowState;

/// Minimum options a question must keep after repair.
pub const MIN_OPTIONS: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Malformed {
  EmptyTitle,
  EmptyExplanation,
  EmptyOption { index: usize },
  AnswerOutOfRange { correct_answer_id: usize, options: usize },
  TooFewOptions { options: usize },
  MissingSnippet,
}

impl fmt::Display for Malformed {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Malformed::EmptyTitle => write!(f, "empty title"),
      Malformed::EmptyExplanation => write!(f, "empty explanation"),
      Malformed::EmptyOption { index } => write!(f, "option {} is empty", index),
      Malformed::AnswerOutOfRange { correct_answer_id, options } => {
        write!(f, "correct_answer_id {} outside {} options", correct_answer_id, options)
      }
      Malformed::TooFewOptions { options } => {
        write!(f, "{} distinct options, need at least {}", options, MIN_OPTIONS)
      }
      Malformed::MissingSnippet => write!(f, "title refers to code it does not contain"),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
  /// Title already in the corpus.
  Duplicate,
  /// Title repeats one accepted earlier in this run or earlier in the same batch.
  RepeatedInRun,
  Malformed(Malformed),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedQuestion {
  pub question: Question,
  pub reason: Rejection,
}

/// Most recent corpus titles worth sending as the exclusion payload.
/// Corpora over `exclusion_window` keep only the newest entries; medium/hard
/// runs shrink further to `exclusion_window_strict`.
pub fn comparison_window<'a>(
  existing_titles: &'a [String],
  difficulty: Difficulty,
  settings: &WorkflowSettings,
) -> &'a [String] {
  let mut limit = existing_titles.len();
  if limit > settings.exclusion_window {
    limit = settings.exclusion_window;
  }
  if matches!(difficulty, Difficulty::Medium | Difficulty::Hard) {
    limit = limit.min(settings.exclusion_window_strict);
  }
  &existing_titles[existing_titles.len() - limit..]
}

/// Structural acceptance check with answer-index repair.
pub fn check_structure(q: Question) -> Result<Question, Malformed> {
  let title = q.title.trim().to_string();
  let explanation = q.explanation.trim().to_string();
  if title.is_empty() {
    return Err(Malformed::EmptyTitle);
  }
  if explanation.is_empty() {
    return Err(Malformed::EmptyExplanation);
  }
  if q.correct_answer_id >= q.options.len() {
    return Err(Malformed::AnswerOutOfRange {
      correct_answer_id: q.correct_answer_id,
      options: q.options.len(),
    });
  }

  let mut options: Vec<String> = Vec::with_capacity(q.options.len());
  let mut correct_answer_id = 0;
  for (i, raw) in q.options.iter().enumerate() {
    let opt = raw.trim();
    if opt.is_empty() {
      return Err(Malformed::EmptyOption { index: i });
    }
    let pos = match options.iter().position(|o| o == opt) {
      Some(p) => p,
      None => {
        options.push(opt.to_string());
        options.len() - 1
      }
    };
    if i == q.correct_answer_id {
      correct_answer_id = pos;
    }
  }
  if options.len() < MIN_OPTIONS {
    return Err(Malformed::TooFewOptions { options: options.len() });
  }
  if references_missing_snippet(&title) {
    return Err(Malformed::MissingSnippet);
  }

  Ok(Question { title, options, correct_answer_id, explanation })
}

const SNIPPET_REFERENCES: &[&str] = &[
  "following code",
  "code below",
  "code above",
  "this code",
  "given code",
  "following snippet",
  "this snippet",
  "the snippet",
  "following program",
  "following function",
  "this function",
];

/// True when the title points at a code sample that is not inlined.
pub fn references_missing_snippet(title: &str) -> bool {
  let lower = title.to_lowercase();
  let reference_end = SNIPPET_REFERENCES
    .iter()
    .filter_map(|r| lower.find(r).map(|i| i + r.len()))
    .min();
  match reference_end {
    Some(end) => !contains_code(title) && !code_follows(&lower[end..]),
    None => false,
  }
}

/// Code inlined on the same line as the reference, after its `:` or `?`.
fn code_follows(tail: &str) -> bool {
  let body = match tail.find(|c| c == ':' || c == '?') {
    Some(i) => &tail[i + 1..],
    None => tail,
  };
  body.chars().any(|c| matches!(c, '(' | ')' | '{' | '}' | '[' | ']' | '=' | ';'))
}

fn contains_code(title: &str) -> bool {
  if title.contains("```") || title.matches('`').count() >= 2 {
    return true;
  }
  title
    .lines()
    .skip(1)
    .any(|line| line.chars().any(|c| matches!(c, '(' | ')' | '{' | '}' | '[' | ']' | '=' | ';' | ':')))
}

/// One validation pass over `generated_batch`.
#[instrument(level = "info", skip(state, settings), fields(
  language = %state.target_language,
  difficulty = %state.difficulty,
  batch = state.generated_batch.len(),
  retry = state.retry_count,
))]
pub fn validate(mut state: WorkflowState, settings: &WorkflowSettings) -> WorkflowState {
  let corpus: HashSet<String> = state.existing_titles.iter().map(|t| normalize_title(t)).collect();
  let compare_corpus = !corpus.is_empty();
  if !compare_corpus {
    debug!(target: "quiz", "Empty corpus; skipping duplicate comparison");
  } else {
    let window = comparison_window(&state.existing_titles, state.difficulty, settings).len();
    debug!(target: "quiz", corpus = corpus.len(), window, "Comparing titles against corpus");
  }

  let mut seen: HashSet<String> = state.accepted_questions.iter().map(|q| normalize_title(&q.title)).collect();
  let mut newly_accepted = 0usize;
  let mut rejected = Vec::new();
  let mut corpus_dups = Vec::new();

  for candidate in std::mem::take(&mut state.generated_batch) {
    let q = match check_structure(candidate.clone()) {
      Ok(q) => q,
      Err(reason) => {
        debug!(target: "quiz", title = %trunc_for_log(&candidate.title, 60), %reason, "Malformed candidate");
        rejected.push(RejectedQuestion { question: candidate, reason: Rejection::Malformed(reason) });
        continue;
      }
    };

    let key = normalize_title(&q.title);
    if compare_corpus && corpus.contains(&key) {
      corpus_dups.push(q.title.clone());
      rejected.push(RejectedQuestion { question: q, reason: Rejection::Duplicate });
      continue;
    }
    if !seen.insert(key) {
      rejected.push(RejectedQuestion { question: q, reason: Rejection::RepeatedInRun });
      continue;
    }
    if newly_accepted >= state.requested_count {
      debug!(target: "quiz", title = %trunc_for_log(&q.title, 60), "Dropping surplus candidate");
      continue;
    }

    state.accepted_questions.push(q);
    newly_accepted += 1;
  }

  for title in corpus_dups {
    if !state.existing_titles.iter().any(|t| t == &title) {
      state.existing_titles.push(title);
    }
  }

  state.requested_count = state.requested_count.saturating_sub(newly_accepted);
  state.retry_count += 1;

  info!(
    target: "quiz",
    accepted = newly_accepted,
    rejected = rejected.len(),
    remaining = state.requested_count,
    total_accepted = state.accepted_questions.len(),
    "Validation pass complete"
  );
  state.rejected_questions = rejected;
  state
}

//! Challenge persistence: the corpus of known titles, per-user history and recorded answers.
//!
//! `ChallengeStore` is what the service layer needs from storage; the
//! in-memory store backs the binary and the tests.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{AnswerRecord, Difficulty, Question, QuestionSource, StoredChallenge};
use crate::error::HistoryError;

#[async_trait]
pub trait ChallengeStore: Send + Sync {
  /// Titles already issued for this language/difficulty, oldest first.
  async fn existing_titles(&self, language: &str, difficulty: Difficulty) -> Vec<String>;

  /// Persist delivered questions for a user and return the stored records.
  async fn append_accepted(
    &self,
    questions: &[Question],
    user_id: &str,
    language: &str,
    difficulty: Difficulty,
    source: QuestionSource,
  ) -> Vec<StoredChallenge>;

  /// Everything stored for a user, oldest first.
  async fn history(&self, user_id: &str) -> Vec<StoredChallenge>;

  /// Record the user's answers. All entries are checked before any is written.
  async fn record_answers(&self, user_id: &str, answers: &[AnswerRecord]) -> Result<Vec<StoredChallenge>, HistoryError>;
}

/// Language keys are compared case-insensitively.
fn language_key(language: &str) -> String {
  language.trim().to_lowercase()
}

#[derive(Clone, Default)]
pub struct InMemoryChallengeStore {
  by_id: Arc<RwLock<HashMap<Uuid, StoredChallenge>>>,
  by_topic: Arc<RwLock<HashMap<(String, Difficulty), Vec<Uuid>>>>,
  by_user: Arc<RwLock<HashMap<String, Vec<Uuid>>>>,
}

impl InMemoryChallengeStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl ChallengeStore for InMemoryChallengeStore {
  #[instrument(level = "debug", skip(self))]
  async fn existing_titles(&self, language: &str, difficulty: Difficulty) -> Vec<String> {
    let ids = { self.by_topic.read().await.get(&(language_key(language), difficulty)).cloned() };
    let Some(ids) = ids else { return Vec::new() };
    let by_id = self.by_id.read().await;
    ids.iter().filter_map(|id| by_id.get(id)).map(|c| c.question.title.clone()).collect()
  }

  #[instrument(level = "debug", skip(self, questions), fields(count = questions.len()))]
  async fn append_accepted(
    &self,
    questions: &[Question],
    user_id: &str,
    language: &str,
    difficulty: Difficulty,
    source: QuestionSource,
  ) -> Vec<StoredChallenge> {
    let mut by_id = self.by_id.write().await;
    let mut by_topic = self.by_topic.write().await;
    let mut by_user = self.by_user.write().await;

    let mut stored = Vec::with_capacity(questions.len());
    for q in questions {
      let c = StoredChallenge {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        language: language.trim().to_string(),
        difficulty,
        created_at: Utc::now(),
        source,
        question: q.clone(),
        user_answer: None,
      };
      by_topic.entry((language_key(language), difficulty)).or_default().push(c.id);
      by_user.entry(user_id.to_string()).or_default().push(c.id);
      by_id.insert(c.id, c.clone());
      stored.push(c);
    }
    debug!(target: "quizgen_backend", %user_id, stored = stored.len(), "Challenges stored");
    stored
  }

  #[instrument(level = "debug", skip(self))]
  async fn history(&self, user_id: &str) -> Vec<StoredChallenge> {
    let ids = { self.by_user.read().await.get(user_id).cloned() };
    let Some(ids) = ids else { return Vec::new() };
    let by_id = self.by_id.read().await;
    ids.iter().filter_map(|id| by_id.get(id).cloned()).collect()
  }

  #[instrument(level = "debug", skip(self, answers), fields(count = answers.len()))]
  async fn record_answers(&self, user_id: &str, answers: &[AnswerRecord]) -> Result<Vec<StoredChallenge>, HistoryError> {
    if answers.is_empty() {
      return Err(HistoryError::Empty);
    }
    let mut by_id = self.by_id.write().await;

    for a in answers {
      let c = by_id
        .get(&a.challenge_id)
        .filter(|c| c.user_id == user_id)
        .ok_or(HistoryError::UnknownChallenge { id: a.challenge_id })?;
      if let Some(answer) = a.user_answer {
        let options = c.question.options.len();
        if answer >= options {
          return Err(HistoryError::AnswerOutOfRange { id: a.challenge_id, answer, options });
        }
      }
    }

    let mut updated = Vec::with_capacity(answers.len());
    for a in answers {
      if let Some(c) = by_id.get_mut(&a.challenge_id) {
        c.user_answer = a.user_answer;
        updated.push(c.clone());
      }
    }
    debug!(target: "quizgen_backend", %user_id, recorded = updated.len(), "Answers recorded");
    Ok(updated)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::oracle::testing::question;

  #[tokio::test]
  async fn titles_are_scoped_by_language_and_difficulty() {
    let store = InMemoryChallengeStore::new();
    store
      .append_accepted(&[question("p1"), question("p2")], "u1", "Python", Difficulty::Easy, QuestionSource::Generated)
      .await;
    store
      .append_accepted(&[question("p3")], "u2", "python ", Difficulty::Easy, QuestionSource::Generated)
      .await;
    store
      .append_accepted(&[question("h1")], "u1", "python", Difficulty::Hard, QuestionSource::Generated)
      .await;

    assert_eq!(store.existing_titles("PYTHON", Difficulty::Easy).await, vec!["p1", "p2", "p3"]);
    assert_eq!(store.existing_titles("python", Difficulty::Hard).await, vec!["h1"]);
    assert!(store.existing_titles("rust", Difficulty::Easy).await.is_empty());
  }

  #[tokio::test]
  async fn history_is_per_user_in_insertion_order() {
    let store = InMemoryChallengeStore::new();
    let stored = store
      .append_accepted(&[question("a"), question("b")], "u1", "go", Difficulty::Medium, QuestionSource::Generated)
      .await;
    store
      .append_accepted(&[question("c")], "u2", "go", Difficulty::Medium, QuestionSource::Fallback)
      .await;

    let h = store.history("u1").await;
    assert_eq!(h.len(), 2);
    assert_eq!(h[0].id, stored[0].id);
    assert_eq!(h[1].question.title, "b");
    assert_eq!(store.history("u2").await[0].source, QuestionSource::Fallback);
    assert!(store.history("nobody").await.is_empty());
  }

  #[tokio::test]
  async fn answers_are_recorded_all_or_nothing() {
    let store = InMemoryChallengeStore::new();
    let mine = store
      .append_accepted(&[question("a"), question("b")], "u1", "go", Difficulty::Easy, QuestionSource::Generated)
      .await;
    let theirs = store
      .append_accepted(&[question("c")], "u2", "go", Difficulty::Easy, QuestionSource::Generated)
      .await;

    let bad = [
      AnswerRecord { challenge_id: mine[0].id, user_answer: Some(2) },
      AnswerRecord { challenge_id: mine[1].id, user_answer: Some(4) },
    ];
    assert_eq!(
      store.record_answers("u1", &bad).await.err(),
      Some(HistoryError::AnswerOutOfRange { id: mine[1].id, answer: 4, options: 4 })
    );
    assert_eq!(store.history("u1").await[0].user_answer, None);

    let foreign = [AnswerRecord { challenge_id: theirs[0].id, user_answer: Some(0) }];
    assert_eq!(
      store.record_answers("u1", &foreign).await.err(),
      Some(HistoryError::UnknownChallenge { id: theirs[0].id })
    );
    assert_eq!(store.record_answers("u1", &[]).await.err(), Some(HistoryError::Empty));

    let good = [
      AnswerRecord { challenge_id: mine[0].id, user_answer: Some(3) },
      AnswerRecord { challenge_id: mine[1].id, user_answer: None },
    ];
    let updated = store.record_answers("u1", &good).await.expect("recorded");
    assert_eq!(updated.len(), 2);
    let h = store.history("u1").await;
    assert_eq!(h[0].user_answer, Some(3));
    assert_eq!(h[1].user_answer, None);
  }
}

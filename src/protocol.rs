//! Public protocol structs for the HTTP endpoints (serde ready).
//! Field names are camelCase on the wire; keep this small and stable.

use serde::{Deserialize, Serialize};

use crate::domain::{QuestionSource, QuotaRecord, StoredChallenge};
use crate::logic::GenerationReport;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateIn {
    #[serde(default)]
    pub count: Option<u32>,
    pub programming_language: String,
    pub difficulty: String,
}

/// DTO for one delivered question.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOut {
    pub id: String,
    pub title: String,
    pub options: Vec<String>,
    pub correct_answer_id: usize,
    pub explanation: String,
    pub difficulty: String,
    pub programming_language: String,
    pub source: QuestionSource,
    /// RFC 3339.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_answer: Option<usize>,
}

/// Convert a stored challenge (internal) to the public DTO.
pub fn to_out(c: &StoredChallenge) -> QuestionOut {
    QuestionOut {
        id: c.id.to_string(),
        title: c.question.title.clone(),
        options: c.question.options.clone(),
        correct_answer_id: c.question.correct_answer_id,
        explanation: c.question.explanation.clone(),
        difficulty: c.difficulty.to_string(),
        programming_language: c.language.clone(),
        source: c.source,
        timestamp: c.created_at.to_rfc3339(),
        user_answer: c.user_answer,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOut {
    pub questions: Vec<QuestionOut>,
    /// Present on partial success (retry ceiling or oracle failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub fallback: bool,
    pub retries: u32,
    pub quota_remaining: u32,
}

impl From<&GenerationReport> for GenerateOut {
    fn from(r: &GenerationReport) -> Self {
        GenerateOut {
            questions: r.questions.iter().map(to_out).collect(),
            error: r.error.as_ref().map(|e| e.to_string()),
            fallback: r.fallback,
            retries: r.retries,
            quota_remaining: r.quota_remaining,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaOut {
    pub user_id: String,
    pub quota_remaining: u32,
    pub last_reset_date: String,
}

pub fn quota_out(user_id: &str, record: &QuotaRecord) -> QuotaOut {
    QuotaOut {
        user_id: user_id.to_string(),
        quota_remaining: record.remaining,
        last_reset_date: record.last_reset.to_rfc3339(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryOut {
    pub user_id: String,
    pub questions: Vec<QuestionOut>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerIn {
    pub question_id: String,
    #[serde(default)]
    pub user_answer: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SaveAnswersIn {
    pub answers: Vec<AnswerIn>,
}

#[derive(Debug, Serialize)]
pub struct SaveAnswersOut {
    pub saved: usize,
    pub questions: Vec<QuestionOut>,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub oracle: bool,
}

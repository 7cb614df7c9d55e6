//! Minimal OpenAI-compatible client implementing the question oracle.
//!
//! We only call chat.completions with a strict JSON-object response format.
//! Calls are instrumented and log model names, latencies, and token usage (not contents).
//!
//! NOTE: We never log the API key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::domain::Question;
use crate::error::OracleError;
use crate::oracle::{GenerationRequest, QuestionOracle};
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub temperature: f32,
}

/// Envelope the model is told to answer with.
#[derive(Deserialize)]
struct QuestionEnvelope {
  questions: Vec<Question>,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; `Ok(None)` when it is absent.
  /// The HTTP timeout is a transport backstop; the workflow applies its own per-call deadline.
  pub fn from_env(temperature: f32, timeout: Duration) -> Result<Option<Self>, OracleError> {
    Self::from_lookup(|k| std::env::var(k).ok(), temperature, timeout)
  }

  fn from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
    temperature: f32,
    timeout: Duration,
  ) -> Result<Option<Self>, OracleError> {
    let Some(api_key) = lookup("OPENAI_API_KEY") else { return Ok(None) };
    let base_url = lookup("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".into());
    let model = lookup("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".into());

    let client = reqwest::Client::builder()
      .timeout(timeout + Duration::from_secs(5))
      .build()
      .map_err(|e| OracleError::Transport(format!("HTTP client setup failed: {}", e)))?;

    Ok(Some(Self { client, api_key, base_url, model, temperature }))
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(
    &self,
    system: &str,
    user: &str,
  ) -> Result<T, OracleError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature: self.temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "quizgen-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| OracleError::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(OracleError::Http { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| OracleError::Schema(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .ok_or_else(|| OracleError::Schema("empty completion".into()))?;

    parse_json_content(&text)
  }
}

#[async_trait]
impl QuestionOracle for OpenAI {
  #[instrument(level = "info", skip(self, request), fields(count = request.count, language = %request.language, difficulty = %request.difficulty))]
  async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Question>, OracleError> {
    let start = std::time::Instant::now();
    let result = self
      .chat_json::<QuestionEnvelope>(&request.prompt.system, &request.prompt.user)
      .await;
    let elapsed = start.elapsed();

    match result {
      Ok(env) => {
        info!(?elapsed, received = env.questions.len(), "Model response received successfully");
        Ok(env.questions)
      }
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed during question generation");
        Err(e)
      }
    }
  }
}

/// Models occasionally wrap JSON in a markdown fence even in JSON mode.
fn parse_json_content<T: for<'a> Deserialize<'a>>(text: &str) -> Result<T, OracleError> {
  let trimmed = text.trim();
  let inner = trimmed
    .strip_prefix("```json")
    .or_else(|| trimmed.strip_prefix("```"))
    .and_then(|s| s.strip_suffix("```"))
    .unwrap_or(trimmed);
  serde_json::from_str::<T>(inner.trim()).map_err(|e| OracleError::Schema(format!("JSON parse error: {}", e)))
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

//! Application state: configuration, the question oracle, the challenge store and the quota gate.
//!
//! The oracle is optional. Without OPENAI_API_KEY every request is answered
//! with the hard fallback question.

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::config::{load_agent_config_from_env, AgentConfig};
use crate::oracle::QuestionOracle;
use crate::openai::OpenAI;
use crate::quota::QuotaGate;
use crate::store::{ChallengeStore, InMemoryChallengeStore};

#[derive(Clone)]
pub struct AppState {
    pub config: AgentConfig,
    pub oracle: Option<Arc<dyn QuestionOracle>>,
    pub store: Arc<dyn ChallengeStore>,
    pub quota: QuotaGate,
}

impl AppState {
    /// Build state from env: load config, init OpenAI, empty in-memory stores.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_agent_config_from_env().unwrap_or_default();

        let openai = OpenAI::from_env(config.workflow.temperature, config.workflow.oracle_timeout());
        let oracle: Option<Arc<dyn QuestionOracle>> = match openai {
            Ok(Some(oa)) => {
                info!(target: "quizgen_backend", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
                Some(Arc::new(oa))
            }
            Ok(None) => {
                info!(target: "quizgen_backend", "OpenAI disabled (no OPENAI_API_KEY). Serving fallback questions only.");
                None
            }
            Err(e) => {
                error!(target: "quizgen_backend", error = %e, "OpenAI disabled (OPENAI_API_KEY set, client setup failed). Serving fallback questions only.");
                None
            }
        };

        info!(
            target: "quizgen_backend",
            max_retries = config.workflow.max_retries,
            oracle_timeout_secs = config.workflow.oracle_timeout_secs,
            allowance = config.quota.allowance,
            window_hours = config.quota.window_hours,
            "Workflow configured"
        );

        Self::with_parts(config, oracle, Arc::new(InMemoryChallengeStore::new()))
    }

    pub fn with_parts(
        config: AgentConfig,
        oracle: Option<Arc<dyn QuestionOracle>>,
        store: Arc<dyn ChallengeStore>,
    ) -> Self {
        let quota = QuotaGate::new(config.quota.clone());
        Self { config, oracle, store, quota }
    }
}

//! Application state: engine configuration and the optional Groq client.
//!
//! Sessions themselves live on their WebSocket tasks; this struct only holds
//! what is shared and immutable across connections.

use tracing::{info, instrument};

use crate::config::{load_engine_config_from_env, EngineConfig};
use crate::domain::{BloomLevel, ChallengeType};
use crate::error::GenerationError;
use crate::groq::{GenerateChallenge, GroqClient};

pub struct AppState {
    pub config: EngineConfig,
    pub groq: Option<GroqClient>,
}

impl AppState {
    /// Build state from env: load TOML config, init the Groq client if an
    /// API key is present.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_engine_config_from_env();

        let groq = GroqClient::from_env(config.prompts.clone(), config.settings.temperature);
        if let Some(g) = &groq {
            info!(target: "bloomstep_backend", base_url = %g.base_url, model = %g.model, "Groq generation enabled.");
        } else {
            info!(target: "bloomstep_backend", "Groq generation disabled (no GROQ_API_KEY). Sessions will surface generation errors.");
        }

        Self { config, groq }
    }
}

impl GenerateChallenge for AppState {
    async fn generate(
        &self,
        context: &str,
        level: BloomLevel,
        kind: ChallengeType,
        prior_prompts: &str,
    ) -> Result<String, GenerationError> {
        match &self.groq {
            Some(client) => client.generate(context, level, kind, prior_prompts).await,
            None => Err(GenerationError::Disabled),
        }
    }
}

//! Minimal Groq client (OpenAI-compatible chat completions).
//!
//! One POST per generation request, no automatic retry; transport failures,
//! non-success statuses, and empty envelopes come back as typed
//! `GenerationError`s. The reply content is returned verbatim — parsing it
//! into a challenge is the caller's concern, since the model may emit
//! malformed JSON regardless of instruction.
//!
//! NOTE: We never log the API key and keep payload truncations short.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::{Prompts, CHALLENGE_SCHEMA};
use crate::domain::{BloomLevel, ChallengeType};
use crate::error::GenerationError;
use crate::util::{fill_template, trunc_for_log};

/// Contract between the session and whatever produces challenge text.
/// The production impl is `GroqClient`; tests drive the session with stubs.
pub trait GenerateChallenge {
  fn generate(
    &self,
    context: &str,
    level: BloomLevel,
    kind: ChallengeType,
    prior_prompts: &str,
  ) -> impl std::future::Future<Output = Result<String, GenerationError>> + Send;
}

impl<G: GenerateChallenge + Sync + Send> GenerateChallenge for std::sync::Arc<G> {
  async fn generate(
    &self,
    context: &str,
    level: BloomLevel,
    kind: ChallengeType,
    prior_prompts: &str,
  ) -> Result<String, GenerationError> {
    (**self).generate(context, level, kind, prior_prompts).await
  }
}

#[derive(Clone)]
pub struct GroqClient {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub temperature: f32,
  pub prompts: Prompts,
}

impl GroqClient {
  /// Construct the client if we find GROQ_API_KEY; otherwise return None.
  pub fn from_env(prompts: Prompts, temperature: f32) -> Option<Self> {
    let api_key = std::env::var("GROQ_API_KEY").ok()?;
    let base_url = std::env::var("GROQ_BASE_URL")
      .unwrap_or_else(|_| "https://api.groq.com/openai/v1".into());
    let model =
      std::env::var("GROQ_MODEL").unwrap_or_else(|_| "llama-3.1-8b-instant".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model, temperature, prompts })
  }

  /// Build the system instruction for one (level, kind) request.
  /// The anti-repetition block is inserted only when prior prompts exist.
  fn system_prompt(&self, level: BloomLevel, kind: ChallengeType, prior_prompts: &str) -> String {
    let history_block = if prior_prompts.is_empty() {
      String::new()
    } else {
      fill_template(&self.prompts.history_template, &[("prior_prompts", prior_prompts)])
    };
    let schema = fill_template(CHALLENGE_SCHEMA, &[("kind", kind.label())]);
    fill_template(
      &self.prompts.generation_system,
      &[
        ("level", level.label()),
        ("kind", kind.label()),
        ("kind_instruction", self.prompts.instruction_for(kind)),
        ("history_block", &history_block),
        ("schema", &schema),
      ],
    )
  }

  /// Single chat-completion attempt; returns the first choice's content.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat(&self, system: &str, user: &str) -> Result<String, GenerationError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature: self.temperature,
    };

    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "bloomstep-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req)
      .send()
      .await
      .map_err(|e| GenerationError::Network(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_service_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(GenerationError::Service { status, message });
    }

    let body: ChatCompletionResponse =
      res.json().await.map_err(|e| GenerationError::Network(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(
        prompt_tokens = ?usage.prompt_tokens,
        completion_tokens = ?usage.completion_tokens,
        total_tokens = ?usage.total_tokens,
        "Groq usage"
      );
    }

    body
      .choices
      .first()
      .and_then(|c| c.message.content.clone())
      .filter(|s| !s.trim().is_empty())
      .map(|s| s.trim().to_string())
      .ok_or(GenerationError::EmptyChoices)
  }
}

impl GenerateChallenge for GroqClient {
  /// Generate one taxonomy-level question over the given context.
  /// Returns raw structured text; validation happens at the caller.
  #[instrument(
    level = "info",
    skip(self, context, prior_prompts),
    fields(level = level.label(), kind = kind.label(), context_len = context.len(), history_len = prior_prompts.len())
  )]
  async fn generate(
    &self,
    context: &str,
    level: BloomLevel,
    kind: ChallengeType,
    prior_prompts: &str,
  ) -> Result<String, GenerationError> {
    let system = self.system_prompt(level, kind, prior_prompts);
    let user = fill_template(&self.prompts.generation_user_template, &[("context", context)]);

    let start = std::time::Instant::now();
    let result = self.chat(&system, &user).await;
    let elapsed = start.elapsed();

    match &result {
      Ok(text) => {
        info!(?elapsed, preview = %trunc_for_log(text, 80), "Model response received")
      }
      Err(e) => error!(?elapsed, error = %e, "Model call failed during challenge generation"),
    }
    result
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
}
#[derive(Serialize)]
struct ChatMessageReq {
  role: String,
  content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)]
  usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice {
  message: ChatMessageResp,
}
#[derive(Deserialize)]
struct ChatMessageResp {
  content: Option<String>,
}
#[derive(Deserialize)]
struct Usage {
  #[serde(default)]
  prompt_tokens: Option<u32>,
  #[serde(default)]
  completion_tokens: Option<u32>,
  #[serde(default)]
  total_tokens: Option<u32>,
}

/// Try to extract a clean error message from the service's error body.
fn extract_service_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client() -> GroqClient {
    GroqClient {
      client: reqwest::Client::new(),
      api_key: "test".into(),
      base_url: "http://localhost:0".into(),
      model: "llama-3.1-8b-instant".into(),
      temperature: 0.5,
      prompts: Prompts::default(),
    }
  }

  #[test]
  fn system_prompt_includes_level_kind_and_schema() {
    let c = client();
    let sys = c.system_prompt(BloomLevel::Apply, ChallengeType::CaseStudy, "");
    assert!(sys.contains("APPLY"));
    assert!(sys.contains("CASE_STUDY"));
    assert!(sys.contains("\"indice_correcta\""));
    assert!(sys.contains(&c.prompts.case_study_instruction));
    // Empty history leaves no exclusion block.
    assert!(!sys.contains("FORBIDDEN"));
  }

  #[test]
  fn system_prompt_lists_prior_prompts_verbatim() {
    let c = client();
    let sys = c.system_prompt(
      BloomLevel::Remember,
      ChallengeType::Quiz,
      "What is an atom? | What is a proton?",
    );
    assert!(sys.contains("FORBIDDEN"));
    assert!(sys.contains("What is an atom? | What is a proton?"));
  }

  #[test]
  fn service_error_body_is_unwrapped() {
    let msg = extract_service_error(r#"{"error":{"message":"model overloaded"}}"#);
    assert_eq!(msg.as_deref(), Some("model overloaded"));
    assert!(extract_service_error("plain text").is_none());
  }
}

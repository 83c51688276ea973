//! Loading engine configuration (prompt templates + tuning knobs) from TOML.
//!
//! Defaults are compiled in and work out of the box; a TOML file pointed to
//! by ENGINE_CONFIG_PATH only overrides.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct EngineConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub settings: Settings,
}

/// Tuning knobs for the session and the generation call.
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
  /// Character cap applied to the loaded document before it becomes context.
  #[serde(default = "default_context_char_limit")]
  pub context_char_limit: usize,
  /// Pause between scoring and the next generated challenge, so the learner
  /// can read the feedback first.
  #[serde(default = "default_next_challenge_delay_ms")]
  pub next_challenge_delay_ms: u64,
  /// Sampling temperature for generation; kept low for dependable JSON.
  #[serde(default = "default_temperature")]
  pub temperature: f32,
}

fn default_context_char_limit() -> usize {
  8000
}
fn default_next_challenge_delay_ms() -> u64 {
  4000
}
fn default_temperature() -> f32 {
  0.5
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      context_char_limit: default_context_char_limit(),
      next_challenge_delay_ms: default_next_challenge_delay_ms(),
      temperature: default_temperature(),
    }
  }
}

/// Prompt templates used by the generation client. Override them in TOML if
/// you need to tune tone or structure; the JSON schema block must keep the
/// exact field names because the parser enforces them.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  /// System template. Keys: {level}, {kind}, {kind_instruction},
  /// {history_block}, {schema}.
  pub generation_system: String,
  /// User template. Keys: {context}.
  pub generation_user_template: String,
  /// Anti-repetition block, inserted only when prior prompts exist.
  /// Keys: {prior_prompts}.
  pub history_template: String,
  /// Canned per-type elaborations, one per challenge shape.
  pub quiz_instruction: String,
  pub fill_blank_instruction: String,
  pub case_study_instruction: String,
  pub odd_one_out_instruction: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generation_system: "Act as an expert instructor applying Bloom's taxonomy. \
Your goal is to generate one multiple-choice question grounded in the context the user provides. \
The cognitive-complexity level must be '{level}'.\n\
CHALLENGE TYPE: {kind}. Instruction: {kind_instruction}\n\n\
{history_block}\n\
IMPORTANT: Reply ONLY with a single raw JSON object (no markdown, no ```json code fences, no commentary) \
with exactly this structure:\n{schema}"
        .into(),
      generation_user_template: "Context: {context}".into(),
      history_template: "IMPORTANT: Generate a COMPLETELY NEW question. It is FORBIDDEN to repeat \
or paraphrase any of these previous questions: {prior_prompts}\n"
        .into(),
      quiz_instruction: "Generate a direct multiple-choice question.".into(),
      fill_blank_instruction: "Take a sentence from the text, remove one key term and make it the \
correct option. The other options are plausible but wrong terms."
        .into(),
      case_study_instruction: "Invent a brief hypothetical situation where the concept applies.".into(),
      odd_one_out_instruction: "Produce 4 concepts where 3 are related and 1 does not belong. \
The question must be: which one does not belong?"
        .into(),
    }
  }
}

impl Prompts {
  /// Look up the canned instruction for a challenge shape.
  pub fn instruction_for(&self, kind: crate::domain::ChallengeType) -> &str {
    use crate::domain::ChallengeType::*;
    match kind {
      Quiz => &self.quiz_instruction,
      FillBlank => &self.fill_blank_instruction,
      CaseStudy => &self.case_study_instruction,
      OddOneOut => &self.odd_one_out_instruction,
    }
  }
}

/// Exact schema the model must reply with. The field names are the wire
/// contract enforced by `ChallengeSpec::parse`.
pub const CHALLENGE_SCHEMA: &str = r#"{
  "pregunta": "...",
  "opciones": ["option1", "option2", "option3", "option4"],
  "indice_correcta": 0,
  "retroalimentacion": "brief explanation",
  "tipo_desafio": "{kind}",
  "pista": "short help text that does not give the answer away"
}"#;

/// Attempt to load `EngineConfig` from ENGINE_CONFIG_PATH. On any parsing or
/// IO error, falls back to defaults.
pub fn load_engine_config_from_env() -> EngineConfig {
  let Some(path) = std::env::var("ENGINE_CONFIG_PATH").ok() else {
    return EngineConfig::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<EngineConfig>(&s) {
      Ok(cfg) => {
        info!(target: "bloomstep_backend", %path, "Loaded engine config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "bloomstep_backend", %path, error = %e, "Failed to parse TOML config; using defaults");
        EngineConfig::default()
      }
    },
    Err(e) => {
      error!(target: "bloomstep_backend", %path, error = %e, "Failed to read TOML config file; using defaults");
      EngineConfig::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_complete() {
    let cfg = EngineConfig::default();
    assert_eq!(cfg.settings.context_char_limit, 8000);
    assert_eq!(cfg.settings.next_challenge_delay_ms, 4000);
    assert!(cfg.prompts.generation_system.contains("{level}"));
    assert!(cfg.prompts.generation_system.contains("{schema}"));
  }

  #[test]
  fn partial_toml_overrides_only_named_fields() {
    let cfg: EngineConfig = toml::from_str(
      r#"
      [settings]
      context_char_limit = 1234
      "#,
    )
    .unwrap();
    assert_eq!(cfg.settings.context_char_limit, 1234);
    assert_eq!(cfg.settings.next_challenge_delay_ms, 4000);
    assert!(!cfg.prompts.quiz_instruction.is_empty());
  }
}

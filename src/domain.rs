//! Domain models: Bloom levels, challenge types, the challenge itself, and
//! the progression snapshot. The validating parse of the untrusted generated
//! payload lives here because the wire contract is a domain concern.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseError;

/// Every challenge carries exactly this many answer options.
pub const OPTION_COUNT: usize = 4;

/// Ordinal cognitive-complexity stage (Bloom taxonomy, four stages).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BloomLevel {
  Remember,
  Understand,
  Apply,
  Analyze,
}

impl BloomLevel {
  /// Ordinal rank 0..=3.
  pub fn rank(self) -> u8 {
    match self {
      BloomLevel::Remember => 0,
      BloomLevel::Understand => 1,
      BloomLevel::Apply => 2,
      BloomLevel::Analyze => 3,
    }
  }

  /// Clamp an arbitrary rank into a valid level.
  pub fn from_rank(rank: u8) -> Self {
    match rank {
      0 => BloomLevel::Remember,
      1 => BloomLevel::Understand,
      2 => BloomLevel::Apply,
      _ => BloomLevel::Analyze,
    }
  }

  /// Uppercase label used in prompts, HUD updates, and the summary.
  pub fn label(self) -> &'static str {
    match self {
      BloomLevel::Remember => "REMEMBER",
      BloomLevel::Understand => "UNDERSTAND",
      BloomLevel::Apply => "APPLY",
      BloomLevel::Analyze => "ANALYZE",
    }
  }

  /// The next level up, saturating at the top.
  pub fn promoted(self) -> Self {
    BloomLevel::from_rank(self.rank().saturating_add(1).min(3))
  }
}

/// Shape of the question asked at a given level. Each level exercises a
/// distinct cognitive skill through a distinct question shape, so the
/// mapping is fixed 1:1.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
  Quiz,
  FillBlank,
  CaseStudy,
  OddOneOut,
}

impl ChallengeType {
  pub fn for_level(level: BloomLevel) -> Self {
    match level {
      BloomLevel::Remember => ChallengeType::Quiz,
      BloomLevel::Understand => ChallengeType::FillBlank,
      BloomLevel::Apply => ChallengeType::CaseStudy,
      BloomLevel::Analyze => ChallengeType::OddOneOut,
    }
  }

  /// Uppercase label used in prompts and echoed back in `tipo_desafio`.
  pub fn label(self) -> &'static str {
    match self {
      ChallengeType::Quiz => "QUIZ",
      ChallengeType::FillBlank => "FILL_BLANK",
      ChallengeType::CaseStudy => "CASE_STUDY",
      ChallengeType::OddOneOut => "ODD_ONE_OUT",
    }
  }

  /// Lenient reverse of `label`. The model's echo is advisory only, so an
  /// unrecognized label is a `None`, not an error.
  pub fn from_label(s: &str) -> Option<Self> {
    match s.trim().to_ascii_uppercase().as_str() {
      "QUIZ" => Some(ChallengeType::Quiz),
      "FILL_BLANK" => Some(ChallengeType::FillBlank),
      "CASE_STUDY" => Some(ChallengeType::CaseStudy),
      "ODD_ONE_OUT" => Some(ChallengeType::OddOneOut),
      _ => None,
    }
  }
}

/// Raw wire payload the generator is instructed to produce. Field names are
/// part of the external contract; see the prompt schema in config.rs.
#[derive(Debug, Deserialize)]
struct RawChallenge {
  pregunta: String,
  opciones: Vec<String>,
  indice_correcta: i64,
  retroalimentacion: String,
  tipo_desafio: String,
  pista: String,
}

/// A fully validated challenge, immutable once produced.
#[derive(Clone, Debug, Serialize)]
pub struct ChallengeSpec {
  pub id: String,
  pub prompt_text: String,
  /// Exactly OPTION_COUNT entries; duplicates are allowed (not deduplicated).
  pub options: Vec<String>,
  pub correct_index: usize,
  pub explanation: String,
  pub challenge_type: ChallengeType,
  pub hint_text: String,
}

impl ChallengeSpec {
  /// Validating parse of the generator's reply.
  ///
  /// The upstream is an LLM with no hard format guarantee, so we reject on
  /// malformed JSON, missing fields, wrong option arity, or an out-of-range
  /// correct index. `requested` is the type we asked for; the echoed
  /// `tipo_desafio` only overrides it when it parses to a known label.
  pub fn parse(raw: &str, requested: ChallengeType) -> Result<Self, ParseError> {
    let payload: RawChallenge = serde_json::from_str(raw)?;

    if payload.opciones.len() != OPTION_COUNT {
      return Err(ParseError::OptionCount {
        expected: OPTION_COUNT,
        got: payload.opciones.len(),
      });
    }
    let len = payload.opciones.len();
    if payload.indice_correcta < 0 || payload.indice_correcta as usize >= len {
      return Err(ParseError::IndexOutOfRange { index: payload.indice_correcta, len });
    }

    Ok(ChallengeSpec {
      id: Uuid::new_v4().to_string(),
      prompt_text: payload.pregunta,
      options: payload.opciones,
      correct_index: payload.indice_correcta as usize,
      explanation: payload.retroalimentacion,
      challenge_type: ChallengeType::from_label(&payload.tipo_desafio).unwrap_or(requested),
      hint_text: payload.pista,
    })
  }
}

/// Immutable snapshot of the learner's progression, returned from every
/// mutating policy call so callers can diff before/after without aliasing.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct ProgressionState {
  pub level: BloomLevel,
  pub score: u32,
  pub current_streak: u32,
  pub total_correct: u32,
  pub total_incorrect: u32,
  pub total_hints_used: u32,
}

impl ProgressionState {
  pub fn new() -> Self {
    Self {
      level: BloomLevel::Remember,
      score: 0,
      current_streak: 0,
      total_correct: 0,
      total_incorrect: 0,
      total_hints_used: 0,
    }
  }
}

impl Default for ProgressionState {
  fn default() -> Self {
    Self::new()
  }
}

/// Final figures exposed when a session ends.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SessionSummary {
  pub level: BloomLevel,
  pub score: u32,
  pub correct: u32,
  pub total: u32,
  pub hints_used: u32,
  /// `correct / total`, or 0 when no challenge was attempted.
  pub accuracy: f32,
}

impl SessionSummary {
  pub fn from_state(state: &ProgressionState) -> Self {
    let total = state.total_correct + state.total_incorrect;
    let accuracy = if total == 0 {
      0.0
    } else {
      state.total_correct as f32 / total as f32
    };
    Self {
      level: state.level,
      score: state.score,
      correct: state.total_correct,
      total,
      hints_used: state.total_hints_used,
      accuracy,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn raw(index: i64) -> String {
    format!(
      r#"{{"pregunta":"Which layer routes packets?",
          "opciones":["Network","Transport","Session","Physical"],
          "indice_correcta":{index},
          "retroalimentacion":"Routing happens at layer 3.",
          "tipo_desafio":"QUIZ",
          "pista":"Think about IP addresses."}}"#
    )
  }

  #[test]
  fn parse_accepts_well_formed_payload() {
    let spec = ChallengeSpec::parse(&raw(0), ChallengeType::Quiz).unwrap();
    assert_eq!(spec.prompt_text, "Which layer routes packets?");
    assert_eq!(spec.options.len(), OPTION_COUNT);
    assert_eq!(spec.correct_index, 0);
    assert_eq!(spec.challenge_type, ChallengeType::Quiz);
  }

  #[test]
  fn parse_rejects_out_of_range_index() {
    let err = ChallengeSpec::parse(&raw(4), ChallengeType::Quiz).unwrap_err();
    assert!(matches!(err, ParseError::IndexOutOfRange { index: 4, len: 4 }));
    let err = ChallengeSpec::parse(&raw(-1), ChallengeType::Quiz).unwrap_err();
    assert!(matches!(err, ParseError::IndexOutOfRange { index: -1, .. }));
  }

  #[test]
  fn parse_rejects_wrong_option_arity() {
    let raw = r#"{"pregunta":"q","opciones":["a","b","c"],"indice_correcta":0,
                  "retroalimentacion":"r","tipo_desafio":"QUIZ","pista":"p"}"#;
    let err = ChallengeSpec::parse(raw, ChallengeType::Quiz).unwrap_err();
    assert!(matches!(err, ParseError::OptionCount { expected: 4, got: 3 }));
  }

  #[test]
  fn parse_rejects_missing_fields_and_fences() {
    // Missing "pista"
    let raw = r#"{"pregunta":"q","opciones":["a","b","c","d"],"indice_correcta":0,
                  "retroalimentacion":"r","tipo_desafio":"QUIZ"}"#;
    assert!(matches!(
      ChallengeSpec::parse(raw, ChallengeType::Quiz),
      Err(ParseError::Json(_))
    ));
    // Markdown fences are a contract violation, not something we strip.
    let fenced = format!("```json\n{}\n```", raw);
    assert!(matches!(
      ChallengeSpec::parse(&fenced, ChallengeType::Quiz),
      Err(ParseError::Json(_))
    ));
  }

  #[test]
  fn unknown_type_label_falls_back_to_requested() {
    let raw = r#"{"pregunta":"q","opciones":["a","b","c","d"],"indice_correcta":1,
                  "retroalimentacion":"r","tipo_desafio":"TRIVIA","pista":"p"}"#;
    let spec = ChallengeSpec::parse(raw, ChallengeType::OddOneOut).unwrap();
    assert_eq!(spec.challenge_type, ChallengeType::OddOneOut);
  }

  #[test]
  fn level_type_mapping_is_fixed() {
    assert_eq!(ChallengeType::for_level(BloomLevel::Remember), ChallengeType::Quiz);
    assert_eq!(ChallengeType::for_level(BloomLevel::Understand), ChallengeType::FillBlank);
    assert_eq!(ChallengeType::for_level(BloomLevel::Apply), ChallengeType::CaseStudy);
    assert_eq!(ChallengeType::for_level(BloomLevel::Analyze), ChallengeType::OddOneOut);
  }

  #[test]
  fn summary_accuracy_handles_zero_attempts() {
    let s = SessionSummary::from_state(&ProgressionState::new());
    assert_eq!(s.accuracy, 0.0);
    assert_eq!(s.total, 0);
  }
}

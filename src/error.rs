//! Error taxonomy for the assessment engine.
//!
//! Every failure here is local and recoverable: document and generation
//! errors leave the session retriable, parse errors just mean "no usable
//! challenge produced", and state errors are integration defects rejected
//! at the API boundary. Nothing in this crate panics across the WS edge.

use thiserror::Error;

/// The source document could not be turned into a usable context.
#[derive(Debug, Error)]
pub enum DocumentError {
  #[error("document contained no usable text")]
  EmptyText,
}

/// The generation service did not produce a reply we can work with.
/// One attempt per request; the caller decides whether to re-trigger.
#[derive(Debug, Error)]
pub enum GenerationError {
  #[error("generation disabled: no API key configured")]
  Disabled,

  #[error("network error calling generation service: {0}")]
  Network(String),

  #[error("generation service HTTP {status}: {message}")]
  Service { status: u16, message: String },

  #[error("generation service returned no choices")]
  EmptyChoices,
}

/// The generated payload violated the challenge contract.
/// Treated exactly like a generation failure by the session.
#[derive(Debug, Error)]
pub enum ParseError {
  #[error("malformed challenge JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("expected {expected} options, got {got}")]
  OptionCount { expected: usize, got: usize },

  #[error("correct-option index {index} out of bounds for {len} options")]
  IndexOutOfRange { index: i64, len: usize },
}

/// An action arrived that the current session state cannot honor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
  #[error("challenge was already answered")]
  AlreadyAnswered,

  #[error("action '{action}' is not valid in phase '{phase}'")]
  InvalidAction { action: &'static str, phase: &'static str },
}

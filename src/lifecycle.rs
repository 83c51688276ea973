//! The currently displayed challenge: option shuffling, answer verification,
//! and the exactly-one-verification rule.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::domain::{ChallengeSpec, OPTION_COUNT};
use crate::error::StateError;

/// Live session object for one accepted challenge.
///
/// The correct answer is captured as text from the unshuffled options, so
/// verification compares content and stays correct under any permutation.
#[derive(Debug)]
pub struct DisplayedChallenge {
  spec: ChallengeSpec,
  shuffled_options: Vec<String>,
  correct_text: String,
  answered: bool,
}

impl DisplayedChallenge {
  /// Accept a spec for display, shuffling a copy of its options with the
  /// thread rng.
  ///
  /// Rejects (as a `ParseError`-equivalent, surfaced by the session like a
  /// generation failure) when the option arity or correct index is wrong;
  /// the validating parse already checks this, but the lifecycle owns its
  /// own contract.
  pub fn accept(spec: ChallengeSpec) -> Result<Self, crate::error::ParseError> {
    Self::accept_with(spec, &mut rand::thread_rng())
  }

  /// Same as `accept`, with a caller-supplied rng (seedable in tests).
  pub fn accept_with<R: Rng>(spec: ChallengeSpec, rng: &mut R) -> Result<Self, crate::error::ParseError> {
    if spec.options.len() != OPTION_COUNT {
      warn!(target: "challenge", id = %spec.id, got = spec.options.len(), "rejecting spec: wrong option count");
      return Err(crate::error::ParseError::OptionCount {
        expected: OPTION_COUNT,
        got: spec.options.len(),
      });
    }
    if spec.correct_index >= spec.options.len() {
      warn!(target: "challenge", id = %spec.id, index = spec.correct_index, "rejecting spec: correct index out of bounds");
      return Err(crate::error::ParseError::IndexOutOfRange {
        index: spec.correct_index as i64,
        len: spec.options.len(),
      });
    }

    // Capture the correct text before shuffling; Fisher-Yates via
    // SliceRandom is uniform over all permutations.
    let correct_text = spec.options[spec.correct_index].clone();
    let mut shuffled_options = spec.options.clone();
    shuffled_options.shuffle(rng);

    debug!(target: "challenge", id = %spec.id, kind = spec.challenge_type.label(), "challenge accepted for display");
    Ok(Self { spec, shuffled_options, correct_text, answered: false })
  }

  pub fn spec(&self) -> &ChallengeSpec {
    &self.spec
  }

  /// Options in display order.
  pub fn shuffled_options(&self) -> &[String] {
    &self.shuffled_options
  }

  pub fn answered(&self) -> bool {
    self.answered
  }

  /// Verify a submitted answer by exact text equality against the captured
  /// correct option. Exactly one verification is allowed per challenge; any
  /// further call fails without changing anything.
  pub fn submit(&mut self, selected_text: &str) -> Result<bool, StateError> {
    if self.answered {
      return Err(StateError::AlreadyAnswered);
    }
    self.answered = true;
    let correct = selected_text == self.correct_text;
    debug!(target: "challenge", id = %self.spec.id, correct, "answer verified");
    Ok(correct)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ChallengeType;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  fn spec(correct_index: usize) -> ChallengeSpec {
    ChallengeSpec {
      id: "t-1".into(),
      prompt_text: "Pick the odd one out".into(),
      options: vec!["oak".into(), "pine".into(), "birch".into(), "granite".into()],
      correct_index,
      explanation: "Granite is a rock, the rest are trees.".into(),
      challenge_type: ChallengeType::OddOneOut,
      hint_text: "Three of them grow.".into(),
    }
  }

  #[test]
  fn correct_text_submission_wins_under_any_shuffle() {
    for seed in 0..64 {
      let mut rng = StdRng::seed_from_u64(seed);
      let mut dc = DisplayedChallenge::accept_with(spec(3), &mut rng).unwrap();
      assert_eq!(dc.shuffled_options().len(), 4);
      assert!(dc.submit("granite").unwrap());
    }
  }

  #[test]
  fn wrong_text_submission_loses() {
    let mut dc = DisplayedChallenge::accept(spec(3)).unwrap();
    assert!(!dc.submit("pine").unwrap());
  }

  #[test]
  fn second_submission_is_rejected() {
    let mut dc = DisplayedChallenge::accept(spec(0)).unwrap();
    dc.submit("oak").unwrap();
    assert_eq!(dc.submit("oak").unwrap_err(), StateError::AlreadyAnswered);
    assert_eq!(dc.submit("pine").unwrap_err(), StateError::AlreadyAnswered);
  }

  #[test]
  fn out_of_bounds_index_is_rejected() {
    let err = DisplayedChallenge::accept(spec(4)).unwrap_err();
    assert!(matches!(err, crate::error::ParseError::IndexOutOfRange { index: 4, len: 4 }));
  }

  #[test]
  fn wrong_arity_is_rejected() {
    let mut s = spec(0);
    s.options.pop();
    let err = DisplayedChallenge::accept(s).unwrap_err();
    assert!(matches!(err, crate::error::ParseError::OptionCount { got: 3, .. }));
  }

  #[test]
  fn duplicate_options_still_verify_by_text() {
    let mut s = spec(1);
    s.options = vec!["same".into(), "same".into(), "other".into(), "else".into()];
    let mut dc = DisplayedChallenge::accept(s).unwrap();
    assert!(dc.submit("same").unwrap());
  }
}

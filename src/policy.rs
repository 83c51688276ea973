//! Progression policy: level, score, streak, and usage counters.
//!
//! Pure state/policy object. No I/O, no randomness; inputs are pre-validated
//! by the session. Each mutating call returns an immutable snapshot of the
//! state after the mutation.

use tracing::{debug, info};

use crate::domain::{BloomLevel, ChallengeType, ProgressionState};

/// Base points per challenge: 100 × (level rank + 1).
const POINTS_PER_LEVEL: u32 = 100;

/// Consecutive correct answers required to promote.
const PROMOTION_STREAK: u32 = 2;

#[derive(Debug, Default)]
pub struct ProgressionPolicy {
  state: ProgressionState,
}

impl ProgressionPolicy {
  pub fn new() -> Self {
    Self { state: ProgressionState::new() }
  }

  /// Current snapshot.
  pub fn state(&self) -> ProgressionState {
    self.state
  }

  /// The (level, type) pair the next challenge should use. Deterministic
  /// given the current level; the type mapping is fixed 1:1.
  pub fn next_challenge(&self) -> (BloomLevel, ChallengeType) {
    let level = self.state.level;
    let kind = ChallengeType::for_level(level);
    debug!(target: "session", level = level.label(), kind = kind.label(), "next challenge selected");
    (level, kind)
  }

  /// Record that a hint was served. The counter fires at request time; the
  /// score penalty fires at outcome time via `record_outcome`, so the caller
  /// tracks "hint used for this specific challenge" separately.
  pub fn record_hint_used(&mut self) -> ProgressionState {
    self.state.total_hints_used += 1;
    debug!(target: "session", total = self.state.total_hints_used, "hint recorded");
    self.state
  }

  /// Apply the outcome of one challenge.
  ///
  /// Correct: streak and totals advance, points are awarded (halved, floor,
  /// when a hint was used), and a streak of `PROMOTION_STREAK` promotes the
  /// level and resets the streak so the next level's bar is the same
  /// relative difficulty. Incorrect: streak resets, level unchanged.
  pub fn record_outcome(&mut self, correct: bool, hint_used: bool) -> ProgressionState {
    if correct {
      self.state.total_correct += 1;
      self.state.current_streak += 1;

      let mut points = POINTS_PER_LEVEL * (self.state.level.rank() as u32 + 1);
      if hint_used {
        points /= 2;
      }
      self.state.score += points;
      info!(
        target: "session",
        points,
        streak = self.state.current_streak,
        score = self.state.score,
        "correct answer"
      );

      if self.state.current_streak >= PROMOTION_STREAK {
        self.promote();
      }
    } else {
      self.state.total_incorrect += 1;
      self.state.current_streak = 0;
      info!(target: "session", level = self.state.level.label(), "incorrect answer, streak reset");
    }
    self.state
  }

  fn promote(&mut self) {
    if self.state.level < BloomLevel::Analyze {
      self.state.level = self.state.level.promoted();
      self.state.current_streak = 0;
      info!(target: "session", level = self.state.level.label(), "level promoted");
    } else {
      info!(target: "session", "already at max level, promotion skipped");
    }
  }

  /// Zero all fields for a new session or retry.
  pub fn reset(&mut self) -> ProgressionState {
    self.state = ProgressionState::new();
    self.state
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn level_stays_in_range_and_is_monotone() {
    let mut p = ProgressionPolicy::new();
    let mut last_rank = 0u8;
    // Long alternating run of outcomes can never push the level out of 0..=3
    // or decrease it.
    for i in 0..50 {
      let s = p.record_outcome(i % 3 != 0, i % 5 == 0);
      assert!(s.level.rank() <= 3);
      assert!(s.level.rank() >= last_rank);
      last_rank = s.level.rank();
    }
  }

  #[test]
  fn two_in_a_row_promotes_and_resets_streak() {
    let mut p = ProgressionPolicy::new();
    let s = p.record_outcome(true, false);
    assert_eq!(s.current_streak, 1);
    assert_eq!(s.level, BloomLevel::Remember);

    let s = p.record_outcome(true, false);
    assert_eq!(s.level, BloomLevel::Understand);
    assert_eq!(s.current_streak, 0);
  }

  #[test]
  fn promotion_is_noop_at_max_level() {
    let mut p = ProgressionPolicy::new();
    // Climb to Analyze: two correct per promotion, three promotions.
    for _ in 0..6 {
      p.record_outcome(true, false);
    }
    assert_eq!(p.state().level, BloomLevel::Analyze);

    p.record_outcome(true, false);
    let s = p.record_outcome(true, false);
    assert_eq!(s.level, BloomLevel::Analyze);
    // Promotion is a no-op at the top; the streak keeps running.
    assert_eq!(s.current_streak, 2);
  }

  #[test]
  fn hint_halves_points_with_integer_floor() {
    let mut with_hint = ProgressionPolicy::new();
    let mut without = ProgressionPolicy::new();
    let a = with_hint.record_outcome(true, true);
    let b = without.record_outcome(true, false);
    assert_eq!(a.score, b.score / 2);
    assert_eq!(a.score, 50);
  }

  #[test]
  fn hint_counter_fires_at_request_time() {
    let mut p = ProgressionPolicy::new();
    let s = p.record_hint_used();
    assert_eq!(s.total_hints_used, 1);
    // Outcome never touches the counter, even with hint_used set.
    let s = p.record_outcome(false, true);
    assert_eq!(s.total_hints_used, 1);
  }

  #[test]
  fn incorrect_resets_streak_not_level() {
    let mut p = ProgressionPolicy::new();
    p.record_outcome(true, false);
    p.record_outcome(true, false); // promoted to Understand
    let s = p.record_outcome(false, false);
    assert_eq!(s.level, BloomLevel::Understand);
    assert_eq!(s.current_streak, 0);
    assert_eq!(s.total_incorrect, 1);
  }

  #[test]
  fn scoring_scenario_end_to_end() {
    let mut p = ProgressionPolicy::new();

    let s = p.record_outcome(true, false);
    assert_eq!((s.score, s.current_streak, s.level), (100, 1, BloomLevel::Remember));

    let s = p.record_outcome(true, false);
    assert_eq!((s.score, s.current_streak, s.level), (200, 0, BloomLevel::Understand));

    let s = p.record_outcome(false, false);
    assert_eq!((s.score, s.current_streak, s.level), (200, 0, BloomLevel::Understand));

    // Level 1 base is 200; halved for the hint.
    let s = p.record_outcome(true, true);
    assert_eq!(s.score, 300);
  }

  #[test]
  fn reset_zeroes_everything() {
    let mut p = ProgressionPolicy::new();
    p.record_outcome(true, false);
    p.record_hint_used();
    let s = p.reset();
    assert_eq!(s, ProgressionState::new());
  }
}

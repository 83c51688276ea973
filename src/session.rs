//! Session orchestrator: the top-level state machine that sequences
//! "load context → confirm start → generate → display → await answer →
//! score → repeat → terminate → summarize".
//!
//! One orchestrator exists per collaborator connection and is mutated only
//! on that connection's task, so no locking is needed. At most one
//! generation request is outstanding at a time because commands are handled
//! sequentially. The deferred re-generation after scoring is expressed as a
//! `ScheduleNext` directive; the driver owns the actual timer and must honor
//! `CancelScheduled` when the session ends.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::config::Settings;
use crate::domain::{
  BloomLevel, ChallengeSpec, ChallengeType, ProgressionState, SessionSummary,
};
use crate::error::{DocumentError, StateError};
use crate::groq::GenerateChallenge;
use crate::lifecycle::DisplayedChallenge;
use crate::policy::ProgressionPolicy;
use crate::util::{trunc_for_log, truncate_chars};

/// Where the session currently is. `Scoring` is the post-answer pause that
/// loops back into `AwaitingGeneration` when the scheduled tick fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
  Idle,
  AwaitingDocument,
  AwaitingStartConfirmation,
  AwaitingGeneration,
  ChallengeActive,
  Scoring,
  Summarizing,
}

impl SessionPhase {
  pub fn name(self) -> &'static str {
    match self {
      SessionPhase::Idle => "idle",
      SessionPhase::AwaitingDocument => "awaiting_document",
      SessionPhase::AwaitingStartConfirmation => "awaiting_start_confirmation",
      SessionPhase::AwaitingGeneration => "awaiting_generation",
      SessionPhase::ChallengeActive => "challenge_active",
      SessionPhase::Scoring => "scoring",
      SessionPhase::Summarizing => "summarizing",
    }
  }
}

/// Collaborator inputs plus the internal timer tick.
#[derive(Debug)]
pub enum SessionCommand {
  RequestDocument,
  DocumentLoaded { text: String },
  StartConfirmed,
  SubmitAnswer { text: String },
  HintRequested,
  EndSession,
  Retry,
  NewSession,
  /// Fired by the driver when the post-scoring delay elapses.
  NextChallengeDue,
}

impl SessionCommand {
  fn name(&self) -> &'static str {
    match self {
      SessionCommand::RequestDocument => "request_document",
      SessionCommand::DocumentLoaded { .. } => "document_loaded",
      SessionCommand::StartConfirmed => "start_confirmed",
      SessionCommand::SubmitAnswer { .. } => "submit_answer",
      SessionCommand::HintRequested => "hint",
      SessionCommand::EndSession => "end_session",
      SessionCommand::Retry => "retry",
      SessionCommand::NewSession => "new_session",
      SessionCommand::NextChallengeDue => "next_challenge_due",
    }
  }
}

/// Engine-driven callbacks. The driver fans these out to the collaborator;
/// `ScheduleNext` and `CancelScheduled` are directives for the driver itself.
#[derive(Debug)]
pub enum EngineEvent {
  DocumentReady { text: String, truncated: bool },
  LevelChanged { label: &'static str },
  ChallengeReady {
    id: String,
    level: BloomLevel,
    kind: ChallengeType,
    prompt: String,
    options: Vec<String>,
  },
  Outcome { correct: bool, explanation: String, progress: ProgressionState },
  Hint { text: String },
  Summary(SessionSummary),
  Notice { text: String },
  Error { message: String },
  ScheduleNext { delay: Duration },
  CancelScheduled,
}

pub struct SessionOrchestrator<G: GenerateChallenge> {
  generator: G,
  settings: Settings,
  phase: SessionPhase,
  context: String,
  /// Prompt texts already asked this session, passed back into every
  /// generation request to suppress duplicates. Dedup is soft: enforced by
  /// instruction to the generator, never verified locally.
  history: Vec<String>,
  policy: ProgressionPolicy,
  active: Option<DisplayedChallenge>,
  /// Hint text retained until the next challenge is generated, so a hint
  /// can still be served (and counted) after the challenge is scored.
  current_hint: Option<String>,
  hint_used_this_challenge: bool,
}

impl<G: GenerateChallenge> SessionOrchestrator<G> {
  pub fn new(settings: Settings, generator: G) -> Self {
    Self {
      generator,
      settings,
      phase: SessionPhase::Idle,
      context: String::new(),
      history: Vec::new(),
      policy: ProgressionPolicy::new(),
      active: None,
      current_hint: None,
      hint_used_this_challenge: false,
    }
  }

  pub fn phase(&self) -> SessionPhase {
    self.phase
  }

  pub fn history(&self) -> &[String] {
    &self.history
  }

  pub fn progress(&self) -> ProgressionState {
    self.policy.state()
  }

  /// Handle one collaborator input (or timer tick) and return the resulting
  /// event batch. Local transitions are synchronous; the only suspension
  /// point is the generation call.
  #[instrument(level = "debug", skip(self, cmd), fields(cmd = cmd.name(), phase = self.phase.name()))]
  pub async fn handle(&mut self, cmd: SessionCommand) -> Vec<EngineEvent> {
    let mut out = Vec::new();
    match cmd {
      SessionCommand::RequestDocument => self.on_request_document(&mut out),
      SessionCommand::DocumentLoaded { text } => self.on_document_loaded(text, &mut out),
      SessionCommand::StartConfirmed => self.on_start_confirmed(&mut out).await,
      SessionCommand::SubmitAnswer { text } => self.on_submit_answer(&text, &mut out),
      SessionCommand::HintRequested => self.on_hint_requested(&mut out),
      SessionCommand::EndSession => self.on_end_session(&mut out),
      SessionCommand::Retry => self.on_retry(&mut out).await,
      SessionCommand::NewSession => self.on_new_session(&mut out),
      SessionCommand::NextChallengeDue => self.on_next_challenge_due(&mut out).await,
    }
    out
  }

  fn on_request_document(&mut self, out: &mut Vec<EngineEvent>) {
    if self.phase != SessionPhase::Idle {
      self.reject("request_document", out);
      return;
    }
    self.phase = SessionPhase::AwaitingDocument;
    out.push(EngineEvent::Notice { text: "Pick a document to study.".into() });
  }

  fn on_document_loaded(&mut self, text: String, out: &mut Vec<EngineEvent>) {
    // Documents may arrive without an explicit request (the collaborator
    // owns file picking), so Idle is accepted here as well.
    if !matches!(self.phase, SessionPhase::Idle | SessionPhase::AwaitingDocument) {
      self.reject("document_loaded", out);
      return;
    }
    self.phase = SessionPhase::AwaitingDocument;

    if text.trim().is_empty() {
      warn!(target: "session", "document load produced no usable text");
      out.push(EngineEvent::Error { message: DocumentError::EmptyText.to_string() });
      return;
    }

    let limit = self.settings.context_char_limit;
    let truncated = text.chars().count() > limit;
    self.context = truncate_chars(&text, limit);
    if truncated {
      warn!(target: "session", limit, "document text truncated to context cap");
    }
    info!(target: "session", chars = self.context.chars().count(), "context ready");

    self.phase = SessionPhase::AwaitingStartConfirmation;
    out.push(EngineEvent::DocumentReady { text: self.context.clone(), truncated });
    out.push(EngineEvent::Notice {
      text: "Document analyzed. Ready when you are — confirm to start.".into(),
    });
  }

  async fn on_start_confirmed(&mut self, out: &mut Vec<EngineEvent>) {
    // AwaitingGeneration is reachable here only after a failed generation
    // (commands are sequential), so confirming again is the manual
    // re-trigger.
    if !matches!(
      self.phase,
      SessionPhase::AwaitingStartConfirmation | SessionPhase::AwaitingGeneration
    ) {
      self.reject("start_confirmed", out);
      return;
    }
    out.push(EngineEvent::Notice { text: "Here we go!".into() });
    self.generate_next(out).await;
  }

  fn on_submit_answer(&mut self, text: &str, out: &mut Vec<EngineEvent>) {
    if self.phase != SessionPhase::ChallengeActive {
      self.reject("submit_answer", out);
      return;
    }
    let Some(active) = self.active.as_mut() else {
      self.reject("submit_answer", out);
      return;
    };

    match active.submit(text) {
      Ok(correct) => {
        let explanation = active.spec().explanation.clone();
        let progress = self.policy.record_outcome(correct, self.hint_used_this_challenge);
        self.phase = SessionPhase::Scoring;

        out.push(EngineEvent::Outcome { correct, explanation, progress });
        out.push(EngineEvent::Notice {
          text: if correct {
            "Correct! Well done!".into()
          } else {
            "Not quite — learn from it and keep going.".into()
          },
        });
        out.push(EngineEvent::ScheduleNext {
          delay: Duration::from_millis(self.settings.next_challenge_delay_ms),
        });
      }
      Err(e) => out.push(EngineEvent::Error { message: e.to_string() }),
    }
  }

  /// Serve the retained hint, if any. The usage counter fires here, at
  /// request time; the score penalty is applied later, at outcome time,
  /// through the per-challenge flag. A hint served after scoring still
  /// counts (inherited behavior, kept on purpose).
  fn on_hint_requested(&mut self, out: &mut Vec<EngineEvent>) {
    match self.current_hint.clone() {
      Some(text) if !text.is_empty() => {
        self.hint_used_this_challenge = true;
        self.policy.record_hint_used();
        out.push(EngineEvent::Hint { text });
      }
      _ => {
        out.push(EngineEvent::Notice { text: "Hmm, no hint available for this one.".into() });
      }
    }
  }

  fn on_end_session(&mut self, out: &mut Vec<EngineEvent>) {
    if matches!(self.phase, SessionPhase::Idle | SessionPhase::AwaitingDocument | SessionPhase::Summarizing) {
      self.reject("end_session", out);
      return;
    }

    out.push(EngineEvent::CancelScheduled);

    // An abandoned challenge counts against the learner: every generated
    // challenge must be accounted for.
    if let Some(active) = self.active.take() {
      if !active.answered() {
        info!(target: "session", "ending with an unanswered challenge; recording as incorrect");
        self.policy.record_outcome(false, self.hint_used_this_challenge);
      }
    }

    self.phase = SessionPhase::Summarizing;
    let summary = SessionSummary::from_state(&self.policy.state());
    info!(
      target: "session",
      level = summary.level.label(),
      correct = summary.correct,
      total = summary.total,
      hints = summary.hints_used,
      "session finished"
    );
    out.push(EngineEvent::Notice { text: "Session finished! Here are your results.".into() });
    out.push(EngineEvent::Summary(summary));
  }

  async fn on_retry(&mut self, out: &mut Vec<EngineEvent>) {
    if self.phase != SessionPhase::Summarizing {
      self.reject("retry", out);
      return;
    }
    // Same document, fresh progress and history.
    self.history.clear();
    self.policy.reset();
    self.active = None;
    self.current_hint = None;
    self.hint_used_this_challenge = false;

    out.push(EngineEvent::Notice { text: "Let's go again — same document.".into() });
    self.generate_next(out).await;
  }

  fn on_new_session(&mut self, out: &mut Vec<EngineEvent>) {
    if self.phase != SessionPhase::Summarizing {
      self.reject("new_session", out);
      return;
    }
    self.history.clear();
    self.policy.reset();
    self.active = None;
    self.current_hint = None;
    self.hint_used_this_challenge = false;
    self.context.clear();
    self.phase = SessionPhase::Idle;
    out.push(EngineEvent::Notice { text: "New session — load a document to begin.".into() });
  }

  async fn on_next_challenge_due(&mut self, out: &mut Vec<EngineEvent>) {
    // A late tick after the session moved on is an internal race, not a
    // collaborator defect; drop it quietly.
    if self.phase != SessionPhase::Scoring {
      debug!(target: "session", phase = self.phase.name(), "ignoring stale next-challenge tick");
      return;
    }
    self.generate_next(out).await;
  }

  /// Ask the policy what to generate, run the single generation attempt, and
  /// either display the parsed challenge or stall in `AwaitingGeneration`
  /// with an error notification (manual re-trigger only; no automatic retry).
  async fn generate_next(&mut self, out: &mut Vec<EngineEvent>) {
    self.phase = SessionPhase::AwaitingGeneration;
    self.hint_used_this_challenge = false;
    self.current_hint = None;
    self.active = None;

    let (level, kind) = self.policy.next_challenge();
    out.push(EngineEvent::LevelChanged { label: level.label() });
    out.push(EngineEvent::Notice {
      text: format!("Generating a {} challenge...", level.label()),
    });

    let prior = self.history.join(" | ");
    let raw = match self.generator.generate(&self.context, level, kind, &prior).await {
      Ok(raw) => raw,
      Err(e) => {
        out.push(EngineEvent::Error { message: e.to_string() });
        return;
      }
    };

    let spec = match ChallengeSpec::parse(&raw, kind) {
      Ok(spec) => spec,
      Err(e) => {
        warn!(target: "challenge", error = %e, raw = %trunc_for_log(&raw, 120), "generated payload rejected");
        out.push(EngineEvent::Error { message: e.to_string() });
        return;
      }
    };

    self.history.push(spec.prompt_text.clone());
    let hint = spec.hint_text.clone();

    match DisplayedChallenge::accept(spec) {
      Ok(displayed) => {
        let s = displayed.spec();
        out.push(EngineEvent::ChallengeReady {
          id: s.id.clone(),
          level,
          kind: s.challenge_type,
          prompt: s.prompt_text.clone(),
          options: displayed.shuffled_options().to_vec(),
        });
        out.push(EngineEvent::Notice { text: "Here is your challenge!".into() });
        self.current_hint = (!hint.is_empty()).then_some(hint);
        self.active = Some(displayed);
        self.phase = SessionPhase::ChallengeActive;
      }
      Err(e) => {
        // Parse already validated bounds, so this is belt-and-suspenders;
        // treated like any other failed generation.
        out.push(EngineEvent::Error { message: e.to_string() });
      }
    }
  }

  fn reject(&self, action: &'static str, out: &mut Vec<EngineEvent>) {
    let err = StateError::InvalidAction { action, phase: self.phase.name() };
    warn!(target: "session", %err, "rejected action");
    out.push(EngineEvent::Error { message: err.to_string() });
  }
}

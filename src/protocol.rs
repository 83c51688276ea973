//! Public protocol structs for the WebSocket and HTTP surfaces (serde ready).
//! Keep this small and stable so the engine and the presentation layer can
//! evolve independently.

use serde::{Deserialize, Serialize};

use crate::domain::{BloomLevel, ChallengeType, ProgressionState, SessionSummary};
use crate::session::{EngineEvent, SessionCommand};

/// Inputs the collaborator can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    RequestDocument,
    DocumentLoaded { text: String },
    StartConfirmed,
    SubmitAnswer { answer: String },
    Hint,
    EndSession,
    Retry,
    NewSession,
}

/// Engine-driven callbacks sent back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    DocumentReady {
        text: String,
        truncated: bool,
    },
    Level {
        label: String,
    },
    Challenge {
        challenge: ChallengeOut,
    },
    Outcome {
        correct: bool,
        explanation: String,
        progress: ProgressionState,
    },
    Hint {
        text: String,
    },
    Summary {
        summary: SessionSummary,
    },
    Notice {
        text: String,
    },
    Error {
        message: String,
    },
}

/// DTO for challenge delivery. Options arrive pre-shuffled; the correct
/// answer, explanation, and hint are withheld until the engine reveals them.
#[derive(Debug, Serialize)]
pub struct ChallengeOut {
    pub id: String,
    pub level: BloomLevel,
    pub kind: ChallengeType,
    pub prompt: String,
    pub options: Vec<String>,
}

/// Map a client message onto a session command. `Ping` is handled by the
/// transport and never reaches the session.
pub fn to_command(msg: ClientWsMessage) -> Option<SessionCommand> {
    match msg {
        ClientWsMessage::Ping => None,
        ClientWsMessage::RequestDocument => Some(SessionCommand::RequestDocument),
        ClientWsMessage::DocumentLoaded { text } => Some(SessionCommand::DocumentLoaded { text }),
        ClientWsMessage::StartConfirmed => Some(SessionCommand::StartConfirmed),
        ClientWsMessage::SubmitAnswer { answer } => {
            Some(SessionCommand::SubmitAnswer { text: answer })
        }
        ClientWsMessage::Hint => Some(SessionCommand::HintRequested),
        ClientWsMessage::EndSession => Some(SessionCommand::EndSession),
        ClientWsMessage::Retry => Some(SessionCommand::Retry),
        ClientWsMessage::NewSession => Some(SessionCommand::NewSession),
    }
}

/// Convert an engine event into its wire form. Returns `None` for the two
/// driver directives (`ScheduleNext`, `CancelScheduled`), which the WS loop
/// consumes itself.
pub fn to_server_message(ev: &EngineEvent) -> Option<ServerWsMessage> {
    match ev {
        EngineEvent::DocumentReady { text, truncated } => Some(ServerWsMessage::DocumentReady {
            text: text.clone(),
            truncated: *truncated,
        }),
        EngineEvent::LevelChanged { label } => {
            Some(ServerWsMessage::Level { label: (*label).to_string() })
        }
        EngineEvent::ChallengeReady { id, level, kind, prompt, options } => {
            Some(ServerWsMessage::Challenge {
                challenge: ChallengeOut {
                    id: id.clone(),
                    level: *level,
                    kind: *kind,
                    prompt: prompt.clone(),
                    options: options.clone(),
                },
            })
        }
        EngineEvent::Outcome { correct, explanation, progress } => {
            Some(ServerWsMessage::Outcome {
                correct: *correct,
                explanation: explanation.clone(),
                progress: *progress,
            })
        }
        EngineEvent::Hint { text } => Some(ServerWsMessage::Hint { text: text.clone() }),
        EngineEvent::Summary(summary) => {
            Some(ServerWsMessage::Summary { summary: summary.clone() })
        }
        EngineEvent::Notice { text } => Some(ServerWsMessage::Notice { text: text.clone() }),
        EngineEvent::Error { message } => {
            Some(ServerWsMessage::Error { message: message.clone() })
        }
        EngineEvent::ScheduleNext { .. } | EngineEvent::CancelScheduled => None,
    }
}

//
// HTTP DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub generation_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_deserialize_from_tagged_json() {
        let msg: ClientWsMessage =
            serde_json::from_str(r#"{"type":"submit_answer","answer":"granite"}"#).unwrap();
        assert!(matches!(msg, ClientWsMessage::SubmitAnswer { ref answer } if answer == "granite"));

        let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"end_session"}"#).unwrap();
        assert!(matches!(msg, ClientWsMessage::EndSession));
    }

    #[test]
    fn driver_directives_have_no_wire_form() {
        assert!(to_server_message(&EngineEvent::CancelScheduled).is_none());
        assert!(to_server_message(&EngineEvent::ScheduleNext {
            delay: std::time::Duration::from_secs(1)
        })
        .is_none());
    }
}

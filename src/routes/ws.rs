//! WebSocket upgrade + session loop. Each connection owns one
//! `SessionOrchestrator`; client messages become session commands, engine
//! events become JSON replies, and the post-scoring delay is a cancelable
//! timer task keyed to this connection.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::protocol::{to_command, to_server_message, ClientWsMessage, ServerWsMessage};
use crate::session::{EngineEvent, SessionCommand, SessionOrchestrator};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "bloomstep_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "bloomstep_backend", "WebSocket connected, session created");

  let mut session = SessionOrchestrator::new(state.config.settings.clone(), state.clone());

  // Channel for the deferred next-challenge tick. Capacity 1 is enough:
  // at most one generation is ever scheduled.
  let (tick_tx, mut tick_rx) = mpsc::channel::<()>(1);
  let mut pending_tick: Option<JoinHandle<()>> = None;

  'session: loop {
    let events = tokio::select! {
      incoming = socket.recv() => {
        match incoming {
          Some(Ok(Message::Text(txt))) => {
            match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(ClientWsMessage::Ping) => {
                if send(&mut socket, &ServerWsMessage::Pong).await.is_err() { break; }
                continue;
              }
              Ok(msg) => {
                debug!(target: "bloomstep_backend", "WS received: {:?}", &msg);
                match to_command(msg) {
                  Some(cmd) => session.handle(cmd).await,
                  None => continue,
                }
              }
              Err(e) => {
                let reply = ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) };
                if send(&mut socket, &reply).await.is_err() { break; }
                continue;
              }
            }
          }
          Some(Ok(Message::Ping(payload))) => {
            let _ = socket.send(Message::Pong(payload)).await;
            continue;
          }
          Some(Ok(Message::Close(_))) | None => break,
          Some(Ok(_)) => continue,
          Some(Err(e)) => {
            error!(target: "bloomstep_backend", error = %e, "WS receive error");
            break;
          }
        }
      }
      Some(()) = tick_rx.recv() => {
        session.handle(SessionCommand::NextChallengeDue).await
      }
    };

    for event in events {
      match &event {
        EngineEvent::ScheduleNext { delay } => {
          // Replace any pending timer; only one generation may be queued.
          if let Some(handle) = pending_tick.take() {
            handle.abort();
          }
          let delay = *delay;
          let tx = tick_tx.clone();
          pending_tick = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(()).await;
          }));
        }
        EngineEvent::CancelScheduled => {
          if let Some(handle) = pending_tick.take() {
            handle.abort();
          }
        }
        other => {
          if let Some(reply) = to_server_message(other) {
            if send(&mut socket, &reply).await.is_err() {
              break 'session;
            }
          }
        }
      }
    }
  }

  // The session is gone; a challenge must never be generated for it.
  if let Some(handle) = pending_tick.take() {
    handle.abort();
  }
  info!(
    target: "bloomstep_backend",
    phase = session.phase().name(),
    score = session.progress().score,
    questions_asked = session.history().len(),
    "WebSocket disconnected, session dropped"
  );
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) })
      .to_string()
  });
  socket.send(Message::Text(out)).await.map_err(|e| {
    error!(target: "bloomstep_backend", error = %e, "WS send error");
    e
  })
}

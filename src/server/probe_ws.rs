//! WebSocket probe sessions: one debounced scheduler per connection.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;
use tracing::{debug, warn};

use proxmap::models::{Coordinate, ProbeView};
use proxmap::scheduler::{ProbeHandle, ProbeScheduler};

use crate::AppState;

/// Pointer events sent by the map client
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Move { lat: f64, lng: f64 },
    Tap { lat: f64, lng: f64 },
    Leave,
}

impl ClientMessage {
    fn apply(self, handle: &ProbeHandle) {
        match self {
            ClientMessage::Move { lat, lng } | ClientMessage::Tap { lat, lng } => {
                handle.probe(Coordinate::new(lat, lng))
            }
            ClientMessage::Leave => handle.clear_probe(),
        }
    }
}

#[derive(Deserialize)]
pub struct ProbeParams {
    /// Touch surface: pointer-leave is ignored
    #[serde(default)]
    touch: bool,
}

pub async fn probe_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProbeParams>,
) -> Response {
    ws.on_upgrade(move |socket| run_probe(socket, state, params.touch))
}

async fn run_probe(mut socket: WebSocket, state: Arc<AppState>, touch: bool) {
    let handle = ProbeScheduler::spawn(state.probe.touch(touch), state.session.subscribe());
    let mut views = handle.subscribe();

    let initial = views.borrow_and_update().clone();
    if send_view(&mut socket, &initial).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            message = socket.recv() => match message {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientMessage>(text.as_str()) {
                        Ok(message) => message.apply(&handle),
                        Err(e) => debug!("Ignoring probe message: {}", e),
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Probe socket error: {}", e);
                    break;
                }
            },

            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                if send_view(&mut socket, &view).await.is_err() {
                    break;
                }
            }
        }
    }

    handle.dispose();
}

async fn send_view(socket: &mut WebSocket, view: &ProbeView) -> Result<(), ()> {
    let payload = match serde_json::to_string(view) {
        Ok(p) => p,
        Err(e) => {
            warn!("Failed to encode probe view: {}", e);
            return Ok(());
        }
    };
    socket.send(Message::Text(payload.into())).await.map_err(|e| {
        debug!("Probe socket closed: {}", e);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_messages() {
        let moved: ClientMessage =
            serde_json::from_str(r#"{"type":"move","lat":-22.9,"lng":-43.2}"#).unwrap();
        assert_eq!(moved, ClientMessage::Move { lat: -22.9, lng: -43.2 });

        let tap: ClientMessage =
            serde_json::from_str(r#"{"type":"tap","lat":-22.9,"lng":-43.2}"#).unwrap();
        assert_eq!(tap, ClientMessage::Tap { lat: -22.9, lng: -43.2 });

        let leave: ClientMessage = serde_json::from_str(r#"{"type":"leave"}"#).unwrap();
        assert_eq!(leave, ClientMessage::Leave);

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"zoom"}"#).is_err());
    }
}

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use uuid::Uuid;

use super::AppState;
use crate::logs::{BridgeOutcome, OutboundMessage, stream_container_logs};
use crate::runtime::ContainerRuntime;

pub async fn stream_logs(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| log_session(socket, state, id))
}

async fn log_session(socket: WebSocket, state: Arc<AppState>, id: String) {
    let (sender, receiver) = socket.split();
    run_session(state.runtime.as_ref(), &id, sender, receiver).await;
}

/// One viewer of one container's logs.
///
/// The session ends when the runtime stream ends, when a send fails, or
/// when the client closes its side of the socket. Returns `None` in the
/// last case, after the log stream has been dropped.
async fn run_session<Tx, Rx, E>(
    runtime: &dyn ContainerRuntime,
    id: &str,
    sender: Tx,
    receiver: Rx,
) -> Option<BridgeOutcome>
where
    Tx: Sink<Message> + Unpin,
    Tx::Error: Display,
    Rx: Stream<Item = Result<Message, E>> + Unpin,
{
    let session = Uuid::now_v7();
    log::info!("[{}] Log session opened for container {}", session, id);

    let mut sink = sender.with(|message: OutboundMessage| {
        future::ready(Ok::<_, Tx::Error>(Message::Text(message.to_json().into())))
    });

    let outcome = tokio::select! {
        outcome = stream_container_logs(runtime, id, &mut sink) => {
            match outcome {
                BridgeOutcome::OpenFailed => {
                    log::info!("[{}] Log stream for {} could not be opened", session, id);
                }
                BridgeOutcome::StreamEnded { delivered } => {
                    log::info!("[{}] Log stream ended after {} messages", session, delivered);
                }
                BridgeOutcome::ClientGone { delivered } => {
                    log::info!("[{}] Viewer disconnected after {} messages", session, delivered);
                }
                BridgeOutcome::ReadFailed { delivered } => {
                    log::warn!("[{}] Log stream failed after {} messages", session, delivered);
                }
            }
            Some(outcome)
        }
        _ = wait_for_close(receiver) => {
            log::info!("[{}] Viewer closed the connection", session);
            None
        }
    };

    let _ = sink.close().await;
    outcome
}

/// Resolves once the client sends a close frame, the socket errors, or the
/// receive half ends.
async fn wait_for_close<Rx, E>(mut receiver: Rx)
where
    Rx: Stream<Item = Result<Message, E>> + Unpin,
{
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

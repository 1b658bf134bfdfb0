use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::{
        room::ProfileSummary,
        ws::{AuthenticatedEvent, ClientMessage, ServerMessage},
    },
    services::room_service,
    state::{
        SharedState,
        connections::{ClientSession, UserProfile},
    },
};

/// Handle the full lifecycle of an authenticated player connection.
pub async fn handle_socket(state: SharedState, user: UserProfile, socket: WebSocket) {
    let (sender, mut receiver) = socket.split();
    let (session, outbound_rx) = state.connections().register(user);

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = spawn_writer(sender, outbound_rx);

    info!(connection = %session.id, player = %session.user.id, "player connected");
    session.send(ServerMessage::Authenticated(AuthenticatedEvent {
        profile: ProfileSummary::from(&session.user),
    }));

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                Ok(message) => {
                    debug!(
                        connection = %session.id,
                        event = message.name(),
                        "received client message"
                    );
                    room_service::handle_client_message(&state, &session, message).await;
                }
                Err(err) => {
                    warn!(connection = %session.id, error = %err, "failed to parse client message");
                    session.send(ServerMessage::error(format!("malformed message: {err}")));
                }
            },
            Ok(Message::Close(_)) => {
                info!(connection = %session.id, "player closed the connection");
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %session.id, error = %err, "websocket error");
                break;
            }
        }
    }

    room_service::handle_disconnect(&state, &session).await;
    info!(connection = %session.id, player = %session.user.id, "player disconnected");

    finalize(writer_task, session).await;
}

fn spawn_writer(
    mut sender: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::UnboundedReceiver<ServerMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let payload = match serde_json::to_string(&message) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(error = %err, "failed to serialize message `{message:?}`");
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    })
}

/// Drop the last sender so the writer drains and exits, then wait for it.
async fn finalize(writer_task: JoinHandle<()>, session: ClientSession) {
    drop(session);
    let _ = writer_task.await;
}

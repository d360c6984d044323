// Realtime synchronization channel.
//
// One WebSocket per browser client. The connection loop decodes inbound
// frames into `ClientEvent`s and dispatches them to the handler functions
// below; handlers mutate the session store and fan results out through
// the room registry. Failure frames go only to the origin connection.
// Events from a single connection are processed in arrival order; no
// ordering is guaranteed across connections (last write wins).

pub mod protocol;

use crate::error::{request_id_from_headers_or_generate, with_request_id_scope, ErrorCode};
use crate::rooms::{RoomJoin, RoomRegistry};
use crate::store::{Participant, SessionStore};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use codepair_common::language::Language;
use codepair_common::protocol::ws::{ClientEvent, ServerEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct WsState {
    store: SessionStore,
    rooms: RoomRegistry,
}

pub fn router(store: SessionStore, rooms: RoomRegistry) -> Router {
    Router::new().route("/ws", get(ws_upgrade)).with_state(WsState { store, rooms })
}

pub async fn ws_upgrade(
    State(state): State<WsState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let request_id = request_id_from_headers_or_generate(&headers);
    ws.on_upgrade(move |socket| async move {
        with_request_id_scope(request_id, handle_socket(state.store, state.rooms, socket)).await;
    })
}

async fn handle_socket(store: SessionStore, rooms: RoomRegistry, mut socket: WebSocket) {
    let connection_id = Uuid::new_v4();
    debug!(connection_id = %connection_id, "websocket connection established");

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerEvent>();

    loop {
        tokio::select! {
            maybe_outbound = outbound_rx.recv() => {
                let Some(outbound_event) = maybe_outbound else {
                    break;
                };
                if protocol::send_event(&mut socket, &outbound_event).await.is_err() {
                    break;
                }
            }
            maybe_message = socket.recv() => {
                let Some(message) = maybe_message else {
                    break;
                };

                match message {
                    Ok(Message::Text(raw_frame)) => {
                        let event = match protocol::decode_event(&raw_frame) {
                            Ok(event) => event,
                            Err(decode_error) => {
                                warn!(
                                    connection_id = %connection_id,
                                    error = %decode_error,
                                    "undecodable websocket frame"
                                );
                                let reply = ErrorCode::ValidationFailed
                                    .event("frame is not a recognized event");
                                if protocol::send_event(&mut socket, &reply).await.is_err() {
                                    break;
                                }
                                continue;
                            }
                        };

                        match event {
                            ClientEvent::Join { session_id, participant_id, display_name } => {
                                let result = handle_join(
                                    &store,
                                    &rooms,
                                    connection_id,
                                    &outbound_tx,
                                    session_id,
                                    participant_id,
                                    display_name,
                                )
                                .await;
                                let reply = match result {
                                    Ok(snapshot) => snapshot,
                                    Err(error_event) => error_event,
                                };
                                if protocol::send_event(&mut socket, &reply).await.is_err() {
                                    break;
                                }
                            }
                            ClientEvent::CodeChange { session_id, code, participant_id } => {
                                if let Err(error_event) = handle_code_change(
                                    &store,
                                    &rooms,
                                    connection_id,
                                    session_id,
                                    code,
                                    participant_id,
                                )
                                .await
                                {
                                    if protocol::send_event(&mut socket, &error_event)
                                        .await
                                        .is_err()
                                    {
                                        break;
                                    }
                                }
                            }
                            ClientEvent::LanguageChange { session_id, language, participant_id } => {
                                if let Err(error_event) = handle_language_change(
                                    &store,
                                    &rooms,
                                    session_id,
                                    language,
                                    participant_id,
                                )
                                .await
                                {
                                    if protocol::send_event(&mut socket, &error_event)
                                        .await
                                        .is_err()
                                    {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        }
    }

    handle_disconnect(&store, &rooms, connection_id).await;
    debug!(connection_id = %connection_id, "websocket connection closed");
}

/// Enter a session: register the connection in the room, record the
/// participant, and notify the rest of the room. The returned snapshot
/// goes to the joining connection alone; it never receives its own
/// presence broadcast.
pub(crate) async fn handle_join(
    store: &SessionStore,
    rooms: &RoomRegistry,
    connection_id: Uuid,
    outbound: &mpsc::UnboundedSender<ServerEvent>,
    session_id: Uuid,
    participant_id: String,
    display_name: String,
) -> Result<ServerEvent, ServerEvent> {
    if !store.exists(session_id).await {
        return Err(ErrorCode::SessionNotFound.event("session not found"));
    }

    match rooms.join(session_id, connection_id, outbound.clone()).await {
        RoomJoin::Member => {}
        RoomJoin::BoundElsewhere => {
            return Err(
                ErrorCode::ConnectionFailed.event("connection is already in another session")
            );
        }
    }

    let participant = Participant {
        id: participant_id.clone(),
        connection_id,
        display_name: display_name.clone(),
        joined_at: Utc::now(),
    };
    // The session can be reclaimed between the existence check and the
    // insert; unwind the room registration and report it as missing.
    if !store.add_participant(session_id, participant).await {
        rooms.leave(session_id, connection_id).await;
        return Err(ErrorCode::SessionNotFound.event("session not found"));
    }

    let Some(session) = store.get(session_id).await else {
        rooms.leave(session_id, connection_id).await;
        return Err(ErrorCode::SessionNotFound.event("session not found"));
    };
    let participants = store.list_participants(session_id).await;
    let count = participants.len();

    rooms
        .broadcast_excluding(
            session_id,
            &ServerEvent::PresenceJoined { participant_id: participant_id.clone(), display_name, count },
            connection_id,
        )
        .await;

    info!(
        session_id = %session_id,
        participant_id = %participant_id,
        count = count,
        "participant joined session"
    );

    Ok(ServerEvent::Joined {
        session_id,
        code: session.code,
        language: session.language,
        participants,
        count,
    })
}

/// Replace the shared buffer and fan the new value out to every room
/// member except the origin (the origin already holds this text; echoing
/// it back would fight the local editor).
pub(crate) async fn handle_code_change(
    store: &SessionStore,
    rooms: &RoomRegistry,
    connection_id: Uuid,
    session_id: Uuid,
    code: String,
    participant_id: String,
) -> Result<(), ServerEvent> {
    if !store.set_code(session_id, code.clone()).await {
        return Err(ErrorCode::SessionNotFound.event("session not found"));
    }

    rooms
        .broadcast_excluding(
            session_id,
            &ServerEvent::CodeUpdated { code, participant_id, timestamp: Utc::now() },
            connection_id,
        )
        .await;

    debug!(session_id = %session_id, "code updated");
    Ok(())
}

/// Switch the session language. The buffer is reset server-side, so the
/// update goes to every room member including the origin — all editors
/// reset in lockstep.
pub(crate) async fn handle_language_change(
    store: &SessionStore,
    rooms: &RoomRegistry,
    session_id: Uuid,
    language: Language,
    participant_id: String,
) -> Result<(), ServerEvent> {
    let Some(code) = store.set_language(session_id, language).await else {
        return Err(ErrorCode::SessionNotFound.event("session not found"));
    };

    rooms
        .broadcast(session_id, &ServerEvent::LanguageUpdated { language, code, participant_id })
        .await;

    info!(session_id = %session_id, language = %language, "language changed");
    Ok(())
}

/// Resolve a closed connection to its participant and remove it. The
/// transport supplies no session id, so this scans the store; the first
/// match wins. Connections that never joined a session disconnect
/// silently.
pub(crate) async fn handle_disconnect(
    store: &SessionStore,
    rooms: &RoomRegistry,
    connection_id: Uuid,
) -> Option<(Uuid, String)> {
    // Always drop the transport membership, even for a connection whose
    // participant mapping was superseded by a re-join.
    rooms.evict_connection(connection_id).await;

    let (session_id, participant_id) = store.find_by_connection(connection_id).await?;
    let removal = store.remove_participant(session_id, &participant_id).await?;

    rooms
        .broadcast(
            session_id,
            &ServerEvent::PresenceLeft {
                participant_id: participant_id.clone(),
                count: removal.remaining,
            },
        )
        .await;

    info!(
        session_id = %session_id,
        participant_id = %participant_id,
        remaining = removal.remaining,
        session_deleted = removal.session_deleted,
        "participant disconnected"
    );
    Some((session_id, participant_id))
}

// Room registry: the transport-side broadcast groups.
//
// Owns the session-id -> connection-id relation and the per-connection
// outbound channels. The protocol handlers only use the abstract
// join/leave/broadcast operations; sockets themselves never appear here.

use codepair_common::protocol::ws::ServerEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Outcome of [`RoomRegistry::join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomJoin {
    /// The connection is registered in this room (newly or already).
    Member,
    /// The connection is registered in a different room; a connection
    /// belongs to at most one room, so the join is refused.
    BoundElsewhere,
}

#[derive(Debug, Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<Uuid, HashMap<Uuid, mpsc::UnboundedSender<ServerEvent>>>>>,
}

impl RoomRegistry {
    /// Register a connection's outbound channel in a room. Re-joining
    /// the same room is idempotent (the sender is replaced).
    pub async fn join(
        &self,
        room: Uuid,
        connection_id: Uuid,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) -> RoomJoin {
        let mut guard = self.rooms.write().await;

        let already_elsewhere = guard
            .iter()
            .any(|(other, members)| *other != room && members.contains_key(&connection_id));
        if already_elsewhere {
            return RoomJoin::BoundElsewhere;
        }

        guard.entry(room).or_default().insert(connection_id, sender);
        RoomJoin::Member
    }

    /// Remove a connection from a room; the room itself is dropped once
    /// its last member leaves. Returns whether the member was present.
    pub async fn leave(&self, room: Uuid, connection_id: Uuid) -> bool {
        let mut guard = self.rooms.write().await;
        let Some(members) = guard.get_mut(&room) else {
            return false;
        };
        let removed = members.remove(&connection_id).is_some();
        if members.is_empty() {
            guard.remove(&room);
        }
        removed
    }

    /// Remove a connection from whichever room holds it, if any. Used on
    /// disconnect, where the transport supplies no room id — including
    /// for connections whose participant mapping was superseded.
    pub async fn evict_connection(&self, connection_id: Uuid) -> Option<Uuid> {
        let mut guard = self.rooms.write().await;
        let room = guard
            .iter()
            .find_map(|(room, members)| members.contains_key(&connection_id).then_some(*room))?;
        let members = guard.get_mut(&room)?;
        members.remove(&connection_id);
        if members.is_empty() {
            guard.remove(&room);
        }
        Some(room)
    }

    /// Fire-and-forget delivery to every member of a room. Send failures
    /// (receiver already gone) are ignored; the transport owns delivery.
    pub async fn broadcast(&self, room: Uuid, event: &ServerEvent) -> usize {
        self.broadcast_filtered(room, event, None).await
    }

    /// Same as [`broadcast`](Self::broadcast) but skipping the origin
    /// connection, so a sender never hears its own mutation echoed back.
    pub async fn broadcast_excluding(
        &self,
        room: Uuid,
        event: &ServerEvent,
        excluded_connection: Uuid,
    ) -> usize {
        self.broadcast_filtered(room, event, Some(excluded_connection)).await
    }

    async fn broadcast_filtered(
        &self,
        room: Uuid,
        event: &ServerEvent,
        excluded_connection: Option<Uuid>,
    ) -> usize {
        let recipients: Vec<mpsc::UnboundedSender<ServerEvent>> = {
            let guard = self.rooms.read().await;
            let Some(members) = guard.get(&room) else {
                return 0;
            };
            members
                .iter()
                .filter(|(connection_id, _)| Some(**connection_id) != excluded_connection)
                .map(|(_, sender)| sender.clone())
                .collect()
        };

        let mut sent = 0;
        for recipient in recipients {
            if recipient.send(event.clone()).is_ok() {
                sent += 1;
            }
        }
        sent
    }

    pub async fn member_count(&self, room: Uuid) -> usize {
        self.rooms.read().await.get(&room).map(HashMap::len).unwrap_or(0)
    }
}

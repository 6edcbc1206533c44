//! Outbound delivery: per-connection channels and per-room multicast.

use crate::protocol::ServerMessage;
use crate::session::{ConnectionId, Identity, RoomId};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Sender half feeding one connection's writer task.
pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug)]
struct Connection {
    outbound: Outbound,
    identity: Option<Identity>,
}

/// Tracks live connections and which rooms they listen to.
#[derive(Debug, Default)]
pub struct ConnectionHub {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<RoomId, BTreeSet<ConnectionId>>,
}

impl ConnectionHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection.
    #[instrument(skip(self, outbound))]
    pub fn connect(&mut self, id: ConnectionId, identity: Option<Identity>, outbound: Outbound) {
        info!(connection = %id, verified = identity.is_some(), "Connection registered");
        self.connections.insert(id, Connection { outbound, identity });
    }

    /// Forgets a connection and removes it from every room.
    #[instrument(skip(self))]
    pub fn disconnect(&mut self, id: ConnectionId) {
        self.connections.remove(&id);
        self.rooms.retain(|_, members| {
            members.remove(&id);
            !members.is_empty()
        });
        info!(connection = %id, "Connection removed");
    }

    /// Verified identity of a connection.
    pub fn identity(&self, id: ConnectionId) -> Option<&Identity> {
        self.connections.get(&id).and_then(|c| c.identity.as_ref())
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Adds a connection to a room's audience.
    #[instrument(skip(self))]
    pub fn join_room(&mut self, room_id: &str, id: ConnectionId) {
        self.rooms.entry(room_id.to_string()).or_default().insert(id);
    }

    /// Drops a room's audience.
    #[instrument(skip(self))]
    pub fn close_room(&mut self, room_id: &str) {
        self.rooms.remove(room_id);
    }

    /// Connections listening to a room.
    pub fn room_members(&self, room_id: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Sends a message to one connection.
    ///
    /// A closed channel means the connection is going away; the message is
    /// dropped and the disconnect event cleans up.
    pub fn send(&self, id: ConnectionId, message: ServerMessage) {
        match self.connections.get(&id) {
            Some(connection) => {
                if connection.outbound.send(message).is_err() {
                    warn!(connection = %id, "Outbound channel closed, dropping message");
                }
            }
            None => debug!(connection = %id, "Send to unknown connection ignored"),
        }
    }

    /// Sends a message to every connection in a room.
    #[instrument(skip(self, message))]
    pub fn broadcast(&self, room_id: &str, message: &ServerMessage) {
        let members = self.room_members(room_id);
        debug!(room_id, recipients = members.len(), "Broadcasting");
        for id in members {
            self.send(id, message.clone());
        }
    }

    /// Sends a message to every connection in a room except one.
    #[instrument(skip(self, message))]
    pub fn broadcast_except(&self, room_id: &str, except: ConnectionId, message: &ServerMessage) {
        for id in self.room_members(room_id) {
            if id != except {
                self.send(id, message.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_reaches_room_members_only() {
        let mut hub = ConnectionHub::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        hub.connect(ConnectionId(1), None, tx1);
        hub.connect(ConnectionId(2), None, tx2);
        hub.join_room("room", ConnectionId(1));

        hub.broadcast("room", &ServerMessage::MatchmakingCancelled);

        assert_eq!(rx1.try_recv().unwrap(), ServerMessage::MatchmakingCancelled);
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_disconnect_leaves_rooms() {
        let mut hub = ConnectionHub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        hub.connect(ConnectionId(1), None, tx);
        hub.join_room("room", ConnectionId(1));
        hub.disconnect(ConnectionId(1));
        assert!(hub.room_members("room").is_empty());
        assert_eq!(hub.connection_count(), 0);
    }

    #[test]
    fn test_send_to_closed_channel_is_ignored() {
        let mut hub = ConnectionHub::new();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.connect(ConnectionId(1), None, tx);
        drop(rx);
        hub.send(ConnectionId(1), ServerMessage::MatchmakingCancelled);
    }
}

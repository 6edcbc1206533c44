//! Private rooms: created by a host, joined by code, started with optional fill.

use crate::games::ludo::ActionError;
use crate::session::{ConnectionId, Identity, Participant, RoomId};
use rand::Rng;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 4;

/// Builds the room id for a private room code.
pub fn private_room_id(code: &str) -> RoomId {
    format!("ludo-private-{}", code.to_uppercase())
}

/// Generates a random room code.
pub fn generate_room_code(rng: &mut impl Rng) -> String {
    (0..CODE_LEN)
        .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
        .collect()
}

/// A member waiting in a private room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyMember {
    /// Member connection.
    pub connection: ConnectionId,
    /// Verified identity, if any.
    pub identity: Option<Identity>,
}

/// A private room that has not started yet.
#[derive(Debug, Clone)]
pub struct Lobby {
    /// Room id, shared with the session it becomes.
    pub room_id: RoomId,
    /// Shareable code.
    pub code: String,
    /// Creator; the only member allowed to start.
    pub host: ConnectionId,
    /// Seat count.
    pub max_players: usize,
    /// Members in join order, host first.
    pub members: Vec<LobbyMember>,
}

impl Lobby {
    /// Display names of the members, in join order.
    pub fn member_names(&self) -> Vec<String> {
        self.members
            .iter()
            .map(|m| match &m.identity {
                Some(identity) => identity.display_name().clone(),
                None => m.connection.to_string(),
            })
            .collect()
    }
}

/// Open private rooms keyed by room id.
#[derive(Debug, Default)]
pub struct LobbyRegistry {
    lobbies: HashMap<RoomId, Lobby>,
}

impl LobbyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a room with the host as first member.
    ///
    /// The caller picks a code not used by any lobby or live session.
    #[instrument(skip(self, identity))]
    pub fn create(
        &mut self,
        code: String,
        host: ConnectionId,
        identity: Option<Identity>,
        max_players: usize,
    ) -> &Lobby {
        let room_id = private_room_id(&code);
        info!(%room_id, %host, max_players, "Private room created");
        let lobby = Lobby {
            room_id: room_id.clone(),
            code,
            host,
            max_players,
            members: vec![LobbyMember {
                connection: host,
                identity,
            }],
        };
        self.lobbies.entry(room_id).insert_entry(lobby).into_mut()
    }

    /// Adds a member by room code.
    ///
    /// # Errors
    ///
    /// [`ActionError::RoomNotFound`] for unknown codes,
    /// [`ActionError::RoomFull`] when every seat is taken.
    #[instrument(skip(self, identity))]
    pub fn join(
        &mut self,
        code: &str,
        connection: ConnectionId,
        identity: Option<Identity>,
    ) -> Result<&Lobby, ActionError> {
        let room_id = private_room_id(code);
        let lobby = self
            .lobbies
            .get_mut(&room_id)
            .ok_or(ActionError::RoomNotFound)?;

        if lobby.members.iter().any(|m| m.connection == connection) {
            return Ok(lobby);
        }
        if lobby.members.len() >= lobby.max_players {
            warn!(%room_id, %connection, "Room is full");
            return Err(ActionError::RoomFull);
        }

        lobby.members.push(LobbyMember {
            connection,
            identity,
        });
        info!(%room_id, %connection, members = lobby.members.len(), "Joined private room");
        Ok(lobby)
    }

    /// Closes a room and returns its finalized participant list.
    ///
    /// Empty seats become automated participants when `fill` is set.
    ///
    /// # Errors
    ///
    /// [`ActionError::RoomNotFound`], [`ActionError::NotHost`], or
    /// [`ActionError::NotEnoughPlayers`] when fewer than `min_players` seats
    /// would be filled. The room stays open on error.
    #[instrument(skip(self))]
    pub fn start(
        &mut self,
        room_id: &str,
        requester: ConnectionId,
        fill: bool,
        min_players: usize,
    ) -> Result<(Lobby, Vec<Participant>), ActionError> {
        let lobby = self.lobbies.get(room_id).ok_or(ActionError::RoomNotFound)?;
        if lobby.host != requester {
            warn!(room_id, %requester, "Non-host tried to start");
            return Err(ActionError::NotHost);
        }

        let mut participants: Vec<Participant> = lobby
            .members
            .iter()
            .map(|m| Participant::human(m.connection, m.identity.clone()))
            .collect();
        if fill {
            let open = lobby.max_players.saturating_sub(participants.len());
            participants.extend((1..=open).map(Participant::automated));
        }
        if participants.len() < min_players {
            return Err(ActionError::NotEnoughPlayers);
        }

        let lobby = self
            .lobbies
            .remove(room_id)
            .ok_or(ActionError::RoomNotFound)?;
        info!(room_id, seats = participants.len(), "Private room started");
        Ok((lobby, participants))
    }

    /// Removes a connection from every room; rooms left empty are dropped.
    ///
    /// Returns the rooms that still have members, for notification.
    #[instrument(skip(self))]
    pub fn remove_member(&mut self, connection: ConnectionId) -> Vec<RoomId> {
        let mut touched = Vec::new();
        self.lobbies.retain(|room_id, lobby| {
            let before = lobby.members.len();
            lobby.members.retain(|m| m.connection != connection);
            if lobby.members.len() == before {
                return true;
            }
            if lobby.members.is_empty() {
                info!(%room_id, "Private room closed");
                return false;
            }
            if lobby.host == connection {
                lobby.host = lobby.members[0].connection;
                info!(%room_id, host = %lobby.host, "Host handed over");
            }
            touched.push(room_id.clone());
            true
        });
        touched
    }

    /// Gets an open room.
    pub fn get(&self, room_id: &str) -> Option<&Lobby> {
        self.lobbies.get(room_id)
    }

    /// True if an open room uses the code.
    pub fn code_in_use(&self, code: &str) -> bool {
        self.lobbies.contains_key(&private_room_id(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_room_code_shape() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let code = generate_room_code(&mut rng);
        assert_eq!(code.len(), 4);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_join_by_code_case_insensitive() {
        let mut lobbies = LobbyRegistry::new();
        lobbies.create("AB12".to_string(), ConnectionId(1), None, 4);
        let lobby = lobbies.join("ab12", ConnectionId(2), None).unwrap();
        assert_eq!(lobby.members.len(), 2);
    }

    #[test]
    fn test_join_errors() {
        let mut lobbies = LobbyRegistry::new();
        lobbies.create("AB12".to_string(), ConnectionId(1), None, 2);
        assert_eq!(
            lobbies.join("ZZZZ", ConnectionId(2), None).unwrap_err(),
            ActionError::RoomNotFound
        );
        lobbies.join("AB12", ConnectionId(2), None).unwrap();
        assert_eq!(
            lobbies.join("AB12", ConnectionId(3), None).unwrap_err(),
            ActionError::RoomFull
        );
    }

    #[test]
    fn test_start_requires_host() {
        let mut lobbies = LobbyRegistry::new();
        lobbies.create("AB12".to_string(), ConnectionId(1), None, 4);
        lobbies.join("AB12", ConnectionId(2), None).unwrap();
        let room_id = private_room_id("AB12");
        assert_eq!(
            lobbies.start(&room_id, ConnectionId(2), false, 2).unwrap_err(),
            ActionError::NotHost
        );
        assert!(lobbies.get(&room_id).is_some());
    }

    #[test]
    fn test_start_with_fill() {
        let mut lobbies = LobbyRegistry::new();
        lobbies.create("AB12".to_string(), ConnectionId(1), None, 4);
        let room_id = private_room_id("AB12");
        let (_, participants) = lobbies.start(&room_id, ConnectionId(1), true, 2).unwrap();
        assert_eq!(participants.len(), 4);
        assert!(!participants[0].is_automated());
        assert_eq!(participants[3], Participant::automated(3));
        assert!(lobbies.get(&room_id).is_none());
    }

    #[test]
    fn test_start_alone_without_fill_rejected() {
        let mut lobbies = LobbyRegistry::new();
        lobbies.create("AB12".to_string(), ConnectionId(1), None, 4);
        let room_id = private_room_id("AB12");
        assert_eq!(
            lobbies.start(&room_id, ConnectionId(1), false, 2).unwrap_err(),
            ActionError::NotEnoughPlayers
        );
    }

    #[test]
    fn test_host_leaving_hands_over() {
        let mut lobbies = LobbyRegistry::new();
        lobbies.create("AB12".to_string(), ConnectionId(1), None, 4);
        lobbies.join("AB12", ConnectionId(2), None).unwrap();
        let touched = lobbies.remove_member(ConnectionId(1));
        let room_id = private_room_id("AB12");
        assert_eq!(touched, vec![room_id.clone()]);
        assert_eq!(lobbies.get(&room_id).unwrap().host, ConnectionId(2));

        assert!(lobbies.remove_member(ConnectionId(2)).is_empty());
        assert!(lobbies.get(&room_id).is_none());
    }
}

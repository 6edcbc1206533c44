//! FIFO admission queue per game category.

use crate::games::GameCategory;
use crate::session::{ConnectionId, Identity};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, instrument};

/// A connection waiting for a match.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// Waiting connection.
    pub connection: ConnectionId,
    /// Verified identity carried into the session.
    pub identity: Option<Identity>,
    /// Group size the player asked for. Only entries with equal sizes are
    /// grouped together.
    pub group_size: usize,
}

/// Waiting players, one FIFO queue per category. No priorities, no expiry.
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    queues: HashMap<GameCategory, VecDeque<QueueEntry>>,
}

impl MatchmakingQueue {
    /// Creates empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to a category's queue. Idempotent per connection.
    ///
    /// Returns the queue length afterwards.
    #[instrument(skip(self, identity))]
    pub fn enqueue(
        &mut self,
        connection: ConnectionId,
        identity: Option<Identity>,
        category: GameCategory,
        group_size: usize,
    ) -> usize {
        let queue = self.queues.entry(category).or_default();
        if queue.iter().any(|entry| entry.connection == connection) {
            debug!(%connection, %category, "Already queued");
            return queue.len();
        }

        queue.push_back(QueueEntry {
            connection,
            identity,
            group_size,
        });
        info!(%connection, %category, queue_size = queue.len(), "Added to queue");
        queue.len()
    }

    /// Pops the oldest `group_size` entries that asked for `group_size`
    /// once enough of them are waiting. Entries wanting other sizes keep
    /// their place.
    #[instrument(skip(self))]
    pub fn dequeue_group(
        &mut self,
        category: GameCategory,
        group_size: usize,
    ) -> Option<Vec<QueueEntry>> {
        let queue = self.queues.get_mut(&category)?;
        let waiting = queue
            .iter()
            .filter(|entry| entry.group_size == group_size)
            .count();
        if group_size == 0 || waiting < group_size {
            debug!(%category, group_size, waiting, "Not enough players for a group");
            return None;
        }

        let mut group = Vec::with_capacity(group_size);
        let mut rest = VecDeque::with_capacity(queue.len() - group_size);
        for entry in queue.drain(..) {
            if group.len() < group_size && entry.group_size == group_size {
                group.push(entry);
            } else {
                rest.push_back(entry);
            }
        }
        *queue = rest;
        info!(%category, players = group.len(), "Matched group");
        Some(group)
    }

    /// Removes a connection from whichever queue holds it.
    ///
    /// Returns true if it was queued.
    #[instrument(skip(self))]
    pub fn remove(&mut self, connection: ConnectionId) -> bool {
        let mut removed = false;
        for (category, queue) in self.queues.iter_mut() {
            let before = queue.len();
            queue.retain(|entry| entry.connection != connection);
            if queue.len() != before {
                info!(%connection, %category, "Removed from queue");
                removed = true;
            }
        }
        removed
    }

    /// Number of connections waiting in a category.
    pub fn queue_size(&self, category: GameCategory) -> usize {
        self.queues.get(&category).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_is_idempotent() {
        let mut queue = MatchmakingQueue::new();
        assert_eq!(queue.enqueue(ConnectionId(1), None, GameCategory::Ludo, 2), 1);
        assert_eq!(queue.enqueue(ConnectionId(1), None, GameCategory::Ludo, 2), 1);
        assert_eq!(queue.queue_size(GameCategory::Ludo), 1);
    }

    #[test]
    fn test_dequeue_waits_for_full_group() {
        let mut queue = MatchmakingQueue::new();
        queue.enqueue(ConnectionId(1), None, GameCategory::Ludo, 3);
        queue.enqueue(ConnectionId(2), None, GameCategory::Ludo, 3);
        assert!(queue.dequeue_group(GameCategory::Ludo, 3).is_none());
        queue.enqueue(ConnectionId(3), None, GameCategory::Ludo, 3);

        let group = queue.dequeue_group(GameCategory::Ludo, 3).unwrap();
        let ids: Vec<_> = group.iter().map(|e| e.connection).collect();
        assert_eq!(ids, vec![ConnectionId(1), ConnectionId(2), ConnectionId(3)]);
        assert_eq!(queue.queue_size(GameCategory::Ludo), 0);
    }

    #[test]
    fn test_fifo_leaves_latecomers_waiting() {
        let mut queue = MatchmakingQueue::new();
        for id in 1..=3 {
            queue.enqueue(ConnectionId(id), None, GameCategory::Ludo, 2);
        }
        let group = queue.dequeue_group(GameCategory::Ludo, 2).unwrap();
        assert_eq!(group[0].connection, ConnectionId(1));
        assert_eq!(group[1].connection, ConnectionId(2));
        assert_eq!(queue.queue_size(GameCategory::Ludo), 1);
    }

    #[test]
    fn test_groups_only_matching_sizes() {
        let mut queue = MatchmakingQueue::new();
        queue.enqueue(ConnectionId(1), None, GameCategory::Ludo, 4);
        queue.enqueue(ConnectionId(2), None, GameCategory::Ludo, 2);
        assert!(queue.dequeue_group(GameCategory::Ludo, 2).is_none());

        queue.enqueue(ConnectionId(3), None, GameCategory::Ludo, 2);
        let group = queue.dequeue_group(GameCategory::Ludo, 2).unwrap();
        let ids: Vec<_> = group.iter().map(|e| e.connection).collect();
        assert_eq!(ids, vec![ConnectionId(2), ConnectionId(3)]);
        assert_eq!(queue.queue_size(GameCategory::Ludo), 1);
        assert!(queue.dequeue_group(GameCategory::Ludo, 4).is_none());
    }

    #[test]
    fn test_remove() {
        let mut queue = MatchmakingQueue::new();
        queue.enqueue(ConnectionId(1), None, GameCategory::Ludo, 2);
        assert!(queue.remove(ConnectionId(1)));
        assert!(!queue.remove(ConnectionId(1)));
        assert!(queue.dequeue_group(GameCategory::Ludo, 1).is_none());
    }
}

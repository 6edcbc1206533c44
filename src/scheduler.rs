//! Delayed steps fed back into the coordinator loop.

use crate::session::RoomId;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, instrument};

/// A delayed step bound to one session instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timer {
    /// Automated participant rolls.
    AutomatedRoll {
        /// Room of the session.
        room_id: RoomId,
        /// Session instance the step belongs to.
        instance: u64,
    },
    /// Automated participant moves or skips with its pending roll.
    AutomatedMove {
        /// Room of the session.
        room_id: RoomId,
        /// Session instance the step belongs to.
        instance: u64,
    },
    /// A human's unplayable roll is skipped.
    AutoSkip {
        /// Room of the session.
        room_id: RoomId,
        /// Session instance the step belongs to.
        instance: u64,
    },
    /// A finished session is removed.
    Cleanup {
        /// Room of the session.
        room_id: RoomId,
        /// Session instance the step belongs to.
        instance: u64,
    },
}

impl Timer {
    /// Room the timer belongs to.
    pub fn room_id(&self) -> &str {
        match self {
            Self::AutomatedRoll { room_id, .. }
            | Self::AutomatedMove { room_id, .. }
            | Self::AutoSkip { room_id, .. }
            | Self::Cleanup { room_id, .. } => room_id,
        }
    }

    /// Session instance the timer belongs to.
    pub fn instance(&self) -> u64 {
        match self {
            Self::AutomatedRoll { instance, .. }
            | Self::AutomatedMove { instance, .. }
            | Self::AutoSkip { instance, .. }
            | Self::Cleanup { instance, .. } => *instance,
        }
    }
}

/// Schedules delayed steps and cancels them per room.
pub trait Scheduler: Send {
    /// Fires `timer` after `delay`.
    fn schedule(&mut self, delay: Duration, timer: Timer);

    /// Drops every pending timer of a room.
    fn cancel_room(&mut self, room_id: &str);
}

/// Production scheduler: one sleeping task per timer, delivered over a channel.
#[derive(Debug)]
pub struct TokioScheduler {
    fired: mpsc::UnboundedSender<Timer>,
    pending: HashMap<RoomId, Vec<AbortHandle>>,
}

impl TokioScheduler {
    /// Creates a scheduler delivering fired timers to `fired`.
    pub fn new(fired: mpsc::UnboundedSender<Timer>) -> Self {
        Self {
            fired,
            pending: HashMap::new(),
        }
    }
}

impl Scheduler for TokioScheduler {
    #[instrument(skip(self))]
    fn schedule(&mut self, delay: Duration, timer: Timer) {
        let fired = self.fired.clone();
        let room_id = timer.room_id().to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if fired.send(timer).is_err() {
                debug!("Coordinator gone, timer dropped");
            }
        });

        let handles = self.pending.entry(room_id).or_default();
        handles.retain(|h| !h.is_finished());
        handles.push(handle.abort_handle());
    }

    #[instrument(skip(self))]
    fn cancel_room(&mut self, room_id: &str) {
        if let Some(handles) = self.pending.remove(room_id) {
            debug!(room_id, count = handles.len(), "Cancelling timers");
            for handle in handles {
                handle.abort();
            }
        }
    }
}

/// Test scheduler: records timers until the test fires them.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    pending: VecDeque<(Duration, Timer)>,
}

impl ManualScheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Timers not yet taken, in scheduling order.
    pub fn pending(&self) -> &VecDeque<(Duration, Timer)> {
        &self.pending
    }

    /// Removes and returns the oldest pending timer.
    pub fn pop(&mut self) -> Option<Timer> {
        self.pending.pop_front().map(|(_, timer)| timer)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration, timer: Timer) {
        self.pending.push_back((delay, timer));
    }

    fn cancel_room(&mut self, room_id: &str) {
        self.pending.retain(|(_, timer)| timer.room_id() != room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roll(room: &str) -> Timer {
        Timer::AutomatedRoll {
            room_id: room.to_string(),
            instance: 1,
        }
    }

    #[test]
    fn test_manual_cancel_room() {
        let mut scheduler = ManualScheduler::new();
        scheduler.schedule(Duration::from_millis(10), roll("a"));
        scheduler.schedule(Duration::from_millis(10), roll("b"));
        scheduler.cancel_room("a");
        assert_eq!(scheduler.pop(), Some(roll("b")));
        assert_eq!(scheduler.pop(), None);
    }

    #[test]
    fn test_manual_pops_in_scheduling_order() {
        let mut scheduler = ManualScheduler::new();
        scheduler.schedule(Duration::from_millis(30), roll("a"));
        scheduler.schedule(Duration::from_millis(10), roll("b"));
        scheduler.schedule(Duration::from_millis(20), roll("c"));
        assert_eq!(scheduler.pending().len(), 3);
        assert_eq!(scheduler.pop(), Some(roll("a")));
        assert_eq!(scheduler.pop(), Some(roll("b")));
        assert_eq!(scheduler.pop(), Some(roll("c")));
        assert!(scheduler.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = TokioScheduler::new(tx);
        scheduler.schedule(Duration::from_millis(100), roll("a"));
        assert_eq!(rx.recv().await, Some(roll("a")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_cancel_prevents_delivery() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = TokioScheduler::new(tx);
        scheduler.schedule(Duration::from_millis(100), roll("a"));
        scheduler.schedule(Duration::from_millis(200), roll("b"));
        scheduler.cancel_room("a");
        assert_eq!(rx.recv().await, Some(roll("b")));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }
}

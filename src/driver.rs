//! Automated turns and other delayed steps.
//!
//! Every step is a [`Timer`] bound to a session instance. A step re-checks
//! that its instance is still live and in the expected phase before acting;
//! otherwise it is dropped without a reply, since nobody is waiting on it.

use crate::coordinator::Coordinator;
use crate::games::ludo::Phase;
use crate::protocol::ServerMessage;
use crate::scheduler::{Scheduler, Timer};
use crate::session::Identity;
use tracing::{debug, error, info, instrument, warn};

impl<S: Scheduler> Coordinator<S> {
    /// Dispatches a fired timer.
    #[instrument(skip(self))]
    pub(crate) fn on_timer(&mut self, timer: Timer) {
        match timer {
            Timer::AutomatedRoll { room_id, instance } => self.on_automated_roll(&room_id, instance),
            Timer::AutomatedMove { room_id, instance } => self.on_automated_move(&room_id, instance),
            Timer::AutoSkip { room_id, instance } => self.on_auto_skip(&room_id, instance),
            Timer::Cleanup { room_id, instance } => self.on_cleanup(&room_id, instance),
        }
    }

    /// Hands the turn to the driver if the acting participant is automated.
    pub(crate) fn schedule_next_step(&mut self, room_id: &str) {
        let Some(session) = self.sessions.get(room_id) else {
            return;
        };
        if !session.awaits_automated() {
            return;
        }
        debug!(room_id, seat = session.game().turn(), "Automated turn queued");
        self.scheduler.schedule(
            self.config.automated_roll_delay(),
            Timer::AutomatedRoll {
                room_id: room_id.to_string(),
                instance: session.instance(),
            },
        );
    }

    fn on_automated_roll(&mut self, room_id: &str, instance: u64) {
        let Some(session) = self.sessions.get_instance_mut(room_id, instance) else {
            debug!(room_id, instance, "Session gone, roll dropped");
            return;
        };
        if !session.awaits_automated() || session.game().phase() != Phase::AwaitingRoll {
            debug!(room_id, "Not an automated roll any more, dropped");
            return;
        }

        let seat = session.game().turn();
        let roll = match session.game_mut().roll(seat, self.dice.as_mut()) {
            Ok(roll) => roll,
            Err(e) => {
                warn!(room_id, seat, error = %e, "Automated roll failed");
                return;
            }
        };
        self.hub
            .broadcast(room_id, &ServerMessage::roll_result(session, &roll));

        self.scheduler.schedule(
            self.config.automated_move_delay(),
            Timer::AutomatedMove {
                room_id: room_id.to_string(),
                instance,
            },
        );
    }

    fn on_automated_move(&mut self, room_id: &str, instance: u64) {
        let Some(session) = self.sessions.get_instance_mut(room_id, instance) else {
            debug!(room_id, instance, "Session gone, move dropped");
            return;
        };
        if !session.awaits_automated() || session.game().pending_dice().is_none() {
            debug!(room_id, "Not an automated move any more, dropped");
            return;
        }

        let seat = session.game().turn();
        let slots = session.game().valid_move_slots();
        if slots.is_empty() {
            match session.game_mut().skip() {
                Ok(skip) => {
                    self.hub
                        .broadcast(room_id, &ServerMessage::skip_result(session, &skip));
                }
                Err(e) => {
                    warn!(room_id, seat, error = %e, "Automated skip failed");
                    return;
                }
            }
            self.schedule_next_step(room_id);
            return;
        }

        let slot = slots[self.dice.pick(slots.len())];
        let turn = match session.game_mut().move_piece(seat, slot) {
            Ok(turn) => turn,
            Err(e) => {
                warn!(room_id, seat, slot, error = %e, "Automated move failed");
                return;
            }
        };
        debug!(room_id, seat, slot, bonus = turn.bonus, "Automated move");
        self.hub
            .broadcast(room_id, &ServerMessage::move_result(session, &turn));

        if turn.game_over() {
            self.finish_game(room_id);
        } else {
            self.schedule_next_step(room_id);
        }
    }

    fn on_auto_skip(&mut self, room_id: &str, instance: u64) {
        let Some(session) = self.sessions.get_instance_mut(room_id, instance) else {
            debug!(room_id, instance, "Session gone, skip dropped");
            return;
        };
        if session.acting_participant().is_automated()
            || session.game().pending_dice().is_none()
            || !session.game().valid_move_slots().is_empty()
        {
            debug!(room_id, "Nothing to skip, dropped");
            return;
        }

        match session.game_mut().skip() {
            Ok(skip) => self
                .hub
                .broadcast(room_id, &ServerMessage::skip_result(session, &skip)),
            Err(e) => {
                warn!(room_id, error = %e, "Auto-skip failed");
                return;
            }
        }
        self.schedule_next_step(room_id);
    }

    fn on_cleanup(&mut self, room_id: &str, instance: u64) {
        if self.sessions.get_instance_mut(room_id, instance).is_none() {
            debug!(room_id, instance, "Session already gone");
            return;
        }
        self.scheduler.cancel_room(room_id);
        self.sessions.remove(room_id);
        self.hub.close_room(room_id);
        info!(room_id, "Finished session cleaned up");
    }

    /// Records outcomes and schedules removal of a finished session.
    #[instrument(skip(self))]
    pub(crate) fn finish_game(&mut self, room_id: &str) {
        let Some(session) = self.sessions.get(room_id) else {
            return;
        };
        let Some(winner) = session.game().winner() else {
            return;
        };
        let instance = session.instance();
        let category = session.category();
        let results: Vec<(Identity, bool)> = session
            .participants()
            .iter()
            .enumerate()
            .filter_map(|(seat, p)| p.identity().map(|id| (id.clone(), seat == winner)))
            .collect();
        info!(room_id, winner = %session.color_of(winner), "Game over");

        if let Some(recorder) = &self.recorder {
            for (identity, won) in &results {
                if let Err(e) = recorder.record_outcome(identity, category, room_id, *won) {
                    error!(room_id, user_id = identity.user_id(), error = %e, "Failed to record outcome");
                }
            }
        }

        self.scheduler.schedule(
            self.config.cleanup_grace(),
            Timer::Cleanup {
                room_id: room_id.to_string(),
                instance,
            },
        );
    }
}

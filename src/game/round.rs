//! Round Lifecycle
//!
//! Orchestrates one round from the join window through game-over. Every wait
//! is a counted number of ticks inside a staged phase machine; the manager
//! never blocks and never retries. One deterministic pass per round:
//!
//! ```text
//! JoinWindow -> StartGrace -> (abort if nobody joined)
//!            -> Instruction -> Playing -> OverDelay -> WinnerDisplay -> Done
//! ```

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::GameConfig;
use crate::game::bus::{Signal, SignalBus};
use crate::game::character::{PlayerNumber, PlayerSlot};
use crate::{seconds_to_ticks, TICK_RATE};

/// Opaque handle for a connection raised by the host's join collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

/// Why a join request was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    /// The join window has closed for this round.
    #[error("the join window is closed")]
    WindowClosed,

    /// Every slot is already taken or promised.
    #[error("all {0} player slots are taken")]
    SlotsFull(u8),
}

/// Where the round currently is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundPhase {
    /// Accepting joins, counting down out loud.
    JoinWindow {
        /// Ticks until the window starts closing
        ticks_remaining: u32,
    },
    /// "Game Starting!" grace second; joins still land.
    StartGrace {
        /// Ticks until the round actually starts
        ticks_remaining: u32,
    },
    /// Instruction banner is up.
    Instruction {
        /// Ticks until the banner clears
        ticks_remaining: u32,
    },
    /// Active round; waiting for every occupied slot to place.
    Playing,
    /// Everyone placed; short beat before announcing the end.
    OverDelay {
        /// Ticks until `RoundOver` fires
        ticks_remaining: u32,
    },
    /// Winner on screen; waiting to return to the menu.
    WinnerDisplay {
        /// Ticks until the scene load request
        ticks_remaining: u32,
    },
    /// Round finished or aborted; the manager is inert.
    Done,
}

/// Join-window and round-lifecycle orchestration.
///
/// A join takes its slot out of the free pool immediately, but the
/// `PlayerJoined` announcement is deferred to the next tick so slot
/// numbering can never race the host's instantiation order (the
/// engine-order workaround from the original join flow, kept as an
/// explicit one-tick deferral).
pub struct RoundManager {
    max_players: u8,
    instruction_text: String,
    instruction_display_seconds: u32,
    menu_scene_index: usize,

    phase: RoundPhase,
    joining_enabled: bool,
    free_slots: Vec<PlayerSlot>,
    pending_joins: Vec<(ConnectionId, PlayerSlot, PlayerNumber)>,
    slot_numbers: BTreeMap<PlayerSlot, PlayerNumber>,
    placements: BTreeMap<PlayerSlot, u8>,
    round_over_fired: bool,
}

impl RoundManager {
    /// Create a manager for one round from a validated config.
    pub fn new(config: &GameConfig) -> Self {
        let free_slots = (1..=config.max_players).map(PlayerSlot).collect();
        Self {
            max_players: config.max_players,
            instruction_text: config.instruction_text.clone(),
            instruction_display_seconds: config.instruction_display_seconds,
            menu_scene_index: config.menu_scene_index,
            phase: RoundPhase::JoinWindow {
                ticks_remaining: seconds_to_ticks(config.join_wait_seconds),
            },
            joining_enabled: true,
            free_slots,
            pending_joins: Vec::new(),
            slot_numbers: BTreeMap::new(),
            placements: BTreeMap::new(),
            round_over_fired: false,
        }
    }

    /// Accept a join request from the host's connect collaborator.
    ///
    /// The next free slot is taken out of the pool right away, first-come,
    /// so the caller can instantiate the character; the `PlayerJoined`
    /// announcement with the display number fires on the next tick.
    pub fn handle_join(&mut self, connection: ConnectionId) -> Result<PlayerSlot, JoinError> {
        if !self.joining_enabled {
            return Err(JoinError::WindowClosed);
        }
        if self.free_slots.is_empty() {
            return Err(JoinError::SlotsFull(self.max_players));
        }
        let slot = self.free_slots.remove(0);
        // Slots are handed out in order, so the display number is the
        // occupied count: (max - free remaining).
        let player_number = PlayerNumber(self.max_players - self.free_slots.len() as u8);
        self.slot_numbers.insert(slot, player_number);
        self.pending_joins.push((connection, slot, player_number));
        Ok(slot)
    }

    /// Record a placement. Deliveries are idempotent per slot; a repeat is a
    /// no-op. Wired to `PlacementAchieved` by the world.
    pub fn handle_placement(&mut self, slot: PlayerSlot, ordinal: u8) {
        self.placements.entry(slot).or_insert(ordinal);
    }

    /// Advance one fixed simulation step, firing lifecycle signals as
    /// stages elapse.
    pub fn tick(&mut self, bus: &SignalBus) {
        self.assign_pending_joins(bus);

        match self.phase {
            RoundPhase::JoinWindow { ticks_remaining } => {
                let remaining = ticks_remaining.saturating_sub(1);
                if remaining == 0 {
                    bus.fire(Signal::CountdownTextChanged("Game Starting!".to_string()));
                    self.phase = RoundPhase::StartGrace {
                        ticks_remaining: seconds_to_ticks(1),
                    };
                } else {
                    if remaining % TICK_RATE == 0 {
                        bus.fire(Signal::CountdownTextChanged(format!(
                            "Time Till Start: {}",
                            remaining / TICK_RATE
                        )));
                    }
                    self.phase = RoundPhase::JoinWindow {
                        ticks_remaining: remaining,
                    };
                }
            }
            RoundPhase::StartGrace { ticks_remaining } => {
                let remaining = ticks_remaining.saturating_sub(1);
                if remaining == 0 {
                    self.close_join_window(bus);
                } else {
                    self.phase = RoundPhase::StartGrace {
                        ticks_remaining: remaining,
                    };
                }
            }
            RoundPhase::Instruction { ticks_remaining } => {
                let remaining = ticks_remaining.saturating_sub(1);
                if remaining == 0 {
                    bus.fire(Signal::InstructionTextChanged(String::new()));
                    self.phase = RoundPhase::Playing;
                } else {
                    self.phase = RoundPhase::Instruction {
                        ticks_remaining: remaining,
                    };
                }
            }
            RoundPhase::Playing => {
                // The round ends when every slot actually occupied has
                // placed, not when a fixed count is reached. Occupied is
                // max minus the slots still free, so late window sizes work.
                let occupied = self.occupied_slots();
                if occupied > 0 && self.placements.len() as u8 == occupied {
                    // The detection tick counts toward the one-second beat.
                    self.phase = RoundPhase::OverDelay {
                        ticks_remaining: seconds_to_ticks(1) - 1,
                    };
                }
            }
            RoundPhase::OverDelay { ticks_remaining } => {
                let remaining = ticks_remaining.saturating_sub(1);
                if remaining == 0 {
                    self.fire_round_over(bus);
                    self.phase = RoundPhase::WinnerDisplay {
                        ticks_remaining: seconds_to_ticks(5),
                    };
                } else {
                    self.phase = RoundPhase::OverDelay {
                        ticks_remaining: remaining,
                    };
                }
            }
            RoundPhase::WinnerDisplay { ticks_remaining } => {
                let remaining = ticks_remaining.saturating_sub(1);
                if remaining == 0 {
                    bus.fire(Signal::RequestSceneLoad(self.menu_scene_index));
                    self.phase = RoundPhase::Done;
                } else {
                    self.phase = RoundPhase::WinnerDisplay {
                        ticks_remaining: remaining,
                    };
                }
            }
            RoundPhase::Done => {}
        }
    }

    fn assign_pending_joins(&mut self, bus: &SignalBus) {
        for (connection, slot, player_number) in std::mem::take(&mut self.pending_joins) {
            info!(?connection, slot = slot.0, number = player_number.0, "player joined");
            bus.fire(Signal::PlayerJoined {
                slot,
                player_number,
            });
        }
    }

    fn close_join_window(&mut self, bus: &SignalBus) {
        self.joining_enabled = false;

        if self.occupied_slots() == 0 {
            // Nobody joined: straight back to the menu, the round never
            // starts.
            info!("no players joined, aborting round");
            bus.fire(Signal::RequestSceneLoad(self.menu_scene_index));
            self.phase = RoundPhase::Done;
            return;
        }

        bus.fire(Signal::RoundStarted);
        bus.fire(Signal::InstructionTextChanged(self.instruction_text.clone()));
        let ticks = seconds_to_ticks(self.instruction_display_seconds);
        if ticks == 0 {
            bus.fire(Signal::InstructionTextChanged(String::new()));
            self.phase = RoundPhase::Playing;
        } else {
            self.phase = RoundPhase::Instruction {
                ticks_remaining: ticks,
            };
        }
    }

    fn fire_round_over(&mut self, bus: &SignalBus) {
        if self.round_over_fired {
            return;
        }
        self.round_over_fired = true;
        bus.fire(Signal::RoundOver);

        let winner = self
            .placements
            .iter()
            .find(|(_, ordinal)| **ordinal == 1)
            .and_then(|(slot, _)| self.slot_numbers.get(slot).copied());
        match winner {
            Some(number) => {
                info!(%number, "winner declared");
                bus.fire(Signal::WinnerDeclared(number));
            }
            None => warn!("round over with no first-place slot recorded"),
        }
    }

    /// Slots handed out so far: configured max minus the free pool.
    pub fn occupied_slots(&self) -> u8 {
        self.max_players - self.free_slots.len() as u8
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Is the join window still open.
    pub fn joining_enabled(&self) -> bool {
        self.joining_enabled
    }

    /// Slot to placement ordinal, as recorded so far.
    pub fn placements(&self) -> &BTreeMap<PlayerSlot, u8> {
        &self.placements
    }

    /// Display number assigned to a slot, if it joined.
    pub fn player_number(&self, slot: PlayerSlot) -> Option<PlayerNumber> {
        self.slot_numbers.get(&slot).copied()
    }
}

//! World Wiring and Tick Driver
//!
//! Owns the bus, the round manager, the goal zone, and every spawned
//! character, and wires their subscriptions together so the host only deals
//! with three calls: `join` when a connection arrives, `tick` once per
//! simulation step with that step's inputs and collision reports, and the
//! snapshot accessors for whatever it renders.
//!
//! All signal dispatch happens while the fired-into component is the only
//! thing borrowed: the manager fires its lifecycle signals from inside its
//! own tick (characters handle them, the manager holds no subscription to
//! them), and goal contacts are reported only after every character borrow
//! from the movement pass has been released.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{ConfigError, GameConfig};
use crate::core::fixed::{Fixed, FIXED_ONE};
use crate::core::vec2::FixedVec2;
use crate::game::bus::{Signal, SignalBus, SignalKind, Subscriptions};
use crate::game::character::{
    AnimationState, Character, CharacterConfig, CharacterKind, CharacterPhase, ClearanceProbe,
    PlayerNumber, PlayerSlot, Tint,
};
use crate::game::goal::GoalZone;
use crate::game::input::InputFrame;
use crate::game::round::{ConnectionId, JoinError, RoundManager, RoundPhase};

/// A hazard collision reported by the host physics collaborator.
#[derive(Clone, Copy, Debug)]
pub struct HazardContact {
    /// Slot of the character that was hit
    pub slot: PlayerSlot,
    /// Surface normal at the contact point, pointing away from the hazard
    pub normal: FixedVec2,
}

/// Everything the host sampled for one simulation step.
#[derive(Clone, Debug, Default)]
pub struct TickInputs {
    /// Per-slot logical input, absent slots idle this tick
    pub frames: BTreeMap<PlayerSlot, InputFrame>,
    /// Hazard collisions detected since the last step
    pub hazard_contacts: Vec<HazardContact>,
}

impl TickInputs {
    /// An empty step: no input, no contacts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one slot's input frame for this step.
    pub fn set_frame(&mut self, slot: PlayerSlot, frame: InputFrame) {
        self.frames.insert(slot, frame);
    }

    /// Add a hazard contact report for this step.
    pub fn add_hazard_contact(&mut self, slot: PlayerSlot, normal: FixedVec2) {
        self.hazard_contacts.push(HazardContact { slot, normal });
    }
}

/// Render-facing snapshot of one character, taken at a tick boundary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharacterView {
    /// Slot identity
    pub slot: PlayerSlot,
    /// Display number, if the join announcement has landed
    pub player_number: Option<PlayerNumber>,
    /// Sprite tint, if assigned
    pub tint: Option<Tint>,
    /// Current position
    pub position: FixedVec2,
    /// Animation to play
    pub animation: AnimationState,
    /// Horizontal sprite flip
    pub facing_left: bool,
    /// Coarse lifecycle phase
    pub phase: CharacterPhase,
    /// Final placement, once finished
    pub placement: Option<u8>,
    /// Current collision footprint height
    pub collider_height: Fixed,
}

struct CharacterHandle {
    character: Rc<RefCell<Character>>,
    _subs: Subscriptions,
}

/// One round's components, wired and ready to tick.
pub struct World {
    bus: Rc<SignalBus>,
    char_config: CharacterConfig,
    kind: CharacterKind,
    finish_line_x: Fixed,
    manager: Rc<RefCell<RoundManager>>,
    characters: BTreeMap<PlayerSlot, CharacterHandle>,
    goal: GoalZone,
    probe: Box<dyn ClearanceProbe>,
    _manager_subs: Subscriptions,
}

impl World {
    /// Build a world for one round. Validates the config up front; nothing
    /// after this call can fail on a config value.
    pub fn new(
        config: GameConfig,
        kind: CharacterKind,
        probe: Box<dyn ClearanceProbe>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let bus = Rc::new(SignalBus::new());
        let manager = Rc::new(RefCell::new(RoundManager::new(&config)));

        // The manager's one inbound signal: placements come from the goal
        // zone, which only fires after the manager's own tick has returned.
        let mut manager_subs = Subscriptions::new(Rc::clone(&bus));
        let manager2 = Rc::clone(&manager);
        manager_subs.add(SignalKind::PlacementAchieved, move |signal| {
            if let Signal::PlacementAchieved { slot, ordinal } = signal {
                manager2.borrow_mut().handle_placement(*slot, *ordinal);
            }
        });

        Ok(Self {
            bus,
            char_config: CharacterConfig::from_game(&config),
            kind,
            finish_line_x: config.finish_line_x_fixed(),
            manager,
            characters: BTreeMap::new(),
            goal: GoalZone::new(),
            probe,
            _manager_subs: manager_subs,
        })
    }

    /// The bus, for host collaborators (UI, scene loader) to subscribe to.
    pub fn bus(&self) -> Rc<SignalBus> {
        Rc::clone(&self.bus)
    }

    /// Handle a new connection: reserve a slot and spawn its character.
    ///
    /// The character exists and is subscribed before the deferred
    /// `PlayerJoined` announcement fires on the next tick, so it always
    /// observes its own join.
    pub fn join(&mut self, connection: ConnectionId) -> Result<PlayerSlot, JoinError> {
        let slot = self.manager.borrow_mut().handle_join(connection)?;

        let character = Rc::new(RefCell::new(Character::new(
            slot,
            self.kind,
            self.char_config,
            self.spawn_position(slot),
        )));

        let mut subs = Subscriptions::new(Rc::clone(&self.bus));
        for kind in [
            SignalKind::PlayerJoined,
            SignalKind::RoundStarted,
            SignalKind::PlacementAchieved,
        ] {
            let character2 = Rc::clone(&character);
            subs.add(kind, move |signal| {
                character2.borrow_mut().handle_signal(signal);
            });
        }

        info!(slot = slot.0, kind = ?self.kind, "character spawned");
        self.characters.insert(
            slot,
            CharacterHandle {
                character,
                _subs: subs,
            },
        );
        Ok(slot)
    }

    // Spawn lanes stack downward from slot 1, one unit apart.
    fn spawn_position(&self, slot: PlayerSlot) -> FixedVec2 {
        FixedVec2::new(0, -FIXED_ONE * (slot.0 as Fixed - 1))
    }

    /// Advance one fixed simulation step.
    ///
    /// Order within a step: lifecycle first (joins land, phase signals
    /// fire), then this step's input, then hazard responses, then movement,
    /// then goal-line checks on the post-movement positions.
    pub fn tick(&mut self, inputs: &TickInputs) {
        self.manager.borrow_mut().tick(&self.bus);

        for (slot, frame) in &inputs.frames {
            if let Some(handle) = self.characters.get(slot) {
                handle.character.borrow_mut().apply_input(frame);
            }
        }

        for contact in &inputs.hazard_contacts {
            if let Some(handle) = self.characters.get(&contact.slot) {
                handle
                    .character
                    .borrow_mut()
                    .on_hazard_contact(contact.normal);
            }
        }

        for handle in self.characters.values() {
            handle.character.borrow_mut().step(self.probe.as_ref());
        }

        // Collect crossings first so every character borrow is released
        // before `PlacementAchieved` dispatches back into them.
        let mut finishers = Vec::new();
        for handle in self.characters.values() {
            let character = handle.character.borrow();
            if character.placement().is_none() && character.position().x >= self.finish_line_x {
                finishers.push(character.slot());
            }
        }
        for slot in finishers {
            self.goal.report_contact(&self.bus, slot);
        }
    }

    /// Report a goal-trigger contact from the host physics collaborator.
    ///
    /// The built-in finish-line check covers the plain side-scroller; a host
    /// with a shaped goal region reports contacts itself through this.
    pub fn report_goal_contact(&mut self, slot: PlayerSlot) -> Option<u8> {
        self.goal.report_contact(&self.bus, slot)
    }

    /// Current round lifecycle phase.
    pub fn phase(&self) -> RoundPhase {
        self.manager.borrow().phase()
    }

    /// Is the join window still open.
    pub fn joining_enabled(&self) -> bool {
        self.manager.borrow().joining_enabled()
    }

    /// Slot to placement ordinal, as recorded so far.
    pub fn placements(&self) -> BTreeMap<PlayerSlot, u8> {
        self.manager.borrow().placements().clone()
    }

    /// Snapshot one character for the render collaborator.
    pub fn view(&self, slot: PlayerSlot) -> Option<CharacterView> {
        self.characters.get(&slot).map(|handle| {
            let character = handle.character.borrow();
            CharacterView {
                slot: character.slot(),
                player_number: character.player_number(),
                tint: character.tint(),
                position: character.position(),
                animation: character.animation_state(),
                facing_left: character.facing_left(),
                phase: character.phase(),
                placement: character.placement(),
                collider_height: character.collider_height(),
            }
        })
    }

    /// Snapshot every spawned character, in slot order.
    pub fn views(&self) -> Vec<CharacterView> {
        self.characters
            .keys()
            .filter_map(|slot| self.view(*slot))
            .collect()
    }

    /// Despawn every character and clear the finish line, releasing their
    /// subscriptions. Called on the scene transition out of the round.
    pub fn teardown_round(&mut self) {
        info!(characters = self.characters.len(), "round torn down");
        self.characters.clear();
        self.goal = GoalZone::new();
    }
}

//! Character State Machine
//!
//! Per-player state for the two minigame controllers. Both variants share
//! one contract — join, run, take knockback, finish — and differ by a tagged
//! variant selected at construction rather than inheritance: the `Runner`
//! moves on the player's axis input, the `Croucher` auto-runs forward and
//! trades the axis for a crouch button.
//!
//! States: Joining, Idle, Running, Crouching (croucher only), Hit, Finished.
//! Finished is terminal: placement is recorded once, speed is forced to zero
//! and input stays disabled for the rest of the round. The animation state is
//! never stored; it is re-derived from the current flags on demand with
//! priority Hit > Crouch > Running > Idle.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GameConfig;
use crate::core::fixed::{fixed_mul, Fixed, TICK_DURATION};
use crate::core::vec2::FixedVec2;
use crate::game::bus::Signal;
use crate::game::input::InputFrame;

/// A player's ordinal identity for one round (1..=max_players).
///
/// Assigned once at join time, never reassigned, never reused in a round.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PlayerSlot(pub u8);

/// Display number shown on screen and used to pick a tint.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PlayerNumber(pub u8);

impl std::fmt::Display for PlayerNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Player {}", self.0)
    }
}

/// Sprite tint assigned per player number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tint {
    /// Player 1
    Red,
    /// Player 2
    Blue,
    /// Player 3
    Yellow,
    /// Player 4
    Green,
}

/// Fixed palette indexed by player number - 1.
pub const TINT_PALETTE: [Tint; 4] = [Tint::Red, Tint::Blue, Tint::Yellow, Tint::Green];

impl Tint {
    /// Bounds-checked palette lookup. Player numbers outside the palette
    /// yield None and the join must be rejected.
    pub fn for_player(number: PlayerNumber) -> Option<Tint> {
        let index = (number.0 as usize).checked_sub(1)?;
        TINT_PALETTE.get(index).copied()
    }
}

/// Which controller variant a character uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharacterKind {
    /// Axis-driven runner (the plain minigame).
    Runner,
    /// Auto-running croucher (the tunnel minigame).
    Croucher,
}

/// Animation state handed to the render collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimationState {
    /// Standing still
    Idle,
    /// Moving
    Running,
    /// Ducked (croucher only)
    Crouch,
    /// In knockback recovery
    Hit,
}

/// Coarse lifecycle state, derived from the current flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharacterPhase {
    /// Spawned but not yet assigned a player number
    Joining,
    /// Joined, not moving
    Idle,
    /// Moving under input or auto-run
    Running,
    /// Ducked, or released but still blocked overhead
    Crouching,
    /// In knockback recovery
    Hit,
    /// Placed at the goal; terminal
    Finished,
}

/// Upward obstruction check supplied by the host physics collaborator.
///
/// Gates whether a released croucher may stand back up mid-tunnel.
pub trait ClearanceProbe {
    /// True if nothing obstructs the span `length` above `position`.
    fn clear_above(&self, position: FixedVec2, length: Fixed) -> bool;
}

/// A probe that always reports clear. Suits the runner minigame, which has
/// no tunnels.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenSky;

impl ClearanceProbe for OpenSky {
    fn clear_above(&self, _position: FixedVec2, _length: Fixed) -> bool {
        true
    }
}

/// In-flight knockback interpolation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct Knockback {
    /// Position at the moment of impact
    origin: FixedVec2,
    /// `origin - direction * distance`, reached exactly at the last tick
    target: FixedVec2,
    /// Ticks elapsed since impact
    elapsed_ticks: u32,
}

/// Per-character tuning, converted from [`GameConfig`] once at spawn.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CharacterConfig {
    /// Base movement speed (units/second, fixed-point)
    pub base_speed: Fixed,
    /// Knockback recovery length in ticks
    pub knockback_duration_ticks: u32,
    /// Knockback push distance
    pub knockback_distance: Fixed,
    /// Speed multiplier while crouched
    pub crouch_speed_modifier: Fixed,
    /// Footprint height multiplier while crouched
    pub crouch_height_modifier: Fixed,
    /// Upward probe length for stand-up clearance
    pub crouch_probe_length: Fixed,
    /// Standing footprint height
    pub collider_height: Fixed,
}

impl CharacterConfig {
    /// Convert the relevant options out of a validated [`GameConfig`].
    pub fn from_game(config: &GameConfig) -> Self {
        Self {
            base_speed: config.move_speed_fixed(),
            knockback_duration_ticks: config.knockback_duration_ticks().max(1),
            knockback_distance: config.knockback_distance_fixed(),
            crouch_speed_modifier: config.crouch_speed_modifier_fixed(),
            crouch_height_modifier: config.crouch_height_modifier_fixed(),
            crouch_probe_length: config.crouch_clearance_probe_length_fixed(),
            collider_height: config.collider_height_fixed(),
        }
    }
}

/// One player's character: movement, knockback, placement, animation flags.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Character {
    slot: PlayerSlot,
    kind: CharacterKind,
    config: CharacterConfig,

    player_number: Option<PlayerNumber>,
    tint: Option<Tint>,
    input_enabled: bool,

    position: FixedVec2,
    move_vector: FixedVec2,
    speed: Fixed,
    facing_left: bool,

    knockback: Option<Knockback>,
    placement: Option<u8>,

    // Croucher-only flags. `crouch_cancelled` means "standing height fully
    // restored"; it goes false on crouch and true again only once the
    // clearance probe allows standing.
    crouching: bool,
    crouch_cancelled: bool,
    collider_height: Fixed,
}

impl Character {
    /// Spawn a character at a position. It starts in Joining with input
    /// disabled until the round starts.
    pub fn new(
        slot: PlayerSlot,
        kind: CharacterKind,
        config: CharacterConfig,
        spawn_position: FixedVec2,
    ) -> Self {
        Self {
            slot,
            kind,
            player_number: None,
            tint: None,
            input_enabled: false,
            position: spawn_position,
            move_vector: FixedVec2::ZERO,
            speed: config.base_speed,
            facing_left: false,
            knockback: None,
            placement: None,
            crouching: false,
            crouch_cancelled: true,
            collider_height: config.collider_height,
            config,
        }
    }

    /// React to a bus signal. Signals addressed to another slot are ignored
    /// by identity, not treated as errors.
    pub fn handle_signal(&mut self, signal: &Signal) {
        match signal {
            Signal::PlayerJoined {
                slot,
                player_number,
            } if *slot == self.slot => {
                match Tint::for_player(*player_number) {
                    Some(tint) => {
                        self.player_number = Some(*player_number);
                        self.tint = Some(tint);
                        self.input_enabled = false;
                        debug!(slot = self.slot.0, number = player_number.0, ?tint, "player joined");
                    }
                    None => {
                        warn!(
                            number = player_number.0,
                            palette = TINT_PALETTE.len(),
                            "join rejected: player number outside tint palette"
                        );
                    }
                }
            }
            Signal::RoundStarted => {
                if self.placement.is_none() {
                    self.input_enabled = true;
                    if self.kind == CharacterKind::Croucher {
                        // Auto-run: the croucher always moves right; the axis
                        // never touches its move vector.
                        self.move_vector = FixedVec2::RIGHT;
                    }
                }
            }
            Signal::PlacementAchieved { slot, ordinal } if *slot == self.slot => {
                self.finish(*ordinal);
            }
            _ => {}
        }
    }

    /// Consume this tick's input frame. The world only routes frames to
    /// characters with input enabled; knockback additionally eats the frame.
    pub fn apply_input(&mut self, frame: &InputFrame) {
        if !self.input_enabled || self.is_hit() {
            return;
        }
        match self.kind {
            CharacterKind::Runner => {
                self.move_vector = frame.move_vector();
            }
            CharacterKind::Croucher => {
                if frame.action_pressed() {
                    self.crouch();
                }
                if frame.action_released() {
                    self.crouching = false;
                }
            }
        }
    }

    /// Advance one fixed simulation step.
    pub fn step(&mut self, probe: &dyn ClearanceProbe) {
        if self.step_knockback() {
            return;
        }

        // A released croucher stands back up only once the probe clears.
        if self.kind == CharacterKind::Croucher && !self.crouching && !self.crouch_cancelled {
            if probe.clear_above(self.position, self.config.crouch_probe_length) {
                self.collider_height = self.config.collider_height;
                self.speed = self.config.base_speed;
                self.crouch_cancelled = true;
            }
        }

        if self.input_enabled {
            let delta = self.move_vector.scale(self.speed).scale(TICK_DURATION);
            self.position = self.position + delta;
        }

        // Sprite flip is sticky: only a nonzero X changes it.
        if self.move_vector.x > 0 {
            self.facing_left = false;
        } else if self.move_vector.x < 0 {
            self.facing_left = true;
        }
    }

    /// Hazard collision response: begin the knockback interpolation away
    /// from the contact normal. Ignored while already recovering or after
    /// finishing.
    pub fn on_hazard_contact(&mut self, contact_normal: FixedVec2) {
        if self.is_hit() || self.placement.is_some() {
            return;
        }
        let direction = contact_normal.negate();
        let target = self.position - direction.scale(self.config.knockback_distance);
        self.knockback = Some(Knockback {
            origin: self.position,
            target,
            elapsed_ticks: 0,
        });
        debug!(slot = self.slot.0, ?direction, "knockback started");
    }

    fn step_knockback(&mut self) -> bool {
        let Some(mut kb) = self.knockback else {
            return false;
        };
        kb.elapsed_ticks += 1;
        let duration = self.config.knockback_duration_ticks;
        if kb.elapsed_ticks >= duration {
            // Land exactly on the endpoint, then leave Hit.
            self.position = kb.target;
            self.knockback = None;
        } else {
            let t = crate::core::fixed::fixed_div(
                (kb.elapsed_ticks as Fixed) << crate::core::fixed::FIXED_SCALE,
                (duration as Fixed) << crate::core::fixed::FIXED_SCALE,
            );
            self.position = kb.origin.lerp(kb.target, t);
            self.knockback = Some(kb);
        }
        true
    }

    fn crouch(&mut self) {
        debug_assert_eq!(self.kind, CharacterKind::Croucher);
        self.speed = fixed_mul(self.config.base_speed, self.config.crouch_speed_modifier);
        self.collider_height =
            fixed_mul(self.config.collider_height, self.config.crouch_height_modifier);
        self.crouching = true;
        self.crouch_cancelled = false;
    }

    fn finish(&mut self, ordinal: u8) {
        if self.placement.is_some() {
            return;
        }
        self.placement = Some(ordinal);
        self.speed = 0;
        self.input_enabled = false;
        if self.kind == CharacterKind::Croucher {
            // The croucher's move vector is forced, so zero it explicitly or
            // the finished animation would keep running in place.
            self.move_vector = FixedVec2::ZERO;
        }
        debug!(slot = self.slot.0, ordinal, "finished");
    }

    /// Animation state re-derived from current flags, priority
    /// Hit > Crouch > Running > Idle.
    pub fn animation_state(&self) -> AnimationState {
        if self.is_hit() {
            return AnimationState::Hit;
        }
        if self.kind == CharacterKind::Croucher && (self.crouching || !self.crouch_cancelled) {
            return AnimationState::Crouch;
        }
        if !self.move_vector.is_zero() {
            AnimationState::Running
        } else {
            AnimationState::Idle
        }
    }

    /// Coarse lifecycle phase, derived from current flags.
    pub fn phase(&self) -> CharacterPhase {
        if self.placement.is_some() {
            return CharacterPhase::Finished;
        }
        if self.player_number.is_none() {
            return CharacterPhase::Joining;
        }
        if self.is_hit() {
            return CharacterPhase::Hit;
        }
        if self.kind == CharacterKind::Croucher && (self.crouching || !self.crouch_cancelled) {
            return CharacterPhase::Crouching;
        }
        if self.input_enabled && !self.move_vector.is_zero() {
            CharacterPhase::Running
        } else {
            CharacterPhase::Idle
        }
    }

    /// Slot identity.
    pub fn slot(&self) -> PlayerSlot {
        self.slot
    }

    /// Controller variant.
    pub fn kind(&self) -> CharacterKind {
        self.kind
    }

    /// Current position.
    pub fn position(&self) -> FixedVec2 {
        self.position
    }

    /// Current speed.
    pub fn speed(&self) -> Fixed {
        self.speed
    }

    /// Assigned display number, if joined.
    pub fn player_number(&self) -> Option<PlayerNumber> {
        self.player_number
    }

    /// Assigned tint, if joined.
    pub fn tint(&self) -> Option<Tint> {
        self.tint
    }

    /// Final placement ordinal, if finished.
    pub fn placement(&self) -> Option<u8> {
        self.placement
    }

    /// Currently in knockback recovery.
    pub fn is_hit(&self) -> bool {
        self.knockback.is_some()
    }

    /// May this character currently move.
    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    /// Horizontal sprite flip for the render collaborator.
    pub fn facing_left(&self) -> bool {
        self.facing_left
    }

    /// Current collision footprint height.
    pub fn collider_height(&self) -> Fixed {
        self.collider_height
    }

    /// Croucher duck flag.
    pub fn is_crouching(&self) -> bool {
        self.crouching
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::{to_fixed, FIXED_ONE};

    fn test_config() -> CharacterConfig {
        CharacterConfig::from_game(&GameConfig::default())
    }

    fn joined_runner() -> Character {
        let mut character = Character::new(
            PlayerSlot(1),
            CharacterKind::Runner,
            test_config(),
            FixedVec2::ZERO,
        );
        character.handle_signal(&Signal::PlayerJoined {
            slot: PlayerSlot(1),
            player_number: PlayerNumber(1),
        });
        character.handle_signal(&Signal::RoundStarted);
        character
    }

    fn joined_croucher() -> Character {
        let mut character = Character::new(
            PlayerSlot(1),
            CharacterKind::Croucher,
            test_config(),
            FixedVec2::ZERO,
        );
        character.handle_signal(&Signal::PlayerJoined {
            slot: PlayerSlot(1),
            player_number: PlayerNumber(1),
        });
        character.handle_signal(&Signal::RoundStarted);
        character
    }

    /// Probe that reports whatever the test sets.
    struct FixedProbe(bool);
    impl ClearanceProbe for FixedProbe {
        fn clear_above(&self, _: FixedVec2, _: Fixed) -> bool {
            self.0
        }
    }

    #[test]
    fn test_starts_joining_then_idle_on_join() {
        let mut character = Character::new(
            PlayerSlot(2),
            CharacterKind::Runner,
            test_config(),
            FixedVec2::ZERO,
        );
        assert_eq!(character.phase(), CharacterPhase::Joining);

        character.handle_signal(&Signal::PlayerJoined {
            slot: PlayerSlot(2),
            player_number: PlayerNumber(2),
        });
        assert_eq!(character.phase(), CharacterPhase::Idle);
        assert_eq!(character.tint(), Some(Tint::Blue));
        assert!(!character.input_enabled());
    }

    #[test]
    fn test_join_for_other_slot_ignored() {
        let mut character = Character::new(
            PlayerSlot(1),
            CharacterKind::Runner,
            test_config(),
            FixedVec2::ZERO,
        );
        character.handle_signal(&Signal::PlayerJoined {
            slot: PlayerSlot(2),
            player_number: PlayerNumber(2),
        });
        assert_eq!(character.phase(), CharacterPhase::Joining);
        assert_eq!(character.player_number(), None);
    }

    #[test]
    fn test_join_outside_palette_rejected() {
        let mut character = Character::new(
            PlayerSlot(1),
            CharacterKind::Runner,
            test_config(),
            FixedVec2::ZERO,
        );
        // A 4-entry palette cannot seat player 5.
        character.handle_signal(&Signal::PlayerJoined {
            slot: PlayerSlot(1),
            player_number: PlayerNumber(5),
        });
        assert_eq!(character.player_number(), None);
        assert_eq!(character.tint(), None);

        // Player 0 is equally out of range.
        character.handle_signal(&Signal::PlayerJoined {
            slot: PlayerSlot(1),
            player_number: PlayerNumber(0),
        });
        assert_eq!(character.player_number(), None);
    }

    #[test]
    fn test_runner_moves_on_axis_input() {
        let mut character = joined_runner();
        character.apply_input(&InputFrame::with_movement(127, 0));
        character.step(&OpenSky);

        assert!(character.position().x > 0);
        assert_eq!(character.animation_state(), AnimationState::Running);
        assert!(!character.facing_left());

        character.apply_input(&InputFrame::with_movement(-127, 0));
        character.step(&OpenSky);
        assert!(character.facing_left());

        // Axis back to zero: running stops, flip stays sticky.
        character.apply_input(&InputFrame::new());
        character.step(&OpenSky);
        assert_eq!(character.animation_state(), AnimationState::Idle);
        assert!(character.facing_left());
    }

    #[test]
    fn test_no_movement_before_round_start() {
        let mut character = Character::new(
            PlayerSlot(1),
            CharacterKind::Runner,
            test_config(),
            FixedVec2::ZERO,
        );
        character.handle_signal(&Signal::PlayerJoined {
            slot: PlayerSlot(1),
            player_number: PlayerNumber(1),
        });
        character.apply_input(&InputFrame::with_movement(127, 0));
        character.step(&OpenSky);
        assert_eq!(character.position(), FixedVec2::ZERO);
    }

    #[test]
    fn test_croucher_auto_runs_and_ignores_axis() {
        let mut character = joined_croucher();
        // Push the stick hard left; the croucher still runs right.
        character.apply_input(&InputFrame::with_movement(-127, 0));
        character.step(&OpenSky);
        assert!(character.position().x > 0);
        assert_eq!(character.animation_state(), AnimationState::Running);
    }

    #[test]
    fn test_crouch_scales_speed_and_footprint() {
        let mut character = joined_croucher();
        let standing_height = character.collider_height();
        let standing_speed = character.speed();

        let mut press = InputFrame::new();
        press.set_action_pressed();
        character.apply_input(&press);

        assert!(character.is_crouching());
        assert_eq!(character.animation_state(), AnimationState::Crouch);
        assert_eq!(character.speed(), fixed_mul(standing_speed, to_fixed(0.5)));
        assert_eq!(
            character.collider_height(),
            fixed_mul(standing_height, to_fixed(0.7))
        );
    }

    #[test]
    fn test_release_blocked_overhead_stays_crouched() {
        let mut character = joined_croucher();
        let mut press = InputFrame::new();
        press.set_action_pressed();
        character.apply_input(&press);
        let crouched_height = character.collider_height();

        let mut release = InputFrame::new();
        release.set_action_released();
        character.apply_input(&release);

        // Still inside the tunnel: footprint must not pop back out.
        character.step(&FixedProbe(false));
        assert_eq!(character.collider_height(), crouched_height);
        assert_eq!(character.animation_state(), AnimationState::Crouch);

        // Clearance found on a later tick restores everything.
        character.step(&FixedProbe(true));
        assert_eq!(character.collider_height(), test_config().collider_height);
        assert_eq!(character.speed(), test_config().base_speed);
        assert_eq!(character.animation_state(), AnimationState::Running);
    }

    #[test]
    fn test_knockback_interpolates_and_exits_at_duration() {
        let mut character = joined_runner();
        let impact = character.position();
        let duration = test_config().knockback_duration_ticks;

        // Contact normal pointing left pushes the character left.
        character.on_hazard_contact(FixedVec2::new(-FIXED_ONE, 0));
        assert!(character.is_hit());
        assert_eq!(character.animation_state(), AnimationState::Hit);
        assert_eq!(character.position(), impact);

        // Input is ignored for the whole recovery.
        for _ in 0..duration - 1 {
            character.apply_input(&InputFrame::with_movement(127, 0));
            character.step(&OpenSky);
            assert!(character.is_hit());
        }
        character.step(&OpenSky);

        // Exactly at the duration: endpoint reached, Hit exited.
        assert!(!character.is_hit());
        let expected = impact - FixedVec2::new(FIXED_ONE, 0).scale(test_config().knockback_distance);
        assert_eq!(character.position(), expected);
    }

    #[test]
    fn test_second_contact_during_recovery_ignored() {
        let mut character = joined_runner();
        character.on_hazard_contact(FixedVec2::new(-FIXED_ONE, 0));
        let first = character.knockback;
        character.on_hazard_contact(FixedVec2::new(0, FIXED_ONE));
        assert_eq!(
            character.knockback.map(|k| k.target),
            first.map(|k| k.target)
        );
    }

    #[test]
    fn test_placement_is_terminal() {
        let mut character = joined_croucher();
        character.handle_signal(&Signal::PlacementAchieved {
            slot: PlayerSlot(1),
            ordinal: 2,
        });

        assert_eq!(character.phase(), CharacterPhase::Finished);
        assert_eq!(character.placement(), Some(2));
        assert_eq!(character.speed(), 0);
        assert!(!character.input_enabled());
        assert_eq!(character.animation_state(), AnimationState::Idle);

        // A second delivery must not overwrite the ordinal.
        character.handle_signal(&Signal::PlacementAchieved {
            slot: PlayerSlot(1),
            ordinal: 3,
        });
        assert_eq!(character.placement(), Some(2));

        // Restart signals cannot revive a finished character.
        character.handle_signal(&Signal::RoundStarted);
        assert!(!character.input_enabled());

        let before = character.position();
        character.step(&OpenSky);
        assert_eq!(character.position(), before);
    }

    #[test]
    fn test_placement_for_other_slot_ignored() {
        let mut character = joined_runner();
        character.handle_signal(&Signal::PlacementAchieved {
            slot: PlayerSlot(3),
            ordinal: 1,
        });
        assert_eq!(character.placement(), None);
        assert!(character.input_enabled());
    }

    #[test]
    fn test_hazard_contact_after_finish_ignored() {
        let mut character = joined_runner();
        character.handle_signal(&Signal::PlacementAchieved {
            slot: PlayerSlot(1),
            ordinal: 1,
        });
        character.on_hazard_contact(FixedVec2::new(-FIXED_ONE, 0));
        assert!(!character.is_hit());
    }

    #[test]
    fn test_tint_palette_lookup() {
        assert_eq!(Tint::for_player(PlayerNumber(1)), Some(Tint::Red));
        assert_eq!(Tint::for_player(PlayerNumber(4)), Some(Tint::Green));
        assert_eq!(Tint::for_player(PlayerNumber(0)), None);
        assert_eq!(Tint::for_player(PlayerNumber(5)), None);
    }
}

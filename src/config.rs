//! Round Configuration
//!
//! The named numeric options for one round, loadable from JSON. Values are
//! plain numbers at the file boundary and are converted to fixed-point once,
//! at load time, never inside the tick loop.
//!
//! Defaults mirror the shipped minigame tuning: a 5 second join window, a
//! 2 second instruction banner, four player slots, and the croucher's
//! half-speed / 0.7-height crouch.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::fixed::{to_fixed, Fixed};
use crate::game::character::TINT_PALETTE;

/// Configuration failures surface at initialization, never mid-round.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file was not valid JSON for [`GameConfig`].
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    /// `max_players` must fit the tint palette.
    #[error("max_players must be between 1 and {max}, got {got}")]
    BadMaxPlayers {
        /// Configured value
        got: u8,
        /// Palette size
        max: u8,
    },

    /// A duration or length option was zero or negative.
    #[error("{0} must be positive")]
    NonPositive(&'static str),
}

fn default_join_wait_seconds() -> u32 {
    5
}
fn default_instruction_display_seconds() -> u32 {
    2
}
fn default_max_players() -> u8 {
    4
}
fn default_move_speed() -> f64 {
    2.0
}
fn default_knockback_duration() -> f64 {
    0.5
}
fn default_knockback_distance() -> f64 {
    0.25
}
fn default_crouch_speed_modifier() -> f64 {
    0.5
}
fn default_crouch_height_modifier() -> f64 {
    0.7
}
fn default_crouch_clearance_probe_length() -> f64 {
    0.25
}
fn default_collider_height() -> f64 {
    1.0
}
fn default_finish_line_x() -> f64 {
    20.0
}
fn default_instruction_text() -> String {
    "Press A To Crouch".to_string()
}
fn default_menu_scene_index() -> usize {
    0
}

/// All tunable options for one round.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameConfig {
    /// Length of the join window in seconds.
    #[serde(default = "default_join_wait_seconds")]
    pub join_wait_seconds: u32,

    /// How long the instruction banner stays up after the round starts.
    #[serde(default = "default_instruction_display_seconds")]
    pub instruction_display_seconds: u32,

    /// Number of player slots (1..=palette size).
    #[serde(default = "default_max_players")]
    pub max_players: u8,

    /// Base movement speed, units per second.
    #[serde(default = "default_move_speed")]
    pub move_speed: f64,

    /// Knockback recovery time in seconds of simulation time.
    #[serde(default = "default_knockback_duration")]
    pub knockback_duration: f64,

    /// How far a hazard pushes a character back, in units.
    #[serde(default = "default_knockback_distance")]
    pub knockback_distance: f64,

    /// Speed multiplier while crouched.
    #[serde(default = "default_crouch_speed_modifier")]
    pub crouch_speed_modifier: f64,

    /// Collision footprint height multiplier while crouched.
    #[serde(default = "default_crouch_height_modifier")]
    pub crouch_height_modifier: f64,

    /// Length of the upward probe gating stand-up, in units.
    #[serde(default = "default_crouch_clearance_probe_length")]
    pub crouch_clearance_probe_length: f64,

    /// Full (standing) collision footprint height, in units.
    #[serde(default = "default_collider_height")]
    pub collider_height: f64,

    /// X coordinate of the goal line.
    #[serde(default = "default_finish_line_x")]
    pub finish_line_x: f64,

    /// Instruction banner shown when the round starts.
    #[serde(default = "default_instruction_text")]
    pub instruction_text: String,

    /// Scene index of the main menu, for the end-of-round transition.
    #[serde(default = "default_menu_scene_index")]
    pub menu_scene_index: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        // Round-trips through serde so the defaults live in one place.
        serde_json::from_str("{}").expect("empty config must deserialize")
    }
}

impl GameConfig {
    /// Load and validate a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on options that would corrupt the round.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let palette = TINT_PALETTE.len() as u8;
        if self.max_players == 0 || self.max_players > palette {
            return Err(ConfigError::BadMaxPlayers {
                got: self.max_players,
                max: palette,
            });
        }
        for (value, name) in [
            (self.move_speed, "move_speed"),
            (self.knockback_duration, "knockback_duration"),
            (self.knockback_distance, "knockback_distance"),
            (self.crouch_speed_modifier, "crouch_speed_modifier"),
            (self.crouch_height_modifier, "crouch_height_modifier"),
            (
                self.crouch_clearance_probe_length,
                "crouch_clearance_probe_length",
            ),
            (self.collider_height, "collider_height"),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::NonPositive(name));
            }
        }
        Ok(())
    }

    /// Base movement speed in fixed-point.
    pub fn move_speed_fixed(&self) -> Fixed {
        to_fixed(self.move_speed)
    }

    /// Knockback duration in simulation ticks.
    pub fn knockback_duration_ticks(&self) -> u32 {
        (self.knockback_duration * crate::TICK_RATE as f64).round() as u32
    }

    /// Knockback distance in fixed-point.
    pub fn knockback_distance_fixed(&self) -> Fixed {
        to_fixed(self.knockback_distance)
    }

    /// Crouch speed multiplier in fixed-point.
    pub fn crouch_speed_modifier_fixed(&self) -> Fixed {
        to_fixed(self.crouch_speed_modifier)
    }

    /// Crouch height multiplier in fixed-point.
    pub fn crouch_height_modifier_fixed(&self) -> Fixed {
        to_fixed(self.crouch_height_modifier)
    }

    /// Clearance probe length in fixed-point.
    pub fn crouch_clearance_probe_length_fixed(&self) -> Fixed {
        to_fixed(self.crouch_clearance_probe_length)
    }

    /// Standing collider height in fixed-point.
    pub fn collider_height_fixed(&self) -> Fixed {
        to_fixed(self.collider_height)
    }

    /// Goal line X in fixed-point.
    pub fn finish_line_x_fixed(&self) -> Fixed {
        to_fixed(self.finish_line_x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_shipped_tuning() {
        let config = GameConfig::default();
        assert_eq!(config.join_wait_seconds, 5);
        assert_eq!(config.instruction_display_seconds, 2);
        assert_eq!(config.max_players, 4);
        assert_eq!(config.move_speed, 2.0);
        assert_eq!(config.knockback_duration, 0.5);
        assert_eq!(config.crouch_height_modifier, 0.7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config: GameConfig =
            serde_json::from_str(r#"{"max_players": 2, "move_speed": 3.5}"#).unwrap();
        assert_eq!(config.max_players, 2);
        assert_eq!(config.move_speed, 3.5);
        assert_eq!(config.join_wait_seconds, 5);
    }

    #[test]
    fn test_max_players_must_fit_palette() {
        let mut config = GameConfig::default();
        config.max_players = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadMaxPlayers { .. })
        ));

        config.max_players = TINT_PALETTE.len() as u8 + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadMaxPlayers { .. })
        ));
    }

    #[test]
    fn test_nonpositive_rejected() {
        let mut config = GameConfig::default();
        config.knockback_duration = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive("knockback_duration"))
        ));
    }

    #[test]
    fn test_fixed_conversions() {
        let config = GameConfig::default();
        assert_eq!(config.knockback_duration_ticks(), 30); // 0.5s at 60 Hz
        assert_eq!(config.move_speed_fixed(), crate::FIXED_ONE * 2);
    }
}

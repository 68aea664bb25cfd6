//! # Party Dash Round Simulation
//!
//! Deterministic round simulation for the Party Dash minigame pack: a join
//! window, two side-scrolling character controllers (a free runner and an
//! auto-running croucher), a synchronous signal bus, and the round
//! orchestration that ties them together. Rendering, physics resolution,
//! device input, and scene transitions are host collaborators behind narrow
//! seams.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PARTY DASH SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                 │
//! │  ├── fixed.rs    - Q16.16 fixed-point arithmetic            │
//! │  └── vec2.rs     - 2D vector with fixed-point               │
//! │                                                             │
//! │  game/           - Round logic (deterministic)              │
//! │  ├── bus.rs      - Synchronous signal dispatch              │
//! │  ├── input.rs    - Per-slot logical input frames            │
//! │  ├── character.rs- Character state machine (two variants)   │
//! │  ├── round.rs    - Join window and round lifecycle          │
//! │  ├── goal.rs     - Arrival order and placements             │
//! │  └── world.rs    - Component wiring and tick driver         │
//! │                                                             │
//! │  config.rs       - Named numeric options (serde)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are **100% deterministic**:
//! - No floating-point arithmetic in round logic
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies; all waits are counted in ticks
//!
//! Given identical per-tick inputs, a round produces identical signal
//! sequences and final placements on any platform.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;

// Re-export commonly used types
pub use config::GameConfig;
pub use core::fixed::{Fixed, FIXED_HALF, FIXED_ONE, FIXED_SCALE};
pub use core::vec2::FixedVec2;
pub use game::bus::{Signal, SignalBus, SignalKind, SubscriberId};
pub use game::character::{AnimationState, Character, CharacterKind, PlayerNumber, PlayerSlot};
pub use game::input::InputFrame;
pub use game::world::World;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;

/// Convert whole seconds to simulation ticks.
#[inline]
pub const fn seconds_to_ticks(seconds: u32) -> u32 {
    seconds * TICK_RATE
}

//! Round logic: signals, input, characters, lifecycle, and wiring.
//!
//! Everything in this module is deterministic. The host feeds
//! [`InputFrame`](input::InputFrame)s and collision reports in, ticks the
//! [`World`](world::World), and observes [`Signal`](bus::Signal)s and
//! character snapshots coming out.

pub mod bus;
pub mod character;
pub mod goal;
pub mod input;
pub mod round;
pub mod world;

pub use bus::{Signal, SignalBus, SignalKind, SubscriberId, Subscriptions};
pub use character::{
    AnimationState, Character, CharacterConfig, CharacterKind, CharacterPhase, ClearanceProbe,
    OpenSky, PlayerNumber, PlayerSlot, Tint,
};
pub use goal::GoalZone;
pub use input::InputFrame;
pub use round::{ConnectionId, JoinError, RoundManager, RoundPhase};
pub use world::{CharacterView, HazardContact, TickInputs, World};

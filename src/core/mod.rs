//! Core deterministic primitives.
//!
//! Integer-only math shared by every part of the round simulation so that
//! identical inputs replay to identical positions on any platform.

pub mod fixed;
pub mod vec2;

// Re-export core types
pub use fixed::{Fixed, FIXED_HALF, FIXED_ONE, FIXED_SCALE};
pub use vec2::FixedVec2;

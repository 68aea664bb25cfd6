//! Logical Input Frames
//!
//! The simulation never touches input devices; the host's input collaborator
//! samples each player's logical actions once per tick and hands the result
//! over as an [`InputFrame`]. Axis values arrive as i8 and are converted to
//! fixed-point through a lookup table so the conversion is exact and
//! identical on every platform.

use serde::{Deserialize, Serialize};

use crate::core::fixed::Fixed;
use crate::core::vec2::FixedVec2;

/// Lookup table converting i8 axis input to Fixed in [-1.0, +1.0].
///
/// `value * 65536 / 127` is not an integer scale, so floor division is
/// precomputed for all 256 byte values. Index 128 (-128 as i8) means "no
/// input" and maps to 0.
pub static MOVE_LUT: [Fixed; 256] = {
    let mut lut = [0i32; 256];
    let mut i = 0i32;
    while i < 256 {
        let signed = if i < 128 { i } else { i - 256 };
        if signed == -128 {
            lut[i as usize] = 0;
        } else {
            lut[i as usize] = (signed * 65536) / 127;
        }
        i += 1;
    }
    lut
};

/// Convert an i8 axis sample to Fixed using the lookup table.
#[inline]
pub fn axis_to_fixed(input: i8) -> Fixed {
    MOVE_LUT[(input as u8) as usize]
}

/// One player's logical input for one simulation tick.
///
/// Button state is edge-based: the host sets the pressed/released bits on
/// the tick the transition happened, not while the button is held.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFrame {
    /// Axis X: -127 (left) to +127 (right), -128 = no input
    pub move_x: i8,

    /// Axis Y: -127 (down) to +127 (up), -128 = no input
    pub move_y: i8,

    /// Action flags (packed bits):
    /// - Bit 0: action button pressed this tick
    /// - Bit 1: action button released this tick
    pub flags: u8,
}

impl InputFrame {
    /// Special axis value indicating no input.
    pub const NO_INPUT: i8 = -128;

    /// Action button pressed this tick.
    pub const FLAG_ACTION_PRESSED: u8 = 0x01;

    /// Action button released this tick.
    pub const FLAG_ACTION_RELEASED: u8 = 0x02;

    /// Create an idle frame.
    pub const fn new() -> Self {
        Self {
            move_x: Self::NO_INPUT,
            move_y: Self::NO_INPUT,
            flags: 0,
        }
    }

    /// Create a frame with an axis sample.
    pub const fn with_movement(move_x: i8, move_y: i8) -> Self {
        Self {
            move_x,
            move_y,
            flags: 0,
        }
    }

    /// Axis value as a fixed-point vector clamped to [-1, 1] per component.
    #[inline]
    pub fn move_vector(&self) -> FixedVec2 {
        FixedVec2 {
            x: axis_to_fixed(self.move_x),
            y: axis_to_fixed(self.move_y),
        }
    }

    /// Was the action button pressed this tick?
    #[inline]
    pub fn action_pressed(&self) -> bool {
        self.flags & Self::FLAG_ACTION_PRESSED != 0
    }

    /// Was the action button released this tick?
    #[inline]
    pub fn action_released(&self) -> bool {
        self.flags & Self::FLAG_ACTION_RELEASED != 0
    }

    /// True if nothing happened this tick.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.move_x == Self::NO_INPUT && self.move_y == Self::NO_INPUT && self.flags == 0
    }

    /// Set the action-pressed edge bit.
    #[inline]
    pub fn set_action_pressed(&mut self) {
        self.flags |= Self::FLAG_ACTION_PRESSED;
    }

    /// Set the action-released edge bit.
    #[inline]
    pub fn set_action_released(&mut self) {
        self.flags |= Self::FLAG_ACTION_RELEASED;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::FIXED_ONE;
    use proptest::prelude::*;

    #[test]
    fn test_move_lut_values() {
        assert_eq!(MOVE_LUT[0], 0);
        assert_eq!(MOVE_LUT[127], FIXED_ONE); // +127 -> +1.0
        assert_eq!(MOVE_LUT[129], -FIXED_ONE); // -127 -> -1.0
        assert_eq!(MOVE_LUT[128], 0); // -128 -> no input
    }

    #[test]
    fn test_axis_to_fixed() {
        assert_eq!(axis_to_fixed(0), 0);
        assert_eq!(axis_to_fixed(127), FIXED_ONE);
        assert_eq!(axis_to_fixed(-127), -FIXED_ONE);
        assert_eq!(axis_to_fixed(-128), 0);
    }

    #[test]
    fn test_action_flags() {
        let mut frame = InputFrame::new();
        assert!(frame.is_idle());
        assert!(!frame.action_pressed());
        assert!(!frame.action_released());

        frame.set_action_pressed();
        assert!(frame.action_pressed());
        assert!(!frame.action_released());
        assert!(!frame.is_idle());

        frame.set_action_released();
        assert!(frame.action_released());
    }

    #[test]
    fn test_move_vector() {
        let frame = InputFrame::with_movement(127, -127);
        let v = frame.move_vector();
        assert_eq!(v.x, FIXED_ONE);
        assert_eq!(v.y, -FIXED_ONE);
    }

    proptest! {
        // Axis conversion never leaves [-1, 1] and is symmetric.
        #[test]
        fn prop_axis_clamped_and_symmetric(raw in any::<i8>()) {
            let v = axis_to_fixed(raw);
            prop_assert!((-FIXED_ONE..=FIXED_ONE).contains(&v));
            if raw != i8::MIN {
                prop_assert_eq!(axis_to_fixed(-raw), -v);
            }
        }
    }
}

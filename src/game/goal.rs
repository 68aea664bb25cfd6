//! Goal Zone
//!
//! Arrival ordering for the finish line. The host's trigger region reports
//! contacts; the zone keeps the ordered arrival list and fires one
//! `PlacementAchieved` per slot. Characters carry more than one collider, so
//! repeat contacts from the same logical player are deduplicated by slot
//! identity, never by collider instance.

use tracing::info;

use crate::game::bus::{Signal, SignalBus};
use crate::game::character::PlayerSlot;

/// Ordered arrival list for one round's finish line.
#[derive(Debug, Default)]
pub struct GoalZone {
    arrivals: Vec<PlayerSlot>,
}

impl GoalZone {
    /// Create an empty zone.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a contact. The first contact per slot appends to the arrival
    /// list and fires `PlacementAchieved(slot, position_in_list)`; repeats
    /// are no-ops. Returns the ordinal on first contact.
    pub fn report_contact(&mut self, bus: &SignalBus, slot: PlayerSlot) -> Option<u8> {
        if self.arrivals.contains(&slot) {
            return None;
        }
        self.arrivals.push(slot);
        let ordinal = self.arrivals.len() as u8;
        info!(slot = slot.0, ordinal, "goal reached");
        bus.fire(Signal::PlacementAchieved { slot, ordinal });
        Some(ordinal)
    }

    /// Slots that have finished, in arrival order.
    pub fn arrivals(&self) -> &[PlayerSlot] {
        &self.arrivals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::game::bus::SignalKind;

    #[test]
    fn test_arrival_order_gives_dense_ordinals() {
        let bus = SignalBus::new();
        let mut zone = GoalZone::new();

        assert_eq!(zone.report_contact(&bus, PlayerSlot(3)), Some(1));
        assert_eq!(zone.report_contact(&bus, PlayerSlot(1)), Some(2));
        assert_eq!(zone.report_contact(&bus, PlayerSlot(2)), Some(3));
        assert_eq!(
            zone.arrivals(),
            &[PlayerSlot(3), PlayerSlot(1), PlayerSlot(2)]
        );
    }

    #[test]
    fn test_repeat_contact_deduplicated() {
        let bus = SignalBus::new();
        let fired = Rc::new(RefCell::new(Vec::new()));
        let fired2 = Rc::clone(&fired);
        bus.subscribe(SignalKind::PlacementAchieved, move |signal| {
            if let Signal::PlacementAchieved { slot, ordinal } = signal {
                fired2.borrow_mut().push((*slot, *ordinal));
            }
        });

        let mut zone = GoalZone::new();
        // Two colliders on the same character hit the trigger on the same
        // tick: exactly one placement may come out.
        assert_eq!(zone.report_contact(&bus, PlayerSlot(1)), Some(1));
        assert_eq!(zone.report_contact(&bus, PlayerSlot(1)), None);
        assert_eq!(zone.report_contact(&bus, PlayerSlot(2)), Some(2));
        assert_eq!(zone.report_contact(&bus, PlayerSlot(1)), None);

        assert_eq!(
            *fired.borrow(),
            vec![(PlayerSlot(1), 1), (PlayerSlot(2), 2)]
        );
    }
}

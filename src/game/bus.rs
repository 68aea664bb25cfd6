//! Synchronous Signal Dispatch
//!
//! The process-wide set of named signals that components raise and observe.
//! Dispatch is synchronous and single-threaded: firing a signal calls every
//! current subscriber in registration order, then returns. There is no
//! queuing and no cross-tick delivery.
//!
//! The one hazard worth guarding is a handler unsubscribing (itself or
//! another handler) while a dispatch is in flight. `fire` iterates over a
//! snapshot of the subscriber list and re-checks the live registry before
//! each call, so a handler removed mid-dispatch is never invoked after its
//! removal.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{trace, warn};

use crate::game::character::{PlayerNumber, PlayerSlot};

/// A named event raised on the bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Signal {
    /// The join window closed and movement is now allowed.
    RoundStarted,
    /// Every occupied slot has finished; the round is over.
    RoundOver,
    /// A slot reached the goal at the given arrival rank (1 = first).
    PlacementAchieved {
        /// Slot that finished
        slot: PlayerSlot,
        /// Arrival rank, dense from 1
        ordinal: u8,
    },
    /// A connection was assigned a slot during the join window.
    PlayerJoined {
        /// Slot assigned to the new player
        slot: PlayerSlot,
        /// Display number for UI and tinting
        player_number: PlayerNumber,
    },
    /// The join-window countdown text changed.
    CountdownTextChanged(String),
    /// The instruction banner text changed ("" hides it).
    InstructionTextChanged(String),
    /// The round winner, for the game-over screen.
    WinnerDeclared(PlayerNumber),
    /// Ask the host scene loader to switch scenes.
    RequestSceneLoad(usize),
}

impl Signal {
    /// The payload-free discriminant used as the subscription key.
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::RoundStarted => SignalKind::RoundStarted,
            Signal::RoundOver => SignalKind::RoundOver,
            Signal::PlacementAchieved { .. } => SignalKind::PlacementAchieved,
            Signal::PlayerJoined { .. } => SignalKind::PlayerJoined,
            Signal::CountdownTextChanged(_) => SignalKind::CountdownTextChanged,
            Signal::InstructionTextChanged(_) => SignalKind::InstructionTextChanged,
            Signal::WinnerDeclared(_) => SignalKind::WinnerDeclared,
            Signal::RequestSceneLoad(_) => SignalKind::RequestSceneLoad,
        }
    }
}

/// Subscription key: which signal a handler wants to observe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SignalKind {
    /// See [`Signal::RoundStarted`]
    RoundStarted,
    /// See [`Signal::RoundOver`]
    RoundOver,
    /// See [`Signal::PlacementAchieved`]
    PlacementAchieved,
    /// See [`Signal::PlayerJoined`]
    PlayerJoined,
    /// See [`Signal::CountdownTextChanged`]
    CountdownTextChanged,
    /// See [`Signal::InstructionTextChanged`]
    InstructionTextChanged,
    /// See [`Signal::WinnerDeclared`]
    WinnerDeclared,
    /// See [`Signal::RequestSceneLoad`]
    RequestSceneLoad,
}

/// Handle returned by [`SignalBus::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubscriberId(u64);

type Handler = Rc<RefCell<dyn FnMut(&Signal)>>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    // Vec order per kind = registration order = dispatch order.
    subscribers: BTreeMap<SignalKind, Vec<(SubscriberId, Handler)>>,
}

impl Registry {
    fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers
            .values()
            .any(|list| list.iter().any(|(sid, _)| *sid == id))
    }
}

/// Process-wide signal registry with synchronous dispatch.
///
/// Single-threaded by design: interior mutability lets components fire
/// signals from inside handlers (re-entrant fires are allowed; ordering
/// across different signal kinds fired in the same tick is unspecified).
#[derive(Default)]
pub struct SignalBus {
    inner: RefCell<Registry>,
}

impl SignalBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one signal kind.
    ///
    /// Handlers fire in registration order. The returned id must be passed
    /// to [`unsubscribe`](Self::unsubscribe) when the owning component
    /// deactivates, or dispatch will keep calling into it.
    pub fn subscribe<F>(&self, kind: SignalKind, handler: F) -> SubscriberId
    where
        F: FnMut(&Signal) + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = SubscriberId(inner.next_id);
        inner
            .subscribers
            .entry(kind)
            .or_default()
            .push((id, Rc::new(RefCell::new(handler))));
        trace!(?kind, ?id, "subscribed");
        id
    }

    /// Remove a handler. Returns false if the id was not registered.
    ///
    /// Safe to call from inside a handler while the same signal is being
    /// dispatched; the removed handler will not fire again this dispatch.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut inner = self.inner.borrow_mut();
        for list in inner.subscribers.values_mut() {
            if let Some(pos) = list.iter().position(|(sid, _)| *sid == id) {
                list.remove(pos);
                trace!(?id, "unsubscribed");
                return true;
            }
        }
        false
    }

    /// Fire a signal, invoking every current subscriber synchronously.
    ///
    /// Firing with no subscribers is a no-op.
    pub fn fire(&self, signal: Signal) {
        let snapshot: Vec<(SubscriberId, Handler)> = {
            let inner = self.inner.borrow();
            match inner.subscribers.get(&signal.kind()) {
                Some(list) if !list.is_empty() => list.clone(),
                _ => return,
            }
        };

        trace!(kind = ?signal.kind(), subscribers = snapshot.len(), "fire");

        for (id, handler) in snapshot {
            // Skip handlers unsubscribed since the snapshot was taken.
            if !self.inner.borrow().contains(id) {
                continue;
            }
            match handler.try_borrow_mut() {
                Ok(mut h) => h(&signal),
                // A handler firing the kind it is currently handling would
                // re-enter itself; skip the nested call rather than panic.
                Err(_) => warn!(?id, kind = ?signal.kind(), "handler re-entered itself, skipping"),
            }
        }
    }

    /// Number of live subscriptions across all kinds.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .values()
            .map(Vec::len)
            .sum()
    }
}

/// Subscriptions owned by one component, released together on teardown.
///
/// Components subscribe on activation and must unsubscribe on deactivation;
/// holding the ids in this guard makes the pairing structural.
pub struct Subscriptions {
    bus: Rc<SignalBus>,
    ids: Vec<SubscriberId>,
}

impl Subscriptions {
    /// Create an empty guard bound to a bus.
    pub fn new(bus: Rc<SignalBus>) -> Self {
        Self {
            bus,
            ids: Vec::new(),
        }
    }

    /// Subscribe and track the resulting id.
    pub fn add<F>(&mut self, kind: SignalKind, handler: F)
    where
        F: FnMut(&Signal) + 'static,
    {
        let id = self.bus.subscribe(kind, handler);
        self.ids.push(id);
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(log: &Rc<RefCell<Vec<&'static str>>>, tag: &'static str) -> impl FnMut(&Signal) {
        let log = Rc::clone(log);
        move |_| log.borrow_mut().push(tag)
    }

    #[test]
    fn test_fire_without_subscribers_is_noop() {
        let bus = SignalBus::new();
        bus.fire(Signal::RoundStarted);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_handlers_fire_in_registration_order_exactly_once() {
        let bus = SignalBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        bus.subscribe(SignalKind::RoundStarted, record(&log, "a"));
        bus.subscribe(SignalKind::RoundStarted, record(&log, "b"));
        bus.subscribe(SignalKind::RoundStarted, record(&log, "c"));
        // A subscriber for another kind must not fire.
        bus.subscribe(SignalKind::RoundOver, record(&log, "x"));

        bus.fire(Signal::RoundStarted);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = SignalBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let id = bus.subscribe(SignalKind::RoundOver, record(&log, "gone"));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));

        bus.fire(Signal::RoundOver);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_unsubscribe_during_dispatch_skips_removed_handler() {
        let bus = Rc::new(SignalBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        // First handler removes the third; the third must never run.
        let late_id = Rc::new(RefCell::new(None::<SubscriberId>));

        let bus2 = Rc::clone(&bus);
        let late2 = Rc::clone(&late_id);
        let log2 = Rc::clone(&log);
        bus.subscribe(SignalKind::RoundStarted, move |_| {
            log2.borrow_mut().push("first");
            if let Some(id) = *late2.borrow() {
                bus2.unsubscribe(id);
            }
        });
        bus.subscribe(SignalKind::RoundStarted, record(&log, "second"));
        let id = bus.subscribe(SignalKind::RoundStarted, record(&log, "third"));
        *late_id.borrow_mut() = Some(id);

        bus.fire(Signal::RoundStarted);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_reentrant_fire_of_other_kind() {
        let bus = Rc::new(SignalBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let bus2 = Rc::clone(&bus);
        let log2 = Rc::clone(&log);
        bus.subscribe(SignalKind::RoundOver, move |_| {
            log2.borrow_mut().push("over");
            bus2.fire(Signal::WinnerDeclared(PlayerNumber(1)));
        });
        bus.subscribe(SignalKind::WinnerDeclared, record(&log, "winner"));

        bus.fire(Signal::RoundOver);
        assert_eq!(*log.borrow(), vec!["over", "winner"]);
    }

    #[test]
    fn test_subscriptions_guard_releases_on_drop() {
        let bus = Rc::new(SignalBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        {
            let mut subs = Subscriptions::new(Rc::clone(&bus));
            subs.add(SignalKind::RoundStarted, record(&log, "scoped"));
            assert_eq!(bus.subscriber_count(), 1);
            bus.fire(Signal::RoundStarted);
        }

        // Guard dropped: no dangling handler left behind.
        assert_eq!(bus.subscriber_count(), 0);
        bus.fire(Signal::RoundStarted);
        assert_eq!(*log.borrow(), vec!["scoped"]);
    }

    #[test]
    fn test_signal_kind_mapping() {
        assert_eq!(
            Signal::PlacementAchieved {
                slot: PlayerSlot(1),
                ordinal: 1
            }
            .kind(),
            SignalKind::PlacementAchieved
        );
        assert_eq!(
            Signal::CountdownTextChanged(String::new()).kind(),
            SignalKind::CountdownTextChanged
        );
    }
}

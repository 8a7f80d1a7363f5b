#![forbid(unsafe_code)]

//! Typed multi-map listener registry.
//!
//! [`ObservableBase`] maps a listener kind ([`ListenerKey`]) to the set of
//! listeners registered for it. It is embedded by every observable model.
//!
//! # Design Invariants
//!
//! 1. **Set semantics**: listeners are compared by identity (`Rc` address).
//!    Adding the same `Rc` twice is a no-op that reports `false`.
//! 2. **Defensive copies**: [`ObservableBase::listeners`] returns a snapshot.
//!    Dispatch iterates the snapshot, so a listener removing itself (or
//!    registering another) during delivery never invalidates the iteration.
//! 3. **Lazy storage**: the backing map is only allocated on the first
//!    registration; unobserved models pay for a single `None`.
//! 4. **No borrow across callbacks**: the internal `RefCell` is released
//!    before any listener runs.
//!
//! The registry is `!Send`. Models are shared between the requests of one
//! session only, and session access is serialized by the host.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::rc::Rc;

use crate::event::{Bubble, EventType, INVALIDATION_EVENT, PropertyListener};

/// Typed key selecting one listener set inside an [`ObservableBase`].
///
/// Two keys address the same set when both the listener type `L` and the
/// name are equal.
pub struct ListenerKey<L: ?Sized + 'static> {
    name: &'static str,
    _marker: PhantomData<fn(&L)>,
}

impl<L: ?Sized + 'static> ListenerKey<L> {
    /// Create a key for listeners of type `L`.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The key name, used in diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    fn slot(&self) -> Slot {
        (TypeId::of::<L>(), self.name)
    }
}

impl<L: ?Sized + 'static> Clone for ListenerKey<L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L: ?Sized + 'static> Copy for ListenerKey<L> {}

impl<L: ?Sized + 'static> fmt::Debug for ListenerKey<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ListenerKey").field(&self.name).finish()
    }
}

type Slot = (TypeId, &'static str);

fn same_listener<L: ?Sized>(a: &Rc<L>, b: &Rc<L>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Listener registry embedded by observable models.
#[derive(Default)]
pub struct ObservableBase {
    listeners: RefCell<Option<HashMap<Slot, Box<dyn Any>>>>,
}

impl ObservableBase {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` under `key`.
    ///
    /// Returns `true` if the listener was newly added.
    pub fn add_listener<L: ?Sized + 'static>(&self, key: ListenerKey<L>, listener: Rc<L>) -> bool {
        let mut guard = self.listeners.borrow_mut();
        let map = guard.get_or_insert_with(HashMap::new);
        let entry = map
            .entry(key.slot())
            .or_insert_with(|| Box::new(Vec::<Rc<L>>::new()));
        let Some(list) = entry.downcast_mut::<Vec<Rc<L>>>() else {
            return false;
        };
        if list.iter().any(|existing| same_listener(existing, &listener)) {
            return false;
        }
        list.push(listener);
        true
    }

    /// Deregister `listener` from `key`.
    ///
    /// Returns `true` if the listener was registered before.
    pub fn remove_listener<L: ?Sized + 'static>(
        &self,
        key: ListenerKey<L>,
        listener: &Rc<L>,
    ) -> bool {
        let mut guard = self.listeners.borrow_mut();
        let Some(map) = guard.as_mut() else {
            return false;
        };
        let slot = key.slot();
        let Some(list) = map
            .get_mut(&slot)
            .and_then(|entry| entry.downcast_mut::<Vec<Rc<L>>>())
        else {
            return false;
        };
        let Some(position) = list
            .iter()
            .position(|existing| same_listener(existing, listener))
        else {
            return false;
        };
        list.remove(position);
        if list.is_empty() {
            map.remove(&slot);
        }
        true
    }

    /// Snapshot of the listeners registered under `key`, in registration
    /// order.
    #[must_use]
    pub fn listeners<L: ?Sized + 'static>(&self, key: ListenerKey<L>) -> Vec<Rc<L>> {
        self.listeners
            .borrow()
            .as_ref()
            .and_then(|map| map.get(&key.slot()))
            .and_then(|entry| entry.downcast_ref::<Vec<Rc<L>>>())
            .cloned()
            .unwrap_or_default()
    }

    /// Live existence check; does not copy.
    #[must_use]
    pub fn has_listeners<L: ?Sized + 'static>(&self, key: ListenerKey<L>) -> bool {
        self.listener_count(key) > 0
    }

    /// Number of listeners registered under `key`.
    #[must_use]
    pub fn listener_count<L: ?Sized + 'static>(&self, key: ListenerKey<L>) -> usize {
        self.listeners
            .borrow()
            .as_ref()
            .and_then(|map| map.get(&key.slot()))
            .and_then(|entry| entry.downcast_ref::<Vec<Rc<L>>>())
            .map_or(0, Vec::len)
    }

    /// Whether any listener of any kind is registered.
    #[must_use]
    pub fn has_any_listeners(&self) -> bool {
        self.listeners
            .borrow()
            .as_ref()
            .is_some_and(|map| !map.is_empty())
    }

    /// Register a property listener for `event`.
    pub fn add_property_listener<S: ?Sized + 'static, V: 'static>(
        &self,
        event: &EventType<S, V>,
        listener: Rc<PropertyListener<S, V>>,
    ) -> bool {
        self.add_listener(event.key(), listener)
    }

    /// Deregister a property listener from `event`.
    pub fn remove_property_listener<S: ?Sized + 'static, V: 'static>(
        &self,
        event: &EventType<S, V>,
        listener: &Rc<PropertyListener<S, V>>,
    ) -> bool {
        self.remove_listener(event.key(), listener)
    }

    /// Deliver a property change to every listener of `event`.
    ///
    /// Listeners run in registration order over a snapshot. A panicking
    /// listener does not prevent delivery to the others: the first panic is
    /// resumed once every listener has run, later ones are logged.
    ///
    /// Returns [`Bubble::Stop`] if any listener asked to stop, or if the event
    /// type does not bubble.
    pub fn notify_listeners<S: ?Sized + 'static, V: 'static>(
        &self,
        event: &EventType<S, V>,
        sender: &S,
        old_value: &V,
        new_value: &V,
    ) -> Bubble {
        let listeners = self.listeners(event.key());
        let mut bubble = Bubble::Bubble;
        let mut first_panic = None;

        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(sender, old_value, new_value))) {
                Ok(Bubble::Stop) => bubble = Bubble::Stop,
                Ok(Bubble::Bubble) => {}
                Err(payload) => {
                    if first_panic.is_none() {
                        first_panic = Some(payload);
                    } else {
                        tracing::error!(
                            event = event.name(),
                            message = panic_message(payload.as_ref()),
                            "further listener panicked during dispatch"
                        );
                    }
                }
            }
        }

        if let Some(payload) = first_panic {
            resume_unwind(payload);
        }

        if event.is_bubbling() {
            bubble
        } else {
            Bubble::Stop
        }
    }

    /// Announce that everything derived from this observable is stale.
    pub fn invalidate(&self) {
        self.notify_listeners(&INVALIDATION_EVENT, self, &(), &());
    }
}

impl fmt::Debug for ObservableBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds = self.listeners.borrow().as_ref().map_or(0, HashMap::len);
        f.debug_struct("ObservableBase")
            .field("listener_kinds", &kinds)
            .finish()
    }
}

/// Text of a panic payload, for logs.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Implemented by models that expose an [`ObservableBase`].
pub trait PropertyObservable {
    /// The embedded registry.
    fn observable(&self) -> &ObservableBase;

    /// Register a property listener.
    fn add_listener<S: ?Sized + 'static, V: 'static>(
        &self,
        event: &EventType<S, V>,
        listener: Rc<PropertyListener<S, V>>,
    ) -> bool
    where
        Self: Sized,
    {
        self.observable().add_property_listener(event, listener)
    }

    /// Deregister a property listener.
    fn remove_listener<S: ?Sized + 'static, V: 'static>(
        &self,
        event: &EventType<S, V>,
        listener: &Rc<PropertyListener<S, V>>,
    ) -> bool
    where
        Self: Sized,
    {
        self.observable().remove_property_listener(event, listener)
    }
}

impl PropertyObservable for ObservableBase {
    fn observable(&self) -> &ObservableBase {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::listener;
    use std::cell::Cell;

    trait Ping {
        fn ping(&self) -> u32;
    }

    struct Fixed(u32);

    impl Ping for Fixed {
        fn ping(&self) -> u32 {
            self.0
        }
    }

    const PING: ListenerKey<dyn Ping> = ListenerKey::new("ping");
    const OTHER_PING: ListenerKey<dyn Ping> = ListenerKey::new("other");

    #[test]
    fn duplicate_add_is_noop() {
        let base = ObservableBase::new();
        let listener: Rc<dyn Ping> = Rc::new(Fixed(1));
        assert!(base.add_listener(PING, listener.clone()));
        assert!(!base.add_listener(PING, listener.clone()));
        assert_eq!(base.listener_count(PING), 1);
    }

    #[test]
    fn remove_reports_presence() {
        let base = ObservableBase::new();
        let listener: Rc<dyn Ping> = Rc::new(Fixed(1));
        assert!(!base.remove_listener(PING, &listener));
        base.add_listener(PING, listener.clone());
        assert!(base.remove_listener(PING, &listener));
        assert!(!base.remove_listener(PING, &listener));
        assert!(!base.has_any_listeners());
    }

    #[test]
    fn keys_with_different_names_are_separate() {
        let base = ObservableBase::new();
        base.add_listener(PING, Rc::new(Fixed(1)) as Rc<dyn Ping>);
        assert!(base.has_listeners(PING));
        assert!(!base.has_listeners(OTHER_PING));
    }

    #[test]
    fn snapshot_is_detached_from_registry() {
        let base = ObservableBase::new();
        let a: Rc<dyn Ping> = Rc::new(Fixed(1));
        let b: Rc<dyn Ping> = Rc::new(Fixed(2));
        base.add_listener(PING, a.clone());
        base.add_listener(PING, b);

        let snapshot = base.listeners(PING);
        base.remove_listener(PING, &a);

        let sum: u32 = snapshot.iter().map(|l| l.ping()).sum();
        assert_eq!(sum, 3);
        assert_eq!(base.listener_count(PING), 1);
    }

    const COUNTER: EventType<ObservableBase, u32> = EventType::new("counter");

    #[test]
    fn listener_may_remove_itself_during_dispatch() {
        let base = Rc::new(ObservableBase::new());
        let calls = Rc::new(Cell::new(0));

        let slot: Rc<RefCell<Option<Rc<PropertyListener<ObservableBase, u32>>>>> =
            Rc::new(RefCell::new(None));
        let self_removing: Rc<PropertyListener<ObservableBase, u32>> = {
            let slot = slot.clone();
            let calls = calls.clone();
            Rc::new(move |sender: &ObservableBase, _: &u32, _: &u32| {
                calls.set(calls.get() + 1);
                if let Some(me) = slot.borrow().as_ref() {
                    sender.remove_property_listener(&COUNTER, me);
                }
                Bubble::Bubble
            })
        };
        *slot.borrow_mut() = Some(self_removing.clone());

        let counting: Rc<PropertyListener<ObservableBase, u32>> = {
            let calls = calls.clone();
            Rc::new(move |_: &ObservableBase, _: &u32, _: &u32| {
                calls.set(calls.get() + 10);
                Bubble::Bubble
            })
        };

        base.add_property_listener(&COUNTER, self_removing);
        base.add_property_listener(&COUNTER, counting);

        base.notify_listeners(&COUNTER, &base, &0, &1);
        assert_eq!(calls.get(), 11);
        base.notify_listeners(&COUNTER, &base, &1, &2);
        assert_eq!(calls.get(), 21);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let base = ObservableBase::new();
        let reached = Rc::new(Cell::new(false));

        base.add_property_listener(
            &COUNTER,
            listener(|_: &ObservableBase, _: &u32, _: &u32| -> Bubble { panic!("boom") }),
        );
        let flag = reached.clone();
        base.add_property_listener(
            &COUNTER,
            listener(move |_: &ObservableBase, _: &u32, _: &u32| {
                flag.set(true);
                Bubble::Bubble
            }),
        );

        let result = catch_unwind(AssertUnwindSafe(|| {
            base.notify_listeners(&COUNTER, &base, &0, &1);
        }));
        let payload = result.expect_err("first panic is resumed");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        assert!(reached.get());
    }

    #[test]
    fn invalidate_reaches_invalidation_listeners() {
        let base = ObservableBase::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        base.add_property_listener(
            &INVALIDATION_EVENT,
            listener(move |_: &ObservableBase, _: &(), _: &()| {
                h.set(h.get() + 1);
                Bubble::Bubble
            }),
        );
        base.invalidate();
        base.invalidate();
        assert_eq!(hits.get(), 2);
    }
}

#![forbid(unsafe_code)]

//! Property change events with bubbling.
//!
//! An [`EventType`] names one observable property of a sender type `S` with
//! value type `V`. Listeners receive the sender, the old and the new value and
//! answer with a [`Bubble`] verdict that decides whether observers further up
//! an ancestor chain see the event too.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::observable::{ListenerKey, ObservableBase};

/// Verdict of a property listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bubble {
    /// Continue delivery to ancestor observables.
    #[default]
    Bubble,
    /// Stop at the current observable.
    Stop,
}

/// Listener signature for property events: `(sender, old, new)`.
pub type PropertyListener<S, V> = dyn Fn(&S, &V, &V) -> Bubble;

/// Listener for [`INVALIDATION_EVENT`].
pub type InvalidationListener = PropertyListener<ObservableBase, ()>;

/// Descriptor of an observable property.
pub struct EventType<S: ?Sized + 'static, V: 'static> {
    name: &'static str,
    bubbling: bool,
    _marker: PhantomData<fn(&S, &V)>,
}

impl<S: ?Sized + 'static, V: 'static> EventType<S, V> {
    /// A bubbling event type.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            bubbling: true,
            _marker: PhantomData,
        }
    }

    /// An event type that is never delivered past its sender.
    #[must_use]
    pub const fn non_bubbling(name: &'static str) -> Self {
        Self {
            name,
            bubbling: false,
            _marker: PhantomData,
        }
    }

    /// Property name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether delivery continues to ancestor observables.
    #[must_use]
    pub const fn is_bubbling(&self) -> bool {
        self.bubbling
    }

    /// Registry key of this event's listener set.
    #[must_use]
    pub const fn key(&self) -> ListenerKey<PropertyListener<S, V>> {
        ListenerKey::new(self.name)
    }
}

impl<S: ?Sized + 'static, V: 'static> fmt::Debug for EventType<S, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventType")
            .field("name", &self.name)
            .field("bubbling", &self.bubbling)
            .finish()
    }
}

/// Fired by [`ObservableBase::invalidate`].
pub const INVALIDATION_EVENT: EventType<ObservableBase, ()> =
    EventType::non_bubbling("invalidation");

/// Deliver an event along a chain of observables, innermost first.
///
/// Delivery ends at the first observable whose listeners answer
/// [`Bubble::Stop`], and right after the first observable for non-bubbling
/// event types.
pub fn notify_bubbling<'a, S: ?Sized + 'static, V: 'static>(
    chain: impl IntoIterator<Item = &'a ObservableBase>,
    event: &EventType<S, V>,
    sender: &S,
    old_value: &V,
    new_value: &V,
) -> Bubble {
    for observable in chain {
        if observable.notify_listeners(event, sender, old_value, new_value) == Bubble::Stop {
            return Bubble::Stop;
        }
    }
    Bubble::Bubble
}

/// Wrap a closure as a shared property listener.
pub fn listener<S: ?Sized + 'static, V: 'static>(
    f: impl Fn(&S, &V, &V) -> Bubble + 'static,
) -> Rc<PropertyListener<S, V>> {
    Rc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Node {
        name: &'static str,
    }

    const TITLE: EventType<Node, String> = EventType::new("title");
    const SILENT: EventType<Node, String> = EventType::non_bubbling("silent");

    fn recording(
        log: &Rc<RefCell<Vec<String>>>,
        tag: &'static str,
        verdict: Bubble,
    ) -> Rc<PropertyListener<Node, String>> {
        let log = log.clone();
        listener(move |sender: &Node, old: &String, new: &String| {
            log.borrow_mut()
                .push(format!("{tag}:{}:{old}->{new}", sender.name));
            verdict
        })
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let base = ObservableBase::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        base.add_property_listener(&TITLE, recording(&log, "a", Bubble::Bubble));
        base.add_property_listener(&TITLE, recording(&log, "b", Bubble::Bubble));

        let node = Node { name: "n" };
        base.notify_listeners(&TITLE, &node, &"x".into(), &"y".into());
        assert_eq!(*log.borrow(), vec!["a:n:x->y", "b:n:x->y"]);
    }

    #[test]
    fn stop_ends_bubbling_chain() {
        let inner = ObservableBase::new();
        let middle = ObservableBase::new();
        let outer = ObservableBase::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        inner.add_property_listener(&TITLE, recording(&log, "inner", Bubble::Bubble));
        middle.add_property_listener(&TITLE, recording(&log, "middle", Bubble::Stop));
        outer.add_property_listener(&TITLE, recording(&log, "outer", Bubble::Bubble));

        let node = Node { name: "n" };
        let verdict = notify_bubbling(
            [&inner, &middle, &outer],
            &TITLE,
            &node,
            &String::new(),
            &"t".into(),
        );
        assert_eq!(verdict, Bubble::Stop);
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn non_bubbling_event_stays_at_sender() {
        let inner = ObservableBase::new();
        let outer = ObservableBase::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        inner.add_property_listener(&SILENT, recording(&log, "inner", Bubble::Bubble));
        outer.add_property_listener(&SILENT, recording(&log, "outer", Bubble::Bubble));

        let node = Node { name: "n" };
        notify_bubbling([&inner, &outer], &SILENT, &node, &String::new(), &"t".into());
        assert_eq!(*log.borrow(), vec!["inner:n:->t"]);
    }

    #[test]
    fn chain_without_listeners_bubbles() {
        let a = ObservableBase::new();
        let node = Node { name: "n" };
        let verdict = notify_bubbling([&a], &TITLE, &node, &String::new(), &String::new());
        assert_eq!(verdict, Bubble::Bubble);
    }
}

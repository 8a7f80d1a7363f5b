#![forbid(unsafe_code)]

//! Registration points for controls.
//!
//! A [`ControlScope`] is where controls register as [`UpdateListener`]s while
//! they are attached. [`LocalScope`] is the concrete scope: the root scope of
//! a window, and the lazily created child scope of every control that renders
//! nested controls.
//!
//! # Design Invariants
//!
//! 1. **Identity**: listeners are registered by `Rc` address; registering the
//!    same listener twice is a no-op.
//! 2. **Snapshot iteration**: [`LocalScope::revalidate`] and
//!    [`LocalScope::has_updates`] iterate a copy, so a listener may detach
//!    (and deregister) while the scope walks its listeners.
//! 3. **Clear detaches**: [`LocalScope::clear`] takes the listener list
//!    first, then tells every former listener that it was detached.
//! 4. **Disabled propagation on change only**: [`ControlScope::disable_scope`]
//!    informs the listeners only when the flag actually flips.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::DisplayContext;
use crate::frame::FrameScope;
use crate::update_queue::UpdateQueue;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Allocate a fresh id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Something that produces client updates at the end of a turnaround.
pub trait UpdateListener {
    /// Whether [`revalidate`](Self::revalidate) would produce actions.
    fn is_invalid(&self) -> bool;

    /// Append the pending client actions to `actions`.
    fn revalidate(&self, ctx: &mut DisplayContext, actions: &mut UpdateQueue);

    /// The scope this listener is registered with changed its disabled state.
    fn notify_disabled(&self, disabled: bool);

    /// The scope this listener is registered with was cleared.
    fn notify_detached(&self);
}

/// Registration point for update listeners, bound to a frame scope.
pub trait ControlScope {
    /// Identity of this scope.
    fn scope_id(&self) -> ScopeId;

    /// The id namespace and command dispatcher of this scope, if bound.
    fn frame_scope(&self) -> Option<Rc<FrameScope>>;

    /// Register a listener. Returns `false` if it was already registered.
    fn add_update_listener(&self, listener: Rc<dyn UpdateListener>) -> bool;

    /// Deregister a listener. Returns `false` if it was not registered.
    fn remove_update_listener(&self, listener: &Rc<dyn UpdateListener>) -> bool;

    /// Disable or enable everything rendered in this scope.
    fn disable_scope(&self, disabled: bool);

    /// Whether this scope is disabled.
    fn is_scope_disabled(&self) -> bool;
}

fn same_listener(a: &Rc<dyn UpdateListener>, b: &Rc<dyn UpdateListener>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Concrete [`ControlScope`] holding its listeners strongly.
pub struct LocalScope {
    id: ScopeId,
    frame: Option<Rc<FrameScope>>,
    listeners: RefCell<Vec<Rc<dyn UpdateListener>>>,
    disabled: Cell<bool>,
}

impl LocalScope {
    /// Scope inside `frame`.
    #[must_use]
    pub fn new(frame: Option<Rc<FrameScope>>, disabled: bool) -> Self {
        Self {
            id: ScopeId::next(),
            frame,
            listeners: RefCell::new(Vec::new()),
            disabled: Cell::new(disabled),
        }
    }

    /// Root scope of a window.
    #[must_use]
    pub fn root(frame: Rc<FrameScope>) -> Rc<Self> {
        Rc::new(Self::new(Some(frame), false))
    }

    fn snapshot(&self) -> Vec<Rc<dyn UpdateListener>> {
        self.listeners.borrow().clone()
    }

    /// Whether any registered listener is invalid.
    #[must_use]
    pub fn has_updates(&self) -> bool {
        self.snapshot().iter().any(|l| l.is_invalid())
    }

    /// Revalidate every invalid listener, in registration order.
    pub fn revalidate(&self, ctx: &mut DisplayContext, actions: &mut UpdateQueue) {
        for listener in self.snapshot() {
            if listener.is_invalid() {
                listener.revalidate(ctx, actions);
            }
        }
    }

    /// Drop every listener and tell each one it was detached.
    pub fn clear(&self) {
        let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        if !listeners.is_empty() {
            tracing::trace!(scope = %self.id, count = listeners.len(), "clearing scope");
        }
        for listener in listeners {
            listener.notify_detached();
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl ControlScope for LocalScope {
    fn scope_id(&self) -> ScopeId {
        self.id
    }

    fn frame_scope(&self) -> Option<Rc<FrameScope>> {
        self.frame.clone()
    }

    fn add_update_listener(&self, listener: Rc<dyn UpdateListener>) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    fn remove_update_listener(&self, listener: &Rc<dyn UpdateListener>) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let Some(position) = listeners.iter().position(|l| same_listener(l, listener)) else {
            return false;
        };
        listeners.remove(position);
        true
    }

    fn disable_scope(&self, disabled: bool) {
        if self.disabled.replace(disabled) == disabled {
            return;
        }
        for listener in self.snapshot() {
            listener.notify_disabled(disabled);
        }
    }

    fn is_scope_disabled(&self) -> bool {
        self.disabled.get()
    }
}

impl fmt::Debug for LocalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalScope")
            .field("id", &self.id)
            .field("listeners", &self.listeners.borrow().len())
            .field("disabled", &self.disabled.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_action::ClientAction;

    #[derive(Default)]
    struct Probe {
        invalid: Cell<bool>,
        disabled: Cell<Option<bool>>,
        detached: Cell<u32>,
    }

    impl UpdateListener for Probe {
        fn is_invalid(&self) -> bool {
            self.invalid.get()
        }

        fn revalidate(&self, _ctx: &mut DisplayContext, actions: &mut UpdateQueue) {
            actions.add(ClientAction::css_class_update("probe", "ok"));
            self.invalid.set(false);
        }

        fn notify_disabled(&self, disabled: bool) {
            self.disabled.set(Some(disabled));
        }

        fn notify_detached(&self) {
            self.detached.set(self.detached.get() + 1);
        }
    }

    #[test]
    fn registration_has_identity_semantics() {
        let scope = LocalScope::new(None, false);
        let probe: Rc<dyn UpdateListener> = Rc::new(Probe::default());
        assert!(scope.add_update_listener(probe.clone()));
        assert!(!scope.add_update_listener(probe.clone()));
        assert!(scope.remove_update_listener(&probe));
        assert!(!scope.remove_update_listener(&probe));
    }

    #[test]
    fn revalidate_visits_invalid_listeners_only() {
        let scope = LocalScope::new(None, false);
        let dirty = Rc::new(Probe::default());
        dirty.invalid.set(true);
        let clean = Rc::new(Probe::default());
        scope.add_update_listener(dirty.clone());
        scope.add_update_listener(clean);

        assert!(scope.has_updates());
        let mut actions = UpdateQueue::new();
        scope.revalidate(&mut DisplayContext::new(), &mut actions);
        assert_eq!(actions.len(), 1);
        assert!(!scope.has_updates());
    }

    #[test]
    fn clear_notifies_and_empties() {
        let scope = LocalScope::new(None, false);
        let probe = Rc::new(Probe::default());
        scope.add_update_listener(probe.clone());
        scope.clear();
        assert_eq!(probe.detached.get(), 1);
        assert_eq!(scope.listener_count(), 0);
    }

    #[test]
    fn disable_propagates_on_change_only() {
        let scope = LocalScope::new(None, false);
        let probe = Rc::new(Probe::default());
        scope.add_update_listener(probe.clone());

        scope.disable_scope(false);
        assert_eq!(probe.disabled.get(), None);
        scope.disable_scope(true);
        assert_eq!(probe.disabled.get(), Some(true));
        assert!(scope.is_scope_disabled());
    }

    #[test]
    fn scope_ids_are_unique() {
        assert_ne!(ScopeId::next(), ScopeId::next());
    }
}

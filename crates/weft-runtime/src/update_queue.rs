#![forbid(unsafe_code)]

//! Ordered queue of client actions for one turnaround.
//!
//! # Design Invariants
//!
//! 1. **Index stability**: [`UpdateQueue::add`] returns an [`UpdateIndex`]
//!    that keeps addressing the same action until the queue is drained.
//!    Dropping an entry nulls its slot; slots are never compacted or
//!    reordered.
//! 2. **Epoch fencing**: draining or clearing starts a new epoch. An index
//!    from an earlier epoch never matches, so a late `drop_update` cannot
//!    remove an action queued in the next turnaround.
//! 3. **Order preservation**: draining yields the live entries in insertion
//!    order.

use std::fmt;

use crate::client_action::ClientAction;

/// Handle of a queued action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpdateIndex {
    epoch: u32,
    slot: u32,
}

impl UpdateIndex {
    /// Position of the action inside its turnaround.
    #[must_use]
    pub const fn slot(self) -> usize {
        self.slot as usize
    }
}

/// Append-only queue of [`ClientAction`]s.
#[derive(Default)]
pub struct UpdateQueue {
    slots: Vec<Option<ClientAction>>,
    live: usize,
    epoch: u32,
}

impl UpdateQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action.
    pub fn add(&mut self, action: ClientAction) -> UpdateIndex {
        let slot = self.slots.len() as u32;
        self.slots.push(Some(action));
        self.live += 1;
        UpdateIndex {
            epoch: self.epoch,
            slot,
        }
    }

    /// Withdraw a previously queued action.
    ///
    /// Returns the action if it was still queued. Indices of other entries
    /// keep their meaning.
    pub fn drop_update(&mut self, index: UpdateIndex) -> Option<ClientAction> {
        if index.epoch != self.epoch {
            return None;
        }
        let dropped = self.slots.get_mut(index.slot())?.take();
        if dropped.is_some() {
            self.live -= 1;
        }
        dropped
    }

    /// The action behind `index`, if still queued.
    #[must_use]
    pub fn get(&self, index: UpdateIndex) -> Option<&ClientAction> {
        if index.epoch != self.epoch {
            return None;
        }
        self.slots.get(index.slot()).and_then(Option::as_ref)
    }

    /// Whether any live action is queued.
    #[must_use]
    pub fn has_updates(&self) -> bool {
        self.live > 0
    }

    /// Number of live actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no live action is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live actions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ClientAction> {
        self.slots.iter().flatten()
    }

    /// Take the live actions in insertion order and start a new epoch.
    pub fn drain(&mut self) -> Vec<ClientAction> {
        let slots = std::mem::take(&mut self.slots);
        self.live = 0;
        self.epoch = self.epoch.wrapping_add(1);
        slots.into_iter().flatten().collect()
    }

    /// Discard everything and start a new epoch.
    ///
    /// Returns the number of live actions that were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.live;
        self.slots.clear();
        self.live = 0;
        self.epoch = self.epoch.wrapping_add(1);
        discarded
    }
}

impl Extend<ClientAction> for UpdateQueue {
    fn extend<T: IntoIterator<Item = ClientAction>>(&mut self, iter: T) {
        for action in iter {
            self.add(action);
        }
    }
}

impl fmt::Debug for UpdateQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateQueue")
            .field("live", &self.live)
            .field("slots", &self.slots.len())
            .field("epoch", &self.epoch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn css(id: &str) -> ClientAction {
        ClientAction::css_class_update(id, "x")
    }

    #[test]
    fn drop_keeps_other_indices() {
        let mut queue = UpdateQueue::new();
        let a = queue.add(css("a"));
        let b = queue.add(css("b"));
        let c = queue.add(css("c"));

        assert_eq!(queue.drop_update(b), Some(css("b")));
        assert_eq!(queue.get(a), Some(&css("a")));
        assert_eq!(queue.get(c), Some(&css("c")));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn double_drop_is_noop() {
        let mut queue = UpdateQueue::new();
        let a = queue.add(css("a"));
        assert!(queue.drop_update(a).is_some());
        assert!(queue.drop_update(a).is_none());
        assert!(!queue.has_updates());
    }

    #[test]
    fn stale_index_does_not_reach_next_epoch() {
        let mut queue = UpdateQueue::new();
        let old = queue.add(css("a"));
        assert_eq!(queue.drain(), vec![css("a")]);

        let fresh = queue.add(css("b"));
        assert_eq!(old.slot(), fresh.slot());
        assert!(queue.drop_update(old).is_none());
        assert_eq!(queue.get(fresh), Some(&css("b")));
    }

    #[test]
    fn clear_reports_discarded_count() {
        let mut queue = UpdateQueue::new();
        queue.extend([css("a"), css("b")]);
        let b = UpdateIndex { epoch: 0, slot: 1 };
        queue.drop_update(b);
        assert_eq!(queue.clear(), 1);
        assert!(queue.is_empty());
    }
}

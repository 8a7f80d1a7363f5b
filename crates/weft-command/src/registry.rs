#![forbid(unsafe_code)]

//! Per-session index of live command models.
//!
//! Models register under the name of the scope (view, dialog, toolbar) that
//! displays them. The registry holds weak references only, so a model that
//! is no longer displayed anywhere disappears without an explicit
//! deregistration; dead entries are pruned on access.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::command_model::CommandModel;

/// Command models of one session, grouped by scope name.
#[derive(Default)]
pub struct CommandModelRegistry {
    scopes: RefCell<BTreeMap<String, Vec<Weak<CommandModel>>>>,
}

impl CommandModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `model` under `scope`. Returns `false` if already present.
    pub fn register(&self, scope: &str, model: &Rc<CommandModel>) -> bool {
        let mut scopes = self.scopes.borrow_mut();
        let entries = scopes.entry(scope.to_owned()).or_default();
        entries.retain(|entry| entry.strong_count() > 0);
        if entries.iter().any(|entry| Weak::ptr_eq(entry, &Rc::downgrade(model))) {
            return false;
        }
        entries.push(Rc::downgrade(model));
        true
    }

    /// Remove `model` from `scope`. Returns whether it was registered.
    pub fn unregister(&self, scope: &str, model: &Rc<CommandModel>) -> bool {
        let mut scopes = self.scopes.borrow_mut();
        let Some(entries) = scopes.get_mut(scope) else {
            return false;
        };
        let before = entries.len();
        let target = Rc::downgrade(model);
        entries.retain(|entry| !Weak::ptr_eq(entry, &target));
        let removed = entries.len() != before;
        if entries.is_empty() {
            scopes.remove(scope);
        }
        removed
    }

    /// Live models of `scope`, in registration order.
    pub fn models(&self, scope: &str) -> Vec<Rc<CommandModel>> {
        let mut scopes = self.scopes.borrow_mut();
        let Some(entries) = scopes.get_mut(scope) else {
            return Vec::new();
        };
        let live: Vec<_> = entries.iter().filter_map(Weak::upgrade).collect();
        if live.len() != entries.len() {
            entries.retain(|entry| entry.strong_count() > 0);
        }
        live
    }

    /// Names of scopes with at least one live model.
    pub fn scopes(&self) -> Vec<String> {
        self.prune();
        self.scopes.borrow().keys().cloned().collect()
    }

    /// Re-evaluate the state of every live model in `scope`.
    ///
    /// Used after a change that affects executability without passing
    /// through an observed model, e.g. a switched selection.
    pub fn update_scope(&self, scope: &str) -> usize {
        let models = self.models(scope);
        for model in &models {
            model.update_state();
        }
        models.len()
    }

    /// Drop dead entries. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut scopes = self.scopes.borrow_mut();
        let mut removed = 0;
        scopes.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|entry| entry.strong_count() > 0);
            removed += before - entries.len();
            !entries.is_empty()
        });
        if removed > 0 {
            tracing::trace!(removed, "pruned command model registry");
        }
        removed
    }
}

impl fmt::Debug for CommandModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scopes = self.scopes.borrow();
        f.debug_map()
            .entries(scopes.iter().map(|(name, entries)| (name, entries.len())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_runtime::{DisplayContext, HandlerResult};

    fn model() -> Rc<CommandModel> {
        CommandModel::new(Rc::new(|_: &mut DisplayContext| HandlerResult::new()))
    }

    #[test]
    fn register_is_idempotent() {
        let registry = CommandModelRegistry::new();
        let save = model();
        assert!(registry.register("toolbar", &save));
        assert!(!registry.register("toolbar", &save));
        assert!(registry.register("dialog", &save));
        assert_eq!(registry.models("toolbar").len(), 1);
        assert_eq!(registry.scopes(), ["dialog", "toolbar"]);
    }

    #[test]
    fn dropped_models_disappear() {
        let registry = CommandModelRegistry::new();
        let keep = model();
        registry.register("toolbar", &keep);
        registry.register("toolbar", &model());

        let live = registry.models("toolbar");
        assert_eq!(live.len(), 1);
        assert!(Rc::ptr_eq(&live[0], &keep));

        drop((keep, live));
        assert_eq!(registry.prune(), 1);
        assert!(registry.scopes().is_empty());
    }

    #[test]
    fn unregister_removes_empty_scope() {
        let registry = CommandModelRegistry::new();
        let save = model();
        registry.register("toolbar", &save);
        assert!(registry.unregister("toolbar", &save));
        assert!(!registry.unregister("toolbar", &save));
        assert!(registry.scopes().is_empty());
    }

    #[test]
    fn update_scope_reaches_live_models() {
        let registry = CommandModelRegistry::new();
        let save = model();
        registry.register("toolbar", &save);
        assert_eq!(registry.update_scope("toolbar"), 1);
        assert_eq!(registry.update_scope("missing"), 0);
    }
}

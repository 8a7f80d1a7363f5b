#![forbid(unsafe_code)]

//! A button model bound to a command.
//!
//! The combined [`ExecutableState`] of a [`CommandModel`] is its local state
//! combined with an optional dynamic [`ExecutabilityModel`].
//!
//! # Design Invariants
//!
//! 1. Without state listeners the state is recomputed on every query and the
//!    dynamic model is not observed.
//! 2. The first state listener triggers one computation that is cached and
//!    does not fire an event. From then on the cache follows every local or
//!    dynamic change and fires [`EXECUTABLE_STATE_PROPERTY`] when it moves.
//! 3. Removing the last state listener drops the cache and the dynamic
//!    subscription.
//! 4. [`CommandModel::execute`] never runs the command unless the combined
//!    state is executable.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use weft_core::{Bubble, EventType, ObservableBase, PropertyListener, ResKey};
use weft_runtime::{Command, CommandArguments, DisplayContext, HandlerResult};

use crate::button_model::ButtonModel;
use crate::dirty::{self, CheckScope};
use crate::executable::{
    EXECUTABILITY_PROPERTY, ExecutabilityListener, ExecutabilityModel, ExecutableState,
    NOT_EXECUTABLE, executability_listener,
};

/// Fired when the combined state of an observed [`CommandModel`] changes.
pub const EXECUTABLE_STATE_PROPERTY: EventType<CommandModel, ExecutableState> =
    EventType::non_bubbling("executableState");

/// Listener for [`EXECUTABLE_STATE_PROPERTY`].
pub type StateListener = PropertyListener<CommandModel, ExecutableState>;

struct Dynamic {
    model: Rc<dyn ExecutabilityModel>,
    hook: Option<Rc<ExecutabilityListener>>,
}

/// Presentation and availability of one command.
pub struct CommandModel {
    this: Weak<CommandModel>,
    button: ButtonModel,
    command: Rc<dyn Command>,
    observable: ObservableBase,
    visible: Cell<bool>,
    disabled_reason: RefCell<Option<ResKey>>,
    dynamic: RefCell<Option<Dynamic>>,
    last_state: RefCell<Option<ExecutableState>>,
    check_scope: RefCell<Option<Rc<dyn CheckScope>>>,
}

impl CommandModel {
    /// A visible, executable model for `command`.
    pub fn new(command: Rc<dyn Command>) -> Rc<Self> {
        Self::with_button(command, ButtonModel::new())
    }

    pub fn with_button(command: Rc<dyn Command>, button: ButtonModel) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            button,
            command,
            observable: ObservableBase::new(),
            visible: Cell::new(true),
            disabled_reason: RefCell::new(None),
            dynamic: RefCell::new(None),
            last_state: RefCell::new(None),
            check_scope: RefCell::new(None),
        })
    }

    /// Presentation properties.
    #[must_use]
    pub fn button(&self) -> &ButtonModel {
        &self.button
    }

    #[must_use]
    pub fn command(&self) -> Rc<dyn Command> {
        self.command.clone()
    }

    // ── Local state ─────────────────────────────────────────────────────

    /// State set directly on this model.
    #[must_use]
    pub fn local_state(&self) -> ExecutableState {
        if !self.visible.get() {
            return ExecutableState::Hidden;
        }
        match &*self.disabled_reason.borrow() {
            Some(reason) => ExecutableState::Disabled(reason.clone()),
            None => ExecutableState::Executable,
        }
    }

    pub fn set_executable(&self) {
        self.disabled_reason.replace(None);
        self.update_state();
    }

    pub fn set_not_executable(&self, reason: ResKey) {
        self.disabled_reason.replace(Some(reason));
        self.update_state();
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
        self.update_state();
    }

    // ── Combined state ──────────────────────────────────────────────────

    /// The combined state, from the cache when observed.
    #[must_use]
    pub fn state(&self) -> ExecutableState {
        if let Some(state) = &*self.last_state.borrow() {
            return state.clone();
        }
        self.compute_state()
    }

    fn compute_state(&self) -> ExecutableState {
        let local = self.local_state();
        match &*self.dynamic.borrow() {
            Some(dynamic) => local.combine(dynamic.model.executability()),
            None => local,
        }
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.state().is_visible()
    }

    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.state().is_executable()
    }

    /// Why the model is not executable, if it is disabled.
    #[must_use]
    pub fn not_executable_reason(&self) -> Option<ResKey> {
        self.state().reason().cloned()
    }

    /// Whether state listeners are registered and the cache is live.
    #[must_use]
    pub fn is_observed(&self) -> bool {
        self.last_state.borrow().is_some()
    }

    /// Recompute the cached state and announce a change.
    ///
    /// Does nothing while the model is unobserved.
    pub fn update_state(&self) {
        let Some(old) = self.last_state.borrow().clone() else {
            return;
        };
        let new = self.compute_state();
        if new == old {
            return;
        }
        self.last_state.replace(Some(new.clone()));
        self.observable
            .notify_listeners(&EXECUTABLE_STATE_PROPERTY, self, &old, &new);
    }

    /// Replace the dynamic executability source.
    pub fn set_executability(&self, model: Option<Rc<dyn ExecutabilityModel>>) {
        let observed = self.is_observed();
        if observed {
            self.unhook_dynamic();
        }
        self.dynamic
            .replace(model.map(|model| Dynamic { model, hook: None }));
        if observed {
            self.hook_dynamic();
        }
        self.update_state();
    }

    // ── Listeners ───────────────────────────────────────────────────────

    /// Register a state listener. The first one starts observation.
    pub fn add_state_listener(&self, listener: Rc<StateListener>) -> bool {
        let first = !self
            .observable
            .has_listeners(EXECUTABLE_STATE_PROPERTY.key());
        let added = self
            .observable
            .add_property_listener(&EXECUTABLE_STATE_PROPERTY, listener);
        if added && first {
            self.hook_dynamic();
            self.last_state.replace(Some(self.compute_state()));
        }
        added
    }

    /// Deregister a state listener. The last one ends observation.
    pub fn remove_state_listener(&self, listener: &Rc<StateListener>) -> bool {
        let removed = self
            .observable
            .remove_property_listener(&EXECUTABLE_STATE_PROPERTY, listener);
        if removed
            && !self
                .observable
                .has_listeners(EXECUTABLE_STATE_PROPERTY.key())
        {
            self.unhook_dynamic();
            self.last_state.replace(None);
        }
        removed
    }

    fn hook_dynamic(&self) {
        let mut dynamic = self.dynamic.borrow_mut();
        let Some(dynamic) = dynamic.as_mut() else {
            return;
        };
        let this = self.this.clone();
        let hook = executability_listener(move |_, _| {
            if let Some(model) = this.upgrade() {
                model.update_state();
            }
            Bubble::Bubble
        });
        dynamic
            .model
            .observable()
            .add_property_listener(&EXECUTABILITY_PROPERTY, hook.clone());
        dynamic.hook = Some(hook);
    }

    fn unhook_dynamic(&self) {
        let mut dynamic = self.dynamic.borrow_mut();
        let Some(dynamic) = dynamic.as_mut() else {
            return;
        };
        if let Some(hook) = dynamic.hook.take() {
            dynamic
                .model
                .observable()
                .remove_property_listener(&EXECUTABILITY_PROPERTY, &hook);
        }
    }

    // ── Execution ───────────────────────────────────────────────────────

    /// Handlers whose changes must be confirmed before the command runs.
    pub fn set_check_scope(&self, scope: Option<Rc<dyn CheckScope>>) {
        self.check_scope.replace(scope);
    }

    /// Arguments for a control command that carry this model as the
    /// invoking model.
    pub fn invoking_arguments(&self, args: CommandArguments) -> CommandArguments {
        match self.this.upgrade() {
            Some(this) => args.with_invoking_model(this),
            None => args,
        }
    }

    /// Run the command if the combined state allows it.
    pub fn execute(&self, ctx: &mut DisplayContext) -> HandlerResult {
        let state = self.state();
        if !state.is_executable() {
            tracing::warn!(
                label = ?self.button.label(),
                state = %state,
                "command model invoked while not executable"
            );
            return HandlerResult::error(state.reason().cloned().unwrap_or(NOT_EXECUTABLE));
        }
        let scope = self.check_scope.borrow().clone();
        dirty::execute_checked(ctx, self.command.clone(), scope.as_deref())
    }
}

impl Command for CommandModel {
    fn execute_command(&self, ctx: &mut DisplayContext) -> HandlerResult {
        self.execute(ctx)
    }
}

impl fmt::Debug for CommandModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandModel")
            .field("label", &self.button.label())
            .field("local", &self.local_state())
            .field("observed", &self.is_observed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executable::ExecutabilitySwitch;

    fn counting() -> (Rc<Cell<u32>>, Rc<CommandModel>) {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let model = CommandModel::new(Rc::new(move |_: &mut DisplayContext| {
            r.set(r.get() + 1);
            HandlerResult::new()
        }));
        (runs, model)
    }

    fn recorder(seen: &Rc<RefCell<Vec<ExecutableState>>>) -> Rc<StateListener> {
        let seen = seen.clone();
        Rc::new(move |_: &CommandModel, _: &ExecutableState, new: &ExecutableState| {
            seen.borrow_mut().push(new.clone());
            Bubble::Bubble
        })
    }

    #[test]
    fn hidden_implies_not_executable() {
        let (_, model) = counting();
        model.set_visible(false);
        assert!(!model.is_visible());
        assert!(!model.is_executable());
        model.set_visible(true);
        assert!(model.is_executable());
    }

    #[test]
    fn first_listener_computes_without_event() {
        let (_, model) = counting();
        model.set_not_executable(ResKey::constant("locked"));
        let seen = Rc::new(RefCell::new(Vec::new()));

        assert!(!model.is_observed());
        model.add_state_listener(recorder(&seen));
        assert!(model.is_observed());
        assert!(seen.borrow().is_empty());
        assert_eq!(model.not_executable_reason(), Some(ResKey::constant("locked")));

        model.set_executable();
        assert_eq!(*seen.borrow(), [ExecutableState::Executable]);
    }

    #[test]
    fn last_removal_drops_cache_and_dynamic_hook() {
        let (_, model) = counting();
        let switch = Rc::new(ExecutabilitySwitch::default());
        model.set_executability(Some(switch.clone()));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let listener = recorder(&seen);

        model.add_state_listener(listener.clone());
        switch.set_state(ExecutableState::Hidden);
        assert_eq!(*seen.borrow(), [ExecutableState::Hidden]);

        assert!(model.remove_state_listener(&listener));
        assert!(!model.is_observed());
        switch.set_state(ExecutableState::Executable);
        assert_eq!(seen.borrow().len(), 1);
        assert!(model.is_executable());
    }

    #[test]
    fn executing_a_disabled_model_reports_error() {
        let (runs, model) = counting();
        model.set_not_executable(ResKey::constant("readonly"));
        let result = model.execute(&mut DisplayContext::new());
        assert_eq!(result.errors(), [ResKey::constant("readonly")]);
        assert_eq!(runs.get(), 0);

        model.set_visible(false);
        let result = model.execute(&mut DisplayContext::new());
        assert_eq!(result.errors(), [NOT_EXECUTABLE]);
    }

    #[test]
    fn invoking_arguments_carry_model() {
        let (_, model) = counting();
        let args = model.invoking_arguments(CommandArguments::new());
        let invoking = args.invoking_model::<CommandModel>().unwrap();
        assert!(Rc::ptr_eq(&invoking, &model));
    }
}

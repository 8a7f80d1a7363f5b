#![forbid(unsafe_code)]

//! Commands: stateless units of execution.
//!
//! A [`Command`] runs against a [`DisplayContext`] and reports through a
//! [`HandlerResult`]. Commands compose with [`CommandExt::and_then`] and
//! [`compose`] into a [`CommandChain`] that stops at the first step that does
//! not succeed. When a step suspends (e.g. it opened a confirmation dialog),
//! the remaining steps travel with the suspended result as its continuation.
//!
//! [`ControlCommand`]s are the named commands a [`Control`] accepts from the
//! client; they receive string arguments plus the reserved invoking-model
//! slot.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::context::DisplayContext;
use crate::control::Control;
use crate::handler_result::HandlerResult;

/// A stateless unit of execution.
pub trait Command {
    /// Execute against the current turnaround.
    fn execute_command(&self, ctx: &mut DisplayContext) -> HandlerResult;
}

impl<F> Command for F
where
    F: Fn(&mut DisplayContext) -> HandlerResult,
{
    fn execute_command(&self, ctx: &mut DisplayContext) -> HandlerResult {
        self(ctx)
    }
}

/// Command that does nothing and succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoNothing;

impl Command for DoNothing {
    fn execute_command(&self, _ctx: &mut DisplayContext) -> HandlerResult {
        HandlerResult::new()
    }
}

/// Sequence of commands that stops at the first non-success.
#[derive(Clone, Default)]
pub struct CommandChain {
    steps: Vec<Rc<dyn Command>>,
}

impl CommandChain {
    /// Chain the given steps.
    #[must_use]
    pub fn new(steps: Vec<Rc<dyn Command>>) -> Self {
        Self { steps }
    }

    /// Append a step.
    pub fn push(&mut self, step: Rc<dyn Command>) {
        self.steps.push(step);
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the chain has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Command for CommandChain {
    fn execute_command(&self, ctx: &mut DisplayContext) -> HandlerResult {
        let mut last = HandlerResult::new();
        for (index, step) in self.steps.iter().enumerate() {
            let mut result = step.execute_command(ctx);
            if result.is_suspended() {
                let rest = &self.steps[index + 1..];
                if !rest.is_empty() {
                    // Suspended results always accept continuations.
                    let _ = result.append_continuation(Rc::new(CommandChain::new(rest.to_vec())));
                }
                return result;
            }
            if !result.is_success() {
                return result;
            }
            last = result;
        }
        last
    }
}

impl fmt::Debug for CommandChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandChain")
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// Composition helpers for commands.
pub trait CommandExt: Command + Sized + 'static {
    /// Run `next` after `self` if `self` succeeds.
    fn and_then(self, next: impl Command + 'static) -> CommandChain {
        CommandChain::new(vec![Rc::new(self), Rc::new(next)])
    }
}

impl<C: Command + Sized + 'static> CommandExt for C {}

/// Compose commands into a chain.
pub fn compose(commands: impl IntoIterator<Item = Rc<dyn Command>>) -> CommandChain {
    CommandChain::new(commands.into_iter().collect())
}

/// Reserved argument slot carrying the model of the invoking button.
pub const INVOKING_MODEL: &str = "invokingModel";

/// Arguments of a control command.
///
/// String values come from the client. The invoking model is a server-side
/// object set by the dispatcher for commands that inspect or update the UI
/// state of the button that triggered them.
#[derive(Clone, Default)]
pub struct CommandArguments {
    values: BTreeMap<String, String>,
    invoking_model: Option<Rc<dyn Any>>,
}

impl CommandArguments {
    /// Empty arguments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a string argument.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up a string argument.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Names of the string arguments.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Whether an argument (or the reserved invoking-model slot) is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        if name == INVOKING_MODEL {
            return self.invoking_model.is_some();
        }
        self.values.contains_key(name)
    }

    /// Fill the invoking-model slot.
    pub fn set_invoking_model(&mut self, model: Rc<dyn Any>) {
        self.invoking_model = Some(model);
    }

    /// Builder form of [`set_invoking_model`](Self::set_invoking_model).
    #[must_use]
    pub fn with_invoking_model(mut self, model: Rc<dyn Any>) -> Self {
        self.invoking_model = Some(model);
        self
    }

    /// The invoking model, if it has type `T`.
    #[must_use]
    pub fn invoking_model<T: Any>(&self) -> Option<Rc<T>> {
        self.invoking_model
            .clone()
            .and_then(|model| model.downcast::<T>().ok())
    }

    /// Number of string arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no string arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for CommandArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandArguments")
            .field("values", &self.values)
            .field("invoking_model", &self.invoking_model.is_some())
            .finish()
    }
}

/// A named command accepted by a [`Control`].
pub trait ControlCommand {
    /// Command name used by the client.
    fn id(&self) -> &str;

    /// Execute on behalf of `control`.
    fn execute(
        &self,
        ctx: &mut DisplayContext,
        control: &Control,
        args: &CommandArguments,
    ) -> HandlerResult;

    /// Whether the command may run while the control's view is disabled.
    fn execute_if_view_disabled(&self) -> bool {
        false
    }
}

type ControlCommandFn = dyn Fn(&mut DisplayContext, &Control, &CommandArguments) -> HandlerResult;

/// [`ControlCommand`] backed by a closure.
pub struct FnControlCommand {
    id: String,
    run: Box<ControlCommandFn>,
    if_view_disabled: bool,
}

impl FnControlCommand {
    /// Create a command named `id`.
    pub fn new(
        id: impl Into<String>,
        run: impl Fn(&mut DisplayContext, &Control, &CommandArguments) -> HandlerResult + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            run: Box::new(run),
            if_view_disabled: false,
        }
    }

    /// Allow execution while the view is disabled.
    #[must_use]
    pub fn allow_if_view_disabled(mut self) -> Self {
        self.if_view_disabled = true;
        self
    }
}

impl ControlCommand for FnControlCommand {
    fn id(&self) -> &str {
        &self.id
    }

    fn execute(
        &self,
        ctx: &mut DisplayContext,
        control: &Control,
        args: &CommandArguments,
    ) -> HandlerResult {
        (self.run)(ctx, control, args)
    }

    fn execute_if_view_disabled(&self) -> bool {
        self.if_view_disabled
    }
}

/// Immutable name → command table of a control.
#[derive(Clone, Default)]
pub struct CommandMap {
    commands: Rc<HashMap<String, Rc<dyn ControlCommand>>>,
}

impl CommandMap {
    /// Table without commands.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up a command by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Rc<dyn ControlCommand>> {
        self.commands.get(name).cloned()
    }

    /// Whether a command with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Number of commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Command names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for CommandMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Build a command table, optionally extending `base`. Later commands
/// replace earlier ones with the same id.
pub fn command_map(
    base: Option<&CommandMap>,
    commands: impl IntoIterator<Item = Rc<dyn ControlCommand>>,
) -> CommandMap {
    let mut table: HashMap<String, Rc<dyn ControlCommand>> = base
        .map(|b| (*b.commands).clone())
        .unwrap_or_default();
    for command in commands {
        table.insert(command.id().to_string(), command);
    }
    CommandMap {
        commands: Rc::new(table),
    }
}

#![forbid(unsafe_code)]

//! Frame scopes: the id namespace and command dispatcher of one browser
//! window or frame.
//!
//! Controls receive their client-side id from the frame scope they are first
//! attached under. Controls that accept commands register as
//! [`CommandListener`]s under that id; the frame holds them weakly, so a
//! control that was dropped without detaching only leaves a stale entry that
//! the next dispatch cleans up.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::command::CommandArguments;
use crate::context::DisplayContext;
use crate::control::ControlError;
use crate::handler_result::HandlerResult;
use crate::scope::ScopeId;

/// Client-side id of a control, unique within its frame scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(String);

impl ControlId {
    /// Wrap an id received from the client.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as sent to the client.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ControlId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Receiver of commands dispatched by id.
pub trait CommandListener {
    /// Execute the named command.
    fn execute_command(
        &self,
        ctx: &mut DisplayContext,
        command: &str,
        args: &CommandArguments,
    ) -> Result<HandlerResult, ControlError>;
}

/// Failure to dispatch a command to a control.
#[derive(Debug)]
pub enum DispatchError {
    /// No live listener is registered under this id.
    UnknownListener(ControlId),
    /// The listener rejected the command.
    Control(ControlError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownListener(id) => write!(f, "no command listener registered for '{id}'"),
            Self::Control(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UnknownListener(_) => None,
            Self::Control(e) => Some(e),
        }
    }
}

impl From<ControlError> for DispatchError {
    fn from(e: ControlError) -> Self {
        Self::Control(e)
    }
}

/// Default prefix of generated control ids.
pub const DEFAULT_ID_PREFIX: &str = "c";

/// Id generator and command dispatcher of one frame.
pub struct FrameScope {
    scope_id: ScopeId,
    name: String,
    id_prefix: String,
    next_id: Cell<u64>,
    command_listeners: RefCell<HashMap<ControlId, Weak<dyn CommandListener>>>,
}

impl FrameScope {
    /// Frame named `name` with the default id prefix.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Self::with_id_prefix(name, DEFAULT_ID_PREFIX)
    }

    /// Frame generating ids as `<prefix><n>`.
    #[must_use]
    pub fn with_id_prefix(name: impl Into<String>, id_prefix: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            scope_id: ScopeId::next(),
            name: name.into(),
            id_prefix: id_prefix.into(),
            next_id: Cell::new(0),
            command_listeners: RefCell::new(HashMap::new()),
        })
    }

    /// Identity of this frame.
    #[must_use]
    pub fn scope_id(&self) -> ScopeId {
        self.scope_id
    }

    /// Frame name, used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Allocate the next control id.
    pub fn create_new_id(&self) -> ControlId {
        let n = self.next_id.get() + 1;
        self.next_id.set(n);
        ControlId(format!("{}{n}", self.id_prefix))
    }

    /// Register `listener` for commands addressed to `id`. Returns `false`
    /// if a live listener was already registered under that id.
    pub fn add_command_listener(&self, id: ControlId, listener: Weak<dyn CommandListener>) -> bool {
        let mut listeners = self.command_listeners.borrow_mut();
        let previous = listeners.insert(id, listener);
        previous.is_none_or(|p| p.strong_count() == 0)
    }

    /// Deregister the listener under `id`.
    pub fn remove_command_listener(&self, id: &ControlId) -> bool {
        self.command_listeners.borrow_mut().remove(id).is_some()
    }

    /// Whether a live listener is registered under `id`.
    #[must_use]
    pub fn has_command_listener(&self, id: &ControlId) -> bool {
        self.command_listeners
            .borrow()
            .get(id)
            .is_some_and(|l| l.strong_count() > 0)
    }

    /// Route a client command to the listener registered under `id`.
    pub fn dispatch_command(
        &self,
        ctx: &mut DisplayContext,
        id: &ControlId,
        command: &str,
        args: &CommandArguments,
    ) -> Result<HandlerResult, DispatchError> {
        let listener = self
            .command_listeners
            .borrow()
            .get(id)
            .and_then(Weak::upgrade);
        let Some(listener) = listener else {
            self.command_listeners.borrow_mut().remove(id);
            tracing::warn!(
                frame = %self.name,
                control = %id,
                command,
                "command for unknown control dropped"
            );
            return Err(DispatchError::UnknownListener(id.clone()));
        };
        tracing::trace!(frame = %self.name, control = %id, command, "dispatching command");
        Ok(listener.execute_command(ctx, command, args)?)
    }
}

impl fmt::Debug for FrameScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameScope")
            .field("name", &self.name)
            .field("next_id", &self.next_id.get())
            .field("command_listeners", &self.command_listeners.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl CommandListener for Echo {
        fn execute_command(
            &self,
            _ctx: &mut DisplayContext,
            command: &str,
            _args: &CommandArguments,
        ) -> Result<HandlerResult, ControlError> {
            if command == "ok" {
                Ok(HandlerResult::new())
            } else {
                Err(ControlError::UnknownCommand {
                    control: None,
                    command: command.to_string(),
                })
            }
        }
    }

    #[test]
    fn ids_are_sequential_with_prefix() {
        let frame = FrameScope::with_id_prefix("main", "m");
        assert_eq!(frame.create_new_id().as_str(), "m1");
        assert_eq!(frame.create_new_id().as_str(), "m2");
    }

    #[test]
    fn dispatch_reaches_live_listener() {
        let frame = FrameScope::new("main");
        let echo: Rc<dyn CommandListener> = Rc::new(Echo);
        let id = frame.create_new_id();
        assert!(frame.add_command_listener(id.clone(), Rc::downgrade(&echo)));

        let mut ctx = DisplayContext::new();
        let result = frame.dispatch_command(&mut ctx, &id, "ok", &CommandArguments::new());
        assert!(result.unwrap().is_success());

        let err = frame
            .dispatch_command(&mut ctx, &id, "nope", &CommandArguments::new())
            .unwrap_err();
        assert!(matches!(err, DispatchError::Control(ControlError::UnknownCommand { .. })));
    }

    #[test]
    fn dropped_listener_is_unknown() {
        let frame = FrameScope::new("main");
        let id = frame.create_new_id();
        {
            let echo: Rc<dyn CommandListener> = Rc::new(Echo);
            frame.add_command_listener(id.clone(), Rc::downgrade(&echo));
        }
        assert!(!frame.has_command_listener(&id));
        let err = frame
            .dispatch_command(&mut DisplayContext::new(), &id, "ok", &CommandArguments::new())
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownListener(_)));
        assert!(!frame.remove_command_listener(&id));
    }
}

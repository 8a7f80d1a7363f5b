#![forbid(unsafe_code)]

//! Outcome of executing a command.
//!
//! [`HandlerResult`] is the only return channel of command execution. It is
//! either a success, a failure carrying encoded error messages (and possibly
//! a failure cause), or a suspension whose continuations run once an
//! asynchronous confirmation (a dialog) has been resolved.

use std::fmt;
use std::rc::Rc;

use weft_core::ResKey;

use crate::command::{Command, CommandChain};
use crate::context::DisplayContext;

/// Failure cause attached to a [`HandlerResult`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandFailure {
    /// User-visible message key.
    pub key: ResKey,
    /// Technical detail for the log, never shown to users.
    pub detail: Option<String>,
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {detail}", self.key),
            None => write!(f, "{}", self.key),
        }
    }
}

/// Returned when a continuation operation is used on a result that is not
/// suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotSuspended;

impl fmt::Display for NotSuspended {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("handler result is not suspended")
    }
}

impl std::error::Error for NotSuspended {}

/// Outcome of a command execution.
#[derive(Default)]
pub struct HandlerResult {
    errors: Vec<ResKey>,
    failure: Option<CommandFailure>,
    suspended: bool,
    continuations: Vec<Rc<dyn Command>>,
    close_dialog: bool,
    error_continuations: Vec<Rc<dyn Command>>,
}

impl HandlerResult {
    /// A successful result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A failed result carrying one error message.
    #[must_use]
    pub fn error(key: ResKey) -> Self {
        let mut result = Self::new();
        result.add_error(key);
        result
    }

    /// A failed result carrying a failure cause.
    #[must_use]
    pub fn failure(key: ResKey, detail: impl fmt::Display) -> Self {
        Self {
            failure: Some(CommandFailure {
                key,
                detail: Some(detail.to_string()),
            }),
            ..Self::default()
        }
    }

    /// A result whose processing waits for user interaction.
    #[must_use]
    pub fn suspended() -> Self {
        Self {
            suspended: true,
            ..Self::default()
        }
    }

    /// No errors, no failure cause, not suspended.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.failure.is_none() && !self.suspended
    }

    /// Whether continuations are pending.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Encoded error messages in the order they were added.
    #[must_use]
    pub fn errors(&self) -> &[ResKey] {
        &self.errors
    }

    /// The failure cause, if any.
    #[must_use]
    pub fn failure_cause(&self) -> Option<&CommandFailure> {
        self.failure.as_ref()
    }

    /// Append an error message.
    pub fn add_error(&mut self, key: ResKey) {
        self.errors.push(key);
    }

    /// Append literal error text.
    pub fn add_error_text(&mut self, text: impl Into<String>) {
        self.errors.push(ResKey::text(text));
    }

    /// Set the failure cause.
    pub fn set_failure(&mut self, failure: CommandFailure) {
        self.failure = Some(failure);
    }

    /// Whether the dialog that triggered the command should close.
    #[must_use]
    pub fn shall_close_dialog(&self) -> bool {
        self.close_dialog
    }

    /// Request closing the triggering dialog.
    pub fn set_close_dialog(&mut self, close: bool) {
        self.close_dialog = close;
    }

    /// Builder form of [`set_close_dialog`](Self::set_close_dialog).
    #[must_use]
    pub fn with_close_dialog(mut self, close: bool) -> Self {
        self.close_dialog = close;
        self
    }

    /// Merge another result into this one.
    ///
    /// Errors and continuations are appended, the suspension and
    /// close-dialog flags are or-ed. The first failure cause wins; a second
    /// one is recorded as error text.
    pub fn append_result(&mut self, other: HandlerResult) {
        self.errors.extend(other.errors);
        self.close_dialog |= other.close_dialog;
        self.suspended |= other.suspended;
        self.continuations.extend(other.continuations);
        match (&self.failure, other.failure) {
            (None, failure) => self.failure = failure,
            (Some(_), Some(failure)) => {
                self.add_error_text(format!("appended failure: {failure}"));
            }
            (Some(_), None) => {}
        }
        self.error_continuations.extend(other.error_continuations);
    }

    /// Add a continuation to a suspended result.
    pub fn append_continuation(&mut self, continuation: Rc<dyn Command>) -> Result<(), NotSuspended> {
        if !self.suspended {
            return Err(NotSuspended);
        }
        self.continuations.push(continuation);
        Ok(())
    }

    /// Number of pending continuations.
    #[must_use]
    pub fn continuation_count(&self) -> usize {
        self.continuations.len()
    }

    /// Package the pending continuations as one command.
    pub fn resume_continuation(&self) -> Result<CommandChain, NotSuspended> {
        if !self.suspended {
            return Err(NotSuspended);
        }
        Ok(CommandChain::new(self.continuations.clone()))
    }

    /// Run the pending continuations in order.
    pub fn resume(self, ctx: &mut DisplayContext) -> Result<HandlerResult, NotSuspended> {
        let chain = self.resume_continuation()?;
        Ok(chain.execute_command(ctx))
    }

    /// Commands to run when the error dialog for this result is closed.
    #[must_use]
    pub fn error_continuation(&self) -> CommandChain {
        CommandChain::new(self.error_continuations.clone())
    }

    /// Queue another command after the existing error continuation. It only
    /// runs if everything queued before it succeeded.
    pub fn add_error_continuation(&mut self, command: Rc<dyn Command>) {
        self.error_continuations.push(command);
    }
}

impl fmt::Debug for HandlerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerResult")
            .field("success", &self.is_success())
            .field("errors", &self.errors)
            .field("failure", &self.failure)
            .field("suspended", &self.suspended)
            .field("continuations", &self.continuations.len())
            .field("close_dialog", &self.close_dialog)
            .finish()
    }
}

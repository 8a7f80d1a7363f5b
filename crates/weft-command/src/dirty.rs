#![forbid(unsafe_code)]

//! Veto protocol for commands that would lose unsaved input.
//!
//! Before a guarded command runs, the [`ChangeHandler`]s of its
//! [`CheckScope`] are asked whether they hold changes. If any does, the
//! command is not executed. A [`DirtyConfirmation`] dialog opens on the
//! window instead and the caller receives a suspended [`HandlerResult`].
//!
//! # Resolution
//!
//! | Choice  | Effect                                                        |
//! |---------|---------------------------------------------------------------|
//! | apply   | Run each pending handler's apply command. Failing handlers    |
//! |         | stay pending for the next click, succeeding ones are done.    |
//! | discard | Run every discard command, continuing past failures.          |
//! | cancel  | Close the dialog; the command never runs.                     |
//!
//! Once no handler is pending, the dialog closes and the original command
//! runs with dirty handling skipped on the context.
//!
//! # Failure Modes
//!
//! | Failure                          | Behavior                                   |
//! |----------------------------------|--------------------------------------------|
//! | Apply command gone at click time | Warning on the window, handler counts done |
//! | Apply command fails              | Errors returned, handler stays pending     |
//! | Discard command fails            | Errors collected, command still runs       |
//! | Choice after resolution          | No-op success                              |

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use weft_core::ResKey;
use weft_runtime::{Command, DialogId, DisplayContext, HandlerResult};

/// Title of the confirmation dialog.
pub const DIRTY_DIALOG_TITLE: ResKey = ResKey::constant("weft.dirtyHandling.title");

/// Warning shown when a handler can no longer apply its changes.
pub const APPLY_UNAVAILABLE: ResKey = ResKey::constant("weft.dirtyHandling.applyUnavailable");

/// A form-like object that may hold unsaved changes.
pub trait ChangeHandler {
    /// Whether unsaved changes exist.
    fn is_changed(&self) -> bool;

    /// User-visible name, listed in the confirmation dialog.
    fn description(&self) -> ResKey;

    /// Command storing the changes.
    ///
    /// `None` when the handler lost the ability to apply, e.g. because the
    /// edit session expired.
    fn apply_command(&self) -> Option<Rc<dyn Command>>;

    /// Command dropping the changes.
    fn discard_command(&self) -> Option<Rc<dyn Command>>;
}

/// The set of handlers a command may affect.
pub trait CheckScope {
    fn affected_handlers(&self) -> Vec<Rc<dyn ChangeHandler>>;
}

impl CheckScope for Vec<Rc<dyn ChangeHandler>> {
    fn affected_handlers(&self) -> Vec<Rc<dyn ChangeHandler>> {
        self.clone()
    }
}

/// Handlers of `scope` that currently report changes.
pub fn dirty_handlers(scope: &dyn CheckScope) -> Vec<Rc<dyn ChangeHandler>> {
    scope
        .affected_handlers()
        .into_iter()
        .filter(|handler| handler.is_changed())
        .collect()
}

/// Run `command`, unless changed handlers in `check_scope` require a
/// confirmation first.
pub fn execute_checked(
    ctx: &mut DisplayContext,
    command: Rc<dyn Command>,
    check_scope: Option<&dyn CheckScope>,
) -> HandlerResult {
    let dirty = match check_scope {
        Some(scope) if !ctx.skip_dirty_handling() => dirty_handlers(scope),
        _ => Vec::new(),
    };
    if dirty.is_empty() {
        return command.execute_command(ctx);
    }

    tracing::debug!(dirty = dirty.len(), "command deferred for confirmation");
    let confirmation = Rc::new(DirtyConfirmation {
        dialog: Cell::new(None),
        pending: RefCell::new(dirty),
        continuation: command,
        resolved: Cell::new(false),
    });
    let id = ctx
        .window_mut()
        .open_dialog(DIRTY_DIALOG_TITLE, confirmation.clone());
    confirmation.dialog.set(Some(id));
    HandlerResult::suspended()
}

/// Model of the open confirmation dialog.
pub struct DirtyConfirmation {
    dialog: Cell<Option<DialogId>>,
    pending: RefCell<Vec<Rc<dyn ChangeHandler>>>,
    continuation: Rc<dyn Command>,
    resolved: Cell<bool>,
}

impl DirtyConfirmation {
    /// Descriptions of the handlers still awaiting resolution.
    #[must_use]
    pub fn pending(&self) -> Vec<ResKey> {
        self.pending
            .borrow()
            .iter()
            .map(|handler| handler.description())
            .collect()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Whether one of the choices completed the protocol.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.get()
    }

    #[must_use]
    pub fn dialog(&self) -> Option<DialogId> {
        self.dialog.get()
    }

    /// Apply the pending handlers; run the command once none is left.
    pub fn apply(&self, ctx: &mut DisplayContext) -> HandlerResult {
        if self.resolved.get() {
            return HandlerResult::new();
        }

        let handlers = self.pending.take();
        let mut failed = Vec::new();
        let mut result = HandlerResult::new();
        for handler in handlers {
            if !handler.is_changed() {
                continue;
            }
            let Some(apply) = handler.apply_command() else {
                let description = handler.description();
                tracing::warn!(handler = %description, "apply command unavailable, handler skipped");
                ctx.window_mut()
                    .show_warning(ResKey::message(&APPLY_UNAVAILABLE, [description]));
                continue;
            };
            let outcome = ctx.with_dirty_handling_skipped(|ctx| apply.execute_command(ctx));
            if !outcome.is_success() {
                tracing::debug!(handler = %handler.description(), "apply failed, handler stays pending");
                result.append_result(outcome);
                failed.push(handler);
            }
        }

        if failed.is_empty() {
            return self.finish(ctx, result);
        }
        *self.pending.borrow_mut() = failed;
        result
    }

    /// Discard every pending handler, then run the command.
    pub fn discard(&self, ctx: &mut DisplayContext) -> HandlerResult {
        if self.resolved.get() {
            return HandlerResult::new();
        }

        let mut result = HandlerResult::new();
        for handler in self.pending.take() {
            let Some(discard) = handler.discard_command() else {
                continue;
            };
            let outcome = ctx.with_dirty_handling_skipped(|ctx| discard.execute_command(ctx));
            if !outcome.is_success() {
                tracing::warn!(handler = %handler.description(), "discard failed, continuing");
                result.append_result(outcome);
            }
        }
        self.finish(ctx, result)
    }

    /// Abandon the command.
    pub fn cancel(&self, ctx: &mut DisplayContext) -> HandlerResult {
        if !self.resolved.replace(true) {
            self.pending.borrow_mut().clear();
            self.close(ctx);
            tracing::debug!("deferred command cancelled");
        }
        HandlerResult::new().with_close_dialog(true)
    }

    fn finish(&self, ctx: &mut DisplayContext, earlier: HandlerResult) -> HandlerResult {
        self.resolved.set(true);
        self.close(ctx);
        let mut result = ctx.with_dirty_handling_skipped(|ctx| self.continuation.execute_command(ctx));
        result.append_result(earlier);
        result.set_close_dialog(true);
        result
    }

    fn close(&self, ctx: &mut DisplayContext) {
        if let Some(id) = self.dialog.get() {
            ctx.window_mut().close_dialog(id);
        }
    }
}

impl fmt::Debug for DirtyConfirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirtyConfirmation")
            .field("dialog", &self.dialog.get())
            .field("pending", &self.pending_count())
            .field("resolved", &self.resolved.get())
            .finish()
    }
}

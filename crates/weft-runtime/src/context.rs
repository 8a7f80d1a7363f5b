#![forbid(unsafe_code)]

//! Per-turnaround display context.
//!
//! A [`DisplayContext`] carries the current control scope while a request is
//! processed. Controls install themselves as the current scope only for the
//! duration of their own subtree through [`DisplayContext::render_scoped`],
//! [`DisplayContext::validate_scoped`] and [`DisplayContext::execute_scoped`].
//!
//! # Design Invariants
//!
//! 1. **Guaranteed restore**: the previous scope, phase and dirty-handling
//!    flag are restored by a drop guard, so they come back on normal return
//!    and while a panic unwinds through the scoped operation.
//! 2. **No sharing**: a context belongs to the one thread processing one
//!    turnaround; it is `!Send` and never synchronized.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Panic inside a scoped operation | Control or command bug | Scope restored, panic continues |
//! | No execution scope | Rendering outside any scope | [`ControlError::NoExecutionScope`](crate::ControlError::NoExecutionScope) from `Control::write` |

use std::fmt;
use std::rc::Rc;

use crate::client_action::ClientAction;
use crate::scope::{ControlScope, LocalScope};
use crate::update_queue::UpdateQueue;
use crate::window::WindowScope;

/// What the current turnaround is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Between scoped operations.
    #[default]
    Idle,
    /// Producing markup.
    Rendering,
    /// Collecting client updates.
    Validating,
    /// Running a command.
    Executing,
}

/// State of one request/response turnaround.
#[derive(Default)]
pub struct DisplayContext {
    scope: Option<Rc<dyn ControlScope>>,
    phase: Phase,
    skip_dirty_handling: bool,
    window: WindowScope,
}

impl DisplayContext {
    /// Context without a current scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context whose current scope is `scope`.
    #[must_use]
    pub fn with_scope(scope: Rc<dyn ControlScope>) -> Self {
        Self {
            scope: Some(scope),
            ..Self::default()
        }
    }

    /// The scope currently installed.
    #[must_use]
    pub fn execution_scope(&self) -> Option<Rc<dyn ControlScope>> {
        self.scope.clone()
    }

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run a render operation with `scope` installed.
    pub fn render_scoped<R>(
        &mut self,
        scope: Rc<dyn ControlScope>,
        op: impl FnOnce(&mut DisplayContext) -> R,
    ) -> R {
        self.scoped(scope, Phase::Rendering, op)
    }

    /// Run a revalidation with `scope` installed.
    pub fn validate_scoped<R>(
        &mut self,
        scope: Rc<dyn ControlScope>,
        op: impl FnOnce(&mut DisplayContext) -> R,
    ) -> R {
        self.scoped(scope, Phase::Validating, op)
    }

    /// Run a command with `scope` installed.
    pub fn execute_scoped<R>(
        &mut self,
        scope: Rc<dyn ControlScope>,
        op: impl FnOnce(&mut DisplayContext) -> R,
    ) -> R {
        self.scoped(scope, Phase::Executing, op)
    }

    fn scoped<R>(
        &mut self,
        scope: Rc<dyn ControlScope>,
        phase: Phase,
        op: impl FnOnce(&mut DisplayContext) -> R,
    ) -> R {
        let guard = RestoreGuard::save(self);
        guard.ctx.scope = Some(scope);
        guard.ctx.phase = phase;
        op(&mut *guard.ctx)
    }

    /// Whether dirty-form checks are bypassed for the running command.
    #[must_use]
    pub fn skip_dirty_handling(&self) -> bool {
        self.skip_dirty_handling
    }

    /// Run `op` with dirty-form checks bypassed.
    pub fn with_dirty_handling_skipped<R>(&mut self, op: impl FnOnce(&mut DisplayContext) -> R) -> R {
        let guard = RestoreGuard::save(self);
        guard.ctx.skip_dirty_handling = true;
        op(&mut *guard.ctx)
    }

    /// The window this turnaround addresses.
    #[must_use]
    pub fn window(&self) -> &WindowScope {
        &self.window
    }

    /// Mutable access to the window.
    pub fn window_mut(&mut self) -> &mut WindowScope {
        &mut self.window
    }

    /// End-of-turnaround pass: collect the client actions of every invalid
    /// control below `root`.
    pub fn revalidate(&mut self, root: &Rc<LocalScope>) -> Vec<ClientAction> {
        let mut actions = UpdateQueue::new();
        let scope: Rc<dyn ControlScope> = root.clone();
        self.validate_scoped(scope, |ctx| root.revalidate(ctx, &mut actions));
        let actions = actions.drain();
        tracing::debug!(count = actions.len(), "turnaround revalidated");
        actions
    }
}

impl fmt::Debug for DisplayContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayContext")
            .field("scope", &self.scope.as_ref().map(|s| s.scope_id()))
            .field("phase", &self.phase)
            .field("skip_dirty_handling", &self.skip_dirty_handling)
            .field("window", &self.window)
            .finish()
    }
}

/// Puts back scope, phase and the dirty-handling flag on drop.
struct RestoreGuard<'a> {
    ctx: &'a mut DisplayContext,
    scope: Option<Rc<dyn ControlScope>>,
    phase: Phase,
    skip_dirty_handling: bool,
}

impl<'a> RestoreGuard<'a> {
    fn save(ctx: &'a mut DisplayContext) -> Self {
        let scope = ctx.scope.clone();
        let phase = ctx.phase;
        let skip_dirty_handling = ctx.skip_dirty_handling;
        Self {
            ctx,
            scope,
            phase,
            skip_dirty_handling,
        }
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        self.ctx.scope = self.scope.take();
        self.ctx.phase = self.phase;
        self.ctx.skip_dirty_handling = self.skip_dirty_handling;
    }
}

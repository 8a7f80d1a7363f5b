#![forbid(unsafe_code)]

//! Server-side controls: the attach/detach lifecycle, incremental updates
//! versus full repaint, and command dispatch.
//!
//! A [`Control`] is created through [`Control::new`] and always lives in an
//! `Rc`. What it renders is supplied by a [`ControlView`] strategy; the
//! lifecycle itself is fixed.
//!
//! # Design Invariants
//!
//! 1. **Stable id**: the client-side id is taken from the first frame scope
//!    the control is attached under and never changes afterwards. Attaching
//!    under a scope of another frame is rejected.
//! 2. **One scope at a time**: attaching to the scope the control is already
//!    attached to is a no-op; any other scope is rejected until `detach`.
//! 3. **Repaint supersedes updates**: while a repaint is requested no
//!    incremental update is accepted, and requesting one discards the queued
//!    updates and detaches all children.
//! 4. **Children first on detach**: the child scope is cleared before the
//!    control announces its own detachment, so children never react to the
//!    parent's events.
//! 5. **Weak back-references**: a control refers to its scope and frame
//!    weakly; scopes own their listeners.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | View returns an error or panics | Rendering bug | Open tags closed, error logged, error fragment written |
//! | Command for detached control | Stale client | Warning logged, [`ControlError::NotAttached`] |
//! | Command while view disabled | Stale client | Warning logged, repaint requested, default result |
//! | Unknown command | Client/server mismatch | [`ControlError::UnknownCommand`] |

use std::cell::{Cell, OnceCell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use weft_core::event::listener;
use weft_core::{
    Bubble, EventType, INVALIDATION_EVENT, InvalidationListener, ObservableBase,
    PropertyObservable, panic_message,
};

use crate::client_action::ClientAction;
use crate::command::{CommandArguments, CommandMap};
use crate::context::DisplayContext;
use crate::frame::{CommandListener, ControlId, FrameScope};
use crate::handler_result::HandlerResult;
use crate::scope::{ControlScope, LocalScope, ScopeId, UpdateListener};
use crate::tag_writer::{HtmlWriter, TagWriter};
use crate::update_queue::{UpdateIndex, UpdateQueue};

bitflags! {
    /// Lifecycle flags of a control.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ControlFlags: u8 {
        /// Registered with a scope.
        const ATTACHED         = 0b01;
        /// A full redraw is due at the next revalidation.
        const REPAINT_REQUIRED = 0b10;
    }
}

/// Fired with `true` on attach and `false` on detach.
pub const ATTACHED_PROPERTY: EventType<Control, bool> = EventType::non_bubbling("attached");

/// Fired with `true` once the client view matches the server state and with
/// `false` when it went stale (repaint requested, detached).
pub const UP_TO_DATE_PROPERTY: EventType<Control, bool> = EventType::non_bubbling("upToDate");

/// CSS class carried by every control element.
pub const IS_CONTROL_CSS_CLASS: &str = "is-control";

/// CSS class of controls the client-side inspector may target.
pub const CAN_INSPECT_CSS_CLASS: &str = "can-inspect";

/// Command name that makes a control inspectable.
pub const GUI_INSPECTOR_COMMAND: &str = "gui-inspector";

/// Built-in property: the control's CSS class list.
pub const CSS_CLASS_PROPERTY: &str = "cssClass";

/// Built-in property: [`CAN_INSPECT_CSS_CLASS`] or nothing.
pub const CAN_INSPECT_CLASS_PROPERTY: &str = "canInspectClass";

/// Reads one named property of a control.
pub type PropertyAccessor = Rc<dyn Fn(&Control) -> Option<String>>;

// ─── Errors ─────────────────────────────────────────────────────────────────

/// Lifecycle and dispatch failures of a control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// Already attached to a different scope.
    ScopeConflict {
        control: Option<ControlId>,
        attached: ScopeId,
        requested: ScopeId,
    },
    /// The id was assigned by another frame scope.
    FrameMismatch { control: Option<ControlId> },
    /// The scope is not bound to a frame scope.
    NoFrameScope { requested: ScopeId },
    /// Rendering without an installed scope.
    NoExecutionScope,
    /// No command with this name.
    UnknownCommand {
        control: Option<ControlId>,
        command: String,
    },
    /// Command for a control that is not attached.
    NotAttached {
        control: Option<ControlId>,
        command: String,
    },
    /// No property with this name.
    UnknownProperty { property: String },
    /// The id was requested before any frame scope assigned one.
    MissingId,
    /// The control is being dropped.
    Released,
}

struct IdDisplay<'a>(&'a Option<ControlId>);

impl fmt::Display for IdDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "'{id}'"),
            None => f.write_str("<no id>"),
        }
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScopeConflict {
                control,
                attached,
                requested,
            } => write!(
                f,
                "control {} is attached to {attached}, cannot attach to {requested}",
                IdDisplay(control)
            ),
            Self::FrameMismatch { control } => write!(
                f,
                "control {} got its id from a different frame scope",
                IdDisplay(control)
            ),
            Self::NoFrameScope { requested } => write!(f, "{requested} has no frame scope"),
            Self::NoExecutionScope => f.write_str("no execution scope installed"),
            Self::UnknownCommand { control, command } => write!(
                f,
                "no command '{command}' registered in control {}",
                IdDisplay(control)
            ),
            Self::NotAttached { control, command } => write!(
                f,
                "command '{command}' for detached control {}",
                IdDisplay(control)
            ),
            Self::UnknownProperty { property } => write!(f, "no property '{property}'"),
            Self::MissingId => f.write_str("control id requested before assignment"),
            Self::Released => f.write_str("control is being dropped"),
        }
    }
}

impl std::error::Error for ControlError {}

/// A view failed to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError {
    message: String,
}

impl RenderError {
    /// Failure with a technical message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The technical message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RenderError {}

impl From<ControlError> for RenderError {
    fn from(e: ControlError) -> Self {
        Self::new(e.to_string())
    }
}

// ─── View strategy ──────────────────────────────────────────────────────────

/// What a control renders, and its hooks into the lifecycle.
pub trait ControlView {
    /// Render the control's markup.
    fn write(
        &self,
        ctx: &mut DisplayContext,
        out: &mut dyn TagWriter,
        control: &Control,
    ) -> Result<(), RenderError>;

    /// The single CSS class defining the client-side structure.
    fn type_css_class(&self) -> Option<&str> {
        None
    }

    /// Additional state-dependent CSS classes.
    fn append_css_classes(&self, _control: &Control, _classes: &mut Vec<String>) {}

    /// Properties contributed to the control's property table.
    fn properties(&self) -> Vec<(&'static str, PropertyAccessor)> {
        Vec::new()
    }

    /// Called after the control registered with its scope.
    fn attached(&self, _control: &Control) {}

    /// Called after the control left its scope.
    fn detached(&self, _control: &Control) {}

    /// Placeholder written when rendering failed.
    fn write_error_fragment(&self, out: &mut dyn TagWriter, control: &Control, reason: &str) {
        out.begin_tag("span");
        if let Some(id) = control.id() {
            out.write_attribute("id", id.as_str());
        }
        out.write_attribute("class", "render-error");
        out.write_attribute("title", reason);
        out.text("!");
        out.end_tag();
    }

    /// Name used in logs.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<F> ControlView for F
where
    F: Fn(&mut DisplayContext, &mut dyn TagWriter, &Control) -> Result<(), RenderError>,
{
    fn write(
        &self,
        ctx: &mut DisplayContext,
        out: &mut dyn TagWriter,
        control: &Control,
    ) -> Result<(), RenderError> {
        self(ctx, out, control)
    }
}

/// Pin a closure to the [`ControlView`] signature.
pub fn view_fn<F>(render: F) -> F
where
    F: Fn(&mut DisplayContext, &mut dyn TagWriter, &Control) -> Result<(), RenderError> + 'static,
{
    render
}

// ─── Control ────────────────────────────────────────────────────────────────

struct Attachment {
    scope_id: ScopeId,
    scope: Weak<dyn ControlScope>,
    frame: Weak<FrameScope>,
}

#[derive(Clone)]
struct InvalidationSource {
    source: Weak<dyn PropertyObservable>,
    listener: Rc<InvalidationListener>,
}

/// Node of the server-side UI tree.
pub struct Control {
    this: Weak<Control>,
    scope_id: ScopeId,
    id: OnceCell<ControlId>,
    id_frame: RefCell<Weak<FrameScope>>,
    flags: Cell<ControlFlags>,
    attachment: RefCell<Option<Attachment>>,
    local_scope: RefCell<Option<Rc<LocalScope>>>,
    commands: CommandMap,
    pending: RefCell<UpdateQueue>,
    observable: ObservableBase,
    invalidation: RefCell<Vec<InvalidationSource>>,
    properties: BTreeMap<&'static str, PropertyAccessor>,
    view: Box<dyn ControlView>,
}

impl Control {
    /// Control without commands.
    pub fn new(view: impl ControlView + 'static) -> Rc<Self> {
        Self::with_commands(view, CommandMap::empty())
    }

    /// Control accepting `commands` from the client.
    pub fn with_commands(view: impl ControlView + 'static, commands: CommandMap) -> Rc<Self> {
        let mut properties: BTreeMap<&'static str, PropertyAccessor> = BTreeMap::new();
        properties.insert(
            CSS_CLASS_PROPERTY,
            Rc::new(|control: &Control| Some(control.css_classes())),
        );
        properties.insert(
            CAN_INSPECT_CLASS_PROPERTY,
            Rc::new(|control: &Control| {
                control
                    .can_inspect()
                    .then(|| CAN_INSPECT_CSS_CLASS.to_string())
            }),
        );
        properties.extend(view.properties());

        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            scope_id: ScopeId::next(),
            id: OnceCell::new(),
            id_frame: RefCell::new(Weak::new()),
            flags: Cell::new(ControlFlags::empty()),
            attachment: RefCell::new(None),
            local_scope: RefCell::new(None),
            commands,
            pending: RefCell::new(UpdateQueue::new()),
            observable: ObservableBase::new(),
            invalidation: RefCell::new(Vec::new()),
            properties,
            view: Box::new(view),
        })
    }

    // ── Accessors ──

    /// The client-side id, once assigned.
    #[must_use]
    pub fn id(&self) -> Option<&ControlId> {
        self.id.get()
    }

    /// The client-side id, or [`ControlError::MissingId`].
    pub fn require_id(&self) -> Result<&ControlId, ControlError> {
        self.id.get().ok_or(ControlError::MissingId)
    }

    /// Take an id from `frame` unless one is assigned already.
    pub fn fetch_id(&self, frame: &Rc<FrameScope>) -> &ControlId {
        self.id.get_or_init(|| {
            *self.id_frame.borrow_mut() = Rc::downgrade(frame);
            frame.create_new_id()
        })
    }

    /// Current lifecycle flags.
    #[must_use]
    pub fn flags(&self) -> ControlFlags {
        self.flags.get()
    }

    /// Whether registered with a scope.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.flags.get().contains(ControlFlags::ATTACHED)
    }

    /// Whether a full redraw is due.
    #[must_use]
    pub fn is_repaint_requested(&self) -> bool {
        self.flags.get().contains(ControlFlags::REPAINT_REQUIRED)
    }

    /// The scope this control is attached to.
    #[must_use]
    pub fn scope(&self) -> Option<Rc<dyn ControlScope>> {
        self.attachment
            .borrow()
            .as_ref()
            .and_then(|a| a.scope.upgrade())
    }

    /// The control's command table.
    #[must_use]
    pub fn commands(&self) -> &CommandMap {
        &self.commands
    }

    /// The view strategy.
    #[must_use]
    pub fn view(&self) -> &dyn ControlView {
        self.view.as_ref()
    }

    /// The child scope, if one was created.
    #[must_use]
    pub fn local_scope(&self) -> Option<Rc<LocalScope>> {
        self.local_scope.borrow().clone()
    }

    fn set_flag(&self, flag: ControlFlags, on: bool) {
        let mut flags = self.flags.get();
        flags.set(flag, on);
        self.flags.set(flags);
    }

    fn as_scope(&self) -> Option<Rc<dyn ControlScope>> {
        self.this.upgrade().map(|this| this as Rc<dyn ControlScope>)
    }

    // ── Attach / detach ──

    /// Register with `scope`.
    ///
    /// Returns `Ok(false)` if already attached to this very scope.
    pub fn attach(&self, scope: &Rc<dyn ControlScope>) -> Result<bool, ControlError> {
        let requested = scope.scope_id();
        if let Some(current) = self.attachment.borrow().as_ref() {
            if current.scope_id == requested {
                return Ok(false);
            }
            return Err(ControlError::ScopeConflict {
                control: self.id().cloned(),
                attached: current.scope_id,
                requested,
            });
        }

        let frame = scope
            .frame_scope()
            .ok_or(ControlError::NoFrameScope { requested })?;
        if self.id.get().is_some()
            && !std::ptr::eq(self.id_frame.borrow().as_ptr(), Rc::as_ptr(&frame))
        {
            return Err(ControlError::FrameMismatch {
                control: self.id().cloned(),
            });
        }
        let this = self.this.upgrade().ok_or(ControlError::Released)?;
        let id = self.fetch_id(&frame).clone();

        *self.attachment.borrow_mut() = Some(Attachment {
            scope_id: requested,
            scope: Rc::downgrade(scope),
            frame: Rc::downgrade(&frame),
        });
        self.set_flag(ControlFlags::ATTACHED, true);

        scope.add_update_listener(this);
        if !self.commands.is_empty() {
            let listener: Weak<dyn CommandListener> = self.this.clone();
            if !frame.add_command_listener(id.clone(), listener) {
                tracing::warn!(control = %id, frame = frame.name(), "replaced live command listener");
            }
        }
        self.register_invalidation_listeners();

        self.set_flag(ControlFlags::REPAINT_REQUIRED, false);
        self.view.attached(self);
        self.observable
            .notify_listeners(&ATTACHED_PROPERTY, self, &false, &true);
        self.observable
            .notify_listeners(&UP_TO_DATE_PROPERTY, self, &false, &true);

        self.disable_child_scopes(scope.is_scope_disabled());

        tracing::trace!(control = %id, scope = %requested, "control attached");
        Ok(true)
    }

    /// Leave the current scope. Returns `false` if not attached.
    pub fn detach(&self) -> bool {
        if !self.is_attached() {
            return false;
        }
        self.set_flag(ControlFlags::ATTACHED, false);

        let (scope, frame) = match self.attachment.borrow().as_ref() {
            Some(a) => (a.scope.upgrade(), a.frame.upgrade()),
            None => (None, None),
        };

        self.unregister_invalidation_listeners();
        if !self.commands.is_empty() {
            if let (Some(frame), Some(id)) = (frame, self.id()) {
                frame.remove_command_listener(id);
            }
        }
        if let (Some(scope), Some(this)) = (scope, self.this.upgrade()) {
            let listener: Rc<dyn UpdateListener> = this;
            scope.remove_update_listener(&listener);
        }

        self.clear_local_scope();
        self.pending.borrow_mut().clear();
        self.set_flag(ControlFlags::REPAINT_REQUIRED, false);

        self.observable
            .notify_listeners(&UP_TO_DATE_PROPERTY, self, &true, &false);
        self.view.detached(self);
        self.observable
            .notify_listeners(&ATTACHED_PROPERTY, self, &true, &false);

        *self.attachment.borrow_mut() = None;
        tracing::trace!(control = ?self.id().map(ControlId::as_str), "control detached");
        true
    }

    // ── Updates ──

    /// Whether revalidation would produce client actions.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.is_repaint_requested()
            || self.has_updates()
            || self.local_scope().is_some_and(|local| local.has_updates())
    }

    /// Whether incremental updates are queued.
    #[must_use]
    pub fn has_updates(&self) -> bool {
        self.pending.borrow().has_updates()
    }

    /// Queue an incremental update.
    ///
    /// Returns `None` while detached or while a repaint is requested; the
    /// update is then subsumed by the next full render.
    pub fn add_update(&self, action: ClientAction) -> Option<UpdateIndex> {
        if !self.is_attached() || self.is_repaint_requested() {
            return None;
        }
        Some(self.pending.borrow_mut().add(action))
    }

    /// Withdraw a queued update.
    pub fn drop_update(&self, index: UpdateIndex) -> Option<ClientAction> {
        self.pending.borrow_mut().drop_update(index)
    }

    /// Schedule a full redraw. Returns `false` if not attached or already
    /// requested.
    pub fn request_repaint(&self) -> bool {
        if !self.is_attached() || self.is_repaint_requested() {
            return false;
        }
        self.set_flag(ControlFlags::REPAINT_REQUIRED, true);
        self.observable
            .notify_listeners(&UP_TO_DATE_PROPERTY, self, &true, &false);

        let discarded = self.pending.borrow_mut().clear();
        self.clear_local_scope();
        tracing::trace!(control = ?self.id().map(ControlId::as_str), discarded, "repaint requested");
        true
    }

    /// Leave repaint mode after a full render.
    fn reset(&self) {
        if self.is_repaint_requested() {
            self.set_flag(ControlFlags::REPAINT_REQUIRED, false);
            self.observable
                .notify_listeners(&UP_TO_DATE_PROPERTY, self, &false, &true);
        }
    }

    fn render_replacement(&self, ctx: &mut DisplayContext) -> Option<ClientAction> {
        let id = self.id()?.clone();
        let mut out = HtmlWriter::new();
        match self.scope() {
            Some(scope) => ctx.render_scoped(scope, |ctx| self.write(ctx, &mut out)),
            None => self.write(ctx, &mut out),
        }
        Some(ClientAction::element_replacement(id.as_str(), out.into_string()))
    }

    // ── Rendering ──

    /// Render this control into `out`.
    ///
    /// Attaches to the context's execution scope first. Any failure, an
    /// error or a panic of the view, is contained here: the writer is
    /// unwound to its entry depth and an error fragment takes the control's
    /// place.
    pub fn write(&self, ctx: &mut DisplayContext, out: &mut dyn TagWriter) {
        let depth = out.depth();
        let outcome = catch_unwind(AssertUnwindSafe(|| self.write_scoped(ctx, out)));
        let reason = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };
        out.end_all(depth);
        tracing::error!(
            control = ?self.id().map(ControlId::as_str),
            view = self.view.type_name(),
            reason = %reason,
            "rendering control failed"
        );
        self.view.write_error_fragment(out, self, &reason);
    }

    fn write_scoped(&self, ctx: &mut DisplayContext, out: &mut dyn TagWriter) -> Result<(), RenderError> {
        let scope = ctx.execution_scope().ok_or(ControlError::NoExecutionScope)?;
        self.attach(&scope)?;
        self.reset();
        self.pending.borrow_mut().clear();
        let this = self.as_scope().ok_or(ControlError::Released)?;
        ctx.render_scoped(this, |ctx| self.view.write(ctx, out, self))
    }

    /// Write the `id` and `class` attributes of the control's root element.
    pub fn write_control_attributes(&self, out: &mut dyn TagWriter) {
        if let Some(id) = self.id() {
            out.write_attribute("id", id.as_str());
        }
        out.write_attribute("class", &self.css_classes());
    }

    /// Whether the client-side inspector may target this control.
    #[must_use]
    pub fn can_inspect(&self) -> bool {
        self.commands.contains(GUI_INSPECTOR_COMMAND)
    }

    /// The control's CSS class list.
    #[must_use]
    pub fn css_classes(&self) -> String {
        let mut classes = Vec::new();
        if let Some(type_class) = self.view.type_css_class() {
            classes.push(type_class.to_string());
        }
        classes.push(IS_CONTROL_CSS_CLASS.to_string());
        if self.can_inspect() {
            classes.push(CAN_INSPECT_CSS_CLASS.to_string());
        }
        self.view.append_css_classes(self, &mut classes);
        classes.retain(|c| !c.is_empty());
        classes.join(" ")
    }

    /// Action bringing the client's class attribute up to date.
    #[must_use]
    pub fn create_css_update(&self) -> Option<ClientAction> {
        let id = self.id()?;
        Some(ClientAction::css_class_update(id.as_str(), self.css_classes()))
    }

    // ── Properties ──

    /// Read a named property.
    pub fn property_value(&self, name: &str) -> Result<Option<String>, ControlError> {
        let accessor = self
            .properties
            .get(name)
            .ok_or_else(|| ControlError::UnknownProperty {
                property: name.to_string(),
            })?;
        Ok(accessor(self))
    }

    /// Names of all readable properties, sorted.
    #[must_use]
    pub fn available_properties(&self) -> Vec<&'static str> {
        self.properties.keys().copied().collect()
    }

    // ── Invalidation ──

    /// Repaint whenever `source` is invalidated while this control is
    /// attached.
    pub fn listen_for_invalidation<O: PropertyObservable + 'static>(&self, source: &Rc<O>) {
        let control = self.this.clone();
        let repaint: Rc<InvalidationListener> =
            listener(move |_: &ObservableBase, _: &(), _: &()| {
                if let Some(control) = control.upgrade() {
                    control.request_repaint();
                }
                Bubble::Bubble
            });
        if self.is_attached() {
            source
                .observable()
                .add_property_listener(&INVALIDATION_EVENT, repaint.clone());
        }
        let source: Rc<dyn PropertyObservable> = source.clone();
        let source: Weak<dyn PropertyObservable> = Rc::downgrade(&source);
        self.invalidation.borrow_mut().push(InvalidationSource {
            source,
            listener: repaint,
        });
    }

    fn register_invalidation_listeners(&self) {
        let sources = self.invalidation.borrow().clone();
        for entry in sources {
            if let Some(source) = entry.source.upgrade() {
                source
                    .observable()
                    .add_property_listener(&INVALIDATION_EVENT, entry.listener);
            }
        }
    }

    fn unregister_invalidation_listeners(&self) {
        let sources = self.invalidation.borrow().clone();
        for entry in sources {
            if let Some(source) = entry.source.upgrade() {
                source
                    .observable()
                    .remove_property_listener(&INVALIDATION_EVENT, &entry.listener);
            }
        }
    }

    // ── Commands ──

    /// Whether the scope this control is rendered in is disabled.
    #[must_use]
    pub fn is_view_disabled(&self) -> bool {
        self.scope().is_some_and(|scope| scope.is_scope_disabled())
    }

    /// Run a named command of this control.
    pub fn execute_command(
        &self,
        ctx: &mut DisplayContext,
        name: &str,
        args: &CommandArguments,
    ) -> Result<HandlerResult, ControlError> {
        let Some(command) = self.commands.get(name) else {
            return Err(ControlError::UnknownCommand {
                control: self.id().cloned(),
                command: name.to_string(),
            });
        };

        if !self.is_attached() {
            tracing::warn!(
                control = ?self.id().map(ControlId::as_str),
                command = name,
                "command for detached control dropped"
            );
            return Err(ControlError::NotAttached {
                control: self.id().cloned(),
                command: name.to_string(),
            });
        }

        if self.is_view_disabled() && !command.execute_if_view_disabled() {
            tracing::warn!(
                control = ?self.id().map(ControlId::as_str),
                view = self.view.type_name(),
                command = name,
                arguments = ?args.names().collect::<Vec<_>>(),
                "command triggered while view is disabled"
            );
            self.request_repaint();
            return Ok(HandlerResult::new());
        }

        let this = self.as_scope().ok_or(ControlError::Released)?;
        Ok(ctx.execute_scoped(this, |ctx| command.execute(ctx, self, args)))
    }

    // ── Child scope ──

    fn init_local_scope(&self) -> Rc<LocalScope> {
        if let Some(local) = self.local_scope() {
            return local;
        }
        let local = Rc::new(LocalScope::new(self.frame_scope(), self.is_view_disabled()));
        *self.local_scope.borrow_mut() = Some(local.clone());
        local
    }

    fn clear_local_scope(&self) {
        let local = self.local_scope.borrow_mut().take();
        if let Some(local) = local {
            local.clear();
        }
    }

    fn disable_child_scopes(&self, disabled: bool) {
        if let Some(local) = self.local_scope() {
            local.disable_scope(disabled);
        }
    }
}

impl ControlScope for Control {
    fn scope_id(&self) -> ScopeId {
        self.scope_id
    }

    fn frame_scope(&self) -> Option<Rc<FrameScope>> {
        let attached = self
            .attachment
            .borrow()
            .as_ref()
            .and_then(|a| a.frame.upgrade());
        attached.or_else(|| self.id_frame.borrow().upgrade())
    }

    fn add_update_listener(&self, listener: Rc<dyn UpdateListener>) -> bool {
        self.init_local_scope().add_update_listener(listener)
    }

    fn remove_update_listener(&self, listener: &Rc<dyn UpdateListener>) -> bool {
        self.local_scope()
            .is_some_and(|local| local.remove_update_listener(listener))
    }

    fn disable_scope(&self, disabled: bool) {
        self.disable_child_scopes(disabled);
    }

    fn is_scope_disabled(&self) -> bool {
        self.local_scope()
            .is_some_and(|local| local.is_scope_disabled())
    }
}

impl UpdateListener for Control {
    fn is_invalid(&self) -> bool {
        Control::is_invalid(self)
    }

    fn revalidate(&self, ctx: &mut DisplayContext, actions: &mut UpdateQueue) {
        if !self.is_attached() {
            return;
        }
        if self.is_repaint_requested() {
            // Children are rebuilt by the replacement render, their updates
            // are obsolete.
            self.clear_local_scope();
            if let Some(action) = self.render_replacement(ctx) {
                actions.add(action);
            }
        } else if let Some(this) = self.as_scope() {
            ctx.validate_scoped(this, |ctx| {
                actions.extend(self.pending.borrow_mut().drain());
                if let Some(local) = self.local_scope() {
                    if local.has_updates() {
                        local.revalidate(ctx, actions);
                    }
                }
            });
        }
        self.reset();
    }

    fn notify_disabled(&self, disabled: bool) {
        self.disable_child_scopes(disabled);
    }

    fn notify_detached(&self) {
        self.detach();
    }
}

impl CommandListener for Control {
    fn execute_command(
        &self,
        ctx: &mut DisplayContext,
        command: &str,
        args: &CommandArguments,
    ) -> Result<HandlerResult, ControlError> {
        Control::execute_command(self, ctx, command, args)
    }
}

impl PropertyObservable for Control {
    fn observable(&self) -> &ObservableBase {
        &self.observable
    }
}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Control")
            .field("id", &self.id())
            .field("view", &self.view.type_name())
            .field("flags", &self.flags.get())
            .field("pending", &self.pending.borrow().len())
            .field("commands", &self.commands)
            .finish()
    }
}

#![forbid(unsafe_code)]

//! Control runtime: the server-side UI tree and its turnaround protocol.
//!
//! # Role in weft
//! `weft-runtime` owns everything that happens between a request entering
//! through a [`DisplayContext`] and the list of [`ClientAction`]s going back
//! to the browser:
//!
//! - [`Control`] attach/detach, repaint requests and incremental updates.
//! - [`LocalScope`] / [`FrameScope`] registration and id assignment.
//! - Scoped rendering, validation and execution on the [`DisplayContext`].
//! - [`Command`] composition and the [`HandlerResult`] return channel.
//!
//! # Turnaround
//!
//! ```text
//! request ─► FrameScope::dispatch_command ─► Control::execute_command
//!                                                 │ (models change)
//!                                                 ▼
//!            add_update / request_repaint on affected controls
//!                                                 │
//! response ◄─ DisplayContext::revalidate(root) ◄──┘
//! ```
//!
//! Everything here is single-threaded: one context serves one turnaround on
//! one thread, and the types are `!Send`.

pub mod client_action;
pub mod command;
pub mod context;
pub mod control;
pub mod frame;
pub mod handler_result;
pub mod scope;
pub mod tag_writer;
pub mod update_queue;
pub mod window;

pub use client_action::ClientAction;
pub use command::{
    Command, CommandArguments, CommandChain, CommandExt, CommandMap, ControlCommand, DoNothing,
    FnControlCommand, INVOKING_MODEL, command_map, compose,
};
pub use context::{DisplayContext, Phase};
pub use control::{
    ATTACHED_PROPERTY, CAN_INSPECT_CSS_CLASS, Control, ControlError, ControlFlags, ControlView,
    GUI_INSPECTOR_COMMAND, IS_CONTROL_CSS_CLASS, PropertyAccessor, RenderError,
    UP_TO_DATE_PROPERTY, view_fn,
};
pub use frame::{CommandListener, ControlId, DispatchError, FrameScope};
pub use handler_result::{CommandFailure, HandlerResult, NotSuspended};
pub use scope::{ControlScope, LocalScope, ScopeId, UpdateListener};
pub use tag_writer::{HtmlWriter, TagWriter};
pub use update_queue::{UpdateIndex, UpdateQueue};
pub use window::{DialogId, WindowScope};

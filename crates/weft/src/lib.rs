#![forbid(unsafe_code)]

//! weft public facade crate.
//!
//! This crate provides the stable surface area for applications. It
//! re-exports common types from the internal crates and offers a prelude
//! for day-to-day usage.

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use weft_core::{
    Bubble, EventType, ListenerKey, ObservableBase, PropertyListener, PropertyObservable, ResKey,
};

// --- Runtime re-exports ----------------------------------------------------

pub use weft_runtime::{
    ClientAction, Command, CommandArguments, Control, ControlError, ControlScope, ControlView,
    DispatchError, DisplayContext, FrameScope, HandlerResult, LocalScope, RenderError, TagWriter,
    UpdateQueue, WindowScope,
};

// --- Command re-exports ----------------------------------------------------

pub use weft_command::{
    ButtonModel, ChangeHandler, CommandModel, CommandModelRegistry, DirtyConfirmation,
    ExecutabilityModel, ExecutabilitySwitch, ExecutableState,
};

// --- Report re-exports -----------------------------------------------------

#[cfg(feature = "report")]
pub use weft_report::{
    CreatorRunner, QueueReporter, ReportCreator, ReportError, ReportId, ReportJob, ReportMode,
    ReportPosition, ReportQueueConfig, ReportType,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for weft applications.
#[derive(Debug)]
pub enum Error {
    /// Control lifecycle or command failure.
    Control(ControlError),
    /// A request addressed a control that could not take it.
    Dispatch(DispatchError),
    /// A view failed to render.
    Render(RenderError),
    /// Report queue failure.
    #[cfg(feature = "report")]
    Report(ReportError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control(err) => write!(f, "{err}"),
            Self::Dispatch(err) => write!(f, "{err}"),
            Self::Render(err) => write!(f, "{err}"),
            #[cfg(feature = "report")]
            Self::Report(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Control(err) => Some(err),
            Self::Dispatch(err) => Some(err),
            Self::Render(err) => Some(err),
            #[cfg(feature = "report")]
            Self::Report(err) => Some(err),
        }
    }
}

impl From<ControlError> for Error {
    fn from(err: ControlError) -> Self {
        Self::Control(err)
    }
}

impl From<DispatchError> for Error {
    fn from(err: DispatchError) -> Self {
        Self::Dispatch(err)
    }
}

impl From<RenderError> for Error {
    fn from(err: RenderError) -> Self {
        Self::Render(err)
    }
}

#[cfg(feature = "report")]
impl From<ReportError> for Error {
    fn from(err: ReportError) -> Self {
        Self::Report(err)
    }
}

/// Standard result type for weft APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Bubble, ButtonModel, Command, CommandArguments, CommandModel, Control, ControlView,
        DisplayContext, Error, FrameScope, HandlerResult, LocalScope, PropertyObservable, ResKey,
        Result, TagWriter,
    };

    pub use crate::{command, core, runtime};
}

pub use weft_command as command;
pub use weft_core as core;
#[cfg(feature = "report")]
pub use weft_report as report;
pub use weft_runtime as runtime;

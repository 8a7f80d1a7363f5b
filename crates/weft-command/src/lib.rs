#![forbid(unsafe_code)]

//! Command models: what a button shows, whether it may run, and the
//! confirmation that guards it against losing unsaved input.
//!
//! # Role in weft
//! A [`CommandModel`] wraps a [`weft_runtime::Command`] with presentation
//! state ([`ButtonModel`]) and a combined [`ExecutableState`]. Executing it
//! goes through [`dirty::execute_checked`], which may defer the command
//! behind a [`DirtyConfirmation`] dialog.

pub mod button_model;
pub mod command_model;
pub mod dirty;
pub mod executable;
pub mod registry;

pub use button_model::{
    ACCESS_KEY_PROPERTY, ButtonModel, CSS_CLASSES_PROPERTY, DISABLED_IMAGE_PROPERTY,
    IMAGE_PROPERTY, LABEL_PROPERTY, TOOLTIP_CAPTION_PROPERTY, TOOLTIP_PROPERTY,
};
pub use command_model::{CommandModel, EXECUTABLE_STATE_PROPERTY, StateListener};
pub use dirty::{
    APPLY_UNAVAILABLE, ChangeHandler, CheckScope, DIRTY_DIALOG_TITLE, DirtyConfirmation,
    dirty_handlers, execute_checked,
};
pub use executable::{
    EXECUTABILITY_PROPERTY, ExecutabilityListener, ExecutabilityModel, ExecutabilitySwitch,
    ExecutableState, NOT_EXECUTABLE, executability_listener,
};
pub use registry::CommandModelRegistry;

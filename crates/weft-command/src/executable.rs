#![forbid(unsafe_code)]

//! Tri-state command availability and its observable sources.
//!
//! # Design Invariants
//!
//! 1. A hidden command is never executable: [`ExecutableState`] has no
//!    "invisible but executable" variant.
//! 2. [`ExecutableState::combine`] is monotonic. Combining never yields a
//!    state less restrictive than either input
//!    (`Hidden > Disabled > Executable`).
//! 3. On equal restrictiveness the receiver wins, so a local reason is kept
//!    over a dynamic one.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use weft_core::{Bubble, EventType, ObservableBase, PropertyListener, PropertyObservable, ResKey};

/// Default reason for a disabled command.
pub const NOT_EXECUTABLE: ResKey = ResKey::constant("weft.command.notExecutable");

/// Fired by an [`ExecutabilityModel`] when its state changes.
pub const EXECUTABILITY_PROPERTY: EventType<dyn ExecutabilityModel, ExecutableState> =
    EventType::non_bubbling("executability");

/// Listener for [`EXECUTABILITY_PROPERTY`].
pub type ExecutabilityListener = PropertyListener<dyn ExecutabilityModel, ExecutableState>;

/// Wrap a closure over `(old, new)` as an [`ExecutabilityListener`].
pub fn executability_listener(
    f: impl Fn(&ExecutableState, &ExecutableState) -> Bubble + 'static,
) -> Rc<ExecutabilityListener> {
    Rc::new(
        move |_: &(dyn ExecutabilityModel + 'static),
              old: &ExecutableState,
              new: &ExecutableState| f(old, new),
    )
}

/// Availability of a command.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ExecutableState {
    /// Visible and executable.
    #[default]
    Executable,
    /// Visible, but disabled for the given reason.
    Disabled(ResKey),
    /// Not displayed at all.
    Hidden,
}

impl ExecutableState {
    /// Disabled with the default reason.
    #[must_use]
    pub fn not_executable() -> Self {
        Self::Disabled(NOT_EXECUTABLE)
    }

    /// Whether the command is displayed.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::Hidden)
    }

    /// Whether the command may run.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::Executable)
    }

    /// Why the command is disabled.
    #[must_use]
    pub fn reason(&self) -> Option<&ResKey> {
        match self {
            Self::Disabled(reason) => Some(reason),
            _ => None,
        }
    }

    /// Rank in the `Executable < Disabled < Hidden` order.
    #[must_use]
    pub fn restrictiveness(&self) -> u8 {
        match self {
            Self::Executable => 0,
            Self::Disabled(_) => 1,
            Self::Hidden => 2,
        }
    }

    /// The more restrictive of both states; `self` on a tie.
    #[must_use]
    pub fn combine(self, other: ExecutableState) -> ExecutableState {
        if other.restrictiveness() > self.restrictiveness() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for ExecutableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executable => f.write_str("executable"),
            Self::Disabled(reason) => write!(f, "disabled({reason})"),
            Self::Hidden => f.write_str("hidden"),
        }
    }
}

/// A dynamic source of [`ExecutableState`].
///
/// Implementors fire [`EXECUTABILITY_PROPERTY`] on their observable whenever
/// [`executability`](Self::executability) would answer differently.
pub trait ExecutabilityModel: PropertyObservable {
    /// The current state.
    fn executability(&self) -> ExecutableState;
}

/// An [`ExecutabilityModel`] whose state is set explicitly.
#[derive(Debug, Default)]
pub struct ExecutabilitySwitch {
    observable: ObservableBase,
    state: RefCell<ExecutableState>,
}

impl ExecutabilitySwitch {
    /// A switch starting in `state`.
    #[must_use]
    pub fn new(state: ExecutableState) -> Self {
        Self {
            observable: ObservableBase::new(),
            state: RefCell::new(state),
        }
    }

    /// Change the state. Returns whether it differed.
    pub fn set_state(&self, state: ExecutableState) -> bool {
        if *self.state.borrow() == state {
            return false;
        }
        let old = self.state.replace(state.clone());
        let sender: &(dyn ExecutabilityModel + 'static) = self;
        self.observable
            .notify_listeners(&EXECUTABILITY_PROPERTY, sender, &old, &state);
        true
    }
}

impl PropertyObservable for ExecutabilitySwitch {
    fn observable(&self) -> &ObservableBase {
        &self.observable
    }
}

impl ExecutabilityModel for ExecutabilitySwitch {
    fn executability(&self) -> ExecutableState {
        self.state.borrow().clone()
    }
}

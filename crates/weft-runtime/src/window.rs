#![forbid(unsafe_code)]

//! Server-side state of one browser window: open dialogs and pending
//! blocking warnings.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use weft_core::ResKey;

/// Handle of an open dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DialogId(u64);

struct OpenDialog {
    id: DialogId,
    title: ResKey,
    model: Rc<dyn Any>,
}

/// Dialog stack and warning list of a window.
#[derive(Default)]
pub struct WindowScope {
    dialogs: Vec<OpenDialog>,
    warnings: Vec<ResKey>,
    next_dialog: u64,
}

impl WindowScope {
    /// Window without dialogs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a modal dialog on top of the stack.
    pub fn open_dialog<D: Any>(&mut self, title: ResKey, model: Rc<D>) -> DialogId {
        self.next_dialog += 1;
        let id = DialogId(self.next_dialog);
        tracing::debug!(dialog = id.0, title = %title, "dialog opened");
        self.dialogs.push(OpenDialog {
            id,
            title,
            model: model as Rc<dyn Any>,
        });
        id
    }

    /// Close a dialog. Returns `false` if it was not open.
    pub fn close_dialog(&mut self, id: DialogId) -> bool {
        let Some(position) = self.dialogs.iter().position(|d| d.id == id) else {
            return false;
        };
        self.dialogs.remove(position);
        tracing::debug!(dialog = id.0, "dialog closed");
        true
    }

    /// Whether the dialog is still open.
    #[must_use]
    pub fn is_open(&self, id: DialogId) -> bool {
        self.dialogs.iter().any(|d| d.id == id)
    }

    /// Model of an open dialog, if it has type `D`.
    #[must_use]
    pub fn dialog<D: Any>(&self, id: DialogId) -> Option<Rc<D>> {
        self.dialogs
            .iter()
            .find(|d| d.id == id)
            .and_then(|d| d.model.clone().downcast::<D>().ok())
    }

    /// Title of an open dialog.
    #[must_use]
    pub fn dialog_title(&self, id: DialogId) -> Option<&ResKey> {
        self.dialogs.iter().find(|d| d.id == id).map(|d| &d.title)
    }

    /// Open dialogs whose model has type `D`, bottom first.
    #[must_use]
    pub fn dialogs_of<D: Any>(&self) -> Vec<(DialogId, Rc<D>)> {
        self.dialogs
            .iter()
            .filter_map(|d| d.model.clone().downcast::<D>().ok().map(|m| (d.id, m)))
            .collect()
    }

    /// The dialog on top of the stack.
    #[must_use]
    pub fn top_dialog(&self) -> Option<DialogId> {
        self.dialogs.last().map(|d| d.id)
    }

    /// Number of open dialogs.
    #[must_use]
    pub fn dialog_count(&self) -> usize {
        self.dialogs.len()
    }

    /// Queue a blocking warning for the user.
    pub fn show_warning(&mut self, message: ResKey) {
        tracing::debug!(message = %message, "warning queued");
        self.warnings.push(message);
    }

    /// Warnings not yet delivered.
    #[must_use]
    pub fn warnings(&self) -> &[ResKey] {
        &self.warnings
    }

    /// Take the pending warnings for delivery.
    pub fn take_warnings(&mut self) -> Vec<ResKey> {
        std::mem::take(&mut self.warnings)
    }
}

impl fmt::Debug for WindowScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowScope")
            .field("dialogs", &self.dialogs.iter().map(|d| d.id).collect::<Vec<_>>())
            .field("warnings", &self.warnings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialogs_are_typed_and_closable() {
        let mut window = WindowScope::new();
        let a = window.open_dialog(ResKey::constant("confirm"), Rc::new(7u32));
        let b = window.open_dialog(ResKey::constant("note"), Rc::new(String::from("x")));

        assert_eq!(window.top_dialog(), Some(b));
        assert_eq!(window.dialog::<u32>(a).as_deref(), Some(&7));
        assert!(window.dialog::<u32>(b).is_none());
        assert_eq!(window.dialogs_of::<String>().len(), 1);

        assert!(window.close_dialog(a));
        assert!(!window.close_dialog(a));
        assert_eq!(window.dialog_count(), 1);
    }

    #[test]
    fn warnings_are_taken_once() {
        let mut window = WindowScope::new();
        window.show_warning(ResKey::constant("w"));
        assert_eq!(window.take_warnings().len(), 1);
        assert!(window.warnings().is_empty());
    }
}

#![forbid(unsafe_code)]

//! Presentation state of a button.
//!
//! Every setter compares against the current value and fires the matching
//! property event only on an actual change. Values are cloned out of the
//! model, never borrowed, so listeners are free to call setters again.

use std::cell::RefCell;
use std::fmt;

use weft_core::{EventType, ObservableBase, PropertyObservable};

/// Label text.
pub const LABEL_PROPERTY: EventType<ButtonModel, Option<String>> = EventType::new("label");
/// Image reference for the enabled button.
pub const IMAGE_PROPERTY: EventType<ButtonModel, Option<String>> = EventType::new("image");
/// Image reference for the disabled button.
pub const DISABLED_IMAGE_PROPERTY: EventType<ButtonModel, Option<String>> =
    EventType::new("disabledImage");
/// Tooltip body.
pub const TOOLTIP_PROPERTY: EventType<ButtonModel, Option<String>> = EventType::new("tooltip");
/// Tooltip caption.
pub const TOOLTIP_CAPTION_PROPERTY: EventType<ButtonModel, Option<String>> =
    EventType::new("tooltipCaption");
/// Keyboard access key.
pub const ACCESS_KEY_PROPERTY: EventType<ButtonModel, Option<char>> = EventType::new("accessKey");
/// Additional CSS classes, space separated.
pub const CSS_CLASSES_PROPERTY: EventType<ButtonModel, String> = EventType::new("cssClasses");

/// Observable presentation properties of a button.
#[derive(Default)]
pub struct ButtonModel {
    observable: ObservableBase,
    label: RefCell<Option<String>>,
    image: RefCell<Option<String>>,
    disabled_image: RefCell<Option<String>>,
    tooltip: RefCell<Option<String>>,
    tooltip_caption: RefCell<Option<String>>,
    access_key: RefCell<Option<char>>,
    css_classes: RefCell<String>,
}

impl ButtonModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A model with a label.
    #[must_use]
    pub fn labelled(label: impl Into<String>) -> Self {
        let model = Self::new();
        *model.label.borrow_mut() = Some(label.into());
        model
    }

    fn update<V: Clone + PartialEq + 'static>(
        &self,
        cell: &RefCell<V>,
        event: &EventType<ButtonModel, V>,
        value: V,
    ) -> bool {
        if *cell.borrow() == value {
            return false;
        }
        let old = cell.replace(value.clone());
        self.observable.notify_listeners(event, self, &old, &value);
        true
    }

    pub fn label(&self) -> Option<String> {
        self.label.borrow().clone()
    }

    pub fn set_label(&self, label: Option<String>) -> bool {
        self.update(&self.label, &LABEL_PROPERTY, label)
    }

    pub fn image(&self) -> Option<String> {
        self.image.borrow().clone()
    }

    pub fn set_image(&self, image: Option<String>) -> bool {
        self.update(&self.image, &IMAGE_PROPERTY, image)
    }

    /// Image for the disabled state; falls back to [`image`](Self::image).
    pub fn disabled_image(&self) -> Option<String> {
        self.disabled_image.borrow().clone().or_else(|| self.image())
    }

    pub fn set_disabled_image(&self, image: Option<String>) -> bool {
        self.update(&self.disabled_image, &DISABLED_IMAGE_PROPERTY, image)
    }

    pub fn tooltip(&self) -> Option<String> {
        self.tooltip.borrow().clone()
    }

    pub fn set_tooltip(&self, tooltip: Option<String>) -> bool {
        self.update(&self.tooltip, &TOOLTIP_PROPERTY, tooltip)
    }

    pub fn tooltip_caption(&self) -> Option<String> {
        self.tooltip_caption.borrow().clone()
    }

    pub fn set_tooltip_caption(&self, caption: Option<String>) -> bool {
        self.update(&self.tooltip_caption, &TOOLTIP_CAPTION_PROPERTY, caption)
    }

    pub fn access_key(&self) -> Option<char> {
        *self.access_key.borrow()
    }

    pub fn set_access_key(&self, key: Option<char>) -> bool {
        self.update(&self.access_key, &ACCESS_KEY_PROPERTY, key)
    }

    pub fn css_classes(&self) -> String {
        self.css_classes.borrow().clone()
    }

    pub fn set_css_classes(&self, classes: impl Into<String>) -> bool {
        self.update(&self.css_classes, &CSS_CLASSES_PROPERTY, classes.into())
    }
}

impl PropertyObservable for ButtonModel {
    fn observable(&self) -> &ObservableBase {
        &self.observable
    }
}

impl fmt::Debug for ButtonModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ButtonModel")
            .field("label", &self.label.borrow())
            .field("image", &self.image.borrow())
            .field("access_key", &self.access_key.borrow())
            .finish_non_exhaustive()
    }
}

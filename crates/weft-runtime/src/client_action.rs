#![forbid(unsafe_code)]

//! Incremental browser-side instructions.

use std::fmt;

/// One DOM mutation sent to the client at the end of a turnaround.
///
/// The wire encoding belongs to the client-side runtime; this type only
/// carries the instruction and its target element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Replace the element and its subtree with freshly rendered markup.
    ElementReplacement {
        /// Target element id.
        element_id: String,
        /// Markup of the replacement.
        fragment: String,
    },
    /// Overwrite the `class` attribute of an element.
    CssClassUpdate {
        /// Target element id.
        element_id: String,
        /// Space separated class list.
        css_classes: String,
    },
    /// Set a single element property.
    PropertyUpdate {
        /// Target element id.
        element_id: String,
        /// Property name.
        property: String,
        /// New value.
        value: String,
    },
    /// Invoke a client-side function.
    JsFunctionCall {
        /// Element the call is addressed to.
        target: String,
        /// Function name.
        function: String,
        /// Literal arguments.
        args: Vec<String>,
    },
}

impl ClientAction {
    /// Full replacement of `element_id`.
    #[must_use]
    pub fn element_replacement(element_id: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self::ElementReplacement {
            element_id: element_id.into(),
            fragment: fragment.into(),
        }
    }

    /// CSS class update of `element_id`.
    #[must_use]
    pub fn css_class_update(element_id: impl Into<String>, css_classes: impl Into<String>) -> Self {
        Self::CssClassUpdate {
            element_id: element_id.into(),
            css_classes: css_classes.into(),
        }
    }

    /// Property update of `element_id`.
    #[must_use]
    pub fn property_update(
        element_id: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::PropertyUpdate {
            element_id: element_id.into(),
            property: property.into(),
            value: value.into(),
        }
    }

    /// Client-side function call.
    #[must_use]
    pub fn js_function_call(
        target: impl Into<String>,
        function: impl Into<String>,
        args: impl IntoIterator<Item = String>,
    ) -> Self {
        Self::JsFunctionCall {
            target: target.into(),
            function: function.into(),
            args: args.into_iter().collect(),
        }
    }

    /// Id of the element this action addresses.
    #[must_use]
    pub fn target_id(&self) -> &str {
        match self {
            Self::ElementReplacement { element_id, .. }
            | Self::CssClassUpdate { element_id, .. }
            | Self::PropertyUpdate { element_id, .. } => element_id,
            Self::JsFunctionCall { target, .. } => target,
        }
    }

    /// Whether this action redraws the whole element.
    #[must_use]
    pub fn is_replacement(&self) -> bool {
        matches!(self, Self::ElementReplacement { .. })
    }
}

impl fmt::Display for ClientAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ElementReplacement { element_id, fragment } => {
                write!(f, "replace #{element_id} ({} bytes)", fragment.len())
            }
            Self::CssClassUpdate {
                element_id,
                css_classes,
            } => write!(f, "class #{element_id} = \"{css_classes}\""),
            Self::PropertyUpdate {
                element_id,
                property,
                value,
            } => write!(f, "set #{element_id}.{property} = \"{value}\""),
            Self::JsFunctionCall {
                target,
                function,
                args,
            } => write!(f, "call #{target} {function}({})", args.join(", ")),
        }
    }
}

#![forbid(unsafe_code)]

//! Resource keys for user-visible messages.
//!
//! Failures shown to users always carry a [`ResKey`] that the (external)
//! resource layer resolves to localized text. Literal text is supported for
//! messages that come from outside the resource bundles.

use std::borrow::Cow;
use std::fmt;

/// Reference to a localizable message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResKey {
    /// Plain resource key.
    Key(Cow<'static, str>),
    /// Resource key with positional arguments.
    Message {
        /// Resource key of the message template.
        key: Cow<'static, str>,
        /// Arguments substituted into the template.
        args: Vec<String>,
    },
    /// Literal text that bypasses resource lookup.
    Text(String),
}

impl ResKey {
    /// A key known at compile time.
    #[must_use]
    pub const fn constant(key: &'static str) -> Self {
        Self::Key(Cow::Borrowed(key))
    }

    /// A key computed at runtime.
    #[must_use]
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(Cow::Owned(key.into()))
    }

    /// Literal text.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// A message template with arguments.
    #[must_use]
    pub fn message<I, A>(key: &ResKey, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: fmt::Display,
    {
        let args = args.into_iter().map(|a| a.to_string()).collect();
        match key {
            Self::Key(k) | Self::Message { key: k, .. } => Self::Message {
                key: k.clone(),
                args,
            },
            Self::Text(t) => Self::Message {
                key: Cow::Owned(t.clone()),
                args,
            },
        }
    }

    /// The underlying resource key, if this is not literal text.
    #[must_use]
    pub fn resource_key(&self) -> Option<&str> {
        match self {
            Self::Key(k) | Self::Message { key: k, .. } => Some(&**k),
            Self::Text(_) => None,
        }
    }

    /// Message arguments (empty for plain keys and text).
    #[must_use]
    pub fn args(&self) -> &[String] {
        match self {
            Self::Message { args, .. } => args,
            _ => &[],
        }
    }
}

impl fmt::Display for ResKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => f.write_str(k),
            Self::Message { key, args } => write!(f, "{key}({})", args.join(", ")),
            Self::Text(t) => write!(f, "\"{t}\""),
        }
    }
}

impl From<&'static str> for ResKey {
    fn from(key: &'static str) -> Self {
        Self::constant(key)
    }
}

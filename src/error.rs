//! Crate-wide error type.

use std::borrow::Cow;

/// Errors raised by observation, template compilation and view binding.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An array was observed before any array observer factory was registered.
    #[error(
        "array observation is not enabled; call `enable_array_observation()` or \
         `set_array_observer_factory()` before binding to arrays"
    )]
    ArrayObservationDisabled,

    /// A binding expression failed while being evaluated.
    #[error("binding evaluation failed: {0}")]
    Binding(Cow<'static, str>),

    /// A directive's target id does not resolve against an instantiated fragment.
    #[error("template target `{0}` does not resolve to a node")]
    UnresolvedTarget(String),

    /// The markup handed to the template compiler is malformed.
    #[error("markup error at byte {offset}: {message}")]
    Markup {
        /// Byte offset into the joined markup.
        offset: usize,
        /// What went wrong.
        message: String,
    },

    /// A value of the wrong kind reached a place that needs a specific kind.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// The kind that was required.
        expected: &'static str,
        /// The kind that was supplied.
        found: &'static str,
    },

    /// One or more queued updates failed during a flush.
    #[error("{} queued update(s) failed", .0.len())]
    Flush(Vec<Error>),
}

impl Error {
    /// Build a [`Error::Binding`] from any message.
    pub fn binding(message: impl Into<Cow<'static, str>>) -> Self {
        Error::Binding(message.into())
    }

    pub(crate) fn markup(offset: usize, message: impl Into<String>) -> Self {
        Error::Markup {
            offset,
            message: message.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

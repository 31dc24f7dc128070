//! Error Types
//!
//! Three kinds of failure exist in this crate:
//!
//! - Usage errors (bad interpolated values, missing keys) are never returned.
//!   They are reported through `tracing` and rendering degrades gracefully.
//! - Subscriber errors are caught at the effect boundary and logged; they are
//!   wrapped in [`EffectError`] while in flight.
//! - Structural errors ([`TemplateError`]) are fatal. Continuing would corrupt
//!   the live tree, so they are raised with [`std::panic::panic_any`] and
//!   re-raised through effect isolation.

use std::fmt;

use thiserror::Error;

/// Boxed error type accepted from fallible effect bodies.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// A fatal defect in how a template binding was used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A bound getter changed between producing text and producing nodes.
    #[error("binding expected {expected} content but the getter produced {found}")]
    StructuralMismatch {
        expected: BindingKind,
        found: BindingKind,
    },
}

impl TemplateError {
    /// Abort the current binding.
    ///
    /// The error is logged first so the defect is visible even when the
    /// panic payload is swallowed by a test harness.
    pub(crate) fn raise(self) -> ! {
        tracing::error!(error = %self, "Fatal template binding error");
        std::panic::panic_any(self)
    }
}

/// The shape of content a template binding manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// A single text node.
    Text,
    /// A keyed list of node trees.
    Nodes,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKind::Text => f.write_str("text"),
            BindingKind::Nodes => f.write_str("node-tree"),
        }
    }
}

/// A failure raised by an effect body.
#[derive(Debug, Error)]
pub enum EffectError {
    /// The body returned an error.
    #[error("{0}")]
    Failed(String),

    /// The body panicked.
    #[error("panicked: {0}")]
    Panicked(String),
}

impl EffectError {
    /// Build an error from a caught panic payload.
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        EffectError::Panicked(message)
    }
}

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

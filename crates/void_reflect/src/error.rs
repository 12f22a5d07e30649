//! Error types for the reflection engine

use thiserror::Error;

/// Result type for reflection operations
pub type Result<T> = std::result::Result<T, ReflectError>;

/// Errors that can occur while registering or invoking reflected items
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReflectError {
    /// Name or type id already registered in this scope
    #[error("{kind} '{name}' is already registered")]
    RegistrationConflict { kind: &'static str, name: String },

    /// Getter/setter pair or handler factory failed cross-validation
    #[error("signature mismatch for '{name}': {reason}")]
    SignatureMismatch { name: String, reason: String },

    /// Too few arguments with no default to fill the gap, or too many
    #[error("'{method}' expects {expected} argument(s), got {got}")]
    ArgumentCountMismatch {
        method: String,
        expected: String,
        got: usize,
    },

    /// An argument or the result cannot be converted to the declared type
    #[error("'{method}': cannot convert {position} from {found} to {expected}")]
    TypeConversionFailure {
        method: String,
        position: String,
        expected: String,
        found: String,
    },

    /// The first argument of a member call does not resolve to the owning type
    #[error("'{method}' requires a {expected} this pointer, got {found}")]
    InvalidThisPointer {
        method: String,
        expected: String,
        found: String,
    },

    /// A default value was requested where none is registered
    #[error("'{method}' has no default value for argument {index}")]
    MissingDefaultValue { method: String, index: usize },

    /// Lookup by name failed
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    /// Operation not supported by the event bus policy
    #[error(transparent)]
    BusPolicy(#[from] void_event::BusError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl ReflectError {
    pub(crate) fn conflict(kind: &'static str, name: impl Into<String>) -> Self {
        Self::RegistrationConflict {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn signature(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SignatureMismatch {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Fill in the method name on errors raised below the method level
    pub(crate) fn for_method(mut self, name: &str) -> Self {
        match &mut self {
            Self::ArgumentCountMismatch { method, .. }
            | Self::TypeConversionFailure { method, .. }
            | Self::InvalidThisPointer { method, .. }
            | Self::MissingDefaultValue { method, .. } => {
                if method.is_empty() {
                    *method = name.to_string();
                }
            }
            _ => {}
        }
        self
    }

    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }
}

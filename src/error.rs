//! Centralized error handling for refgraph.
//!
//! Every fallible operation in the crate returns [`Result`]. The engine itself
//! distinguishes two severities:
//!
//! 1. **Fatal errors** abort the whole (de)serialize call: I/O failures, frame
//!    corruption, bincode failures on the root payload.
//! 2. **Member-level errors** ([`GraphError::TypeMismatch`], [`GraphError::Modifier`],
//!    [`GraphError::TypeNotRegistered`] for nested values, ...) are caught by the
//!    orchestrator, logged through `tracing`, and the affected member is skipped.
//!    The model keeps whatever value it had before.
//!
//! Reference-resolution failures (a `graph_ref_id` pointing at nothing) are not
//! errors at all: the member deserializes as `Null` and an error is logged.
//!
//! ## Examples
//!
//! ```rust
//! use refgraph::GraphError;
//!
//! fn describe(err: &GraphError) -> &'static str {
//!     match err {
//!         GraphError::Io(_) => "stream failure",
//!         GraphError::Format(_) => "corrupted frame",
//!         GraphError::MemberNotRegistered { .. } => "bad member name",
//!         _ => "other",
//!     }
//! }
//! # assert_eq!(describe(&GraphError::Format("x".into())), "corrupted frame");
//! ```

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for refgraph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// The master error enum covering all failure domains of the engine.
///
/// The type is `Clone`; I/O errors are wrapped in an `Arc` for that reason.
#[derive(Debug, Clone)]
pub enum GraphError {
    /// Failure of the caller's stream or of a file opened by the facade.
    Io(Arc<io::Error>),

    /// Bincode could not encode or decode a payload.
    Serialization(String),

    /// Compression or decompression failure, or an unknown algorithm id.
    Compression(String),

    /// The frame is invalid: wrong magic bytes, unsupported version,
    /// checksum mismatch, truncated data, or an unexpected root type.
    Format(String),

    /// A member name was requested that the model type does not declare.
    MemberNotRegistered {
        /// Wire name of the model type.
        type_name: String,
        /// The requested member.
        member: String,
    },

    /// No factory is registered for a wire type name.
    TypeNotRegistered(String),

    /// A value could not be coerced into the member's type.
    TypeMismatch {
        /// What the member expected.
        expected: Cow<'static, str>,
        /// What the value actually was.
        found: Cow<'static, str>,
    },

    /// A serializer modifier reported a failure.
    Modifier(String),

    /// An invariant of the engine was broken. Please report these as bugs.
    Internal(String),
}

impl GraphError {
    /// Shorthand for [`GraphError::MemberNotRegistered`].
    pub fn member_not_registered(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        Self::MemberNotRegistered {
            type_name: type_name.into(),
            member: member.into(),
        }
    }

    /// Shorthand for [`GraphError::TypeMismatch`].
    pub fn type_mismatch(
        expected: impl Into<Cow<'static, str>>,
        found: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Returns true when the error must abort the whole call rather than a
    /// single member.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Serialization(_) | Self::Compression(_) | Self::Format(_) | Self::Internal(_)
        )
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::Serialization(s) => write!(f, "Serialization Error: {s}"),
            Self::Compression(s) => write!(f, "Compression Error: {s}"),
            Self::Format(s) => write!(f, "Format Error: {s}"),
            Self::MemberNotRegistered { type_name, member } => {
                write!(f, "Member '{member}' is not registered on type '{type_name}'")
            }
            Self::TypeNotRegistered(name) => write!(f, "Type '{name}' is not registered"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "Type Mismatch: expected {expected}, found {found}")
            }
            Self::Modifier(s) => write!(f, "Modifier Error: {s}"),
            Self::Internal(s) => write!(f, "Internal Logic Error: {s}"),
        }
    }
}

impl std::error::Error for GraphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for GraphError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<bincode::error::EncodeError> for GraphError {
    fn from(err: bincode::error::EncodeError) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for GraphError {
    fn from(err: bincode::error::DecodeError) -> Self {
        Self::Serialization(err.to_string())
    }
}

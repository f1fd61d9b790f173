//! Error types for capsule serialization and deserialization.

use std::fmt;

/// Errors that can occur while writing a capsule.
#[derive(Debug)]
pub enum SerializeError {
    /// A field could not be converted to a [`Value`](super::Value).
    FieldError { field: String, message: String },
    /// The encoder rejected the capsule tree.
    FormatError(String),
    /// Writing the encoded bytes failed.
    Io(std::io::Error),
}

impl fmt::Display for SerializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldError { field, message } => {
                write!(f, "failed to serialize field '{field}': {message}")
            }
            Self::FormatError(msg) => write!(f, "format error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl std::error::Error for SerializeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SerializeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// Errors that can occur while reading a capsule.
///
/// Absent fields are never an error: every read names a default. These
/// variants cover data that is present but malformed.
#[derive(Debug)]
pub enum DeserializeError {
    /// A field value had an unexpected type.
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },
    /// A field was present but its content is invalid.
    InvalidData { field: String, message: String },
    /// The bytes are not a valid capsule tree in the requested format.
    FormatError(String),
    /// Shared reference ID not found in the deduplication cache.
    InvalidSharedRef { id: u32 },
    /// Reading the encoded bytes failed.
    Io(std::io::Error),
}

impl DeserializeError {
    pub(crate) fn mismatch(field: &str, expected: &str, found: &super::Value) -> Self {
        Self::TypeMismatch {
            field: field.to_owned(),
            expected: expected.to_owned(),
            found: found.kind().to_owned(),
        }
    }

    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidData {
            field: field.to_owned(),
            message: message.into(),
        }
    }
}

impl fmt::Display for DeserializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch {
                field,
                expected,
                found,
            } => {
                write!(
                    f,
                    "type mismatch for field '{field}': expected {expected}, found {found}"
                )
            }
            Self::InvalidData { field, message } => {
                write!(f, "invalid data in field '{field}': {message}")
            }
            Self::FormatError(msg) => write!(f, "format error: {msg}"),
            Self::InvalidSharedRef { id } => write!(f, "invalid shared reference id {id}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl std::error::Error for DeserializeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DeserializeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

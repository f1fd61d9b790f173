//! Byte encodings of capsule trees.
//!
//! Each [`Format`] variant exists only when its cargo feature is enabled:
//! `serialize-bincode` (default) or `serialize-ron`.

use super::error::{DeserializeError, SerializeError};
use super::value::Value;

/// Supported capsule encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// RON (Rusty Object Notation) - human-readable text format.
    #[cfg(feature = "serialize-ron")]
    Ron,
    /// Bincode - compact binary format.
    #[cfg(feature = "serialize-bincode")]
    Bincode,
}

/// Encode a capsule value to bytes in the given format.
#[allow(unused_variables)]
pub fn encode(value: &Value, format: Format) -> Result<Vec<u8>, SerializeError> {
    match format {
        #[cfg(feature = "serialize-ron")]
        Format::Ron => ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
            .map(|s| s.into_bytes())
            .map_err(|e| SerializeError::FormatError(e.to_string())),
        #[cfg(feature = "serialize-bincode")]
        Format::Bincode => {
            bincode::serialize(value).map_err(|e| SerializeError::FormatError(e.to_string()))
        }
    }
}

/// Decode bytes in the given format to a capsule value.
#[allow(unused_variables)]
pub fn decode(bytes: &[u8], format: Format) -> Result<Value, DeserializeError> {
    match format {
        #[cfg(feature = "serialize-ron")]
        Format::Ron => {
            let s = std::str::from_utf8(bytes)
                .map_err(|e| DeserializeError::FormatError(e.to_string()))?;
            ron::from_str(s).map_err(|e| DeserializeError::FormatError(e.to_string()))
        }
        #[cfg(feature = "serialize-bincode")]
        Format::Bincode => {
            bincode::deserialize(bytes).map_err(|e| DeserializeError::FormatError(e.to_string()))
        }
    }
}

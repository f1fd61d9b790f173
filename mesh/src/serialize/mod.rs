//! Capsule serialization.
//!
//! This module provides:
//!
//! - [`Savable`] - objects that write themselves to an [`OutputCapsule`] and
//!   read themselves back from an [`InputCapsule`]
//! - [`Exporter`] / [`Importer`] - session state with shared-savable
//!   deduplication by pointer identity
//! - [`CapsuleEnum`] - enumerations persisted by variant name
//! - [`Value`] - format-agnostic intermediate representation
//! - [`Format`] / [`encode`] / [`decode`] - format-specific I/O (feature-gated)

mod capsule;
mod error;
mod format;
pub mod value;

pub use capsule::{
    CapsuleEnum, Exporter, Importer, InputCapsule, OutputCapsule, Savable, SharedIdentity,
};
pub use error::{DeserializeError, SerializeError};
pub use format::Format;
pub use value::Value;

// Re-export format functions
pub use format::{decode, encode};

//! Format-agnostic intermediate value representation.
//!
//! A capsule is a [`Value::Map`] of named fields. Nested savables become
//! nested maps, and shared savables (such as vertex buffers referenced from
//! several places) are written once as [`Value::Shared`] and referenced
//! afterwards with [`Value::SharedRef`].

use serde::{Deserialize, Serialize};

/// Format-agnostic value representation for capsule fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
    Bytes(Vec<u8>),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
    /// Map keyed by small integers (e.g. buffer type ordinals).
    IntMap(Vec<(i32, Value)>),
    /// First occurrence of a shared savable (inline data + dedup ID).
    Shared {
        id: u32,
        inner: Box<Value>,
    },
    /// Back-reference to a previously written shared savable (dedup ID).
    SharedRef(u32),
}

impl Value {
    /// Short name of the variant, used in type mismatch diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Bool(_) => "Bool",
            Self::Int(_) => "Int",
            Self::Float(_) => "Float",
            Self::String(_) => "String",
            Self::Bytes(_) => "Bytes",
            Self::IntArray(_) => "IntArray",
            Self::FloatArray(_) => "FloatArray",
            Self::List(_) => "List",
            Self::Map(_) => "Map",
            Self::IntMap(_) => "IntMap",
            Self::Shared { .. } => "Shared",
            Self::SharedRef(_) => "SharedRef",
        }
    }

    /// Look up a named field if this value is a map.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Map(entries) => entries.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

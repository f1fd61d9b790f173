use std::fmt;

use super::Mode;
use crate::buffer::VertexBufferType;

/// Errors raised by mesh buffer management and derived-data builders.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshError {
    /// A buffer of this type is already attached. Use `replace_buffer` instead.
    BufferTypeAlreadySet(VertexBufferType),
    /// The operation needs a float `Position` buffer.
    MissingPositions,
    /// The operation is not defined for this primitive mode.
    UnsupportedMode(Mode),
    /// An index refers past the end of the position buffer.
    IndexOutOfRange { index: usize, vertex_count: usize },
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshError::BufferTypeAlreadySet(ty) => {
                write!(f, "a {ty:?} buffer is already set on this mesh")
            }
            MeshError::MissingPositions => write!(f, "mesh has no float position buffer"),
            MeshError::UnsupportedMode(mode) => {
                write!(f, "operation not supported for {mode:?} meshes")
            }
            MeshError::IndexOutOfRange {
                index,
                vertex_count,
            } => write!(
                f,
                "index {index} out of range for {vertex_count} vertices"
            ),
        }
    }
}

impl std::error::Error for MeshError {}

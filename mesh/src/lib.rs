//! # RedLilium Mesh
//!
//! CPU-side mesh data for RedLilium Engine: vertex buffer ownership, copy
//! policies and capsule persistence.
//!
//! A [`Mesh`] holds its vertex buffers through [`SharedBuffer`] handles, so
//! several meshes can alias the same attribute data. The copy policies on
//! [`Mesh`] decide which buffers a copy shares with its source, and the
//! [`cloner`] module lets a mesh take part in whole object-graph copies.
//!
//! Persistence goes through the [`serialize`] capsule layer, which encodes
//! to bincode (default) or RON depending on the enabled features.

pub mod bound;
pub mod buffer;
pub mod cloner;
pub mod collision;
pub mod mesh;
pub mod serialize;

pub use bound::BoundingVolume;
pub use buffer::{SharedBuffer, Usage, VertexBuffer, VertexBufferType, VertexData, VertexFormat};
pub use cloner::{CloneResolve, Cloner, GraphClone};
pub use collision::CollisionTree;
pub use mesh::{BufferSet, Mesh, MeshError, Mode};
pub use serialize::{DeserializeError, Format, SerializeError};

/// Mesh library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

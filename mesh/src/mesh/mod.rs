//! The mesh entity.
//!
//! This module provides:
//!
//! - [`Mesh`] - Vertex buffers plus primitive layout and derived data
//! - [`BufferSet`] - Buffers keyed by type, kept in attachment order
//! - [`Mode`] - Primitive assembly mode
//! - [`MeshError`] - Buffer management and derived-data errors
//!
//! Copy policies live in [`clone`], persistence in [`io`].

mod buffers;
pub mod clone;
mod data;
mod error;
pub mod io;

pub use buffers::BufferSet;
pub use clone::ANIM_CHANNELS;
pub use data::{Mesh, Mode};
pub use error::MeshError;

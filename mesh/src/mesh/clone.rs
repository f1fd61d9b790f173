//! Mesh copy policies.
//!
//! Three direct policies differ in which buffers are shared with the source:
//!
//! | Policy | Buffers | Collision tree | Bound and arrays |
//! |---|---|---|---|
//! | [`Mesh::shallow_clone`] | all aliased | aliased | copied |
//! | [`Mesh::deep_clone`] | all copied | discarded | copied |
//! | [`Mesh::clone_for_anim`] | animated channels copied, rest aliased | aliased | copied |
//!
//! The [`GraphClone`] impl lets a [`Cloner`] copy a mesh as part of a larger
//! object graph, where the cloner decides per buffer whether to share it.
//! Every policy leaves the GPU vertex array handle unallocated.

use super::{BufferSet, Mesh};
use crate::buffer::VertexBufferType;
use crate::cloner::{Cloner, GraphClone};

/// Animated channels as `(live, bind pose)` pairs, in dependency order.
///
/// A channel is animated only if its bind-pose buffer exists, and a channel
/// is only considered if every earlier one is animated.
pub const ANIM_CHANNELS: [(VertexBufferType, VertexBufferType); 3] = [
    (VertexBufferType::Position, VertexBufferType::BindPosePosition),
    (VertexBufferType::Normal, VertexBufferType::BindPoseNormal),
    (VertexBufferType::Tangent, VertexBufferType::BindPoseTangent),
];

impl Mesh {
    /// Copy the mesh, sharing every vertex buffer with the source.
    ///
    /// The buffer containers are new, so attaching or detaching buffers on
    /// the copy does not affect the source, but element data written through
    /// a shared buffer is visible to both.
    ///
    /// The collision tree is shared too. It goes stale for both meshes if
    /// shared element data is edited in place; call
    /// [`clear_collision_data`](Self::clear_collision_data) after such edits.
    pub fn shallow_clone(&self) -> Mesh {
        Mesh {
            buffers: self.buffers.clone(),
            mesh_bound: self.mesh_bound,
            collision_tree: self.collision_tree.clone(),
            element_lengths: self.element_lengths.clone(),
            mode_start: self.mode_start.clone(),
            vert_count: self.vert_count,
            element_count: self.element_count,
            instance_count: self.instance_count,
            max_num_weights: self.max_num_weights,
            mode: self.mode,
            point_size: self.point_size,
            lod_levels: self.lod_levels.clone(),
            vertex_array_id: None,
        }
    }

    /// Copy the mesh and every buffer's element data.
    ///
    /// The copy shares nothing with the source. The collision tree is not
    /// carried over and is rebuilt on demand.
    pub fn deep_clone(&self) -> Mesh {
        let mut buffers = BufferSet::new();
        for buffer in self.buffers.iter() {
            buffers.replace(buffer.deep_clone());
        }
        log::debug!("Deep-cloned mesh with {} buffers", buffers.len());

        Mesh {
            buffers,
            mesh_bound: self.mesh_bound,
            collision_tree: None,
            element_lengths: self.element_lengths.clone(),
            mode_start: self.mode_start.clone(),
            vert_count: self.vert_count,
            element_count: self.element_count,
            instance_count: self.instance_count,
            max_num_weights: self.max_num_weights,
            mode: self.mode,
            point_size: self.point_size,
            lod_levels: self.lod_levels.iter().map(|b| b.deep_clone()).collect(),
            vertex_array_id: None,
        }
    }

    /// Copy the mesh for independent skinning.
    ///
    /// Starts from a [`shallow_clone`](Self::shallow_clone) and gives the copy
    /// its own copy of each animated channel (see [`ANIM_CHANNELS`]), in the
    /// same list position. Bind-pose buffers and all other buffers stay
    /// shared.
    pub fn clone_for_anim(&self) -> Mesh {
        let mut clone = self.shallow_clone();
        for (live, bind_pose) in ANIM_CHANNELS {
            if !self.has_buffer(bind_pose) {
                break;
            }
            match self.buffer(live) {
                Some(buffer) => {
                    clone.buffers.replace(buffer.deep_clone());
                }
                None => log::warn!("Mesh has a {bind_pose:?} buffer but no {live:?} buffer"),
            }
        }
        clone
    }
}

impl GraphClone for Mesh {
    fn shallow_copy(&self) -> Self {
        Mesh {
            buffers: self.buffers.clone(),
            mesh_bound: self.mesh_bound,
            collision_tree: None,
            element_lengths: self.element_lengths.clone(),
            mode_start: self.mode_start.clone(),
            vert_count: self.vert_count,
            element_count: self.element_count,
            instance_count: self.instance_count,
            max_num_weights: self.max_num_weights,
            mode: self.mode,
            point_size: self.point_size,
            lod_levels: self.lod_levels.clone(),
            vertex_array_id: None,
        }
    }

    fn resolve_fields(&mut self, cloner: &mut Cloner) {
        self.collision_tree = None;
        self.mesh_bound = cloner.resolve(&self.mesh_bound);
        self.buffers = cloner.resolve(&self.buffers);
        self.lod_levels = cloner.resolve(&self.lod_levels);
        self.element_lengths = cloner.resolve(&self.element_lengths);
        self.mode_start = cloner.resolve(&self.mode_start);
    }
}

//! The [`Mesh`] entity and its buffer-level operations.

use std::sync::Arc;

use super::{BufferSet, MeshError};
use crate::bound::BoundingVolume;
use crate::buffer::{SharedBuffer, Usage, VertexBufferType};
use crate::collision::CollisionTree;
use crate::serialize::CapsuleEnum;

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Each vertex is a separate point.
    Points,
    /// Every two vertices form a line.
    Lines,
    /// Connected lines, closed back to the first vertex.
    LineLoop,
    /// Connected lines.
    LineStrip,
    /// Every three vertices form a triangle.
    #[default]
    Triangles,
    /// Each vertex after the first two forms a triangle with the previous two.
    TriangleStrip,
    /// Each vertex after the first two forms a triangle with the first and previous.
    TriangleFan,
    /// Several modes combined; see `element_lengths` and `mode_start`.
    Hybrid,
    /// Tessellation patches.
    Patch,
}

impl Mode {
    /// Number of primitives formed by `count` vertices or indices.
    ///
    /// Returns `None` for modes whose primitive count is not a function of
    /// the vertex count alone.
    pub fn primitive_count(self, count: usize) -> Option<usize> {
        match self {
            Self::Points | Self::LineLoop => Some(count),
            Self::Lines => Some(count / 2),
            Self::LineStrip => Some(count.saturating_sub(1)),
            Self::Triangles => Some(count / 3),
            Self::TriangleStrip | Self::TriangleFan => Some(count.saturating_sub(2)),
            Self::Hybrid | Self::Patch => None,
        }
    }
}

impl CapsuleEnum for Mode {
    fn name(self) -> &'static str {
        match self {
            Self::Points => "Points",
            Self::Lines => "Lines",
            Self::LineLoop => "LineLoop",
            Self::LineStrip => "LineStrip",
            Self::Triangles => "Triangles",
            Self::TriangleStrip => "TriangleStrip",
            Self::TriangleFan => "TriangleFan",
            Self::Hybrid => "Hybrid",
            Self::Patch => "Patch",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Points" => Some(Self::Points),
            "Lines" => Some(Self::Lines),
            "LineLoop" => Some(Self::LineLoop),
            "LineStrip" => Some(Self::LineStrip),
            "Triangles" => Some(Self::Triangles),
            "TriangleStrip" => Some(Self::TriangleStrip),
            "TriangleFan" => Some(Self::TriangleFan),
            "Hybrid" => Some(Self::Hybrid),
            "Patch" => Some(Self::Patch),
            _ => None,
        }
    }
}

/// A renderable geometry object: a set of typed vertex buffers plus the
/// metadata describing how they form primitives.
///
/// Buffers are held through [`SharedBuffer`] handles and may be aliased by
/// other meshes; see [`shallow_clone`](Self::shallow_clone),
/// [`deep_clone`](Self::deep_clone) and
/// [`clone_for_anim`](Self::clone_for_anim) for the sharing rules of each
/// copy. Derived data (the collision tree and the GPU vertex array handle)
/// is never persisted as authoritative state.
///
/// # Example
///
/// ```
/// use redlilium_mesh::buffer::{VertexBuffer, VertexBufferType, VertexData};
/// use redlilium_mesh::mesh::Mesh;
///
/// let mut mesh = Mesh::new();
/// mesh.set_buffer(
///     VertexBuffer::new(VertexBufferType::Position)
///         .with_data(3, VertexData::Float(vec![0.0; 9])),
/// )
/// .unwrap();
/// mesh.update_counts();
/// assert_eq!(mesh.vert_count(), 3);
/// assert_eq!(mesh.element_count(), 1);
/// ```
#[derive(Debug)]
pub struct Mesh {
    pub(super) buffers: BufferSet,
    pub(super) mesh_bound: Option<BoundingVolume>,
    pub(super) collision_tree: Option<Arc<CollisionTree>>,
    pub(super) element_lengths: Option<Vec<i32>>,
    pub(super) mode_start: Option<Vec<i32>>,
    pub(super) vert_count: i32,
    pub(super) element_count: i32,
    pub(super) instance_count: i32,
    pub(super) max_num_weights: i32,
    pub(super) mode: Mode,
    pub(super) point_size: f32,
    pub(super) lod_levels: Vec<SharedBuffer>,
    pub(super) vertex_array_id: Option<u32>,
}

impl Default for Mesh {
    fn default() -> Self {
        Self {
            buffers: BufferSet::new(),
            mesh_bound: Some(BoundingVolume::default()),
            collision_tree: None,
            element_lengths: None,
            mode_start: None,
            vert_count: -1,
            element_count: -1,
            instance_count: -1,
            max_num_weights: -1,
            mode: Mode::Triangles,
            point_size: 1.0,
            lod_levels: Vec::new(),
            vertex_array_id: None,
        }
    }
}

impl Mesh {
    /// Create an empty triangle mesh.
    pub fn new() -> Self {
        Self::default()
    }

    // -- Buffers --------------------------------------------------------------

    /// Attach a buffer. Fails if a buffer of the same type is already set.
    pub fn set_buffer(&mut self, buffer: impl Into<SharedBuffer>) -> Result<(), MeshError> {
        self.buffers.insert(buffer.into())?;
        self.collision_tree = None;
        Ok(())
    }

    /// Attach a buffer, replacing any buffer of the same type in place.
    pub fn replace_buffer(&mut self, buffer: impl Into<SharedBuffer>) -> Option<SharedBuffer> {
        self.collision_tree = None;
        self.buffers.replace(buffer.into())
    }

    /// Detach the buffer of the given type.
    pub fn clear_buffer(&mut self, buffer_type: VertexBufferType) -> Option<SharedBuffer> {
        let removed = self.buffers.remove(buffer_type)?;
        self.collision_tree = None;
        Some(removed)
    }

    pub fn buffer(&self, buffer_type: VertexBufferType) -> Option<&SharedBuffer> {
        self.buffers.get(buffer_type)
    }

    pub fn has_buffer(&self, buffer_type: VertexBufferType) -> bool {
        self.buffers.contains(buffer_type)
    }

    pub fn buffers(&self) -> &BufferSet {
        &self.buffers
    }

    /// Buffers in attachment order.
    pub fn buffer_list(&self) -> &[SharedBuffer] {
        self.buffers.as_slice()
    }

    /// Whether the mesh carries skinning data.
    pub fn is_animated(&self) -> bool {
        self.has_buffer(VertexBufferType::BoneIndex) || self.has_buffer(VertexBufferType::HWBoneIndex)
    }

    /// Set the usage of every buffer to [`Usage::Static`].
    pub fn set_static(&mut self) {
        self.set_usage(Usage::Static);
    }

    /// Set the usage of every buffer to [`Usage::Dynamic`].
    pub fn set_dynamic(&mut self) {
        self.set_usage(Usage::Dynamic);
    }

    /// Set the usage of every buffer to [`Usage::Stream`].
    pub fn set_stream_usage(&mut self) {
        self.set_usage(Usage::Stream);
    }

    fn set_usage(&mut self, usage: Usage) {
        for buffer in self.buffers.iter() {
            buffer.write().set_usage(usage);
        }
    }

    // -- Counts and metadata --------------------------------------------------

    /// Derive the vertex and element counts from the position and index buffers.
    pub fn update_counts(&mut self) {
        if let Some(positions) = self.buffers.get(VertexBufferType::Position) {
            self.vert_count = positions.read().num_elements() as i32;
        }
        let count = match self.buffers.get(VertexBufferType::Index) {
            Some(indices) => indices.read().data().map_or(0, |d| d.len()),
            None if self.vert_count >= 0 => self.vert_count as usize,
            None => return,
        };
        self.element_count = self
            .mode
            .primitive_count(count)
            .map_or(-1, |n| n as i32);
    }

    pub fn vert_count(&self) -> i32 {
        self.vert_count
    }

    pub fn element_count(&self) -> i32 {
        self.element_count
    }

    pub fn instance_count(&self) -> i32 {
        self.instance_count
    }

    pub fn set_instance_count(&mut self, count: i32) {
        self.instance_count = count;
    }

    /// Maximum number of bone weights per vertex (-1 when unknown).
    pub fn max_num_weights(&self) -> i32 {
        self.max_num_weights
    }

    pub fn set_max_num_weights(&mut self, count: i32) {
        self.max_num_weights = count;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.collision_tree = None;
    }

    pub fn point_size(&self) -> f32 {
        self.point_size
    }

    pub fn set_point_size(&mut self, size: f32) {
        self.point_size = size;
    }

    pub fn element_lengths(&self) -> Option<&[i32]> {
        self.element_lengths.as_deref()
    }

    pub fn set_element_lengths(&mut self, lengths: Option<Vec<i32>>) {
        self.element_lengths = lengths;
    }

    pub fn mode_start(&self) -> Option<&[i32]> {
        self.mode_start.as_deref()
    }

    pub fn set_mode_start(&mut self, starts: Option<Vec<i32>>) {
        self.mode_start = starts;
    }

    pub fn bound(&self) -> Option<&BoundingVolume> {
        self.mesh_bound.as_ref()
    }

    pub fn set_bound(&mut self, bound: Option<BoundingVolume>) {
        self.mesh_bound = bound;
    }

    // -- Levels of detail -----------------------------------------------------

    /// Set the index buffers used for each level of detail.
    pub fn set_lod_levels(&mut self, levels: Vec<SharedBuffer>) {
        self.lod_levels = levels;
    }

    pub fn lod_level(&self, level: usize) -> Option<&SharedBuffer> {
        self.lod_levels.get(level)
    }

    pub fn lod_levels(&self) -> &[SharedBuffer] {
        &self.lod_levels
    }

    pub fn num_lod_levels(&self) -> usize {
        self.lod_levels.len()
    }

    // -- Collision data -------------------------------------------------------

    /// Build the collision tree from the current buffers if not already built.
    pub fn create_collision_data(&mut self) -> Result<&Arc<CollisionTree>, MeshError> {
        let tree = match self.collision_tree.take() {
            Some(tree) => tree,
            None => {
                let tree = self.build_collision_tree()?;
                log::debug!(
                    "Built collision tree over {} triangles",
                    tree.triangle_count()
                );
                Arc::new(tree)
            }
        };
        Ok(self.collision_tree.insert(tree))
    }

    pub fn collision_tree(&self) -> Option<&Arc<CollisionTree>> {
        self.collision_tree.as_ref()
    }

    /// Drop the collision tree. It is rebuilt on the next
    /// [`create_collision_data`](Self::create_collision_data).
    pub fn clear_collision_data(&mut self) {
        self.collision_tree = None;
    }

    fn build_collision_tree(&self) -> Result<CollisionTree, MeshError> {
        if self.mode != Mode::Triangles {
            return Err(MeshError::UnsupportedMode(self.mode));
        }
        let positions = self
            .buffers
            .get(VertexBufferType::Position)
            .ok_or(MeshError::MissingPositions)?
            .read();
        let positions = positions
            .data()
            .and_then(|d| d.as_f32())
            .ok_or(MeshError::MissingPositions)?;
        let indices = self
            .buffers
            .get(VertexBufferType::Index)
            .and_then(|b| b.read().data().and_then(|d| d.to_u32_vec()));
        CollisionTree::build(positions, indices.as_deref())
    }

    /// Number of triangles the collision tree would index, if computable.
    pub(super) fn triangle_count(&self) -> Option<usize> {
        if self.mode != Mode::Triangles {
            return None;
        }
        if let Some(indices) = self.buffers.get(VertexBufferType::Index) {
            return indices.read().data().map(|d| d.len() / 3);
        }
        let positions = self.buffers.get(VertexBufferType::Position)?;
        positions.read().data().map(|d| d.len() / 9)
    }

    // -- GPU handle -----------------------------------------------------------

    /// GPU vertex array handle, `None` until allocated by the renderer.
    pub fn vertex_array_id(&self) -> Option<u32> {
        self.vertex_array_id
    }

    pub fn set_vertex_array_id(&mut self, id: Option<u32>) {
        self.vertex_array_id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{VertexBuffer, VertexData};

    fn quad() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.set_buffer(VertexBuffer::new(VertexBufferType::Position).with_data(
            3,
            VertexData::Float(vec![
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0,
            ]),
        ))
        .unwrap();
        mesh.set_buffer(
            VertexBuffer::new(VertexBufferType::Index)
                .with_data(3, VertexData::UnsignedShort(vec![0, 1, 2, 2, 3, 0])),
        )
        .unwrap();
        mesh
    }

    #[test]
    fn test_new_mesh_defaults() {
        let mesh = Mesh::new();
        assert_eq!(mesh.vert_count(), -1);
        assert_eq!(mesh.element_count(), -1);
        assert_eq!(mesh.instance_count(), -1);
        assert_eq!(mesh.max_num_weights(), -1);
        assert_eq!(mesh.mode(), Mode::Triangles);
        assert_eq!(mesh.point_size(), 1.0);
        assert_eq!(mesh.bound(), Some(&BoundingVolume::EMPTY));
        assert_eq!(mesh.vertex_array_id(), None);
        assert!(mesh.buffers().is_empty());
        assert_eq!(mesh.num_lod_levels(), 0);
    }

    #[test]
    fn test_update_counts() {
        let mut mesh = quad();
        mesh.update_counts();
        assert_eq!(mesh.vert_count(), 4);
        assert_eq!(mesh.element_count(), 2);

        mesh.clear_buffer(VertexBufferType::Index);
        mesh.set_mode(Mode::TriangleStrip);
        mesh.update_counts();
        assert_eq!(mesh.element_count(), 2);

        mesh.set_mode(Mode::Hybrid);
        mesh.update_counts();
        assert_eq!(mesh.element_count(), -1);
    }

    #[test]
    fn test_set_buffer_rejects_duplicate_type() {
        let mut mesh = quad();
        let err = mesh
            .set_buffer(VertexBuffer::new(VertexBufferType::Index))
            .unwrap_err();
        assert_eq!(err, MeshError::BufferTypeAlreadySet(VertexBufferType::Index));
        assert!(
            mesh.replace_buffer(VertexBuffer::new(VertexBufferType::Index))
                .is_some()
        );
        assert_eq!(mesh.buffer_list()[1].buffer_type(), VertexBufferType::Index);
    }

    #[test]
    fn test_is_animated() {
        let mut mesh = quad();
        assert!(!mesh.is_animated());
        mesh.set_buffer(VertexBuffer::new(VertexBufferType::HWBoneIndex))
            .unwrap();
        assert!(mesh.is_animated());
        mesh.clear_buffer(VertexBufferType::HWBoneIndex);
        mesh.set_buffer(VertexBuffer::new(VertexBufferType::BoneIndex))
            .unwrap();
        assert!(mesh.is_animated());
    }

    #[test]
    fn test_bulk_usage() {
        let mut mesh = quad();
        mesh.set_dynamic();
        assert!(mesh.buffers().iter().all(|b| b.read().usage() == Usage::Dynamic));
        mesh.set_stream_usage();
        assert!(mesh.buffers().iter().all(|b| b.read().usage() == Usage::Stream));
        mesh.set_static();
        assert!(mesh.buffers().iter().all(|b| b.read().usage() == Usage::Static));
    }

    #[test]
    fn test_collision_data_is_lazy_and_invalidated() {
        let mut mesh = quad();
        assert!(mesh.collision_tree().is_none());

        let tree = mesh.create_collision_data().unwrap().clone();
        assert_eq!(tree.triangle_count(), 2);
        assert!(Arc::ptr_eq(mesh.create_collision_data().unwrap(), &tree));

        mesh.replace_buffer(VertexBuffer::new(VertexBufferType::Normal));
        assert!(mesh.collision_tree().is_none());
    }

    #[test]
    fn test_collision_data_errors() {
        let mut mesh = Mesh::new();
        assert_eq!(
            mesh.create_collision_data().unwrap_err(),
            MeshError::MissingPositions
        );

        let mut lines = quad();
        lines.set_mode(Mode::Lines);
        assert_eq!(
            lines.create_collision_data().unwrap_err(),
            MeshError::UnsupportedMode(Mode::Lines)
        );
    }

    #[test]
    fn test_lod_levels() {
        let mut mesh = quad();
        let lod = VertexBuffer::new(VertexBufferType::Index)
            .with_data(3, VertexData::UnsignedShort(vec![0, 1, 2]))
            .into_shared();
        mesh.set_lod_levels(vec![lod.clone()]);
        assert_eq!(mesh.num_lod_levels(), 1);
        assert!(SharedBuffer::ptr_eq(mesh.lod_level(0).unwrap(), &lod));
        assert!(mesh.lod_level(1).is_none());
    }

    #[test]
    fn test_mode_names_roundtrip() {
        for mode in [
            Mode::Points,
            Mode::Lines,
            Mode::LineLoop,
            Mode::LineStrip,
            Mode::Triangles,
            Mode::TriangleStrip,
            Mode::TriangleFan,
            Mode::Hybrid,
            Mode::Patch,
        ] {
            assert_eq!(Mode::from_name(mode.name()), Some(mode));
        }
    }
}

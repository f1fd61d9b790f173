//! Triangle spatial index used for collision queries.
//!
//! The index is derived entirely from a mesh's position and index buffers.
//! Triangles are ordered by centroid along the longest axis of the mesh
//! bounds and grouped into fixed-size leaves, each with its own box.

use crate::mesh::MeshError;
use crate::serialize::{DeserializeError, InputCapsule, OutputCapsule, Savable, SerializeError};

/// Spatial index over the triangles of a mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionTree {
    min: [f32; 3],
    max: [f32; 3],
    leaf_size: u32,
    triangles: Vec<u32>,
}

impl CollisionTree {
    /// Maximum number of triangles per leaf.
    pub const DEFAULT_LEAF_SIZE: u32 = 21;

    /// Build the index from packed xyz positions and optional triangle-list indices.
    pub fn build(positions: &[f32], indices: Option<&[u32]>) -> Result<Self, MeshError> {
        let vertex_count = positions.len() / 3;
        let vertex = |i: u32| -> Result<[f32; 3], MeshError> {
            let i = i as usize;
            if i >= vertex_count {
                return Err(MeshError::IndexOutOfRange {
                    index: i,
                    vertex_count,
                });
            }
            Ok([positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]])
        };

        let corners: Vec<[u32; 3]> = match indices {
            Some(indices) => indices
                .chunks_exact(3)
                .map(|t| [t[0], t[1], t[2]])
                .collect(),
            None => (0..(vertex_count / 3) as u32)
                .map(|t| [t * 3, t * 3 + 1, t * 3 + 2])
                .collect(),
        };

        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        let mut centroids = Vec::with_capacity(corners.len());
        for tri in &corners {
            let mut centroid = [0.0f32; 3];
            for &corner in tri {
                let p = vertex(corner)?;
                for axis in 0..3 {
                    min[axis] = min[axis].min(p[axis]);
                    max[axis] = max[axis].max(p[axis]);
                    centroid[axis] += p[axis] / 3.0;
                }
            }
            centroids.push(centroid);
        }
        if corners.is_empty() {
            min = [0.0; 3];
            max = [0.0; 3];
        }

        let axis = (0..3)
            .max_by(|&a, &b| (max[a] - min[a]).total_cmp(&(max[b] - min[b])))
            .unwrap_or(0);
        let mut triangles: Vec<u32> = (0..corners.len() as u32).collect();
        triangles.sort_by(|&a, &b| {
            centroids[a as usize][axis].total_cmp(&centroids[b as usize][axis])
        });

        Ok(Self {
            min,
            max,
            leaf_size: Self::DEFAULT_LEAF_SIZE,
            triangles,
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Minimum and maximum corners of the indexed geometry.
    pub fn bounds(&self) -> ([f32; 3], [f32; 3]) {
        (self.min, self.max)
    }

    /// Triangle ids in index order.
    pub fn triangles(&self) -> &[u32] {
        &self.triangles
    }

    /// Triangle ids grouped into leaves.
    pub fn leaves(&self) -> impl Iterator<Item = &[u32]> {
        self.triangles.chunks(self.leaf_size.max(1) as usize)
    }
}

impl Savable for CollisionTree {
    fn write(&self, out: &mut OutputCapsule<'_>) -> Result<(), SerializeError> {
        out.write_float_array("min", Some(self.min.as_slice()));
        out.write_float_array("max", Some(self.max.as_slice()));
        out.write_int(
            "leaf_size",
            self.leaf_size as i32,
            Self::DEFAULT_LEAF_SIZE as i32,
        );
        let triangles: Vec<i32> = self.triangles.iter().map(|&t| t as i32).collect();
        out.write_int_array("triangles", Some(&triangles));
        Ok(())
    }

    fn read(input: &mut InputCapsule<'_>) -> Result<Self, DeserializeError> {
        let corner = |values: Option<Vec<f32>>, name: &str| match values {
            None => Ok([0.0; 3]),
            Some(v) => <[f32; 3]>::try_from(v.as_slice())
                .map_err(|_| DeserializeError::invalid(name, "expected 3 floats")),
        };
        let min = corner(input.read_float_array("min")?, "min")?;
        let max = corner(input.read_float_array("max")?, "max")?;
        let leaf_size = input.read_int("leaf_size", Self::DEFAULT_LEAF_SIZE as i32)?;
        let triangles = input
            .read_int_array("triangles")?
            .unwrap_or_default()
            .into_iter()
            .map(u32::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DeserializeError::invalid("triangles", e.to_string()))?;

        Ok(Self {
            min,
            max,
            leaf_size: u32::try_from(leaf_size)
                .map_err(|e| DeserializeError::invalid("leaf_size", e.to_string()))?,
            triangles,
        })
    }
}

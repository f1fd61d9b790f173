//! Mesh persistence.
//!
//! A mesh is written as a capsule with the following keys. Values equal to
//! their default are omitted, and absent keys read back as the default.
//!
//! | Key | Content | Default |
//! |---|---|---|
//! | `modelBound` | bounding volume | absent |
//! | `vertCount`, `elementCount`, `instanceCount`, `max_num_weights` | int | -1 |
//! | `mode` | [`Mode`] name | `Triangles` |
//! | `collisionTree` | collision tree | absent |
//! | `elementLengths`, `modeStart` | int array | absent |
//! | `pointSize` | float | 1.0 |
//! | `buffers` | buffer type ordinal to buffer | absent |
//! | `lodLevels` | list of index buffers | absent |
//!
//! Hardware-skinning buffers are caches and are never written. An animated
//! mesh gets empty CPU-only placeholders for them when read.

use std::io::{Read, Write};

use super::{BufferSet, Mesh, Mode};
use crate::bound::BoundingVolume;
use crate::buffer::{SharedBuffer, Usage, VertexBuffer, VertexBufferType};
use crate::collision::CollisionTree;
use crate::serialize::{
    DeserializeError, Exporter, Format, Importer, InputCapsule, OutputCapsule, SerializeError,
    decode, encode,
};

/// Hardware-skinning buffers detached from a [`BufferSet`] for the lifetime
/// of the guard. Dropping the guard re-attaches them at their original list
/// positions.
struct DetachedSkinningBuffers<'a> {
    buffers: &'a mut BufferSet,
    detached: Vec<(usize, SharedBuffer)>,
}

impl<'a> DetachedSkinningBuffers<'a> {
    fn detach(buffers: &'a mut BufferSet) -> Self {
        let detached = buffers.take_where(VertexBufferType::is_hw_skinning);
        if !detached.is_empty() {
            log::trace!("Detached {} skinning buffers for write", detached.len());
        }
        Self { buffers, detached }
    }

    fn buffers(&self) -> &BufferSet {
        self.buffers
    }
}

impl Drop for DetachedSkinningBuffers<'_> {
    fn drop(&mut self) {
        let detached = std::mem::take(&mut self.detached);
        if !detached.is_empty() {
            log::trace!("Restoring {} skinning buffers", detached.len());
            self.buffers.restore(detached);
        }
    }
}

fn write_buffers(out: &mut OutputCapsule<'_>, buffers: &BufferSet) -> Result<(), SerializeError> {
    out.write_savable_int_map(
        "buffers",
        Some(buffers.iter().map(|b| (b.buffer_type().ordinal(), b))),
    )
}

impl Mesh {
    /// Write the mesh's durable state into a capsule.
    ///
    /// Takes `&mut self` because the hardware-skinning buffers are detached
    /// while the buffer map is written. They are back in place when this
    /// returns, whether or not the write succeeded.
    pub fn write(&mut self, out: &mut OutputCapsule<'_>) -> Result<(), SerializeError> {
        out.write_savable("modelBound", self.mesh_bound.as_ref())?;
        out.write_int("vertCount", self.vert_count, -1);
        out.write_int("elementCount", self.element_count, -1);
        out.write_int("instanceCount", self.instance_count, -1);
        out.write_int("max_num_weights", self.max_num_weights, -1);
        out.write_enum("mode", self.mode, Mode::Triangles);
        out.write_savable("collisionTree", self.collision_tree.as_deref())?;
        out.write_int_array("elementLengths", self.element_lengths.as_deref());
        out.write_int_array("modeStart", self.mode_start.as_deref());
        out.write_float("pointSize", self.point_size, 1.0);

        {
            let guard = DetachedSkinningBuffers::detach(&mut self.buffers);
            write_buffers(out, guard.buffers())?;
        }

        if !self.lod_levels.is_empty() {
            out.write_savable_list("lodLevels", Some(self.lod_levels.as_slice()))?;
        }
        Ok(())
    }

    /// Reconstruct a mesh from a capsule written by [`write`](Self::write).
    pub fn read(input: &mut InputCapsule<'_>) -> Result<Mesh, DeserializeError> {
        let mut mesh = Mesh {
            mesh_bound: input.read_savable::<BoundingVolume>("modelBound")?,
            vert_count: input.read_int("vertCount", -1)?,
            element_count: input.read_int("elementCount", -1)?,
            instance_count: input.read_int("instanceCount", -1)?,
            max_num_weights: input.read_int("max_num_weights", -1)?,
            mode: input.read_enum("mode", Mode::Triangles)?,
            element_lengths: input.read_int_array("elementLengths")?,
            mode_start: input.read_int_array("modeStart")?,
            point_size: input.read_float("pointSize", 1.0)?,
            ..Mesh::default()
        };
        let collision_tree = input.read_savable::<CollisionTree>("collisionTree")?;

        for (ordinal, buffer) in input
            .read_savable_int_map::<SharedBuffer>("buffers")?
            .unwrap_or_default()
        {
            let buffer_type = buffer.buffer_type();
            if VertexBufferType::from_ordinal(ordinal) != Some(buffer_type) {
                return Err(DeserializeError::invalid(
                    "buffers",
                    format!("key {ordinal} holds a {buffer_type:?} buffer"),
                ));
            }
            if mesh.buffers.insert(buffer).is_err() {
                return Err(DeserializeError::invalid(
                    "buffers",
                    format!("duplicate {buffer_type:?} buffer"),
                ));
            }
        }

        if mesh.is_animated() {
            for buffer_type in [VertexBufferType::HWBoneIndex, VertexBufferType::HWBoneWeight] {
                let placeholder = VertexBuffer::new(buffer_type).with_usage(Usage::CpuOnly);
                mesh.buffers.replace(placeholder.into_shared());
            }
        }

        mesh.lod_levels = input
            .read_savable_list::<SharedBuffer>("lodLevels")?
            .unwrap_or_default();

        // A stored tree that no longer matches the buffers is rebuilt on demand.
        mesh.collision_tree = match collision_tree {
            Some(tree) if Some(tree.triangle_count()) == mesh.triangle_count() => {
                Some(tree.into())
            }
            Some(tree) => {
                log::debug!(
                    "Discarding stored collision tree over {} triangles",
                    tree.triangle_count()
                );
                None
            }
            None => None,
        };

        log::debug!(
            "Read mesh with {} buffers and {} LOD levels",
            mesh.buffers.len(),
            mesh.lod_levels.len()
        );
        Ok(mesh)
    }

    /// Encode the mesh to bytes.
    pub fn save(&mut self, format: Format) -> Result<Vec<u8>, SerializeError> {
        let mut exporter = Exporter::new();
        let mut out = OutputCapsule::new(&mut exporter);
        self.write(&mut out)?;
        encode(&out.finish(), format)
    }

    /// Decode a mesh from bytes produced by [`save`](Self::save).
    pub fn load(bytes: &[u8], format: Format) -> Result<Mesh, DeserializeError> {
        let mut importer = Importer::new();
        let mut input = InputCapsule::new(&mut importer, decode(bytes, format)?)?;
        Mesh::read(&mut input)
    }

    /// Encode the mesh into a writer.
    pub fn save_to<W: Write>(&mut self, mut writer: W, format: Format) -> Result<(), SerializeError> {
        let bytes = self.save(format)?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Decode a mesh from a reader.
    pub fn load_from<R: Read>(mut reader: R, format: Format) -> Result<Mesh, DeserializeError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Mesh::load(&bytes, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::VertexData;
    use crate::serialize::Value;

    fn animated_mesh() -> Mesh {
        let mut mesh = Mesh::new();
        for t in [
            VertexBufferType::HWBoneIndex,
            VertexBufferType::Position,
            VertexBufferType::HWBoneWeight,
            VertexBufferType::BoneIndex,
        ] {
            mesh.set_buffer(
                VertexBuffer::new(t).with_data(3, VertexData::Float(vec![0.0, 1.0, 2.0])),
            )
            .unwrap();
        }
        mesh
    }

    fn write_value(mesh: &mut Mesh) -> Value {
        let mut exporter = Exporter::new();
        let mut out = OutputCapsule::new(&mut exporter);
        mesh.write(&mut out).unwrap();
        out.finish()
    }

    fn identities(mesh: &Mesh) -> Vec<SharedBuffer> {
        mesh.buffer_list().to_vec()
    }

    fn same_buffers(a: &[SharedBuffer], b: &[SharedBuffer]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| SharedBuffer::ptr_eq(x, y))
    }

    #[test]
    fn test_default_mesh_writes_only_bound() {
        let value = write_value(&mut Mesh::new());
        let Value::Map(fields) = &value else {
            panic!("expected a map");
        };
        let keys: Vec<_> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["modelBound", "buffers"]);
        assert_eq!(value.field("buffers"), Some(&Value::IntMap(Vec::new())));
    }

    #[test]
    fn test_skinning_buffers_are_not_written() {
        let mut mesh = animated_mesh();
        let before = identities(&mesh);

        let value = write_value(&mut mesh);
        let Some(Value::IntMap(entries)) = value.field("buffers") else {
            panic!("expected buffers");
        };
        let keys: Vec<_> = entries.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec![
                VertexBufferType::Position.ordinal(),
                VertexBufferType::BoneIndex.ordinal()
            ]
        );
        assert!(same_buffers(&identities(&mesh), &before));
    }

    #[test]
    fn test_guard_restores_on_early_exit() {
        let mut mesh = animated_mesh();
        let before = identities(&mesh);

        let failing = |buffers: &mut BufferSet| -> Result<(), SerializeError> {
            let guard = DetachedSkinningBuffers::detach(buffers);
            assert_eq!(guard.buffers().len(), 2);
            Err(SerializeError::FieldError {
                field: "buffers".into(),
                message: "sink full".into(),
            })
        };
        assert!(failing(&mut mesh.buffers).is_err());
        assert!(same_buffers(&identities(&mesh), &before));
    }

    #[test]
    fn test_guard_restores_on_panic() {
        let mut mesh = animated_mesh();
        let before = identities(&mesh);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = DetachedSkinningBuffers::detach(&mut mesh.buffers);
            panic!("writer failed");
        }));
        assert!(result.is_err());
        assert!(same_buffers(&identities(&mesh), &before));
    }

    #[test]
    fn test_read_attaches_skinning_placeholders() {
        let mut mesh = animated_mesh();
        let value = write_value(&mut mesh);
        let mut importer = Importer::new();
        let mut input = InputCapsule::new(&mut importer, value).unwrap();
        let restored = Mesh::read(&mut input).unwrap();

        assert_eq!(
            restored.buffers().types().collect::<Vec<_>>(),
            vec![
                VertexBufferType::Position,
                VertexBufferType::BoneIndex,
                VertexBufferType::HWBoneIndex,
                VertexBufferType::HWBoneWeight,
            ]
        );
        for t in [VertexBufferType::HWBoneIndex, VertexBufferType::HWBoneWeight] {
            let buffer = restored.buffer(t).unwrap().read();
            assert_eq!(buffer.usage(), Usage::CpuOnly);
            assert!(buffer.is_empty());
        }
    }

    #[test]
    fn test_mismatched_buffer_key_is_rejected() {
        let buffer = Exporter::new()
            .save(&VertexBuffer::new(VertexBufferType::Normal))
            .unwrap();
        let value = Value::Map(vec![(
            "buffers".into(),
            Value::IntMap(vec![(VertexBufferType::Position.ordinal(), buffer)]),
        )]);
        let mut importer = Importer::new();
        let mut input = InputCapsule::new(&mut importer, value).unwrap();
        assert!(matches!(
            Mesh::read(&mut input),
            Err(DeserializeError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_stale_collision_tree_is_discarded() {
        let mut mesh = Mesh::new();
        mesh.set_buffer(
            VertexBuffer::new(VertexBufferType::Position)
                .with_data(3, VertexData::Float(vec![0.0; 18])),
        )
        .unwrap();
        mesh.create_collision_data().unwrap();

        let value = write_value(&mut mesh);
        let mut importer = Importer::new();
        let restored = Mesh::read(&mut InputCapsule::new(&mut importer, value.clone()).unwrap())
            .unwrap();
        assert_eq!(restored.collision_tree().unwrap().triangle_count(), 2);

        // Same tree, but only one triangle's worth of positions.
        let Value::Map(mut fields) = value else {
            panic!("expected a map");
        };
        let positions = Exporter::new()
            .save(
                &VertexBuffer::new(VertexBufferType::Position)
                    .with_data(3, VertexData::Float(vec![0.0; 9])),
            )
            .unwrap();
        for (key, field) in &mut fields {
            if key == "buffers" {
                *field = Value::IntMap(vec![(0, positions.clone())]);
            }
        }
        let mut importer = Importer::new();
        let restored =
            Mesh::read(&mut InputCapsule::new(&mut importer, Value::Map(fields)).unwrap())
                .unwrap();
        assert!(restored.collision_tree().is_none());
    }

    #[cfg(feature = "serialize-bincode")]
    #[test]
    fn test_reader_writer_roundtrip() {
        let mut mesh = animated_mesh();
        mesh.set_point_size(4.0);
        let mut bytes = Vec::new();
        mesh.save_to(&mut bytes, Format::Bincode).unwrap();
        let restored = Mesh::load_from(bytes.as_slice(), Format::Bincode).unwrap();
        assert_eq!(restored.point_size(), 4.0);
        assert!(restored.is_animated());
    }

    #[cfg(feature = "serialize-bincode")]
    #[test]
    fn test_truncated_input_is_an_error() {
        let bytes = animated_mesh().save(Format::Bincode).unwrap();
        assert!(Mesh::load(&bytes[..bytes.len() / 2], Format::Bincode).is_err());
    }
}

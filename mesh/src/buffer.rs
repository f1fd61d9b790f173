//! Vertex buffer types.
//!
//! This module provides:
//! - [`VertexBufferType`] - Closed set of buffer semantics with stable ordinals
//! - [`Usage`] - Upload hint (GPU-resident or CPU-only)
//! - [`VertexFormat`] / [`VertexData`] - Typed element storage
//! - [`VertexBuffer`] - A typed, usage-tagged attribute array
//! - [`SharedBuffer`] - Reference-counted handle used by meshes to alias buffers

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::cloner::{CloneResolve, Cloner, GraphClone};
use crate::serialize::{
    CapsuleEnum, DeserializeError, InputCapsule, OutputCapsule, Savable, SerializeError,
    SharedIdentity, Value,
};

/// Semantic type of a vertex buffer.
///
/// Discriminants are the persisted ordinals used as keys of the mesh
/// `buffers` map and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum VertexBufferType {
    /// Vertex positions (3 floats).
    Position = 0,
    /// Point sprite sizes.
    Size = 1,
    /// Vertex normals (3 floats).
    Normal = 2,
    /// Primary texture coordinates.
    TexCoord = 3,
    /// Vertex colors.
    Color = 4,
    /// Tangents (4 floats, w = handedness).
    Tangent = 5,
    /// Binormals.
    Binormal = 6,
    /// Interleaved vertex data.
    InterleavedData = 7,
    /// Reserved, do not use.
    Reserved0 = 8,
    /// Primitive indices.
    Index = 9,
    /// Rest-pose positions of a skinned mesh.
    BindPosePosition = 10,
    /// Rest-pose normals of a skinned mesh.
    BindPoseNormal = 11,
    /// Bone weights for software skinning.
    BoneWeight = 12,
    /// Bone indices for software skinning.
    BoneIndex = 13,
    TexCoord2 = 14,
    TexCoord3 = 15,
    TexCoord4 = 16,
    TexCoord5 = 17,
    TexCoord6 = 18,
    TexCoord7 = 19,
    TexCoord8 = 20,
    /// Rest-pose tangents of a skinned mesh.
    BindPoseTangent = 21,
    /// Bone weights uploaded for hardware skinning. Regenerated, never persisted.
    HWBoneWeight = 22,
    /// Bone indices uploaded for hardware skinning. Regenerated, never persisted.
    HWBoneIndex = 23,
    /// Per-instance data.
    InstanceData = 24,
}

impl VertexBufferType {
    /// All buffer types in ordinal order.
    pub const ALL: [Self; 25] = [
        Self::Position,
        Self::Size,
        Self::Normal,
        Self::TexCoord,
        Self::Color,
        Self::Tangent,
        Self::Binormal,
        Self::InterleavedData,
        Self::Reserved0,
        Self::Index,
        Self::BindPosePosition,
        Self::BindPoseNormal,
        Self::BoneWeight,
        Self::BoneIndex,
        Self::TexCoord2,
        Self::TexCoord3,
        Self::TexCoord4,
        Self::TexCoord5,
        Self::TexCoord6,
        Self::TexCoord7,
        Self::TexCoord8,
        Self::BindPoseTangent,
        Self::HWBoneWeight,
        Self::HWBoneIndex,
        Self::InstanceData,
    ];

    /// Persisted ordinal of this type.
    pub fn ordinal(self) -> i32 {
        self as i32
    }

    /// Look up a type by its persisted ordinal.
    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Whether this is one of the hardware-skinning cache buffers.
    pub fn is_hw_skinning(self) -> bool {
        matches!(self, Self::HWBoneIndex | Self::HWBoneWeight)
    }
}

impl CapsuleEnum for VertexBufferType {
    fn name(self) -> &'static str {
        match self {
            Self::Position => "Position",
            Self::Size => "Size",
            Self::Normal => "Normal",
            Self::TexCoord => "TexCoord",
            Self::Color => "Color",
            Self::Tangent => "Tangent",
            Self::Binormal => "Binormal",
            Self::InterleavedData => "InterleavedData",
            Self::Reserved0 => "Reserved0",
            Self::Index => "Index",
            Self::BindPosePosition => "BindPosePosition",
            Self::BindPoseNormal => "BindPoseNormal",
            Self::BoneWeight => "BoneWeight",
            Self::BoneIndex => "BoneIndex",
            Self::TexCoord2 => "TexCoord2",
            Self::TexCoord3 => "TexCoord3",
            Self::TexCoord4 => "TexCoord4",
            Self::TexCoord5 => "TexCoord5",
            Self::TexCoord6 => "TexCoord6",
            Self::TexCoord7 => "TexCoord7",
            Self::TexCoord8 => "TexCoord8",
            Self::BindPoseTangent => "BindPoseTangent",
            Self::HWBoneWeight => "HWBoneWeight",
            Self::HWBoneIndex => "HWBoneIndex",
            Self::InstanceData => "InstanceData",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

/// How a buffer is expected to be used by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Usage {
    /// Uploaded once, rarely modified.
    #[default]
    Static,
    /// Modified occasionally.
    Dynamic,
    /// Modified every frame.
    Stream,
    /// Never uploaded; lives on the CPU only.
    CpuOnly,
}

impl CapsuleEnum for Usage {
    fn name(self) -> &'static str {
        match self {
            Self::Static => "Static",
            Self::Dynamic => "Dynamic",
            Self::Stream => "Stream",
            Self::CpuOnly => "CpuOnly",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Static" => Some(Self::Static),
            "Dynamic" => Some(Self::Dynamic),
            "Stream" => Some(Self::Stream),
            "CpuOnly" => Some(Self::CpuOnly),
            _ => None,
        }
    }
}

/// Scalar format of the elements stored in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexFormat {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    #[default]
    Float,
}

impl VertexFormat {
    /// Size in bytes of one scalar.
    pub fn size(&self) -> usize {
        match self {
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::UnsignedShort => 2,
            Self::Int | Self::UnsignedInt | Self::Float => 4,
        }
    }
}

impl CapsuleEnum for VertexFormat {
    fn name(self) -> &'static str {
        match self {
            Self::Byte => "Byte",
            Self::UnsignedByte => "UnsignedByte",
            Self::Short => "Short",
            Self::UnsignedShort => "UnsignedShort",
            Self::Int => "Int",
            Self::UnsignedInt => "UnsignedInt",
            Self::Float => "Float",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Byte" => Some(Self::Byte),
            "UnsignedByte" => Some(Self::UnsignedByte),
            "Short" => Some(Self::Short),
            "UnsignedShort" => Some(Self::UnsignedShort),
            "Int" => Some(Self::Int),
            "UnsignedInt" => Some(Self::UnsignedInt),
            "Float" => Some(Self::Float),
            _ => None,
        }
    }
}

/// Typed element storage of a vertex buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexData {
    Byte(Vec<i8>),
    UnsignedByte(Vec<u8>),
    Short(Vec<i16>),
    UnsignedShort(Vec<u16>),
    Int(Vec<i32>),
    UnsignedInt(Vec<u32>),
    Float(Vec<f32>),
}

impl VertexData {
    /// Scalar format of the stored elements.
    pub fn format(&self) -> VertexFormat {
        match self {
            Self::Byte(_) => VertexFormat::Byte,
            Self::UnsignedByte(_) => VertexFormat::UnsignedByte,
            Self::Short(_) => VertexFormat::Short,
            Self::UnsignedShort(_) => VertexFormat::UnsignedShort,
            Self::Int(_) => VertexFormat::Int,
            Self::UnsignedInt(_) => VertexFormat::UnsignedInt,
            Self::Float(_) => VertexFormat::Float,
        }
    }

    /// Number of scalars stored.
    pub fn len(&self) -> usize {
        match self {
            Self::Byte(v) => v.len(),
            Self::UnsignedByte(v) => v.len(),
            Self::Short(v) => v.len(),
            Self::UnsignedShort(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::UnsignedInt(v) => v.len(),
            Self::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Little-endian bytes of the stored scalars.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        fn collect<T: Copy, const N: usize>(values: &[T], f: fn(T) -> [u8; N]) -> Vec<u8> {
            values.iter().flat_map(|&v| f(v)).collect()
        }
        match self {
            Self::Byte(v) => bytemuck::cast_slice::<i8, u8>(v).to_vec(),
            Self::UnsignedByte(v) => v.clone(),
            Self::Short(v) => collect(v, i16::to_le_bytes),
            Self::UnsignedShort(v) => collect(v, u16::to_le_bytes),
            Self::Int(v) => collect(v, i32::to_le_bytes),
            Self::UnsignedInt(v) => collect(v, u32::to_le_bytes),
            Self::Float(v) => collect(v, f32::to_le_bytes),
        }
    }

    /// Rebuild typed data from little-endian bytes. Returns `None` if the
    /// byte length is not a multiple of the scalar size.
    pub fn from_le_bytes(format: VertexFormat, bytes: &[u8]) -> Option<Self> {
        fn parse<T, const N: usize>(bytes: &[u8], f: fn([u8; N]) -> T) -> Vec<T> {
            bytes
                .chunks_exact(N)
                .map(|chunk| {
                    let mut raw = [0u8; N];
                    raw.copy_from_slice(chunk);
                    f(raw)
                })
                .collect()
        }
        if bytes.len() % format.size() != 0 {
            return None;
        }
        Some(match format {
            VertexFormat::Byte => Self::Byte(bytemuck::pod_collect_to_vec(bytes)),
            VertexFormat::UnsignedByte => Self::UnsignedByte(bytes.to_vec()),
            VertexFormat::Short => Self::Short(parse(bytes, i16::from_le_bytes)),
            VertexFormat::UnsignedShort => Self::UnsignedShort(parse(bytes, u16::from_le_bytes)),
            VertexFormat::Int => Self::Int(parse(bytes, i32::from_le_bytes)),
            VertexFormat::UnsignedInt => Self::UnsignedInt(parse(bytes, u32::from_le_bytes)),
            VertexFormat::Float => Self::Float(parse(bytes, f32::from_le_bytes)),
        })
    }

    /// Float view, if the data is stored as floats.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            Self::Float(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Mutable float view, if the data is stored as floats.
    pub fn as_f32_mut(&mut self) -> Option<&mut [f32]> {
        match self {
            Self::Float(v) => Some(v.as_mut_slice()),
            _ => None,
        }
    }

    /// Widen unsigned integer data to `u32` (index buffers).
    pub fn to_u32_vec(&self) -> Option<Vec<u32>> {
        match self {
            Self::UnsignedByte(v) => Some(v.iter().map(|&i| i as u32).collect()),
            Self::UnsignedShort(v) => Some(v.iter().map(|&i| i as u32).collect()),
            Self::UnsignedInt(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// A typed, usage-tagged array of per-vertex or per-primitive attribute data.
///
/// `Clone` always copies the element data. Sharing a buffer between meshes
/// goes through [`SharedBuffer`].
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBuffer {
    buffer_type: VertexBufferType,
    usage: Usage,
    components: u8,
    normalized: bool,
    instance_span: u32,
    data: Option<VertexData>,
}

impl VertexBuffer {
    /// Create an empty buffer of the given type with [`Usage::Static`].
    pub fn new(buffer_type: VertexBufferType) -> Self {
        Self {
            buffer_type,
            usage: Usage::Static,
            components: 0,
            normalized: false,
            instance_span: 0,
            data: None,
        }
    }

    /// Set the usage hint.
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    /// Set element data with the given number of components per element.
    pub fn with_data(mut self, components: u8, data: VertexData) -> Self {
        self.set_data(components, data);
        self
    }

    /// Mark integer data as normalized when read by shaders.
    pub fn with_normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }

    /// Convert into a shareable handle.
    pub fn into_shared(self) -> SharedBuffer {
        SharedBuffer::new(self)
    }

    pub fn buffer_type(&self) -> VertexBufferType {
        self.buffer_type
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    pub fn set_usage(&mut self, usage: Usage) {
        self.usage = usage;
    }

    /// Components per element (e.g. 3 for a position).
    pub fn components(&self) -> u8 {
        self.components
    }

    pub fn normalized(&self) -> bool {
        self.normalized
    }

    /// Number of instances each element applies to (0 = per vertex).
    pub fn instance_span(&self) -> u32 {
        self.instance_span
    }

    pub fn set_instance_span(&mut self, span: u32) {
        self.instance_span = span;
    }

    pub fn data(&self) -> Option<&VertexData> {
        self.data.as_ref()
    }

    pub fn data_mut(&mut self) -> Option<&mut VertexData> {
        self.data.as_mut()
    }

    /// Replace the element data.
    pub fn set_data(&mut self, components: u8, data: VertexData) {
        self.components = components;
        self.data = Some(data);
    }

    /// Drop the element data, keeping type and usage.
    pub fn clear_data(&mut self) {
        self.data = None;
    }

    /// Scalar format, if the buffer holds data.
    pub fn format(&self) -> Option<VertexFormat> {
        self.data.as_ref().map(VertexData::format)
    }

    /// Number of elements (scalars / components).
    pub fn num_elements(&self) -> usize {
        match (&self.data, self.components) {
            (Some(data), c) if c > 0 => data.len() / c as usize,
            _ => 0,
        }
    }

    /// Whether the buffer holds no element data.
    pub fn is_empty(&self) -> bool {
        self.data.as_ref().is_none_or(VertexData::is_empty)
    }
}

impl Savable for VertexBuffer {
    fn write(&self, out: &mut OutputCapsule<'_>) -> Result<(), SerializeError> {
        out.write_field(
            "buffer_type",
            Value::String(self.buffer_type.name().to_owned()),
        );
        out.write_enum("usage", self.usage, Usage::Static);
        out.write_int("components", self.components as i32, 0);
        out.write_bool("normalized", self.normalized, false);
        let instance_span =
            i32::try_from(self.instance_span).map_err(|e| SerializeError::FieldError {
                field: "instance_span".to_owned(),
                message: format!("{} does not fit an int: {e}", self.instance_span),
            })?;
        out.write_int("instance_span", instance_span, 0);
        if let Some(data) = &self.data {
            out.write_enum("format", data.format(), VertexFormat::Float);
            out.write_bytes("data", Some(&data.to_le_bytes()));
        }
        Ok(())
    }

    fn read(input: &mut InputCapsule<'_>) -> Result<Self, DeserializeError> {
        let buffer_type = match input.read_field("buffer_type") {
            Some(Value::String(name)) => VertexBufferType::from_name(&name).ok_or_else(|| {
                DeserializeError::invalid("buffer_type", format!("unknown buffer type '{name}'"))
            })?,
            Some(other) => return Err(DeserializeError::mismatch("buffer_type", "String", &other)),
            None => return Err(DeserializeError::invalid("buffer_type", "missing")),
        };
        let usage = input.read_enum("usage", Usage::Static)?;
        let components = u8::try_from(input.read_int("components", 0)?)
            .map_err(|e| DeserializeError::invalid("components", e.to_string()))?;
        let normalized = input.read_bool("normalized", false)?;
        let instance_span = u32::try_from(input.read_int("instance_span", 0)?)
            .map_err(|e| DeserializeError::invalid("instance_span", e.to_string()))?;
        let format = input.read_enum("format", VertexFormat::Float)?;
        let data = match input.read_bytes("data")? {
            Some(bytes) => Some(VertexData::from_le_bytes(format, &bytes).ok_or_else(|| {
                DeserializeError::invalid(
                    "data",
                    format!(
                        "{} bytes is not a multiple of the {format:?} size",
                        bytes.len()
                    ),
                )
            })?),
            None => None,
        };

        Ok(Self {
            buffer_type,
            usage,
            components,
            normalized,
            instance_span,
            data,
        })
    }
}

impl GraphClone for VertexBuffer {
    fn shallow_copy(&self) -> Self {
        self.clone()
    }

    fn resolve_fields(&mut self, _cloner: &mut Cloner) {}
}

/// Reference-counted, lockable handle to a [`VertexBuffer`].
///
/// Cloning the handle aliases the buffer: writes through one handle are
/// visible through every other. Use [`deep_clone`](Self::deep_clone) for an
/// independent copy.
///
/// The buffer type is fixed at construction and cached in the handle, so
/// [`buffer_type`](Self::buffer_type) never takes the lock.
#[derive(Clone)]
pub struct SharedBuffer {
    buffer_type: VertexBufferType,
    inner: Arc<RwLock<VertexBuffer>>,
}

impl SharedBuffer {
    pub fn new(buffer: VertexBuffer) -> Self {
        Self {
            buffer_type: buffer.buffer_type,
            inner: Arc::new(RwLock::new(buffer)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, VertexBuffer> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, VertexBuffer> {
        self.inner.write()
    }

    pub fn buffer_type(&self) -> VertexBufferType {
        self.buffer_type
    }

    /// Copy the buffer and its element data into a new, unshared handle.
    pub fn deep_clone(&self) -> Self {
        Self::new(self.inner.read().clone())
    }

    /// Whether both handles refer to the same buffer instance.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Number of handles currently aliasing this buffer.
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Pin this buffer in `cloner` so graph copies keep sharing it.
    pub fn share_in(&self, cloner: &mut Cloner) {
        cloner.share(&self.inner);
    }
}

impl From<VertexBuffer> for SharedBuffer {
    fn from(buffer: VertexBuffer) -> Self {
        Self::new(buffer)
    }
}

impl std::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let buffer = self.inner.read();
        f.debug_struct("SharedBuffer")
            .field("buffer_type", &buffer.buffer_type)
            .field("usage", &buffer.usage)
            .field("components", &buffer.components)
            .field("format", &buffer.format())
            .field("len", &buffer.data.as_ref().map_or(0, VertexData::len))
            .finish()
    }
}

impl Savable for SharedBuffer {
    fn write(&self, out: &mut OutputCapsule<'_>) -> Result<(), SerializeError> {
        self.inner.read().write(out)
    }

    fn read(input: &mut InputCapsule<'_>) -> Result<Self, DeserializeError> {
        VertexBuffer::read(input).map(Self::new)
    }

    fn shared_identity(&self) -> Option<SharedIdentity> {
        Some(SharedIdentity::of(&self.inner))
    }
}

impl CloneResolve for SharedBuffer {
    fn resolve_clone(&self, cloner: &mut Cloner) -> Self {
        Self {
            buffer_type: self.buffer_type,
            inner: cloner.clone_arc(&self.inner),
        }
    }
}

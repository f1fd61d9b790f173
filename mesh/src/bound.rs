//! Bounding volume values owned by meshes.
//!
//! Meshes copy and persist the volume. Computing or intersecting bounds is
//! left to the scene layer.

use glam::Vec3;

use crate::cloner::{CloneResolve, Cloner};
use crate::serialize::{DeserializeError, InputCapsule, OutputCapsule, Savable, SerializeError};

/// A bounding volume enclosing a mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundingVolume {
    /// Axis-aligned box given by its center and half extents.
    Box { center: Vec3, extent: Vec3 },
    /// Sphere given by its center and radius.
    Sphere { center: Vec3, radius: f32 },
}

impl BoundingVolume {
    /// An empty box at the origin.
    pub const EMPTY: Self = Self::Box {
        center: Vec3::ZERO,
        extent: Vec3::ZERO,
    };

    pub fn center(&self) -> Vec3 {
        match self {
            Self::Box { center, .. } | Self::Sphere { center, .. } => *center,
        }
    }
}

impl Default for BoundingVolume {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Savable for BoundingVolume {
    fn write(&self, out: &mut OutputCapsule<'_>) -> Result<(), SerializeError> {
        match self {
            Self::Box { center, extent } => {
                out.write_float_array("center", Some(&center.to_array()));
                out.write_float_array("extent", Some(&extent.to_array()));
            }
            Self::Sphere { center, radius } => {
                out.write_float_array("center", Some(&center.to_array()));
                out.write_float("radius", *radius, 0.0);
                out.write_bool("sphere", true, false);
            }
        }
        Ok(())
    }

    fn read(input: &mut InputCapsule<'_>) -> Result<Self, DeserializeError> {
        let center = read_vec3(input, "center")?;
        if input.read_bool("sphere", false)? {
            Ok(Self::Sphere {
                center,
                radius: input.read_float("radius", 0.0)?,
            })
        } else {
            Ok(Self::Box {
                center,
                extent: read_vec3(input, "extent")?,
            })
        }
    }
}

fn read_vec3(input: &mut InputCapsule<'_>, name: &str) -> Result<Vec3, DeserializeError> {
    match input.read_float_array(name)? {
        None => Ok(Vec3::ZERO),
        Some(values) => <[f32; 3]>::try_from(values.as_slice())
            .map(Vec3::from_array)
            .map_err(|_| {
                DeserializeError::invalid(name, format!("expected 3 floats, found {}", values.len()))
            }),
    }
}

impl CloneResolve for BoundingVolume {
    fn resolve_clone(&self, _cloner: &mut Cloner) -> Self {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::{Exporter, Importer, Value};

    #[test]
    fn test_default_is_empty_box() {
        assert_eq!(BoundingVolume::default(), BoundingVolume::EMPTY);
        assert_eq!(BoundingVolume::default().center(), Vec3::ZERO);
    }

    #[test]
    fn test_box_roundtrip() {
        let bound = BoundingVolume::Box {
            center: Vec3::new(1.0, 2.0, 3.0),
            extent: Vec3::new(0.5, 0.5, 4.0),
        };
        let value = Exporter::new().save(&bound).unwrap();
        assert_eq!(Importer::new().load::<BoundingVolume>(value).unwrap(), bound);
    }

    #[test]
    fn test_sphere_roundtrip() {
        let bound = BoundingVolume::Sphere {
            center: Vec3::NEG_Y,
            radius: 2.5,
        };
        let value = Exporter::new().save(&bound).unwrap();
        assert_eq!(Importer::new().load::<BoundingVolume>(value).unwrap(), bound);
    }

    #[test]
    fn test_wrong_arity_is_rejected() {
        let value = Value::Map(vec![("center".into(), Value::FloatArray(vec![1.0]))]);
        assert!(Importer::new().load::<BoundingVolume>(value).is_err());
    }
}

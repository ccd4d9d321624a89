// Spatial anchors: a position and orientation in physical space

pub mod placement;

pub use glam::{Mat4, Quat, Vec3};
pub use placement::DevicePlacement;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::QUAT_NORM_EPSILON;

/// A persisted position + orientation in physical space.
///
/// Serialized as `{id, position: [x, y, z], rotation: [ix, iy, iz, r]}`.
/// Decoding rejects rotations that cannot be normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialAnchor {
    pub id: Uuid,
    pub position: Vec3,
    #[serde(deserialize_with = "deserialize_rotation")]
    pub rotation: Quat,
}

impl SpatialAnchor {
    /// New anchor with a fresh id. A missing or non-normalizable rotation
    /// becomes the identity rotation.
    pub fn new(position: Vec3, rotation: Option<Quat>) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            rotation: sanitize_rotation(rotation),
        }
    }

    /// Column-major homogeneous transform (rotation, then translation).
    pub fn transform(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }

    /// True when every component can be written to the store file.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite()
    }
}

/// Rotation of `angle` radians about `axis`, or `None` for a zero or
/// non-finite axis.
pub fn rotation_about(axis: Vec3, angle: f32) -> Option<Quat> {
    let axis = axis.try_normalize()?;
    angle.is_finite().then(|| Quat::from_axis_angle(axis, angle))
}

/// Unit rotation for `q`. Already-normalized input is returned unchanged so
/// a value read back from the store compares equal to the one written.
pub fn unit_rotation(q: Quat) -> Option<Quat> {
    if !q.is_finite() {
        return None;
    }
    if q.is_normalized() {
        return Some(q);
    }
    if q.length() < QUAT_NORM_EPSILON {
        return None;
    }
    Some(q.normalize())
}

pub(crate) fn sanitize_rotation(rotation: Option<Quat>) -> Quat {
    match rotation {
        None => Quat::IDENTITY,
        Some(q) => unit_rotation(q).unwrap_or_else(|| {
            log::warn!("Rotation {:?} cannot be normalized, using identity", q);
            Quat::IDENTITY
        }),
    }
}

fn deserialize_rotation<'de, D>(deserializer: D) -> std::result::Result<Quat, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let q = Quat::deserialize(deserializer)?;
    unit_rotation(q)
        .ok_or_else(|| serde::de::Error::custom(format!("rotation {:?} cannot be normalized", q.to_array())))
}

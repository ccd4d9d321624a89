// Device placement: binding of a device identity to a spatial anchor

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{sanitize_rotation, Quat, SpatialAnchor, Vec3};

/// A device bound to a point in physical space.
/// At most one placement per `device_id` is kept by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePlacement {
    pub id: Uuid,
    pub device_id: String,
    pub anchor: SpatialAnchor,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DevicePlacement {
    pub fn new(device_id: impl Into<String>, position: Vec3, rotation: Option<Quat>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            device_id: device_id.into(),
            anchor: SpatialAnchor::new(position, rotation),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.anchor.position
    }

    pub fn rotation(&self) -> Quat {
        self.anchor.rotation
    }

    /// Move the anchor, keeping its orientation.
    pub fn set_position(&mut self, position: Vec3) {
        self.anchor.position = position;
        self.touch();
    }

    /// Move and reorient the anchor.
    pub fn set_transform(&mut self, position: Vec3, rotation: Option<Quat>) {
        self.anchor.position = position;
        self.anchor.rotation = sanitize_rotation(rotation);
        self.touch();
    }

    /// Bump `updated_at`. Always moves strictly forward, even if the clock
    /// reads the same instant as the previous update.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
    }
}

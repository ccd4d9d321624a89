// Home model: controllable devices grouped into rooms

use serde::{Deserialize, Serialize};

use crate::constants::*;

/// Closed set of device classes the app knows how to present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceClass {
    Light,
    Outlet,
    Switch,
    Fan,
    Thermostat,
    Lock,
    GarageDoor,
    Sensor,
    Other,
}

impl DeviceClass {
    /// Only these classes expose a power-state characteristic we drive.
    pub fn supports_on_off(&self) -> bool {
        matches!(
            self,
            DeviceClass::Light | DeviceClass::Outlet | DeviceClass::Switch | DeviceClass::Fan
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeviceClass::Light => "light",
            DeviceClass::Outlet => "outlet",
            DeviceClass::Switch => "switch",
            DeviceClass::Fan => "fan",
            DeviceClass::Thermostat => "thermostat",
            DeviceClass::Lock => "lock",
            DeviceClass::GarageDoor => "garage-door",
            DeviceClass::Sensor => "sensor",
            DeviceClass::Other => "other",
        }
    }
}

/// Backend service type -> device class. Exact (case-insensitive) matches only.
const SERVICE_CLASS_TABLE: &[(&str, DeviceClass)] = &[
    (SERVICE_LIGHTBULB, DeviceClass::Light),
    (SERVICE_OUTLET, DeviceClass::Outlet),
    (SERVICE_SWITCH, DeviceClass::Switch),
    (SERVICE_FAN, DeviceClass::Fan),
    (SERVICE_FAN_V2, DeviceClass::Fan),
    (SERVICE_THERMOSTAT, DeviceClass::Thermostat),
    (SERVICE_LOCK_MECHANISM, DeviceClass::Lock),
    (SERVICE_GARAGE_DOOR_OPENER, DeviceClass::GarageDoor),
    (SERVICE_TEMPERATURE_SENSOR, DeviceClass::Sensor),
    (SERVICE_HUMIDITY_SENSOR, DeviceClass::Sensor),
    (SERVICE_MOTION_SENSOR, DeviceClass::Sensor),
    (SERVICE_CONTACT_SENSOR, DeviceClass::Sensor),
    (SERVICE_LIGHT_SENSOR, DeviceClass::Sensor),
];

/// Map a backend service type identifier to a device class.
/// Unrecognized identifiers map to `DeviceClass::Other`.
pub fn class_for_service_type(service_type: &str) -> DeviceClass {
    SERVICE_CLASS_TABLE
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(service_type))
        .map(|(_, class)| *class)
        .unwrap_or(DeviceClass::Other)
}

/// Class of an accessory from its service types: the first recognized
/// service wins, otherwise `Other`.
pub fn class_for_services<'a>(service_types: impl IntoIterator<Item = &'a str>) -> DeviceClass {
    service_types
        .into_iter()
        .map(class_for_service_type)
        .find(|class| *class != DeviceClass::Other)
        .unwrap_or(DeviceClass::Other)
}

/// A controllable device as cached for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub name: String,
    pub room_name: String,
    pub class: DeviceClass,
    pub is_on: bool,
}

impl Device {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        room_name: impl Into<String>,
        class: DeviceClass,
        is_on: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            room_name: room_name.into(),
            class,
            is_on,
        }
    }

    pub fn supports_on_off(&self) -> bool {
        self.class.supports_on_off()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    pub devices: Vec<Device>,
}

impl Room {
    pub fn new(id: impl Into<String>, name: impl Into<String>, devices: Vec<Device>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            devices,
        }
    }

    /// Synthetic room collecting devices with no backend room.
    pub fn unassigned(devices: Vec<Device>) -> Self {
        Room::new(UNASSIGNED_ROOM_ID, UNASSIGNED_ROOM_NAME, devices)
    }

    pub fn is_unassigned(&self) -> bool {
        self.id == UNASSIGNED_ROOM_ID
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn on_device_count(&self) -> usize {
        self.devices.iter().filter(|d| d.is_on).count()
    }

    pub fn any_on(&self) -> bool {
        self.devices.iter().any(|d| d.is_on)
    }

    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == device_id)
    }
}

/// Per-room counts for list headers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: String,
    pub name: String,
    pub device_count: usize,
    pub on_device_count: usize,
    pub any_on: bool,
}

impl From<&Room> for RoomSummary {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.clone(),
            name: room.name.clone(),
            device_count: room.device_count(),
            on_device_count: room.on_device_count(),
            any_on: room.any_on(),
        }
    }
}

// Spatial Home Constants
// Backend type identifiers follow the HomeKit Accessory Protocol short UUID form.

// Paths
pub const APP_FOLDER: &str = ".spatialhome";
pub const CONFIG_FILENAME: &str = "config.json";
pub const PLACEMENTS_FILENAME: &str = "device_placements.json";
pub const TEMP_FILE_PREFIX: &str = ".tmp_";

// Rooms
pub const UNASSIGNED_ROOM_ID: &str = "unassigned";
pub const UNASSIGNED_ROOM_NAME: &str = "Unassigned";

// Characteristic carrying the on/off flag of a power-controllable service
pub const CHARACTERISTIC_POWER_STATE: &str = "00000025-0000-1000-8000-0026BB765291";

// Service types
pub const SERVICE_ACCESSORY_INFORMATION: &str = "0000003E-0000-1000-8000-0026BB765291";
pub const SERVICE_LIGHTBULB: &str = "00000043-0000-1000-8000-0026BB765291";
pub const SERVICE_OUTLET: &str = "00000047-0000-1000-8000-0026BB765291";
pub const SERVICE_SWITCH: &str = "00000049-0000-1000-8000-0026BB765291";
pub const SERVICE_FAN: &str = "00000040-0000-1000-8000-0026BB765291";
pub const SERVICE_FAN_V2: &str = "000000B7-0000-1000-8000-0026BB765291";
pub const SERVICE_THERMOSTAT: &str = "0000004A-0000-1000-8000-0026BB765291";
pub const SERVICE_LOCK_MECHANISM: &str = "00000045-0000-1000-8000-0026BB765291";
pub const SERVICE_GARAGE_DOOR_OPENER: &str = "00000041-0000-1000-8000-0026BB765291";
pub const SERVICE_TEMPERATURE_SENSOR: &str = "0000008A-0000-1000-8000-0026BB765291";
pub const SERVICE_HUMIDITY_SENSOR: &str = "00000082-0000-1000-8000-0026BB765291";
pub const SERVICE_MOTION_SENSOR: &str = "00000085-0000-1000-8000-0026BB765291";
pub const SERVICE_CONTACT_SENSOR: &str = "00000080-0000-1000-8000-0026BB765291";
pub const SERVICE_LIGHT_SENSOR: &str = "00000084-0000-1000-8000-0026BB765291";

// Mock gateway timing (milliseconds)
pub const DEFAULT_MOCK_DELAY_MS: u64 = 300;

// Logging
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Geometry
pub const QUAT_NORM_EPSILON: f32 = 1e-6;

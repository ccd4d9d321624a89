// Spatial Home Error Types

use thiserror::Error;

/// Failures reported by a device gateway.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Not authorized to access the device registry")]
    NotAuthorized,

    #[error("No home is available in the device registry")]
    HomeNotFound,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Power characteristic not found on device: {0}")]
    CharacteristicNotFound(String),

    #[error("Device does not support on/off control: {0}")]
    ControlNotSupported(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Failures reported by the placement store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Failed to decode placements: {0}")]
    DecodingFailed(String),

    #[error("Failed to encode placements: {0}")]
    EncodingFailed(String),

    #[error("Failed to read placements: {0}")]
    ReadFailed(String),

    #[error("Failed to write placements: {0}")]
    WriteFailed(String),

    #[error("Placement not found")]
    PlacementNotFound,
}

/// Last failure recorded by the home controller, tagged with its origin.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    #[error("Device control error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Placement storage error: {0}")]
    Store(#[from] StoreError),
}

impl ControllerError {
    pub fn is_gateway(&self) -> bool {
        matches!(self, ControllerError::Gateway(_))
    }

    pub fn is_store(&self) -> bool {
        matches!(self, ControllerError::Store(_))
    }
}

#[derive(Error, Debug)]
pub enum SpatialHomeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Controller(#[from] ControllerError),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SpatialHomeError>;

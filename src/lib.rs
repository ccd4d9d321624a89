// Spatial Home - Library Entry Point
//
// Smart-home devices placed in 3D space: device control through an async
// gateway, persisted placements, and the render proxies that mirror them.

pub mod constants;
pub mod error;
pub mod config;
pub mod spatial;
pub mod home;
pub mod store;
pub mod gateway;
pub mod reconcile;
pub mod entities;

pub use config::{AppConfig, ConfigLoad};
pub use entities::{PlacementMode, RenderSurface, SpatialEntityManager};
pub use error::{ControllerError, GatewayError, Result, SpatialHomeError, StoreError};
pub use gateway::{DeviceGateway, HomeRegistry, MockGateway, MockGatewayConfig, RegistryGateway};
pub use home::{Device, DeviceClass, Room, RoomSummary};
pub use reconcile::{ControllerSnapshot, EntityRecord, HomeController};
pub use spatial::{DevicePlacement, Quat, SpatialAnchor, Vec3};
pub use store::PlacementStore;

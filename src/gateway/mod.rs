// Device control gateway -- the only path to the authoritative device backend

pub mod authorization;
pub mod completion;
pub mod mock;
pub mod registry;

pub use mock::{MockGateway, MockGatewayConfig};
pub use registry::{HomeRegistry, RegistryGateway};

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::home::{Device, Room};

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Asynchronous device control. Implemented by the registry adapter and by
/// the mock used in tests and demos.
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// Must complete successfully before the other operations are usable.
    /// Concurrent callers share one backend registration.
    async fn authorize(&self) -> GatewayResult<()>;

    fn is_authorized(&self) -> bool;

    /// Every room with its devices, plus an Unassigned room for room-less
    /// devices. A failed per-device state read yields `is_on = false`.
    async fn enumerate(&self) -> GatewayResult<Vec<Room>>;

    async fn read_state(&self, device: &Device) -> GatewayResult<bool>;

    async fn write_state(&self, device: &Device, is_on: bool) -> GatewayResult<()>;

    /// Read the live state and write its negation. Never trusts cached state.
    async fn toggle(&self, device: &Device) -> GatewayResult<bool> {
        ensure_controllable(device)?;
        let current = self.read_state(device).await?;
        let target = !current;
        self.write_state(device, target).await?;
        log::debug!("Toggled {} from {} to {}", device.id, current, target);
        Ok(target)
    }

    /// Name for logging
    fn name(&self) -> &str;
}

/// Rejects devices whose class cannot be switched on or off.
pub fn ensure_controllable(device: &Device) -> GatewayResult<()> {
    if device.supports_on_off() {
        Ok(())
    } else {
        Err(GatewayError::ControlNotSupported(device.id.clone()))
    }
}

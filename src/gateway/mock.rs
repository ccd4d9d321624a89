// Mock gateway -- deterministic in-memory home with artificial latency
// Reproduces every gateway error so callers cannot tell it from the registry
// adapter except by configuration.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::authorization::AuthorizationGate;
use super::completion::Resolver;
use super::{ensure_controllable, DeviceGateway, GatewayResult};
use crate::constants::DEFAULT_MOCK_DELAY_MS;
use crate::error::GatewayError;
use crate::home::{Device, DeviceClass, Room};

#[derive(Debug, Clone)]
pub struct MockGatewayConfig {
    /// Latency applied to every backend operation.
    pub delay: Duration,
    /// When false, authorization fails with `NotAuthorized`.
    pub grant_access: bool,
    /// When false, `enumerate` fails with `HomeNotFound`.
    pub home_available: bool,
}

impl Default for MockGatewayConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(DEFAULT_MOCK_DELAY_MS),
            grant_access: true,
            home_available: true,
        }
    }
}

impl MockGatewayConfig {
    /// No latency; for tests.
    pub fn instant() -> Self {
        Self {
            delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct Backend {
    rooms: Vec<Room>,
    // Authoritative power state, by device id
    power: HashMap<String, bool>,
    failing_reads: HashSet<String>,
    failing_writes: HashSet<String>,
}

pub struct MockGateway {
    config: Mutex<MockGatewayConfig>,
    backend: Mutex<Backend>,
    auth: AuthorizationGate,
    registrations: AtomicUsize,
    writes: AtomicUsize,
}

impl MockGateway {
    /// Mock over the default seeded home.
    pub fn new(config: MockGatewayConfig) -> Self {
        Self::with_rooms(config, default_home())
    }

    pub fn with_rooms(config: MockGatewayConfig, rooms: Vec<Room>) -> Self {
        let power = rooms
            .iter()
            .flat_map(|r| r.devices.iter())
            .map(|d| (d.id.clone(), d.is_on))
            .collect();
        Self {
            config: Mutex::new(config),
            backend: Mutex::new(Backend {
                rooms,
                power,
                ..Backend::default()
            }),
            auth: AuthorizationGate::new(),
            registrations: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn set_grant_access(&self, grant: bool) {
        lock(&self.config).grant_access = grant;
    }

    pub fn set_home_available(&self, available: bool) {
        lock(&self.config).home_available = available;
    }

    /// Reads of this device fail with `OperationFailed`.
    pub fn fail_reads_for(&self, device_id: &str) {
        lock(&self.backend).failing_reads.insert(device_id.to_string());
    }

    /// Writes to this device fail with `OperationFailed`.
    pub fn fail_writes_for(&self, device_id: &str) {
        lock(&self.backend).failing_writes.insert(device_id.to_string());
    }

    pub fn clear_failures(&self) {
        let mut backend = lock(&self.backend);
        backend.failing_reads.clear();
        backend.failing_writes.clear();
    }

    /// Change a device out-of-band, as a physical switch would.
    pub fn set_backend_state(&self, device_id: &str, is_on: bool) {
        lock(&self.backend).power.insert(device_id.to_string(), is_on);
    }

    pub fn backend_state(&self, device_id: &str) -> Option<bool> {
        lock(&self.backend).power.get(device_id).copied()
    }

    /// Number of times authorization reached the backend.
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    /// Number of successful backend writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let delay = lock(&self.config).delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn require_authorized(&self) -> GatewayResult<()> {
        if self.auth.is_authorized() {
            Ok(())
        } else {
            Err(GatewayError::NotAuthorized)
        }
    }

    fn lookup(&self, device_id: &str) -> GatewayResult<Device> {
        let backend = lock(&self.backend);
        backend
            .rooms
            .iter()
            .flat_map(|r| r.devices.iter())
            .find(|d| d.id == device_id)
            .cloned()
            .ok_or_else(|| GatewayError::DeviceNotFound(device_id.to_string()))
    }

    fn read_now(&self, device: &Device) -> GatewayResult<bool> {
        let known = self.lookup(&device.id)?;
        if !known.supports_on_off() {
            return Err(GatewayError::CharacteristicNotFound(device.id.clone()));
        }
        let backend = lock(&self.backend);
        if backend.failing_reads.contains(&device.id) {
            return Err(GatewayError::OperationFailed(format!("read of {} failed", device.id)));
        }
        Ok(backend.power.get(&device.id).copied().unwrap_or(false))
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new(MockGatewayConfig::default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl DeviceGateway for MockGateway {
    async fn authorize(&self) -> GatewayResult<()> {
        let ticket = self.auth.begin();

        if ticket.must_register {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            // Joined callers are released even if this caller is cancelled mid-delay
            let resolver = Resolver::new(ticket.completion.clone(), Err(GatewayError::NotAuthorized));
            self.simulate_latency().await;
            let outcome = if lock(&self.config).grant_access {
                Ok(())
            } else {
                Err(GatewayError::NotAuthorized)
            };
            resolver.resolve(outcome);
        }

        ticket
            .completion
            .wait()
            .await
            .unwrap_or(Err(GatewayError::NotAuthorized))
    }

    fn is_authorized(&self) -> bool {
        self.auth.is_authorized()
    }

    async fn enumerate(&self) -> GatewayResult<Vec<Room>> {
        self.require_authorized()?;
        self.simulate_latency().await;

        if !lock(&self.config).home_available {
            return Err(GatewayError::HomeNotFound);
        }

        let mut rooms = lock(&self.backend).rooms.clone();
        for device in rooms.iter_mut().flat_map(|r| r.devices.iter_mut()) {
            device.is_on = if device.supports_on_off() {
                self.read_now(device).unwrap_or_else(|e| {
                    log::warn!("Could not read state of {}, assuming off: {}", device.id, e);
                    false
                })
            } else {
                false
            };
        }
        Ok(rooms)
    }

    async fn read_state(&self, device: &Device) -> GatewayResult<bool> {
        self.require_authorized()?;
        self.simulate_latency().await;
        self.read_now(device)
    }

    async fn write_state(&self, device: &Device, is_on: bool) -> GatewayResult<()> {
        ensure_controllable(device)?;
        self.require_authorized()?;
        self.simulate_latency().await;

        let known = self.lookup(&device.id)?;
        if !known.supports_on_off() {
            return Err(GatewayError::CharacteristicNotFound(device.id.clone()));
        }

        let mut backend = lock(&self.backend);
        if backend.failing_writes.contains(&device.id) {
            return Err(GatewayError::OperationFailed(format!("write to {} failed", device.id)));
        }
        backend.power.insert(device.id.clone(), is_on);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Seeded demo home: 4 rooms, 13 devices, 3 of them on.
pub fn default_home() -> Vec<Room> {
    fn room(id: &str, name: &str, devices: &[(&str, &str, DeviceClass, bool)]) -> Room {
        Room::new(
            id,
            name,
            devices
                .iter()
                .map(|(id, device_name, class, on)| Device::new(*id, *device_name, name, *class, *on))
                .collect(),
        )
    }

    vec![
        room(
            "living-room",
            "Living Room",
            &[
                ("living-ceiling-light", "Ceiling Light", DeviceClass::Light, true),
                ("living-floor-lamp", "Floor Lamp", DeviceClass::Light, false),
                ("living-tv-outlet", "TV Outlet", DeviceClass::Outlet, true),
                ("living-thermostat", "Thermostat", DeviceClass::Thermostat, false),
            ],
        ),
        room(
            "kitchen",
            "Kitchen",
            &[
                ("kitchen-pendants", "Pendant Lights", DeviceClass::Light, false),
                ("kitchen-coffee-maker", "Coffee Maker", DeviceClass::Outlet, true),
                ("kitchen-fan", "Range Fan", DeviceClass::Fan, false),
            ],
        ),
        room(
            "bedroom",
            "Bedroom",
            &[
                ("bedroom-bedside-lamp", "Bedside Lamp", DeviceClass::Light, false),
                ("bedroom-ceiling-fan", "Ceiling Fan", DeviceClass::Fan, false),
                ("bedroom-motion-sensor", "Motion Sensor", DeviceClass::Sensor, false),
            ],
        ),
        room(
            "garage",
            "Garage",
            &[
                ("garage-door", "Garage Door", DeviceClass::GarageDoor, false),
                ("garage-workbench", "Workbench Switch", DeviceClass::Switch, false),
                ("garage-side-lock", "Side Door Lock", DeviceClass::Lock, false),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ready() -> MockGateway {
        let gateway = MockGateway::new(MockGatewayConfig::instant());
        gateway.authorize().await.unwrap();
        gateway
    }

    fn find(rooms: &[Room], id: &str) -> Device {
        rooms.iter().flat_map(|r| r.devices.iter()).find(|d| d.id == id).cloned().unwrap()
    }

    #[tokio::test]
    async fn test_default_home_counts() {
        let gateway = ready().await;
        let rooms = gateway.enumerate().await.unwrap();
        assert_eq!(rooms.len(), 4);
        let devices: Vec<&Device> = rooms.iter().flat_map(|r| r.devices.iter()).collect();
        assert_eq!(devices.len(), 13);
        assert_eq!(devices.iter().filter(|d| d.is_on).count(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_authorize_registers_once() {
        let gateway = MockGateway::new(MockGatewayConfig {
            delay: Duration::from_millis(20),
            ..MockGatewayConfig::default()
        });
        let (a, b) = tokio::join!(gateway.authorize(), gateway.authorize());
        assert_eq!(a, Ok(()));
        assert_eq!(b, Ok(()));
        assert_eq!(gateway.registrations(), 1);
    }

    #[tokio::test]
    async fn test_denied_then_granted() {
        let gateway = MockGateway::new(MockGatewayConfig {
            grant_access: false,
            ..MockGatewayConfig::instant()
        });
        assert_eq!(gateway.authorize().await, Err(GatewayError::NotAuthorized));
        assert_eq!(gateway.enumerate().await, Err(GatewayError::NotAuthorized));

        gateway.set_grant_access(true);
        assert_eq!(gateway.authorize().await, Ok(()));
        assert_eq!(gateway.registrations(), 2);
    }

    #[tokio::test]
    async fn test_home_not_found() {
        let gateway = ready().await;
        gateway.set_home_available(false);
        assert_eq!(gateway.enumerate().await, Err(GatewayError::HomeNotFound));
    }

    #[tokio::test]
    async fn test_failed_read_defaults_to_off_in_enumeration() {
        let gateway = ready().await;
        gateway.fail_reads_for("living-ceiling-light");
        let rooms = gateway.enumerate().await.unwrap();
        assert!(!find(&rooms, "living-ceiling-light").is_on);
        let light = find(&rooms, "living-ceiling-light");
        assert!(matches!(gateway.read_state(&light).await, Err(GatewayError::OperationFailed(_))));
    }

    #[tokio::test]
    async fn test_uncontrollable_devices_rejected_without_write() {
        let gateway = ready().await;
        let rooms = gateway.enumerate().await.unwrap();
        for device in rooms.iter().flat_map(|r| r.devices.iter()).filter(|d| !d.supports_on_off()) {
            assert_eq!(
                gateway.write_state(device, true).await,
                Err(GatewayError::ControlNotSupported(device.id.clone()))
            );
            assert_eq!(
                gateway.toggle(device).await,
                Err(GatewayError::ControlNotSupported(device.id.clone()))
            );
        }
        assert_eq!(gateway.write_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_device() {
        let gateway = ready().await;
        let ghost = Device::new("ghost", "Ghost", "Attic", DeviceClass::Light, false);
        assert_eq!(gateway.read_state(&ghost).await, Err(GatewayError::DeviceNotFound("ghost".to_string())));
        assert_eq!(
            gateway.write_state(&ghost, true).await,
            Err(GatewayError::DeviceNotFound("ghost".to_string()))
        );
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_state() {
        let gateway = ready().await;
        let rooms = gateway.enumerate().await.unwrap();
        let fan = find(&rooms, "kitchen-fan");
        assert_eq!(gateway.toggle(&fan).await, Ok(true));
        assert_eq!(gateway.toggle(&fan).await, Ok(false));
        assert_eq!(gateway.backend_state("kitchen-fan"), Some(fan.is_on));
    }

    #[tokio::test]
    async fn test_write_failure_leaves_backend_untouched() {
        let gateway = ready().await;
        gateway.fail_writes_for("garage-workbench");
        let rooms = gateway.enumerate().await.unwrap();
        let switch = find(&rooms, "garage-workbench");
        assert!(matches!(gateway.toggle(&switch).await, Err(GatewayError::OperationFailed(_))));
        assert_eq!(gateway.backend_state("garage-workbench"), Some(false));
    }
}

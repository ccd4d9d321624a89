// Registry adapter: DeviceGateway over a callback-based home registry
//
// The registry is the external home-automation backend. Each read or write
// completes through exactly one callback, possibly on a backend thread; the
// adapter turns each callback into a single resolution of a Completion and
// awaits it, so callers never touch backend threads directly.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use super::authorization::{AuthorizationGate, AuthorizationOutcome};
use super::completion::{Completion, Resolver};
use super::{ensure_controllable, DeviceGateway, GatewayResult};
use crate::constants::{CHARACTERISTIC_POWER_STATE, UNASSIGNED_ROOM_NAME};
use crate::error::GatewayError;
use crate::home::{class_for_services, Device, DeviceClass, Room};

/// Completion callback for a single backend request. `Err` carries the
/// backend's failure description.
pub type Callback<T> = Box<dyn FnOnce(Result<T, String>) + Send + 'static>;

/// Access-status observer. The backend may call it more than once.
pub type AccessObserver = Box<dyn Fn(Result<(), String>) + Send + Sync + 'static>;

/// Raw characteristic value as reported by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum CharacteristicValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CharacteristicValue {
    /// Interpret as an on/off flag. Integers map zero to off, anything else to on.
    pub fn as_power_state(&self) -> Option<bool> {
        match self {
            CharacteristicValue::Bool(b) => Some(*b),
            CharacteristicValue::Int(i) => Some(*i != 0),
            CharacteristicValue::Float(_) | CharacteristicValue::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharacteristicRecord {
    pub id: String,
    pub characteristic_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRecord {
    pub service_type: String,
    pub characteristics: Vec<CharacteristicRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccessoryRecord {
    pub id: String,
    pub name: String,
    pub room_id: Option<String>,
    pub services: Vec<ServiceRecord>,
}

impl AccessoryRecord {
    pub fn device_class(&self) -> DeviceClass {
        class_for_services(self.services.iter().map(|s| s.service_type.as_str()))
    }

    /// First characteristic of the well-known power-state type.
    pub fn power_characteristic(&self) -> Option<&CharacteristicRecord> {
        self.services
            .iter()
            .flat_map(|s| s.characteristics.iter())
            .find(|c| c.characteristic_type.eq_ignore_ascii_case(CHARACTERISTIC_POWER_STATE))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomRecord {
    pub id: String,
    pub name: String,
}

/// Snapshot of the primary home as the registry currently knows it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HomeSnapshot {
    pub name: String,
    pub rooms: Vec<RoomRecord>,
    pub accessories: Vec<AccessoryRecord>,
}

impl HomeSnapshot {
    pub fn accessory(&self, id: &str) -> Option<&AccessoryRecord> {
        self.accessories.iter().find(|a| a.id == id)
    }
}

/// External device registry, reachable only through callbacks.
pub trait HomeRegistry: Send + Sync {
    /// Register for the access decision. Called once per authorization attempt.
    fn register_access_observer(&self, observer: AccessObserver);

    fn primary_home(&self) -> Option<HomeSnapshot>;

    fn read_characteristic(
        &self,
        accessory_id: &str,
        characteristic_id: &str,
        done: Callback<CharacteristicValue>,
    );

    fn write_characteristic(
        &self,
        accessory_id: &str,
        characteristic_id: &str,
        value: CharacteristicValue,
        done: Callback<()>,
    );
}

/// Callback + completion pair for one backend request.
fn bridge<T: Clone + Send + 'static>(op: &'static str) -> (Callback<T>, Completion<GatewayResult<T>>) {
    let completion = Completion::new();
    let resolver = Resolver::new(
        completion.clone(),
        Err(GatewayError::OperationFailed(format!("{} callback was dropped", op))),
    );
    let done: Callback<T> = Box::new(move |result: Result<T, String>| {
        resolver.resolve(result.map_err(GatewayError::OperationFailed));
    });
    (done, completion)
}

async fn settle<T: Clone + Send + 'static>(
    completion: Completion<GatewayResult<T>>,
    op: &'static str,
) -> GatewayResult<T> {
    completion
        .wait()
        .await
        .unwrap_or_else(|| Err(GatewayError::OperationFailed(format!("{} never completed", op))))
}

/// Resolves the authorization completion with `NotAuthorized` if the
/// registry drops the observer without ever reporting.
struct ObserverGuard(Completion<AuthorizationOutcome>);

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        self.0.resolve(Err(GatewayError::NotAuthorized));
    }
}

pub struct RegistryGateway {
    registry: Arc<dyn HomeRegistry>,
    auth: AuthorizationGate,
}

impl RegistryGateway {
    pub fn new(registry: Arc<dyn HomeRegistry>) -> Self {
        Self {
            registry,
            auth: AuthorizationGate::new(),
        }
    }

    fn require_authorized(&self) -> GatewayResult<()> {
        if self.auth.is_authorized() {
            Ok(())
        } else {
            Err(GatewayError::NotAuthorized)
        }
    }

    fn home(&self) -> GatewayResult<HomeSnapshot> {
        self.registry.primary_home().ok_or(GatewayError::HomeNotFound)
    }

    async fn read_power(&self, accessory: &AccessoryRecord) -> GatewayResult<bool> {
        let characteristic = accessory
            .power_characteristic()
            .ok_or_else(|| GatewayError::CharacteristicNotFound(accessory.id.clone()))?;

        let (done, completion) = bridge::<CharacteristicValue>("read");
        self.registry.read_characteristic(&accessory.id, &characteristic.id, done);
        let value = settle(completion, "read").await?;

        value.as_power_state().ok_or_else(|| {
            GatewayError::OperationFailed(format!(
                "unexpected power state value {:?} from {}",
                value, accessory.id
            ))
        })
    }
}

#[async_trait]
impl DeviceGateway for RegistryGateway {
    async fn authorize(&self) -> GatewayResult<()> {
        let ticket = self.auth.begin();

        if ticket.must_register {
            log::debug!("Registering for registry access");
            let guard = ObserverGuard(ticket.completion.clone());
            self.registry.register_access_observer(Box::new(move |result| {
                let outcome = result.map_err(|detail| {
                    log::warn!("Registry access denied: {}", detail);
                    GatewayError::NotAuthorized
                });
                if guard.0.resolve(outcome) {
                    log::info!("Registry authorization resolved");
                }
            }));
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
        let home = self.home()?;

        let room_names: HashMap<&str, &str> = home
            .rooms
            .iter()
            .map(|r| (r.id.as_str(), r.name.as_str()))
            .collect();

        let states = join_all(home.accessories.iter().map(|accessory| async move {
            if !accessory.device_class().supports_on_off() {
                return false;
            }
            match self.read_power(accessory).await {
                Ok(on) => on,
                Err(e) => {
                    log::warn!("Could not read state of {}, assuming off: {}", accessory.id, e);
                    false
                }
            }
        }))
        .await;

        let mut by_room: HashMap<&str, Vec<Device>> = HashMap::new();
        let mut unassigned = Vec::new();

        for (accessory, is_on) in home.accessories.iter().zip(states) {
            let known_room = accessory
                .room_id
                .as_deref()
                .and_then(|id| room_names.get(id).map(|name| (id, *name)));

            let room_name = known_room.map(|(_, name)| name).unwrap_or(UNASSIGNED_ROOM_NAME);
            let device = Device::new(
                accessory.id.clone(),
                accessory.name.clone(),
                room_name,
                accessory.device_class(),
                is_on,
            );

            match known_room {
                Some((id, _)) => by_room.entry(id).or_default().push(device),
                None => unassigned.push(device),
            }
        }

        let mut rooms: Vec<Room> = home
            .rooms
            .iter()
            .map(|r| Room::new(r.id.clone(), r.name.clone(), by_room.remove(r.id.as_str()).unwrap_or_default()))
            .collect();

        if !unassigned.is_empty() {
            rooms.push(Room::unassigned(unassigned));
        }

        log::info!(
            "Enumerated {} rooms, {} devices from {}",
            rooms.len(),
            home.accessories.len(),
            home.name
        );
        Ok(rooms)
    }

    async fn read_state(&self, device: &Device) -> GatewayResult<bool> {
        self.require_authorized()?;
        let home = self.home()?;
        let accessory = home
            .accessory(&device.id)
            .ok_or_else(|| GatewayError::DeviceNotFound(device.id.clone()))?;
        self.read_power(accessory).await
    }

    async fn write_state(&self, device: &Device, is_on: bool) -> GatewayResult<()> {
        ensure_controllable(device)?;
        self.require_authorized()?;
        let home = self.home()?;
        let accessory = home
            .accessory(&device.id)
            .ok_or_else(|| GatewayError::DeviceNotFound(device.id.clone()))?;
        let characteristic = accessory
            .power_characteristic()
            .ok_or_else(|| GatewayError::CharacteristicNotFound(device.id.clone()))?;

        let (done, completion) = bridge::<()>("write");
        self.registry.write_characteristic(
            &accessory.id,
            &characteristic.id,
            CharacteristicValue::Bool(is_on),
            done,
        );
        settle(completion, "write").await?;

        log::debug!("Set {} to {}", device.id, if is_on { "on" } else { "off" });
        Ok(())
    }

    fn name(&self) -> &str {
        "registry"
    }
}

// State reconciliation -- keeps cached rooms/devices, stored placements and
// spatial proxies consistent with the authoritative backend.
//
// The controller is the only component that talks to both the gateway and the
// placement store, and the only one that mutates cached state. Commands take
// `&mut self`, so they run one at a time on the owning task; gateway callbacks
// are resolved into awaited values before any cached state changes.

pub mod filter;


use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::error::{ControllerError, GatewayError, StoreError};
use crate::gateway::DeviceGateway;
use crate::home::{Device, Room, RoomSummary};
use crate::spatial::{DevicePlacement, Quat, Vec3};
use crate::store::PlacementStore;

/// Pure data behind one spatial proxy: a placed, known device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub device: Device,
    pub placement: DevicePlacement,
}

impl EntityRecord {
    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    pub fn is_on(&self) -> bool {
        self.device.is_on
    }
}

/// State published to observers after every command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerSnapshot {
    pub rooms: Vec<Room>,
    pub placements: Vec<DevicePlacement>,
    pub is_loading: bool,
    pub last_error: Option<ControllerError>,
    pub selected_room: Option<String>,
    pub search_text: String,
}

pub struct HomeController {
    gateway: Arc<dyn DeviceGateway>,
    store: PlacementStore,
    rooms: Vec<Room>,
    placements: Vec<DevicePlacement>,
    selected_room: Option<String>,
    search_text: String,
    is_loading: bool,
    last_error: Option<ControllerError>,
    publisher: watch::Sender<ControllerSnapshot>,
}

impl HomeController {
    pub fn new(gateway: Arc<dyn DeviceGateway>, store: PlacementStore) -> Self {
        let (publisher, _) = watch::channel(ControllerSnapshot::default());
        Self {
            gateway,
            store,
            rooms: Vec::new(),
            placements: Vec::new(),
            selected_room: None,
            search_text: String::new(),
            is_loading: false,
            last_error: None,
            publisher,
        }
    }

    // --- Observed state ---

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn placements(&self) -> &[DevicePlacement] {
        &self.placements
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn last_error(&self) -> Option<&ControllerError> {
        self.last_error.as_ref()
    }

    /// The last error as a crate-level `Result`, for entry points.
    pub fn check(&self) -> crate::error::Result<()> {
        match &self.last_error {
            Some(e) => Err(e.clone().into()),
            None => Ok(()),
        }
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
        self.publish();
    }

    pub fn selected_room(&self) -> Option<&str> {
        self.selected_room.as_deref()
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn store(&self) -> &PlacementStore {
        &self.store
    }

    pub fn gateway(&self) -> Arc<dyn DeviceGateway> {
        Arc::clone(&self.gateway)
    }

    /// Receiver that sees a fresh snapshot after each command completes.
    pub fn subscribe(&self) -> watch::Receiver<ControllerSnapshot> {
        self.publisher.subscribe()
    }

    // --- Gateway commands ---

    /// Explicit (re-)authorization.
    pub async fn authorize(&mut self) -> bool {
        self.last_error = None;
        let ok = self.ensure_authorized().await;
        self.publish();
        ok
    }

    /// Load rooms from the gateway and placements from the store.
    pub async fn fetch(&mut self) -> bool {
        self.last_error = None;
        self.is_loading = true;
        self.publish();

        let mut first_error: Option<ControllerError> = None;

        if self.ensure_authorized().await {
            match self.gateway.enumerate().await {
                Ok(rooms) => {
                    log::info!("Fetched {} rooms from {} gateway", rooms.len(), self.gateway.name());
                    self.rooms = rooms;
                }
                Err(e) => {
                    log::error!("Fetching devices failed: {}", e);
                    first_error = Some(e.into());
                }
            }
        } else {
            first_error = self.last_error.take();
        }

        match self.store.load_all() {
            Ok(placements) => self.placements = dedupe_by_device(placements),
            Err(e) => {
                log::error!("Loading placements failed: {}", e);
                first_error.get_or_insert(e.into());
            }
        }

        self.is_loading = false;
        self.last_error = first_error;
        self.publish();
        self.last_error.is_none()
    }

    /// Flip the device's power. Returns the backend-confirmed new state.
    pub async fn toggle(&mut self, device: &Device) -> Option<bool> {
        self.last_error = None;
        if !self.ensure_authorized().await {
            self.publish();
            return None;
        }

        let result = self.gateway.toggle(device).await;
        let outcome = match result {
            Ok(is_on) => {
                self.apply_power(&device.id, is_on);
                Some(is_on)
            }
            Err(e) => {
                self.fail_gateway("toggle", &device.id, e);
                None
            }
        };
        self.publish();
        outcome
    }

    pub async fn set_power(&mut self, device: &Device, is_on: bool) -> bool {
        self.last_error = None;
        if !self.ensure_authorized().await {
            self.publish();
            return false;
        }

        let ok = match self.gateway.write_state(device, is_on).await {
            Ok(()) => {
                self.apply_power(&device.id, is_on);
                true
            }
            Err(e) => {
                self.fail_gateway("set power", &device.id, e);
                false
            }
        };
        self.publish();
        ok
    }

    /// Re-read one device from the backend and update the cache.
    pub async fn refresh_device(&mut self, device: &Device) -> Option<bool> {
        self.last_error = None;
        if !self.ensure_authorized().await {
            self.publish();
            return None;
        }

        let outcome = match self.gateway.read_state(device).await {
            Ok(is_on) => {
                self.apply_power(&device.id, is_on);
                Some(is_on)
            }
            Err(e) => {
                self.fail_gateway("refresh", &device.id, e);
                None
            }
        };
        self.publish();
        outcome
    }

    // --- Placement commands ---
    // Store first; the cache changes only after the store accepted the change.

    pub fn load_placements(&mut self) -> bool {
        self.last_error = None;
        let ok = match self.store.load_all() {
            Ok(placements) => {
                self.placements = dedupe_by_device(placements);
                true
            }
            Err(e) => {
                self.fail_store("load placements", e);
                false
            }
        };
        self.publish();
        ok
    }

    /// Place (or re-place) a device. Replaces any existing placement for it.
    pub fn place(&mut self, device: &Device, position: Vec3, rotation: Option<Quat>) -> Option<DevicePlacement> {
        self.last_error = None;
        let placement = DevicePlacement::new(device.id.clone(), position, rotation);

        let outcome = match self.store.save(&placement) {
            Ok(()) => {
                self.placements.retain(|p| p.device_id != placement.device_id);
                self.placements.push(placement.clone());
                log::info!("Placed {} at {:?}", device.id, position);
                Some(placement)
            }
            Err(e) => {
                self.fail_store("place", e);
                None
            }
        };
        self.publish();
        outcome
    }

    pub fn update_position(&mut self, device_id: &str, position: Vec3) -> Option<DevicePlacement> {
        self.update_placement(device_id, |p| p.set_position(position))
    }

    pub fn update_transform(
        &mut self,
        device_id: &str,
        position: Vec3,
        rotation: Option<Quat>,
    ) -> Option<DevicePlacement> {
        self.update_placement(device_id, |p| p.set_transform(position, rotation))
    }

    pub fn remove_placement(&mut self, device_id: &str) -> bool {
        self.last_error = None;
        let ok = match self.store.delete_by_device_id(device_id) {
            Ok(()) => {
                self.placements.retain(|p| p.device_id != device_id);
                log::info!("Removed placement for {}", device_id);
                true
            }
            Err(e) => {
                self.fail_store("remove placement", e);
                false
            }
        };
        self.publish();
        ok
    }

    pub fn clear_all(&mut self) -> bool {
        self.last_error = None;
        let ok = match self.store.delete_all() {
            Ok(()) => {
                self.placements.clear();
                true
            }
            Err(e) => {
                self.fail_store("clear placements", e);
                false
            }
        };
        self.publish();
        ok
    }

    // --- List filtering ---

    pub fn select_room(&mut self, room_id: Option<String>) {
        self.selected_room = room_id;
        self.publish();
    }

    pub fn search(&mut self, text: impl Into<String>) {
        self.search_text = text.into();
        self.publish();
    }

    /// Devices in the selected room matching the search text.
    pub fn filtered_devices(&self) -> Vec<&Device> {
        filter::filter_devices(&self.rooms, self.selected_room.as_deref(), &self.search_text)
    }

    pub fn filtered_rooms(&self) -> Vec<Room> {
        filter::filter_rooms(&self.rooms, &self.search_text)
    }

    // --- Derived views ---

    /// Every cached device once, in room order.
    pub fn all_devices(&self) -> Vec<&Device> {
        let mut seen = std::collections::HashSet::new();
        self.rooms
            .iter()
            .flat_map(|r| r.devices.iter())
            .filter(|d| seen.insert(d.id.as_str()))
            .collect()
    }

    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.rooms.iter().find_map(|r| r.device(device_id))
    }

    pub fn total_device_count(&self) -> usize {
        self.all_devices().len()
    }

    pub fn on_device_count(&self) -> usize {
        self.all_devices().iter().filter(|d| d.is_on).count()
    }

    pub fn room_summaries(&self) -> Vec<RoomSummary> {
        self.rooms.iter().map(RoomSummary::from).collect()
    }

    pub fn placement_for(&self, device_id: &str) -> Option<&DevicePlacement> {
        self.placements.iter().find(|p| p.device_id == device_id)
    }

    pub fn is_placed(&self, device_id: &str) -> bool {
        self.placement_for(device_id).is_some()
    }

    pub fn placed_devices(&self) -> Vec<&Device> {
        self.all_devices().into_iter().filter(|d| self.is_placed(&d.id)).collect()
    }

    pub fn unplaced_devices(&self) -> Vec<&Device> {
        self.all_devices().into_iter().filter(|d| !self.is_placed(&d.id)).collect()
    }

    /// Proxy data for every placement that refers to a known device.
    pub fn entity_records(&self) -> Vec<EntityRecord> {
        self.placements
            .iter()
            .filter_map(|placement| {
                self.device(&placement.device_id).map(|device| EntityRecord {
                    device: device.clone(),
                    placement: placement.clone(),
                })
            })
            .collect()
    }

    pub fn entity_record(&self, device_id: &str) -> Option<EntityRecord> {
        let placement = self.placement_for(device_id)?;
        let device = self.device(device_id)?;
        Some(EntityRecord {
            device: device.clone(),
            placement: placement.clone(),
        })
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            rooms: self.rooms.clone(),
            placements: self.placements.clone(),
            is_loading: self.is_loading,
            last_error: self.last_error.clone(),
            selected_room: self.selected_room.clone(),
            search_text: self.search_text.clone(),
        }
    }

    // --- Internals ---

    async fn ensure_authorized(&mut self) -> bool {
        if self.gateway.is_authorized() {
            return true;
        }
        match self.gateway.authorize().await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Authorization failed: {}", e);
                self.last_error = Some(e.into());
                false
            }
        }
    }

    /// Set the power flag on every cached copy of the device.
    fn apply_power(&mut self, device_id: &str, is_on: bool) {
        for device in self
            .rooms
            .iter_mut()
            .flat_map(|r| r.devices.iter_mut())
            .filter(|d| d.id == device_id)
        {
            device.is_on = is_on;
        }
    }

    fn update_placement(
        &mut self,
        device_id: &str,
        change: impl FnOnce(&mut DevicePlacement),
    ) -> Option<DevicePlacement> {
        self.last_error = None;

        let Some(mut updated) = self.placement_for(device_id).cloned() else {
            self.fail_store("update placement", StoreError::PlacementNotFound);
            self.publish();
            return None;
        };
        change(&mut updated);

        let outcome = match self.store.update(&updated) {
            Ok(()) => {
                if let Some(slot) = self.placements.iter_mut().find(|p| p.id == updated.id) {
                    *slot = updated.clone();
                }
                Some(updated)
            }
            Err(e) => {
                self.fail_store("update placement", e);
                None
            }
        };
        self.publish();
        outcome
    }

    fn fail_gateway(&mut self, op: &str, device_id: &str, error: GatewayError) {
        log::warn!("{} failed for {}: {}", op, device_id, error);
        self.last_error = Some(error.into());
    }

    fn fail_store(&mut self, op: &str, error: StoreError) {
        log::warn!("{} failed: {}", op, error);
        self.last_error = Some(error.into());
    }

    fn publish(&self) {
        self.publisher.send_replace(self.snapshot());
    }
}

/// Keep the last placement per device id, in file order.
fn dedupe_by_device(placements: Vec<DevicePlacement>) -> Vec<DevicePlacement> {
    let mut result: Vec<DevicePlacement> = Vec::with_capacity(placements.len());
    for placement in placements {
        result.retain(|p| p.device_id != placement.device_id);
        result.push(placement);
    }
    result
}

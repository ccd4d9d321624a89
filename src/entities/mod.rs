// Spatial entity lifecycle -- keeps one render proxy per placed device.
//
// Proxies are render-only handles looked up by device id. Device and placement
// data stays with the controller; the manager never mutates it directly and
// never shows a power state the backend has not confirmed.

#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};

use crate::home::Device;
use crate::reconcile::{EntityRecord, HomeController};
use crate::spatial::{DevicePlacement, Quat, SpatialAnchor, Vec3};

/// The render engine side of a proxy.
pub trait RenderSurface {
    type Handle;

    /// Create a proxy for `record`, positioned at its anchor and showing its power state.
    fn spawn(&mut self, record: &EntityRecord) -> Self::Handle;

    fn set_transform(&mut self, handle: &Self::Handle, anchor: &SpatialAnchor);

    fn set_powered(&mut self, handle: &Self::Handle, is_on: bool);

    fn despawn(&mut self, handle: Self::Handle);
}

/// Placement mode: idle, or waiting for the user to tap a location for one device.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PlacementMode {
    #[default]
    Idle,
    AwaitingLocation { device: Device },
}

pub struct SpatialEntityManager<R: RenderSurface> {
    surface: R,
    proxies: HashMap<String, R::Handle>,
    mode: PlacementMode,
}

impl<R: RenderSurface> SpatialEntityManager<R> {
    pub fn new(surface: R) -> Self {
        Self {
            surface,
            proxies: HashMap::new(),
            mode: PlacementMode::Idle,
        }
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut R {
        &mut self.surface
    }

    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    pub fn has_proxy(&self, device_id: &str) -> bool {
        self.proxies.contains_key(device_id)
    }

    /// Device ids that currently have a proxy, sorted.
    pub fn proxied_device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.proxies.keys().cloned().collect();
        ids.sort();
        ids
    }

    // --- Lifecycle ---

    /// Rebuild every proxy from the controller's placements.
    /// Placements for unknown devices get no proxy.
    pub fn load(&mut self, controller: &HomeController) {
        self.despawn_all();
        for record in controller.entity_records() {
            self.spawn(&record);
        }
        log::info!("Loaded {} spatial proxies", self.proxies.len());
    }

    /// Bring proxies in line with the controller without rebuilding the rest.
    pub fn sync(&mut self, controller: &HomeController) {
        let records = controller.entity_records();
        let live: HashSet<&str> = records.iter().map(|r| r.device_id()).collect();

        let orphaned: Vec<String> = self
            .proxies
            .keys()
            .filter(|id| !live.contains(id.as_str()))
            .cloned()
            .collect();
        for device_id in orphaned {
            self.despawn(&device_id);
        }

        for record in &records {
            match self.proxies.get(record.device_id()) {
                Some(handle) => {
                    self.surface.set_transform(handle, &record.placement.anchor);
                    self.surface.set_powered(handle, record.is_on());
                }
                None => self.spawn(record),
            }
        }
        log::debug!("Synced {} spatial proxies", self.proxies.len());
    }

    // --- Placement mode ---

    pub fn start_placing(&mut self, device: Device) {
        log::debug!("Awaiting location for {}", device.id);
        self.mode = PlacementMode::AwaitingLocation { device };
    }

    pub fn cancel_placing(&mut self) {
        self.mode = PlacementMode::Idle;
    }

    pub fn mode(&self) -> &PlacementMode {
        &self.mode
    }

    pub fn is_placing(&self) -> bool {
        matches!(self.mode, PlacementMode::AwaitingLocation { .. })
    }

    pub fn pending_device(&self) -> Option<&Device> {
        match &self.mode {
            PlacementMode::AwaitingLocation { device } => Some(device),
            PlacementMode::Idle => None,
        }
    }

    /// Place the pending device at the tapped location.
    ///
    /// Returns `None` when no device is pending. When the store rejects the
    /// placement the manager stays in awaiting-location mode and the error is
    /// left on the controller.
    pub fn place_device(
        &mut self,
        controller: &mut HomeController,
        position: Vec3,
        rotation: Option<Quat>,
    ) -> Option<DevicePlacement> {
        let device = self.pending_device()?.clone();
        let placement = controller.place(&device, position, rotation)?;

        // Re-placing a device replaces its proxy
        self.despawn(&device.id);
        let record = EntityRecord {
            device: controller.device(&device.id).cloned().unwrap_or(device),
            placement: placement.clone(),
        };
        self.spawn(&record);
        self.mode = PlacementMode::Idle;
        Some(placement)
    }

    // --- Interaction ---

    /// Tap on a proxy: toggle the device, then show the confirmed state.
    pub async fn handle_tap(&mut self, controller: &mut HomeController, device_id: &str) -> Option<bool> {
        let Some(device) = controller.device(device_id).cloned() else {
            log::warn!("Tap on unknown device {}", device_id);
            return None;
        };

        let is_on = controller.toggle(&device).await?;
        if let Some(handle) = self.proxies.get(device_id) {
            self.surface.set_powered(handle, is_on);
        }
        Some(is_on)
    }

    /// Drag: persist the new position, then move the proxy.
    pub fn reposition(
        &mut self,
        controller: &mut HomeController,
        device_id: &str,
        position: Vec3,
    ) -> Option<DevicePlacement> {
        let placement = controller.update_position(device_id, position)?;
        if let Some(handle) = self.proxies.get(device_id) {
            self.surface.set_transform(handle, &placement.anchor);
        }
        Some(placement)
    }

    /// Destroy the proxy, then delete the stored placement.
    ///
    /// Not transactional: if the delete fails the proxy is already gone while
    /// the placement survives, and the next `load` or `sync` brings it back.
    pub fn remove(&mut self, controller: &mut HomeController, device_id: &str) -> bool {
        self.despawn(device_id);
        let removed = controller.remove_placement(device_id);
        if !removed {
            log::warn!("Proxy for {} destroyed but its placement was not deleted", device_id);
        }
        removed
    }

    /// Delete every placement; proxies go only if the store was cleared.
    pub fn clear_all(&mut self, controller: &mut HomeController) -> bool {
        if !controller.clear_all() {
            return false;
        }
        self.despawn_all();
        true
    }

    // --- Internals ---

    fn spawn(&mut self, record: &EntityRecord) {
        let handle = self.surface.spawn(record);
        self.proxies.insert(record.device_id().to_string(), handle);
    }

    fn despawn(&mut self, device_id: &str) {
        if let Some(handle) = self.proxies.remove(device_id) {
            self.surface.despawn(handle);
        }
    }

    fn despawn_all(&mut self) {
        for (_, handle) in self.proxies.drain() {
            self.surface.despawn(handle);
        }
    }
}

// Entity manager scenarios over a recording render surface

use std::collections::HashMap;
use std::sync::Arc;

use tempfile::TempDir;

use super::*;
use crate::gateway::{MockGateway, MockGatewayConfig};
use crate::store::PlacementStore;

/// Render surface that keeps the live proxies and every call it received.
#[derive(Default)]
struct RecordingSurface {
    next: u32,
    live: HashMap<u32, Proxy>,
    spawned: usize,
    despawned: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct Proxy {
    device_id: String,
    position: Vec3,
    powered: bool,
}

impl RecordingSurface {
    fn proxy_for(&self, device_id: &str) -> Option<&Proxy> {
        self.live.values().find(|p| p.device_id == device_id)
    }
}

impl RenderSurface for RecordingSurface {
    type Handle = u32;

    fn spawn(&mut self, record: &EntityRecord) -> u32 {
        self.next += 1;
        self.spawned += 1;
        self.live.insert(
            self.next,
            Proxy {
                device_id: record.device_id().to_string(),
                position: record.placement.position(),
                powered: record.is_on(),
            },
        );
        self.next
    }

    fn set_transform(&mut self, handle: &u32, anchor: &SpatialAnchor) {
        if let Some(proxy) = self.live.get_mut(handle) {
            proxy.position = anchor.position;
        }
    }

    fn set_powered(&mut self, handle: &u32, is_on: bool) {
        if let Some(proxy) = self.live.get_mut(handle) {
            proxy.powered = is_on;
        }
    }

    fn despawn(&mut self, handle: u32) {
        self.despawned += 1;
        self.live.remove(&handle);
    }
}

struct Fixture {
    _dir: TempDir,
    gateway: Arc<MockGateway>,
    controller: HomeController,
    manager: SpatialEntityManager<RecordingSurface>,
}

async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let gateway = Arc::new(MockGateway::new(MockGatewayConfig::instant()));
    let store = PlacementStore::new(dir.path().join("placements.json"));
    let mut controller = HomeController::new(gateway.clone(), store);
    assert!(controller.fetch().await);
    Fixture {
        _dir: dir,
        gateway,
        controller,
        manager: SpatialEntityManager::new(RecordingSurface::default()),
    }
}

fn device(f: &Fixture, id: &str) -> Device {
    f.controller.device(id).cloned().unwrap()
}

fn place(f: &mut Fixture, id: &str, position: Vec3) -> DevicePlacement {
    let d = device(f, id);
    f.manager.start_placing(d);
    f.manager.place_device(&mut f.controller, position, None).unwrap()
}

fn corrupt_store(f: &Fixture) {
    std::fs::write(f.controller.store().path(), "[{").unwrap();
}

// ---------------------------------------------------------------
// Placement mode
// ---------------------------------------------------------------

#[tokio::test]
async fn test_place_device_without_pending_is_noop() {
    let mut f = fixture().await;
    assert!(f.manager.place_device(&mut f.controller, Vec3::ZERO, None).is_none());
    assert_eq!(f.manager.proxy_count(), 0);
    assert!(f.controller.placements().is_empty());
    assert!(f.controller.last_error().is_none());
}

#[tokio::test]
async fn test_start_and_cancel_placing() {
    let mut f = fixture().await;
    let lamp = device(&f, "living-floor-lamp");

    f.manager.start_placing(lamp.clone());
    assert!(f.manager.is_placing());
    assert_eq!(f.manager.pending_device(), Some(&lamp));

    // A second start replaces the pending device
    let fan = device(&f, "kitchen-fan");
    f.manager.start_placing(fan.clone());
    assert_eq!(f.manager.pending_device(), Some(&fan));

    f.manager.cancel_placing();
    assert_eq!(f.manager.mode(), &PlacementMode::Idle);
    assert!(f.manager.place_device(&mut f.controller, Vec3::ZERO, None).is_none());
}

#[tokio::test]
async fn test_place_device_persists_and_spawns() {
    let mut f = fixture().await;
    let placement = place(&mut f, "living-ceiling-light", Vec3::new(0.0, 2.4, -1.0));

    assert!(!f.manager.is_placing());
    assert!(f.manager.has_proxy("living-ceiling-light"));
    let proxy = f.manager.surface().proxy_for("living-ceiling-light").unwrap();
    assert_eq!(proxy.position, Vec3::new(0.0, 2.4, -1.0));
    assert!(proxy.powered);

    let stored = f.controller.store().get("living-ceiling-light").unwrap().unwrap();
    assert_eq!(stored.id, placement.id);
}

#[tokio::test]
async fn test_replacing_a_device_keeps_one_proxy() {
    let mut f = fixture().await;
    place(&mut f, "kitchen-pendants", Vec3::new(1.0, 2.0, 0.0));
    place(&mut f, "kitchen-pendants", Vec3::new(3.0, 2.0, 0.0));

    assert_eq!(f.manager.proxy_count(), 1);
    assert_eq!(f.manager.surface().live.len(), 1);
    assert_eq!(f.controller.store().count().unwrap(), 1);
    let proxy = f.manager.surface().proxy_for("kitchen-pendants").unwrap();
    assert_eq!(proxy.position, Vec3::new(3.0, 2.0, 0.0));
}

#[tokio::test]
async fn test_store_failure_keeps_awaiting_location() {
    let mut f = fixture().await;
    corrupt_store(&f);
    let lamp = device(&f, "bedroom-bedside-lamp");
    f.manager.start_placing(lamp.clone());

    assert!(f.manager.place_device(&mut f.controller, Vec3::ZERO, None).is_none());
    assert!(f.manager.is_placing());
    assert_eq!(f.manager.pending_device(), Some(&lamp));
    assert_eq!(f.manager.proxy_count(), 0);
    assert!(f.controller.last_error().unwrap().is_store());
}

// ---------------------------------------------------------------
// Load and sync
// ---------------------------------------------------------------

#[tokio::test]
async fn test_load_spawns_only_known_devices() {
    let mut f = fixture().await;
    let store = f.controller.store();
    store
        .save(&DevicePlacement::new("living-floor-lamp", Vec3::new(1.0, 0.0, 1.0), None))
        .unwrap();
    store
        .save(&DevicePlacement::new("removed-accessory", Vec3::ZERO, None))
        .unwrap();
    assert!(f.controller.load_placements());

    f.manager.load(&f.controller);
    assert_eq!(f.manager.proxied_device_ids(), vec!["living-floor-lamp".to_string()]);
    let proxy = f.manager.surface().proxy_for("living-floor-lamp").unwrap();
    assert_eq!(proxy.position, Vec3::new(1.0, 0.0, 1.0));
    assert!(!proxy.powered);
}

#[tokio::test]
async fn test_load_twice_does_not_duplicate() {
    let mut f = fixture().await;
    place(&mut f, "garage-workbench", Vec3::ZERO);
    f.manager.load(&f.controller);
    f.manager.load(&f.controller);
    assert_eq!(f.manager.proxy_count(), 1);
    assert_eq!(f.manager.surface().live.len(), 1);
}

#[tokio::test]
async fn test_sync_spawns_updates_and_despawns() {
    let mut f = fixture().await;
    place(&mut f, "living-floor-lamp", Vec3::ZERO);
    place(&mut f, "kitchen-fan", Vec3::ZERO);

    // Changes made behind the manager's back
    f.controller.remove_placement("kitchen-fan");
    f.controller
        .update_position("living-floor-lamp", Vec3::new(2.0, 0.0, 2.0))
        .unwrap();
    let outlet = device(&f, "living-tv-outlet");
    f.controller.place(&outlet, Vec3::new(-1.0, 0.5, 0.0), None).unwrap();
    let lamp = device(&f, "living-floor-lamp");
    f.controller.set_power(&lamp, true).await;

    let spawned_before = f.manager.surface().spawned;
    f.manager.sync(&f.controller);

    assert_eq!(
        f.manager.proxied_device_ids(),
        vec!["living-floor-lamp".to_string(), "living-tv-outlet".to_string()]
    );
    let surface = f.manager.surface();
    assert_eq!(surface.spawned, spawned_before + 1);
    let lamp_proxy = surface.proxy_for("living-floor-lamp").unwrap();
    assert_eq!(lamp_proxy.position, Vec3::new(2.0, 0.0, 2.0));
    assert!(lamp_proxy.powered);
    assert!(surface.proxy_for("kitchen-fan").is_none());
}

// ---------------------------------------------------------------
// Interaction
// ---------------------------------------------------------------

#[tokio::test]
async fn test_tap_shows_confirmed_state() {
    let mut f = fixture().await;
    place(&mut f, "living-floor-lamp", Vec3::ZERO);

    assert_eq!(f.manager.handle_tap(&mut f.controller, "living-floor-lamp").await, Some(true));
    assert!(f.manager.surface().proxy_for("living-floor-lamp").unwrap().powered);
    assert_eq!(f.gateway.backend_state("living-floor-lamp"), Some(true));

    assert_eq!(f.manager.handle_tap(&mut f.controller, "living-floor-lamp").await, Some(false));
    assert!(!f.manager.surface().proxy_for("living-floor-lamp").unwrap().powered);
}

#[tokio::test]
async fn test_rejected_tap_leaves_visual_unchanged() {
    let mut f = fixture().await;
    place(&mut f, "kitchen-coffee-maker", Vec3::ZERO);
    f.gateway.fail_writes_for("kitchen-coffee-maker");

    assert_eq!(f.manager.handle_tap(&mut f.controller, "kitchen-coffee-maker").await, None);
    assert!(f.manager.surface().proxy_for("kitchen-coffee-maker").unwrap().powered);
    assert!(f.controller.last_error().unwrap().is_gateway());
}

#[tokio::test]
async fn test_tap_on_sensor_is_not_supported() {
    let mut f = fixture().await;
    place(&mut f, "bedroom-motion-sensor", Vec3::ZERO);

    assert_eq!(f.manager.handle_tap(&mut f.controller, "bedroom-motion-sensor").await, None);
    assert!(!f.manager.surface().proxy_for("bedroom-motion-sensor").unwrap().powered);
    assert_eq!(f.gateway.write_count(), 0);
}

#[tokio::test]
async fn test_tap_on_unknown_device() {
    let mut f = fixture().await;
    assert_eq!(f.manager.handle_tap(&mut f.controller, "nope").await, None);
}

#[tokio::test]
async fn test_reposition_moves_proxy_after_store_accepts() {
    let mut f = fixture().await;
    let placed = place(&mut f, "bedroom-ceiling-fan", Vec3::new(0.0, 2.5, 0.0));

    let moved = f
        .manager
        .reposition(&mut f.controller, "bedroom-ceiling-fan", Vec3::new(1.0, 2.5, 1.0))
        .unwrap();
    assert!(moved.updated_at > placed.updated_at);
    assert_eq!(
        f.manager.surface().proxy_for("bedroom-ceiling-fan").unwrap().position,
        Vec3::new(1.0, 2.5, 1.0)
    );

    corrupt_store(&f);
    assert!(f
        .manager
        .reposition(&mut f.controller, "bedroom-ceiling-fan", Vec3::new(9.0, 9.0, 9.0))
        .is_none());
    assert_eq!(
        f.manager.surface().proxy_for("bedroom-ceiling-fan").unwrap().position,
        Vec3::new(1.0, 2.5, 1.0)
    );
}

// ---------------------------------------------------------------
// Removal
// ---------------------------------------------------------------

#[tokio::test]
async fn test_remove_despawns_and_deletes() {
    let mut f = fixture().await;
    place(&mut f, "garage-workbench", Vec3::ZERO);
    place(&mut f, "kitchen-fan", Vec3::ZERO);

    assert!(f.manager.remove(&mut f.controller, "garage-workbench"));
    assert!(!f.manager.has_proxy("garage-workbench"));
    assert!(f.manager.has_proxy("kitchen-fan"));
    assert!(!f.controller.store().has("garage-workbench").unwrap());
    assert!(!f.controller.is_placed("garage-workbench"));
}

#[tokio::test]
async fn test_failed_remove_is_recovered_by_reload() {
    let mut f = fixture().await;
    place(&mut f, "living-tv-outlet", Vec3::new(0.0, 0.3, 2.0));
    let contents = std::fs::read_to_string(f.controller.store().path()).unwrap();

    corrupt_store(&f);
    assert!(!f.manager.remove(&mut f.controller, "living-tv-outlet"));
    assert!(!f.manager.has_proxy("living-tv-outlet"));
    assert!(f.controller.is_placed("living-tv-outlet"));

    std::fs::write(f.controller.store().path(), contents).unwrap();
    assert!(f.controller.load_placements());
    f.manager.sync(&f.controller);
    assert!(f.manager.has_proxy("living-tv-outlet"));
}

#[tokio::test]
async fn test_clear_all() {
    let mut f = fixture().await;
    place(&mut f, "living-floor-lamp", Vec3::ZERO);
    place(&mut f, "kitchen-fan", Vec3::ZERO);

    assert!(f.manager.clear_all(&mut f.controller));
    assert_eq!(f.manager.proxy_count(), 0);
    assert!(f.manager.surface().live.is_empty());
    assert!(f.controller.placements().is_empty());
}

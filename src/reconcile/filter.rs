// Derived list views. Pure functions of cached rooms.

use crate::home::{Device, Room};

/// Case-insensitive substring match on device name or room name.
/// A blank query matches everything.
pub fn matches_query(device: &Device, query: &str) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    device.name.to_lowercase().contains(&needle) || device.room_name.to_lowercase().contains(&needle)
}

/// Devices in `room_id` (or every room when `None`) that match `query`.
pub fn filter_devices<'a>(rooms: &'a [Room], room_id: Option<&str>, query: &str) -> Vec<&'a Device> {
    rooms
        .iter()
        .filter(|room| room_id.map_or(true, |id| room.id == id))
        .flat_map(|room| room.devices.iter())
        .filter(|device| matches_query(device, query))
        .collect()
}

/// Rooms with at least one device matching `query`, devices narrowed to the matches.
pub fn filter_rooms(rooms: &[Room], query: &str) -> Vec<Room> {
    rooms
        .iter()
        .filter_map(|room| {
            let devices: Vec<Device> = room
                .devices
                .iter()
                .filter(|d| matches_query(d, query))
                .cloned()
                .collect();
            if devices.is_empty() {
                None
            } else {
                Some(Room::new(room.id.clone(), room.name.clone(), devices))
            }
        })
        .collect()
}

// Placement store -- ~/.spatialhome/device_placements.json
// The whole placement set is one JSON array. Every mutation loads the set,
// changes it in memory and rewrites the file via temp file + rename.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use uuid::Uuid;

use crate::constants::{APP_FOLDER, PLACEMENTS_FILENAME, TEMP_FILE_PREFIX};
use crate::error::StoreError;
use crate::spatial::DevicePlacement;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Which record a delete targets.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementKey {
    PlacementId(Uuid),
    DeviceId(String),
}

impl PlacementKey {
    fn matches(&self, placement: &DevicePlacement) -> bool {
        match self {
            PlacementKey::PlacementId(id) => placement.id == *id,
            PlacementKey::DeviceId(device_id) => placement.device_id == *device_id,
        }
    }
}

/// Durable device placements. One writer at a time per process.
#[derive(Debug)]
pub struct PlacementStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl PlacementStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store at ~/.spatialhome/device_placements.json
    pub fn open_default() -> Option<Self> {
        default_store_path().map(PlacementStore::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored placements. A missing file is an empty set.
    pub fn load_all(&self) -> StoreResult<Vec<DevicePlacement>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::ReadFailed(e.to_string())),
        };

        serde_json::from_str(&content).map_err(|e| StoreError::DecodingFailed(e.to_string()))
    }

    /// Insert or replace the placement for `placement.device_id`.
    pub fn save(&self, placement: &DevicePlacement) -> StoreResult<()> {
        let _guard = self.lock();
        let mut placements = self.load_all()?;

        let before = placements.len();
        placements.retain(|p| p.device_id != placement.device_id);
        if placements.len() != before {
            log::debug!("Replacing stored placement for device {}", placement.device_id);
        }
        placements.push(placement.clone());

        self.write_all(&placements)
    }

    /// Replace the record with the same placement id.
    pub fn update(&self, placement: &DevicePlacement) -> StoreResult<()> {
        let _guard = self.lock();
        let mut placements = self.load_all()?;

        let slot = placements
            .iter_mut()
            .find(|p| p.id == placement.id)
            .ok_or(StoreError::PlacementNotFound)?;
        *slot = placement.clone();

        self.write_all(&placements)
    }

    pub fn delete(&self, key: &PlacementKey) -> StoreResult<()> {
        let _guard = self.lock();
        let mut placements = self.load_all()?;

        let before = placements.len();
        placements.retain(|p| !key.matches(p));
        if placements.len() == before {
            return Err(StoreError::PlacementNotFound);
        }

        self.write_all(&placements)
    }

    pub fn delete_by_id(&self, placement_id: Uuid) -> StoreResult<()> {
        self.delete(&PlacementKey::PlacementId(placement_id))
    }

    pub fn delete_by_device_id(&self, device_id: &str) -> StoreResult<()> {
        self.delete(&PlacementKey::DeviceId(device_id.to_string()))
    }

    /// Remove the backing file. Nothing to remove is not an error.
    pub fn delete_all(&self) -> StoreResult<()> {
        let _guard = self.lock();
        match fs::remove_file(&self.path) {
            Ok(()) => {
                log::info!("Removed placement store {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::WriteFailed(e.to_string())),
        }
    }

    pub fn has(&self, device_id: &str) -> StoreResult<bool> {
        Ok(self.get(device_id)?.is_some())
    }

    pub fn get(&self, device_id: &str) -> StoreResult<Option<DevicePlacement>> {
        Ok(self.load_all()?.into_iter().find(|p| p.device_id == device_id))
    }

    pub fn get_by_placement_id(&self, placement_id: Uuid) -> StoreResult<Option<DevicePlacement>> {
        Ok(self.load_all()?.into_iter().find(|p| p.id == placement_id))
    }

    pub fn count(&self) -> StoreResult<usize> {
        Ok(self.load_all()?.len())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the full set to a temp file next to the store, then rename over it.
    fn write_all(&self, placements: &[DevicePlacement]) -> StoreResult<()> {
        // JSON has no encoding for NaN or infinity; refuse rather than write null
        if let Some(bad) = placements.iter().find(|p| !p.anchor.is_finite()) {
            return Err(StoreError::EncodingFailed(format!(
                "placement for {} has a non-finite anchor",
                bad.device_id
            )));
        }

        let json = serde_json::to_string_pretty(placements)
            .map_err(|e| StoreError::EncodingFailed(e.to_string()))?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| PLACEMENTS_FILENAME.to_string());
        let tmp_path = dir.join(format!("{}{}", TEMP_FILE_PREFIX, file_name));

        let written = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.path)
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::WriteFailed(e.to_string()));
        }

        log::debug!("Wrote {} placements to {}", placements.len(), self.path.display());
        Ok(())
    }
}

/// ~/.spatialhome/device_placements.json
pub fn default_store_path() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(APP_FOLDER).join(PLACEMENTS_FILENAME))
}

//! Threshold persistence.
//!
//! The stored blob is a JSON object with camelCase keys:
//!
//! ```json
//! { "soilThreshold": 40, "humidityThreshold": 85 }
//! ```
//!
//! Loading never fails: a missing file, unreadable file, malformed JSON or a
//! missing/garbled key falls back to the default for that value, and
//! out-of-range numbers are clamped into 0..=100.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::state::{clamp_percent, Thresholds};

const SOIL_KEY: &str = "soilThreshold";
const HUMIDITY_KEY: &str = "humidityThreshold";

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

pub trait SettingsStore: Send {
    fn load(&self) -> StoredSettings;
    fn save(&self, thresholds: &Thresholds) -> Result<()>;
}

/// Whatever could be recovered from the store; `None` means "use default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoredSettings {
    pub soil_threshold: Option<i64>,
    pub humidity_threshold: Option<i64>,
}

impl StoredSettings {
    /// Parse a stored blob, salvaging each key independently.
    pub fn from_json(raw: &str) -> Self {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!("settings: malformed json, using defaults: {e}");
                return Self::default();
            }
        };
        let Some(obj) = value.as_object() else {
            warn!("settings: stored value is not an object, using defaults");
            return Self::default();
        };
        Self {
            soil_threshold: obj.get(SOIL_KEY).and_then(integer),
            humidity_threshold: obj.get(HUMIDITY_KEY).and_then(integer),
        }
    }

    /// Apply defaults and clamp.
    pub fn resolve(&self) -> Thresholds {
        let defaults = Thresholds::default();
        Thresholds {
            soil: self.soil_threshold.map_or(defaults.soil, clamp_percent),
            humidity: self
                .humidity_threshold
                .map_or(defaults.humidity, clamp_percent),
        }
    }
}

/// Accept integers, floats (rounded) and numeric strings.
fn integer(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsBlob {
    soil_threshold: u8,
    humidity_threshold: u8,
}

impl From<&Thresholds> for SettingsBlob {
    fn from(t: &Thresholds) -> Self {
        Self {
            soil_threshold: t.soil,
            humidity_threshold: t.humidity,
        }
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> StoredSettings {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => StoredSettings::from_json(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "settings: no saved file, using defaults");
                StoredSettings::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), "settings: read failed, using defaults: {e}");
                StoredSettings::default()
            }
        }
    }

    fn save(&self, thresholds: &Thresholds) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create settings dir: {}", parent.display())
                })?;
            }
        }

        let json = serde_json::to_string_pretty(&SettingsBlob::from(thresholds))
            .context("failed to encode settings")?;
        let tmp = self.tmp_path();
        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write settings: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace settings: {}", self.path.display()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local store.  Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemorySlot>>,
}

#[derive(Debug, Default)]
struct MemorySlot {
    saved: Option<Thresholds>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(thresholds: Thresholds) -> Self {
        let store = Self::default();
        store.slot().saved = Some(thresholds);
        store
    }

    /// Last saved value, if any.
    pub fn saved(&self) -> Option<Thresholds> {
        self.slot().saved
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.slot().saves
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, MemorySlot> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> StoredSettings {
        match self.slot().saved {
            Some(t) => StoredSettings {
                soil_threshold: Some(t.soil as i64),
                humidity_threshold: Some(t.humidity as i64),
            },
            None => StoredSettings::default(),
        }
    }

    fn save(&self, thresholds: &Thresholds) -> Result<()> {
        let mut slot = self.slot();
        slot.saved = Some(*thresholds);
        slot.saves += 1;
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

    /// Fresh, empty directory under the system temp dir.
    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "irrigation-settings-test-{}-{}",
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    // -- StoredSettings parsing ----------------------------------------------

    #[test]
    fn full_blob_parses() {
        let s = StoredSettings::from_json(r#"{"soilThreshold":35,"humidityThreshold":70}"#);
        assert_eq!(s.resolve(), Thresholds { soil: 35, humidity: 70 });
    }

    #[test]
    fn missing_keys_use_defaults() {
        let s = StoredSettings::from_json(r#"{"soilThreshold":25}"#);
        assert_eq!(s.soil_threshold, Some(25));
        assert_eq!(s.humidity_threshold, None);
        assert_eq!(s.resolve(), Thresholds { soil: 25, humidity: 85 });

        let s = StoredSettings::from_json("{}");
        assert_eq!(s.resolve(), Thresholds::default());
    }

    #[test]
    fn malformed_json_uses_defaults() {
        for raw in ["", "not json", "{\"soilThreshold\":", "null", "[1,2]", "42"] {
            let s = StoredSettings::from_json(raw);
            assert_eq!(s, StoredSettings::default(), "raw={raw:?}");
            assert_eq!(s.resolve(), Thresholds::default());
        }
    }

    #[test]
    fn garbled_key_defaults_only_that_key() {
        let s = StoredSettings::from_json(r#"{"soilThreshold":"dry","humidityThreshold":60}"#);
        assert_eq!(s.resolve(), Thresholds { soil: 40, humidity: 60 });
    }

    #[test]
    fn numeric_strings_and_floats_are_accepted() {
        let s = StoredSettings::from_json(r#"{"soilThreshold":"30","humidityThreshold":72.6}"#);
        assert_eq!(s.resolve(), Thresholds { soil: 30, humidity: 73 });
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let s = StoredSettings::from_json(r#"{"soilThreshold":-20,"humidityThreshold":400}"#);
        assert_eq!(s.resolve(), Thresholds { soil: 0, humidity: 100 });
    }

    // -- JsonFileStore --------------------------------------------------------

    #[test]
    fn missing_file_loads_defaults() {
        let store = JsonFileStore::new(scratch_dir().join("settings.json"));
        assert_eq!(store.load().resolve(), Thresholds::default());
    }

    #[test]
    fn save_then_load_through_file() {
        let path = scratch_dir().join("settings.json");
        let store = JsonFileStore::new(&path);
        store.save(&Thresholds { soil: 22, humidity: 64 }).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let json: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["soilThreshold"], 22);
        assert_eq!(json["humidityThreshold"], 64);

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.load().resolve(), Thresholds { soil: 22, humidity: 64 });
        assert!(!store.tmp_path().exists(), "temp file should be renamed away");
    }

    #[test]
    fn save_creates_missing_parent_dirs() {
        let path = scratch_dir().join("nested/deeper/settings.json");
        let store = JsonFileStore::new(&path);
        store.save(&Thresholds::default()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn corrupt_file_loads_defaults() {
        let path = scratch_dir().join("settings.json");
        std::fs::write(&path, "{{{{").unwrap();
        let store = JsonFileStore::new(&path);
        assert_eq!(store.load().resolve(), Thresholds::default());
    }

    #[test]
    fn directory_in_place_of_file_loads_defaults_and_fails_save() {
        let path = scratch_dir().join("settings.json");
        std::fs::create_dir_all(&path).unwrap();
        let store = JsonFileStore::new(&path);
        assert_eq!(store.load().resolve(), Thresholds::default());
        assert!(store.save(&Thresholds::default()).is_err());
    }

    // -- MemoryStore ----------------------------------------------------------

    #[test]
    fn memory_store_round_trip_and_counts() {
        let store = MemoryStore::new();
        assert_eq!(store.load(), StoredSettings::default());
        assert_eq!(store.save_count(), 0);

        let shared = store.clone();
        shared.save(&Thresholds { soil: 10, humidity: 20 }).unwrap();

        assert_eq!(store.saved(), Some(Thresholds { soil: 10, humidity: 20 }));
        assert_eq!(store.load().resolve(), Thresholds { soil: 10, humidity: 20 });
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn memory_store_seeded() {
        let store = MemoryStore::with(Thresholds { soil: 50, humidity: 90 });
        assert_eq!(store.load().resolve(), Thresholds { soil: 50, humidity: 90 });
        assert_eq!(store.save_count(), 0);
    }
}

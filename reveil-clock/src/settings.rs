//! Persistent alarm settings.
//!
//! Slots are stored as a small JSON document. A missing or corrupt file
//! must never take the scheduler down; loading falls back to the disabled
//! midnight defaults and says so in the log.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::alarm::slot::{AlarmSlot, SlotId};
use crate::tracing::prelude::*;

/// Store collaborator the scheduler persists through.
pub trait SettingsStore: Send {
    /// Load both slots, falling back to defaults on any failure.
    fn load(&self) -> [AlarmSlot; 2];

    /// Persist both slots. Failures are logged, not propagated; the
    /// in-memory state is authoritative until the next restart.
    fn store(&self, slots: &[AlarmSlot; 2]);
}

#[derive(Serialize, Deserialize)]
struct SettingsFile {
    alarms: Vec<AlarmSlot>,
}

/// JSON file-backed store.
pub struct JsonSettings {
    path: PathBuf,
}

impl JsonSettings {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_owned(),
        }
    }

    fn defaults() -> [AlarmSlot; 2] {
        [
            AlarmSlot::default_for(SlotId::One),
            AlarmSlot::default_for(SlotId::Two),
        ]
    }

    fn try_load(&self) -> std::io::Result<Option<[AlarmSlot; 2]>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&self.path)?;
        let file: SettingsFile = serde_json::from_str(&data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut slots = Self::defaults();
        for slot in file.alarms {
            if slot.hour > 23 || slot.minute > 59 {
                warn!(slot = %slot.id, hour = slot.hour, minute = slot.minute,
                    "Stored alarm time out of range, keeping default");
                continue;
            }
            let index = slot.id.index();
            slots[index] = slot;
        }
        Ok(Some(slots))
    }
}

impl SettingsStore for JsonSettings {
    fn load(&self) -> [AlarmSlot; 2] {
        match self.try_load() {
            Ok(Some(slots)) => slots,
            Ok(None) => {
                info!(path = %self.path.display(), "No settings file, using defaults");
                Self::defaults()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e,
                    "Failed to load alarm settings, using defaults");
                Self::defaults()
            }
        }
    }

    fn store(&self, slots: &[AlarmSlot; 2]) {
        let file = SettingsFile {
            alarms: slots.to_vec(),
        };
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let data = serde_json::to_string_pretty(&file)?;
            std::fs::write(&self.path, data)
        })();

        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e,
                "Failed to persist alarm settings");
        }
    }
}

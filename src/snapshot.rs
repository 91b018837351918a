// civic_zone_rust\src\snapshot.rs
//! Durable zone / authority records (JSON).
//!
//! The owning application persists this document before (or together
//! with) index updates and feeds it back through
//! [`ZoneIndex::from_snapshot`](crate::polygons::ZoneIndex::from_snapshot)
//! at startup or reload.
use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ZoneError};
use crate::types::{Authority, ZoneRecord};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    #[serde(default)]
    pub authorities: Vec<Authority>,
    #[serde(default)]
    pub zones: Vec<ZoneRecord>,
    /// Audit trail of zones taken out of routing when their authority retired.
    #[serde(default)]
    pub retired_zones: Vec<ZoneRecord>,
    /// Next ids to hand out. 0 (older files) means "derive from the records".
    #[serde(default)]
    pub next_authority: u64,
    #[serde(default)]
    pub next_zone: u64,
}

impl SnapshotFile {
    /// Read a snapshot. A missing file is an empty snapshot (first start).
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        if !p.exists() {
            tracing::debug!(path = %p.display(), "no snapshot yet, starting empty");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(p)
            .map_err(|e| ZoneError::Snapshot(format!("read `{}`: {e}", p.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| ZoneError::Snapshot(format!("parse `{}`: {e}", p.display())))
    }

    /// Write atomically: temp file next to the target, then rename.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let p = path.as_ref();
        if let Some(dir) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = p.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(self)?;
        fs::write(&tmp, body)
            .map_err(|e| ZoneError::Snapshot(format!("write `{}`: {e}", tmp.display())))?;
        fs::rename(&tmp, p)
            .map_err(|e| ZoneError::Snapshot(format!("rename to `{}`: {e}", p.display())))?;
        tracing::debug!(path = %p.display(), zones = self.zones.len(), "snapshot saved");
        Ok(())
    }
}

// civic_zone_rust\src\resolver.rs

//! Assignment resolver – 候補 zone 群から authority を 1 つに確定する。
//!
//! * **決定論的** : 同じ index 状態と同じ点 → いつでも同じ結果
//! * 重なり       : 外周リング面積が最小の zone が勝つ（より局所的な管轄を優先）
//! * 同面積       : AuthorityId の小さい方、さらに ZoneId の小さい方
//!
//! `Unassigned` はエラーではなく、手動振り分けキューへ回すための正規の結果。
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::metrics;
use crate::polygons::{IndexSnapshot, Zone, ZoneIndex};
use crate::types::{AuthorityId, Point, ZoneId};

/// Why a point ended up without an authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum UnassignedReason {
    /// Valid point, no active zone covers it.
    NoZoneMatch,
    /// NaN / infinite coordinate.
    InvalidCoordinate,
}

impl UnassignedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnassignedReason::NoZoneMatch => "no_zone_match",
            UnassignedReason::InvalidCoordinate => "invalid_coordinate",
        }
    }
}

impl fmt::Display for UnassignedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closest zone to an unmatched point, offered to whoever triages it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestHint {
    pub authority: AuthorityId,
    pub zone: ZoneId,
    /// Planar distance in degrees.
    pub distance: f64,
}

/// Result of resolving one point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    Assigned {
        authority: AuthorityId,
        zone: ZoneId,
        /// Distinct authorities whose zones contained the point. More than
        /// one means the tie-break decided.
        contenders: usize,
    },
    Unassigned {
        reason: UnassignedReason,
        nearest: Option<NearestHint>,
    },
}

impl Resolution {
    pub fn authority(&self) -> Option<AuthorityId> {
        match self {
            Resolution::Assigned { authority, .. } => Some(*authority),
            Resolution::Unassigned { .. } => None,
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self, Resolution::Assigned { .. })
    }

    pub fn unassigned_reason(&self) -> Option<UnassignedReason> {
        match self {
            Resolution::Assigned { .. } => None,
            Resolution::Unassigned { reason, .. } => Some(*reason),
        }
    }
}

/// Winner among containing zones: smallest area, then authority id, then
/// zone id.
pub fn pick_zone(zones: &[Arc<Zone>]) -> Option<&Arc<Zone>> {
    zones.iter().min_by(|a, b| {
        a.area
            .total_cmp(&b.area)
            .then(a.authority.cmp(&b.authority))
            .then(a.id.cmp(&b.id))
    })
}

/// Pure resolution against one snapshot.
pub fn resolve_in(snapshot: &IndexSnapshot, p: &Point) -> Resolution {
    if !p.is_finite() {
        metrics::RESOLUTIONS.with_label_values(&["invalid_coordinate"]).inc();
        return Resolution::Unassigned {
            reason: UnassignedReason::InvalidCoordinate,
            nearest: None,
        };
    }

    let zones = snapshot.containing_zones(p);
    let contenders = {
        let mut auths: Vec<AuthorityId> = zones.iter().map(|z| z.authority).collect();
        auths.sort_unstable();
        auths.dedup();
        auths.len()
    };
    metrics::RESOLVE_CANDIDATES.observe(contenders as f64);

    match pick_zone(&zones) {
        Some(zone) => {
            if contenders > 1 {
                tracing::debug!(
                    lat = p.lat,
                    lon = p.lon,
                    contenders,
                    winner = %zone.authority,
                    area = zone.area,
                    "overlapping zones, smallest area wins"
                );
                metrics::RESOLUTIONS.with_label_values(&["ambiguous"]).inc();
            } else {
                metrics::RESOLUTIONS.with_label_values(&["assigned"]).inc();
            }
            Resolution::Assigned {
                authority: zone.authority,
                zone: zone.id,
                contenders,
            }
        }
        None => {
            metrics::RESOLUTIONS.with_label_values(&["no_zone_match"]).inc();
            let nearest = snapshot.nearest_zone(p).map(|(z, distance)| NearestHint {
                authority: z.authority,
                zone: z.id,
                distance,
            });
            Resolution::Unassigned {
                reason: UnassignedReason::NoZoneMatch,
                nearest,
            }
        }
    }
}

/// Resolver bound to a shared index. Every call reads the latest snapshot.
#[derive(Debug, Clone)]
pub struct Resolver {
    index: Arc<ZoneIndex>,
}

impl Resolver {
    pub fn new(index: Arc<ZoneIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<ZoneIndex> {
        &self.index
    }

    pub fn resolve(&self, p: &Point) -> Resolution {
        resolve_in(&self.index.snapshot(), p)
    }
}

// civic_zone_rust\src\polygons.rs

//! Zone index – authority ごとの管轄ポリゴンを保持し、点を含む authority を返す。
//
// * 読み手 : `snapshot()` で Arc を複製するだけ。ロックを握ったまま計算しない。
// * 書き手 : writer Mutex で直列化 → 状態をコピーして変更 → RwLock 内で Arc を差し替え。
//           途中で失敗した書き込みは差し替えないので、読み手に半端な状態は見えない。
// * 検索   : RTree (bbox) で候補を絞り、境界を含む ray-casting で確定。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use geo::{BoundingRect, EuclideanDistance};
use rayon::prelude::*;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::error::{Result, ZoneError};
use crate::geometry::{self, ValidationOptions};
use crate::metrics;
use crate::snapshot::SnapshotFile;
use crate::types::{
    Authority, AuthorityDraft, AuthorityId, Geometry, Point, PolygonRings, ZoneId, ZoneRecord,
};

/// A validated zone with its derived data (area, bbox, geo polygon).
#[derive(Debug, Clone)]
pub struct Zone {
    pub id: ZoneId,
    pub authority: AuthorityId,
    pub name: String,
    pub rings: PolygonRings,
    /// Outer-ring shoelace area, holes ignored.
    pub area: f64,
    pub created_at: DateTime<Utc>,
    poly: geo::Polygon<f64>,
    bbox: AABB<[f64; 2]>,
}

impl Zone {
    /// Validates `rings` and computes the cached fields.
    fn build(
        id: ZoneId,
        authority: AuthorityId,
        name: String,
        rings: PolygonRings,
        created_at: DateTime<Utc>,
        opts: &ValidationOptions,
    ) -> Result<Self> {
        if let Err(e) = geometry::validate_polygon(&rings, opts) {
            metrics::GEOMETRY_REJECTED.inc();
            return Err(e);
        }
        let poly = geometry::to_geo_polygon(&rings);
        let rect = poly
            .bounding_rect()
            .ok_or_else(|| ZoneError::MalformedGeometry("outer ring is empty".into()))?;
        let bbox = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        Ok(Self {
            id,
            authority,
            name,
            area: geometry::ring_area(&rings.outer),
            rings,
            created_at,
            poly,
            bbox,
        })
    }

    /// Inclusive containment.
    pub fn contains(&self, p: &Point) -> bool {
        geometry::polygon_contains(&self.rings, p.xy())
    }

    /// Planar distance in degrees, 0 when the point is inside.
    pub fn distance_to(&self, p: &Point) -> f64 {
        self.poly.euclidean_distance(&geo::Point::new(p.lon, p.lat))
    }

    pub fn to_record(&self) -> ZoneRecord {
        ZoneRecord {
            id: self.id,
            authority: self.authority,
            name: self.name.clone(),
            outer: self.rings.outer.clone(),
            holes: self.rings.holes.clone(),
            created_at: self.created_at,
        }
    }
}

/// ─────────── RTree ノード
#[derive(Debug, Clone)]
struct ZoneNode {
    zone: Arc<Zone>,
}

impl RTreeObject for ZoneNode {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.zone.bbox
    }
}

impl PointDistance for ZoneNode {
    fn distance_2(&self, p: &[f64; 2]) -> f64 {
        self.zone
            .poly
            .euclidean_distance(&geo::Point::new(p[0], p[1]))
            .powi(2)
    }
}

impl PartialEq for ZoneNode {
    fn eq(&self, other: &Self) -> bool {
        self.zone.id == other.zone.id
    }
}

#[derive(Clone)]
struct IndexState {
    authorities: BTreeMap<AuthorityId, Authority>,
    zones: BTreeMap<ZoneId, Arc<Zone>>,
    tree: RTree<ZoneNode>,
    /// Persisted records that failed to load; written back untouched.
    held: Vec<ZoneRecord>,
    /// Zones taken out of routing by `retire_authority`, kept for audit.
    retired_zones: Vec<ZoneRecord>,
    next_authority: u64,
    next_zone: u64,
}

impl std::fmt::Debug for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexState")
            .field("authorities", &self.authorities.len())
            .field("zones", &self.zones.len())
            .field("held", &self.held.len())
            .field("retired_zones", &self.retired_zones.len())
            .field("next_authority", &self.next_authority)
            .field("next_zone", &self.next_zone)
            .finish()
    }
}

impl IndexState {
    fn empty() -> Self {
        Self {
            authorities: BTreeMap::new(),
            zones: BTreeMap::new(),
            tree: RTree::new(),
            held: Vec::new(),
            retired_zones: Vec::new(),
            next_authority: 1,
            next_zone: 1,
        }
    }

    fn insert_zone(&mut self, zone: Zone) {
        let zone = Arc::new(zone);
        self.tree.insert(ZoneNode { zone: Arc::clone(&zone) });
        self.zones.insert(zone.id, zone);
    }

    fn drop_zone(&mut self, id: ZoneId) -> Option<Arc<Zone>> {
        let zone = self.zones.remove(&id)?;
        self.tree.remove(&ZoneNode { zone: Arc::clone(&zone) });
        Some(zone)
    }

    fn active_authority(&self, id: AuthorityId) -> Result<&Authority> {
        let auth = self
            .authorities
            .get(&id)
            .ok_or(ZoneError::UnknownAuthority(id))?;
        if auth.retired {
            return Err(ZoneError::AuthorityRetired(id));
        }
        Ok(auth)
    }
}

/// Point-in-time view of the index. Cheap to clone, never changes.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    state: Arc<IndexState>,
}

impl IndexSnapshot {
    /// Every zone whose polygon contains `p`, in zone-id order.
    pub fn containing_zones(&self, p: &Point) -> Vec<Arc<Zone>> {
        let mut hits: Vec<Arc<Zone>> = self
            .state
            .tree
            .locate_in_envelope_intersecting(&AABB::from_point([p.lon, p.lat]))
            .filter(|node| node.zone.contains(p))
            .map(|node| Arc::clone(&node.zone))
            .collect();
        hits.sort_by_key(|z| z.id);
        hits
    }

    /// Authorities owning at least one zone that contains `p`.
    pub fn find_containing(&self, p: &Point) -> BTreeSet<AuthorityId> {
        self.containing_zones(p).iter().map(|z| z.authority).collect()
    }

    /// Closest active zone and its distance, for triage hints.
    pub fn nearest_zone(&self, p: &Point) -> Option<(Arc<Zone>, f64)> {
        if !p.is_finite() {
            return None;
        }
        self.state
            .tree
            .nearest_neighbor(&[p.lon, p.lat])
            .map(|node| (Arc::clone(&node.zone), node.zone.distance_to(p)))
    }

    pub fn authority(&self, id: AuthorityId) -> Option<&Authority> {
        self.state.authorities.get(&id)
    }

    pub fn zone_count(&self) -> usize {
        self.state.zones.len()
    }
}

/// One persisted record that failed to load.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    pub zone: ZoneId,
    pub reason: String,
    /// The record as read, so it can be written back or inspected.
    pub record: ZoneRecord,
}

/// Outcome of building the index from persisted records.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub authorities: usize,
    pub loaded: usize,
    pub rejected: Vec<RejectedRecord>,
}

/// Shared, mutable zone index. Construct once at startup (or via
/// [`ZoneIndex::from_snapshot`]), share behind an `Arc`.
#[derive(Debug)]
pub struct ZoneIndex {
    current: RwLock<Arc<IndexState>>,
    writer: Mutex<()>,
    opts: ValidationOptions,
}

impl Default for ZoneIndex {
    fn default() -> Self {
        Self::new(ValidationOptions::default())
    }
}

impl ZoneIndex {
    pub fn new(opts: ValidationOptions) -> Self {
        Self {
            current: RwLock::new(Arc::new(IndexState::empty())),
            writer: Mutex::new(()),
            opts,
        }
    }

    pub fn validation_options(&self) -> &ValidationOptions {
        &self.opts
    }

    /// Current state; later writes do not affect the returned view.
    pub fn snapshot(&self) -> IndexSnapshot {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        IndexSnapshot {
            state: Arc::clone(&guard),
        }
    }

    /// Serialised copy-on-write update. `f` works on a private copy; the
    /// copy is published only if `f` succeeds.
    fn write<R>(&self, op: &str, f: impl FnOnce(&mut IndexState) -> Result<R>) -> Result<R> {
        let _w = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = IndexState::clone(&self.snapshot().state);
        let out = f(&mut next)?;
        self.publish(op, next);
        Ok(out)
    }

    /// Swap in a finished state. Caller holds the writer lock.
    fn publish(&self, op: &str, next: IndexState) {
        let zones = next.zones.len();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        metrics::ZONE_WRITES.with_label_values(&[op]).inc();
        metrics::ZONES_ACTIVE.set(zones as i64);
    }

    // ───────────────────────── authorities ─────────────────────────

    pub fn register_authority(&self, draft: AuthorityDraft) -> Result<AuthorityId> {
        self.write("authority", |st| {
            let id = AuthorityId(st.next_authority);
            st.next_authority += 1;
            tracing::info!(authority = %id, name = %draft.name, "authority registered");
            st.authorities.insert(
                id,
                Authority {
                    id,
                    name: draft.name,
                    contact_email: draft.contact_email,
                    contact_phone: draft.contact_phone,
                    description: draft.description,
                    authorized_users: BTreeSet::new(),
                    created_at: Utc::now(),
                    retired: false,
                },
            );
            Ok(id)
        })
    }

    pub fn authority(&self, id: AuthorityId) -> Option<Authority> {
        self.snapshot().authority(id).cloned()
    }

    /// First authority with exactly this name, lowest id first.
    pub fn authority_by_name(&self, name: &str) -> Option<Authority> {
        self.snapshot()
            .state
            .authorities
            .values()
            .find(|a| a.name == name)
            .cloned()
    }

    pub fn authorities(&self) -> Vec<Authority> {
        self.snapshot().state.authorities.values().cloned().collect()
    }

    /// Allow `user` to manage the authority's issues. `false` if already granted.
    pub fn grant_user(&self, id: AuthorityId, user: &str) -> Result<bool> {
        self.write("authority", |st| {
            let auth = st
                .authorities
                .get_mut(&id)
                .ok_or(ZoneError::UnknownAuthority(id))?;
            Ok(auth.authorized_users.insert(user.to_string()))
        })
    }

    pub fn revoke_user(&self, id: AuthorityId, user: &str) -> Result<bool> {
        self.write("authority", |st| {
            let auth = st
                .authorities
                .get_mut(&id)
                .ok_or(ZoneError::UnknownAuthority(id))?;
            Ok(auth.authorized_users.remove(user))
        })
    }

    /// Authorities whose dashboard `user` may see.
    pub fn authorities_for_user(&self, user: &str) -> Vec<Authority> {
        self.snapshot()
            .state
            .authorities
            .values()
            .filter(|a| a.authorized_users.contains(user))
            .cloned()
            .collect()
    }

    /// Take an authority out of routing. Its zones leave the index and are
    /// returned for audit; the authority record itself stays so existing
    /// issue references remain valid.
    pub fn retire_authority(&self, id: AuthorityId) -> Result<Vec<ZoneRecord>> {
        self.write("retire", |st| {
            st.active_authority(id)?;
            let ids: Vec<ZoneId> = st
                .zones
                .values()
                .filter(|z| z.authority == id)
                .map(|z| z.id)
                .collect();
            let retired: Vec<ZoneRecord> = ids
                .into_iter()
                .filter_map(|zid| st.drop_zone(zid))
                .map(|z| z.to_record())
                .collect();
            if let Some(auth) = st.authorities.get_mut(&id) {
                auth.retired = true;
            }
            st.retired_zones.extend(retired.iter().cloned());
            tracing::info!(authority = %id, zones = retired.len(), "authority retired");
            Ok(retired)
        })
    }

    // ───────────────────────── zones ─────────────────────────

    /// Validate and insert one polygon. On error the index is unchanged.
    pub fn add_zone(
        &self,
        authority: AuthorityId,
        name: impl Into<String>,
        rings: PolygonRings,
    ) -> Result<ZoneId> {
        let name = name.into();
        // 重い検証はロックの外で。ID は仮置きして書き込み時に振り直す。
        let zone = Zone::build(ZoneId(0), authority, name, rings, Utc::now(), &self.opts)
            .inspect_err(|e| tracing::warn!(authority = %authority, error = %e, "zone rejected"))?;
        self.write("add", |st| {
            st.active_authority(authority)?;
            let id = ZoneId(st.next_zone);
            st.next_zone += 1;
            tracing::info!(zone = %id, authority = %authority, name = %zone.name, area = zone.area, "zone added");
            st.insert_zone(Zone { id, ..zone });
            Ok(id)
        })
    }

    /// Normalise a (multi)polygon into one zone per member polygon.
    /// All members are validated first; one bad member rejects the lot.
    pub fn add_geometry(
        &self,
        authority: AuthorityId,
        name: &str,
        geometry: Geometry,
    ) -> Result<Vec<ZoneId>> {
        let polygons = geometry.into_polygons();
        if polygons.is_empty() {
            return Err(ZoneError::MalformedGeometry(
                "multipolygon has no member polygons".into(),
            ));
        }
        let now = Utc::now();
        let zones = polygons
            .into_par_iter()
            .map(|rings| {
                Zone::build(ZoneId(0), authority, name.to_string(), rings, now, &self.opts)
            })
            .collect::<Result<Vec<_>>>()
            .inspect_err(|e| tracing::warn!(authority = %authority, name, error = %e, "geometry rejected"))?;

        self.write("add", |st| {
            st.active_authority(authority)?;
            let mut ids = Vec::with_capacity(zones.len());
            for zone in zones {
                let id = ZoneId(st.next_zone);
                st.next_zone += 1;
                st.insert_zone(Zone { id, ..zone });
                ids.push(id);
            }
            tracing::info!(authority = %authority, name, zones = ids.len(), "geometry added");
            Ok(ids)
        })
    }

    /// Swap the polygon of an existing zone, keeping id, name and owner.
    pub fn replace_zone(&self, id: ZoneId, rings: PolygonRings) -> Result<()> {
        let existing = self.zone(id).ok_or(ZoneError::UnknownZone(id))?;
        let zone = Zone::build(
            id,
            existing.authority,
            existing.name.clone(),
            rings,
            existing.created_at,
            &self.opts,
        )?;
        self.write("replace", |st| {
            // 検証中に削除されていないか書き込み側で再確認
            if st.drop_zone(id).is_none() {
                return Err(ZoneError::UnknownZone(id));
            }
            tracing::info!(zone = %id, area = zone.area, "zone replaced");
            st.insert_zone(zone);
            Ok(())
        })
    }

    /// Idempotent removal: `true` if the zone existed, `false` if it was
    /// already gone.
    pub fn remove_zone(&self, id: ZoneId) -> bool {
        if self.zone(id).is_none() {
            return false;
        }
        self.write("remove", |st| {
            let removed = st.drop_zone(id).is_some();
            if removed {
                tracing::info!(zone = %id, "zone removed");
            }
            Ok(removed)
        })
        .unwrap_or(false)
    }

    pub fn zone(&self, id: ZoneId) -> Option<Arc<Zone>> {
        self.snapshot().state.zones.get(&id).cloned()
    }

    /// All active zones in id order.
    pub fn zones(&self) -> Vec<Arc<Zone>> {
        self.snapshot().state.zones.values().cloned().collect()
    }

    pub fn zones_for_authority(&self, authority: AuthorityId) -> Vec<Arc<Zone>> {
        self.snapshot()
            .state
            .zones
            .values()
            .filter(|z| z.authority == authority)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().zone_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Authorities owning a zone that contains `p`, deduplicated.
    pub fn find_containing(&self, p: &Point) -> BTreeSet<AuthorityId> {
        self.snapshot().find_containing(p)
    }

    // ───────────────────────── persistence ─────────────────────────

    /// Build an index from persisted records.
    pub fn from_snapshot(file: SnapshotFile, opts: ValidationOptions) -> (Self, LoadReport) {
        let index = Self::new(opts);
        let report = index.reload(file);
        (index, report)
    }

    /// Replace the whole index with the persisted state in one swap.
    /// Records that fail validation, reference an unknown or retired
    /// authority, or repeat a zone id are skipped and reported. They stay
    /// held in the index and [`to_snapshot`](Self::to_snapshot) writes them
    /// back unchanged until [`prune_rejected`](Self::prune_rejected) drops them.
    pub fn reload(&self, file: SnapshotFile) -> LoadReport {
        let mut st = IndexState::empty();
        // 保存済みカウンタより小さい値には戻さない (削除済み ID を再利用しない)
        st.next_authority = file.next_authority.max(1);
        st.next_zone = file.next_zone.max(1);
        for auth in file.authorities {
            st.next_authority = st.next_authority.max(auth.id.0 + 1);
            st.authorities.insert(auth.id, auth);
        }
        for rec in file.retired_zones.iter().chain(&file.zones) {
            st.next_zone = st.next_zone.max(rec.id.0 + 1);
        }
        st.retired_zones = file.retired_zones;

        let built: Vec<(ZoneRecord, Result<Zone>)> = file
            .zones
            .into_par_iter()
            .map(|rec| {
                let zone = Zone::build(
                    rec.id,
                    rec.authority,
                    rec.name.clone(),
                    rec.rings(),
                    rec.created_at,
                    &self.opts,
                );
                (rec, zone)
            })
            .collect();

        let mut report = LoadReport {
            authorities: st.authorities.len(),
            ..LoadReport::default()
        };
        let mut nodes = Vec::with_capacity(built.len());
        for (rec, zone) in built {
            let checked = zone.and_then(|z| {
                st.active_authority(z.authority)?;
                if st.zones.contains_key(&z.id) {
                    return Err(ZoneError::Snapshot(format!("duplicate zone id {}", z.id)));
                }
                Ok(z)
            });
            match checked {
                Ok(z) => {
                    let z = Arc::new(z);
                    nodes.push(ZoneNode { zone: Arc::clone(&z) });
                    st.zones.insert(z.id, z);
                }
                Err(e) => {
                    tracing::warn!(zone = %rec.id, error = %e, "persisted zone skipped, held for write-back");
                    st.held.push(rec.clone());
                    report.rejected.push(RejectedRecord {
                        zone: rec.id,
                        reason: e.to_string(),
                        record: rec,
                    });
                }
            }
        }
        st.tree = RTree::bulk_load(nodes);
        report.loaded = st.zones.len();

        {
            let _w = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            self.publish("reload", st);
        }
        tracing::info!(
            authorities = report.authorities,
            zones = report.loaded,
            rejected = report.rejected.len(),
            "zone index loaded"
        );
        report
    }

    /// Persisted records that failed the last load and are still held.
    pub fn rejected_records(&self) -> Vec<ZoneRecord> {
        self.snapshot().state.held.clone()
    }

    /// Forget the held records; the next save no longer contains them.
    pub fn prune_rejected(&self) -> Vec<ZoneRecord> {
        self.write("prune", |st| {
            let dropped = std::mem::take(&mut st.held);
            if !dropped.is_empty() {
                tracing::warn!(zones = dropped.len(), "rejected persisted zones pruned");
            }
            Ok(dropped)
        })
        .unwrap_or_default()
    }

    /// Zones removed by `retire_authority`, oldest retirement first.
    pub fn retired_zones(&self) -> Vec<ZoneRecord> {
        self.snapshot().state.retired_zones.clone()
    }

    /// Persistable copy of the current state, held records included.
    pub fn to_snapshot(&self) -> SnapshotFile {
        let snap = self.snapshot();
        let st = &snap.state;
        let mut zones: Vec<ZoneRecord> = st.zones.values().map(|z| z.to_record()).collect();
        zones.extend(st.held.iter().cloned());
        // 安定ソート: 同じ ID ならロード済みの方が先に残る
        zones.sort_by_key(|r| r.id);
        SnapshotFile {
            authorities: st.authorities.values().cloned().collect(),
            zones,
            retired_zones: st.retired_zones.clone(),
            next_authority: st.next_authority,
            next_zone: st.next_zone,
        }
    }
}

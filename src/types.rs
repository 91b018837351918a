// civic_zone_rust\src\types.rs
//! 共通データ構造 – ID, Point, Polygon rings, Geometry, Authority, ZoneRecord
use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authority (municipality, ward office, ...) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorityId(pub u64);

/// Zone identifier. Unique within one index, never reused after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub u64);

impl fmt::Display for AuthorityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// WGS84 point. Note the field order: (lat, lon), whereas ring vertices
/// are stored GeoJSON style as (lon, lat).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// lat ∈ [-90, 90], lon ∈ [-180, 180]
    pub fn in_wgs84_range(&self) -> bool {
        self.is_finite() && (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    /// (lon, lat) – 幾何計算用の x/y 順
    pub fn xy(&self) -> Position {
        (self.lon, self.lat)
    }
}

/// One vertex, `(lon, lat)`.
pub type Position = (f64, f64);

/// Closed vertex sequence, first == last.
pub type Ring = Vec<Position>;

/// Outer ring plus zero-or-more holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonRings {
    pub outer: Ring,
    #[serde(default)]
    pub holes: Vec<Ring>,
}

impl PolygonRings {
    pub fn new(outer: Ring, holes: Vec<Ring>) -> Self {
        Self { outer, holes }
    }

    /// Polygon without holes.
    pub fn simple(outer: Ring) -> Self {
        Self { outer, holes: Vec::new() }
    }
}

/// Geometry as it arrives from an import: either a single polygon or a
/// multipolygon. Normalised into a list of polygons before indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Polygon(PolygonRings),
    MultiPolygon(Vec<PolygonRings>),
}

impl Geometry {
    /// Flatten into the polygon list the index stores, one zone per entry.
    pub fn into_polygons(self) -> Vec<PolygonRings> {
        match self {
            Geometry::Polygon(p) => vec![p],
            Geometry::MultiPolygon(ps) => ps,
        }
    }

    pub fn polygon_count(&self) -> usize {
        match self {
            Geometry::Polygon(_) => 1,
            Geometry::MultiPolygon(ps) => ps.len(),
        }
    }
}

/// Administrative input for a new authority.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorityDraft {
    pub name: String,
    pub contact_email: String,
    #[serde(default)]
    pub contact_phone: String,
    #[serde(default)]
    pub description: String,
}

impl AuthorityDraft {
    pub fn new(name: impl Into<String>, contact_email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contact_email: contact_email.into(),
            ..Self::default()
        }
    }
}

/// Civic authority record. Never deleted, only retired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authority {
    pub id: AuthorityId,
    pub name: String,
    pub contact_email: String,
    #[serde(default)]
    pub contact_phone: String,
    #[serde(default)]
    pub description: String,
    /// Users allowed to manage this authority's issues.
    #[serde(default)]
    pub authorized_users: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub retired: bool,
}

/// Durable per-zone record, as persisted by the owning application and
/// consumed at startup / reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub id: ZoneId,
    pub authority: AuthorityId,
    pub name: String,
    pub outer: Ring,
    #[serde(default)]
    pub holes: Vec<Ring>,
    pub created_at: DateTime<Utc>,
}

impl ZoneRecord {
    pub fn rings(&self) -> PolygonRings {
        PolygonRings::new(self.outer.clone(), self.holes.clone())
    }
}

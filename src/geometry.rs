// civic_zone_rust\src\geometry.rs

//! Geometry primitives.
//
// 機能一覧
// ----------------------------------------
// * validate_polygon()   : リング形状チェック (閉じている / 4 点以上 / 3 頂点以上 / 自己交差)
// * point_in_polygon()   : 境界を含む ray-casting 判定 (even-odd)
// * ring_area()          : shoelace 面積 (絶対値)
// * to_geo_polygon()     : geo::Polygon への変換 (bbox / 距離計算用)
//
// 座標はすべて (lon, lat) = (x, y)。許容誤差なしの厳密比較。

use std::collections::BTreeSet;

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Coord, Line, LineString, Polygon};

use crate::error::{Result, ZoneError};
use crate::types::{PolygonRings, Position, Ring};

/// Where a point sits relative to a single ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingLocation {
    Inside,
    Boundary,
    Outside,
}

/// Knobs for [`validate_polygon`].
#[derive(Debug, Clone, Copy)]
pub struct ValidationOptions {
    /// Run the O(n²) non-adjacent edge intersection test.
    pub check_self_intersection: bool,
    /// Upper bound on positions per ring.
    pub max_ring_vertices: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            check_self_intersection: true,
            max_ring_vertices: 50_000,
        }
    }
}

/// Number of distinct vertices in a ring (closing duplicate included only once).
pub fn distinct_vertices(ring: &[Position]) -> usize {
    // -0.0 と 0.0 を同一視するため +0.0 で正規化
    ring.iter()
        .map(|&(x, y)| ((x + 0.0).to_bits(), (y + 0.0).to_bits()))
        .collect::<BTreeSet<_>>()
        .len()
}

fn validate_ring(ring: &[Position], role: &str, opts: &ValidationOptions) -> Result<()> {
    if ring.len() < 4 {
        return Err(ZoneError::MalformedGeometry(format!(
            "{role} has {} positions, at least 4 required",
            ring.len()
        )));
    }
    if ring.len() > opts.max_ring_vertices {
        return Err(ZoneError::MalformedGeometry(format!(
            "{role} has {} positions, limit is {}",
            ring.len(),
            opts.max_ring_vertices
        )));
    }
    if let Some(&(x, y)) = ring.iter().find(|&&(x, y)| {
        !x.is_finite() || !y.is_finite() || !(-180.0..=180.0).contains(&x) || !(-90.0..=90.0).contains(&y)
    }) {
        return Err(ZoneError::MalformedGeometry(format!(
            "{role} has out-of-range position [{x}, {y}]"
        )));
    }
    if ring.first() != ring.last() {
        return Err(ZoneError::MalformedGeometry(format!("{role} is not closed")));
    }
    let distinct = distinct_vertices(ring);
    if distinct < 3 {
        return Err(ZoneError::MalformedGeometry(format!(
            "{role} has {distinct} distinct vertices, at least 3 required"
        )));
    }
    if opts.check_self_intersection && ring_self_intersects(ring) {
        return Err(ZoneError::MalformedGeometry(format!("{role} intersects itself")));
    }
    Ok(())
}

/// Validate outer ring and holes. A failure names the offending ring.
pub fn validate_polygon(poly: &PolygonRings, opts: &ValidationOptions) -> Result<()> {
    validate_ring(&poly.outer, "outer ring", opts)?;
    for (i, hole) in poly.holes.iter().enumerate() {
        validate_ring(hole, &format!("hole {}", i + 1), opts)?;
    }
    Ok(())
}

/// Best-effort simple-ring check: any two non-adjacent edges touching, or
/// two adjacent edges folding back over each other, counts as a
/// self-intersection.
pub fn ring_self_intersects(ring: &[Position]) -> bool {
    // 連続する重複頂点を除いてから辺を作る (長さ 0 の辺は隣接判定を壊す)
    let mut pts: Vec<Position> = Vec::with_capacity(ring.len());
    for &p in ring {
        if pts.last() != Some(&p) {
            pts.push(p);
        }
    }
    let edges: Vec<Line<f64>> = pts
        .windows(2)
        .map(|w| Line::new(Coord { x: w[0].0, y: w[0].1 }, Coord { x: w[1].0, y: w[1].1 }))
        .collect();
    let m = edges.len();
    if m < 3 {
        return false;
    }
    for i in 0..m {
        for j in (i + 1)..m {
            let adjacent = j == i + 1 || (i == 0 && j == m - 1);
            match line_intersection(edges[i], edges[j]) {
                None => {}
                Some(LineIntersection::Collinear { intersection }) => {
                    // 隣接辺でも長さを持つ重なりは折り返し (spike)
                    if !adjacent || intersection.start != intersection.end {
                        return true;
                    }
                }
                Some(LineIntersection::SinglePoint { .. }) => {
                    if !adjacent {
                        return true;
                    }
                }
            }
        }
    }
    false
}

#[inline]
fn on_segment(p: Position, a: Position, b: Position) -> bool {
    let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
    cross == 0.0
        && p.0 >= a.0.min(b.0)
        && p.0 <= a.0.max(b.0)
        && p.1 >= a.1.min(b.1)
        && p.1 <= a.1.max(b.1)
}

/// Even-odd ray cast toward +x. Boundary hits are reported separately.
/// Zero-length edges are skipped; an unclosed ring is treated as if its
/// closing edge were present.
pub fn ring_location(ring: &[Position], p: Position) -> RingLocation {
    let n = ring.len();
    if n == 0 {
        return RingLocation::Outside;
    }
    let mut inside = false;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        if a == b {
            continue;
        }
        if on_segment(p, a, b) {
            return RingLocation::Boundary;
        }
        if (a.1 > p.1) != (b.1 > p.1) {
            let x_cross = a.0 + (p.1 - a.1) * (b.0 - a.0) / (b.1 - a.1);
            if p.0 < x_cross {
                inside = !inside;
            }
        }
    }
    if inside {
        RingLocation::Inside
    } else {
        RingLocation::Outside
    }
}

/// Containment for an already validated polygon. Points on any boundary,
/// hole boundaries included, are inside.
pub fn polygon_contains(poly: &PolygonRings, p: Position) -> bool {
    match ring_location(&poly.outer, p) {
        RingLocation::Outside => false,
        RingLocation::Boundary => true,
        RingLocation::Inside => poly
            .holes
            .iter()
            .all(|hole| ring_location(hole, p) != RingLocation::Inside),
    }
}

/// Inclusive point-in-polygon test. `p` is `(lon, lat)`.
///
/// Fails with `MalformedGeometry` when the outer ring has fewer than three
/// distinct vertices; the index rejects such zones on write, so this never
/// fires at query time there.
pub fn point_in_polygon(p: Position, poly: &PolygonRings) -> Result<bool> {
    let distinct = distinct_vertices(&poly.outer);
    if distinct < 3 {
        return Err(ZoneError::MalformedGeometry(format!(
            "outer ring has {distinct} distinct vertices, at least 3 required"
        )));
    }
    Ok(polygon_contains(poly, p))
}

/// Signed shoelace area; positive for counter-clockwise rings.
pub fn signed_ring_area(ring: &[Position]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let sum: f64 = (0..n)
        .map(|i| {
            let (x0, y0) = ring[i];
            let (x1, y1) = ring[(i + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum();
    sum / 2.0
}

/// Unsigned area of a ring in squared degrees.
pub fn ring_area(ring: &[Position]) -> f64 {
    signed_ring_area(ring).abs()
}

fn to_line_string(ring: &Ring) -> LineString<f64> {
    ring.iter()
        .map(|&(x, y)| Coord { x, y })
        .collect::<Vec<_>>()
        .into()
}

/// Convert to `geo::Polygon` for bounding boxes and distance queries.
pub fn to_geo_polygon(poly: &PolygonRings) -> Polygon<f64> {
    Polygon::new(
        to_line_string(&poly.outer),
        poly.holes.iter().map(to_line_string).collect(),
    )
}

// civic_zone_rust\src\import.rs
//! GeoJSON → zone drafts → index.
//
// 入力: FeatureCollection もしくは単一 Feature。geometry は Polygon / MultiPolygon のみ。
// GeoJSON は [lon, lat] 順。そのまま (lon, lat) タプルとして保持する。
// geometry なし・他の geometry 型の feature はスキップしてレポートに残す。

use std::collections::BTreeSet;
use std::{fs, path::Path};

use geojson::{Feature, GeoJson, Value};

use crate::error::{Result, ZoneError};
use crate::polygons::ZoneIndex;
use crate::types::{AuthorityId, Geometry, PolygonRings, Position, Ring, ZoneId};

/// One importable feature.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneDraft {
    /// Position of the source feature in the document.
    pub feature: usize,
    pub name: String,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFeature {
    /// Position of the feature in the document.
    pub index: usize,
    pub name: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeatures {
    pub drafts: Vec<ZoneDraft>,
    pub skipped: Vec<SkippedFeature>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    /// Zone name and the zone ids created for it (several for a MultiPolygon).
    pub created: Vec<(String, Vec<ZoneId>)>,
    pub skipped: Vec<SkippedFeature>,
}

impl ImportReport {
    pub fn zone_count(&self) -> usize {
        self.created.iter().map(|(_, ids)| ids.len()).sum()
    }
}

fn position(pos: &[f64]) -> Result<Position> {
    match pos {
        [lon, lat, ..] => Ok((*lon, *lat)),
        _ => Err(ZoneError::MalformedGeometry(format!(
            "position needs [lon, lat], got {} values",
            pos.len()
        ))),
    }
}

fn ring(raw: &[Vec<f64>]) -> Result<Ring> {
    raw.iter().map(|p| position(p)).collect()
}

fn polygon(raw: &[Vec<Vec<f64>>]) -> Result<PolygonRings> {
    let (outer, holes) = raw
        .split_first()
        .ok_or_else(|| ZoneError::MalformedGeometry("polygon has no rings".into()))?;
    Ok(PolygonRings::new(
        ring(outer)?,
        holes.iter().map(|h| ring(h)).collect::<Result<Vec<_>>>()?,
    ))
}

/// Convert a GeoJSON geometry value. `Ok(None)` for non-polygonal types.
pub fn geometry_from_value(value: &Value) -> Result<Option<Geometry>> {
    match value {
        Value::Polygon(rings) => Ok(Some(Geometry::Polygon(polygon(rings)?))),
        Value::MultiPolygon(polys) => Ok(Some(Geometry::MultiPolygon(
            polys.iter().map(|p| polygon(p)).collect::<Result<Vec<_>>>()?,
        ))),
        _ => Ok(None),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

fn feature_name(f: &Feature) -> Option<String> {
    f.properties
        .as_ref()
        .and_then(|m| m.get("name"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Parse a GeoJSON document into drafts. Structural problems with a
/// single feature skip that feature; a document that is not a Feature or
/// FeatureCollection is an error.
pub fn parse_geojson(text: &str) -> Result<ParsedFeatures> {
    let gj: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| ZoneError::Import(e.to_string()))?;
    let features = match gj {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => {
            return Err(ZoneError::Import(
                "GeoJSON must be a Feature or FeatureCollection".into(),
            ))
        }
    };

    let mut out = ParsedFeatures::default();
    for (index, f) in features.iter().enumerate() {
        let name = feature_name(f);
        let Some(geometry) = f.geometry.as_ref() else {
            tracing::warn!(index, "feature without geometry, skip");
            out.skipped.push(SkippedFeature {
                index,
                name,
                reason: "feature has no geometry".into(),
            });
            continue;
        };
        match geometry_from_value(&geometry.value) {
            Ok(Some(g)) => {
                let name = name.unwrap_or_else(|| format!("Zone {}", out.drafts.len() + 1));
                out.drafts.push(ZoneDraft {
                    feature: index,
                    name,
                    geometry: g,
                });
            }
            Ok(None) => {
                let kind = value_kind(&geometry.value);
                tracing::warn!(index, kind, "geometry is not a polygon, skip");
                out.skipped.push(SkippedFeature {
                    index,
                    name,
                    reason: format!("unsupported geometry type {kind}"),
                });
            }
            Err(e) => {
                tracing::warn!(index, error = %e, "malformed feature, skip");
                out.skipped.push(SkippedFeature {
                    index,
                    name,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(out)
}

/// Add every draft to `authority`. Names the authority already owned
/// before this import are skipped as duplicates, so re-running an import
/// is harmless. Drafts that fail validation are skipped and reported.
pub fn import_drafts(
    index: &ZoneIndex,
    authority: AuthorityId,
    parsed: ParsedFeatures,
) -> Result<ImportReport> {
    let auth = index
        .authority(authority)
        .ok_or(ZoneError::UnknownAuthority(authority))?;
    if auth.retired {
        return Err(ZoneError::AuthorityRetired(authority));
    }
    let existing: BTreeSet<String> = index
        .zones_for_authority(authority)
        .iter()
        .map(|z| z.name.clone())
        .collect();

    let mut report = ImportReport {
        skipped: parsed.skipped,
        ..ImportReport::default()
    };
    for draft in parsed.drafts {
        if existing.contains(&draft.name) {
            tracing::warn!(name = %draft.name, "zone already exists, skip");
            report.skipped.push(SkippedFeature {
                index: draft.feature,
                name: Some(draft.name),
                reason: "zone already exists".into(),
            });
            continue;
        }
        match index.add_geometry(authority, &draft.name, draft.geometry) {
            Ok(ids) => report.created.push((draft.name, ids)),
            Err(e @ ZoneError::MalformedGeometry(_)) => report.skipped.push(SkippedFeature {
                index: draft.feature,
                name: Some(draft.name),
                reason: e.to_string(),
            }),
            Err(e) => return Err(e),
        }
    }
    tracing::info!(
        authority = %authority,
        zones = report.zone_count(),
        skipped = report.skipped.len(),
        "import finished"
    );
    Ok(report)
}

/// Read, parse and import a GeoJSON file for one authority.
pub fn import_file<P: AsRef<Path>>(
    index: &ZoneIndex,
    authority: AuthorityId,
    path: P,
) -> Result<ImportReport> {
    let p = path.as_ref();
    let text = fs::read_to_string(p)
        .map_err(|e| ZoneError::Import(format!("read `{}`: {e}", p.display())))?;
    import_drafts(index, authority, parse_geojson(&text)?)
}

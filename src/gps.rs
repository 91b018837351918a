// civic_zone_rust\src\gps.rs
//! Location extraction for uploaded photos.
//!
//! EXIF GPS (degrees / minutes / seconds + hemisphere) is converted to
//! decimal degrees. When the image has no usable GPS block the caller's
//! manual coordinates are used; with neither the report is rejected with
//! [`ZoneError::NoLocation`].
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use exif::{In, Reader, Tag, Value};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ZoneError};
use crate::metrics;
use crate::types::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    Exif,
    Manual,
}

impl LocationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationSource::Exif => "exif",
            LocationSource::Manual => "manual",
        }
    }
}

/// A point plus where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Located {
    pub point: Point,
    pub source: LocationSource,
}

/// `d + m/60 + s/3600`, negated for the southern / western hemisphere.
pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64, reference: char) -> f64 {
    let decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    match reference.to_ascii_uppercase() {
        'S' | 'W' => -decimal,
        _ => decimal,
    }
}

fn coordinate(exif: &exif::Exif, value_tag: Tag, ref_tag: Tag, refs: [char; 2]) -> Result<f64, String> {
    let value = exif
        .get_field(value_tag, In::PRIMARY)
        .ok_or_else(|| format!("{value_tag} missing"))?;
    let reference = exif
        .get_field(ref_tag, In::PRIMARY)
        .ok_or_else(|| format!("{ref_tag} missing"))?;

    let dms = match value.value {
        Value::Rational(ref v) if v.len() >= 3 => [v[0].to_f64(), v[1].to_f64(), v[2].to_f64()],
        _ => return Err(format!("{value_tag} is not a degrees/minutes/seconds triple")),
    };
    if dms.iter().any(|x| !x.is_finite() || *x < 0.0) {
        return Err(format!("{value_tag} has a zero denominator or negative part"));
    }

    let r = match reference.value {
        Value::Ascii(ref v) => v.first().and_then(|s| s.first()).map(|&b| (b as char).to_ascii_uppercase()),
        _ => None,
    }
    .ok_or_else(|| format!("{ref_tag} is not ASCII"))?;
    if !refs.contains(&r) {
        return Err(format!("{ref_tag} has unexpected value {r:?}"));
    }

    Ok(dms_to_decimal(dms[0], dms[1], dms[2], r))
}

fn exif_point(image: &[u8]) -> Result<Point, String> {
    let mut cursor = Cursor::new(image);
    let exif = Reader::new()
        .read_from_container(&mut cursor)
        .map_err(|e| format!("exif: {e}"))?;
    let lat = coordinate(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, ['N', 'S'])?;
    let lon = coordinate(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, ['E', 'W'])?;
    let p = Point::new(lat, lon);
    if !p.in_wgs84_range() {
        return Err(format!("decoded point ({lat}, {lon}) is out of range"));
    }
    Ok(p)
}

/// GPS point embedded in `image`, if any. Missing and corrupt metadata
/// both yield `None`; the cause goes to the debug log.
pub fn extract_gps(image: &[u8]) -> Option<Point> {
    match exif_point(image) {
        Ok(p) => Some(p),
        Err(cause) => {
            tracing::debug!(%cause, "no usable GPS metadata");
            None
        }
    }
}

/// EXIF first, manual second.
fn settle(extracted: Option<Point>, manual: Option<Point>) -> Result<Located> {
    if let Some(point) = extracted {
        metrics::LOCATION_SOURCES.with_label_values(&["exif"]).inc();
        return Ok(Located {
            point,
            source: LocationSource::Exif,
        });
    }
    match manual {
        Some(point) if point.in_wgs84_range() => {
            metrics::LOCATION_SOURCES.with_label_values(&["manual"]).inc();
            Ok(Located {
                point,
                source: LocationSource::Manual,
            })
        }
        Some(point) => Err(ZoneError::InvalidCoordinate {
            lat: point.lat,
            lon: point.lon,
        }),
        None => {
            metrics::LOCATION_SOURCES.with_label_values(&["none"]).inc();
            Err(ZoneError::NoLocation)
        }
    }
}

/// Decide the issue location from image bytes and/or manual coordinates.
pub fn locate(image: Option<&[u8]>, manual: Option<Point>) -> Result<Located> {
    settle(image.and_then(extract_gps), manual)
}

/// Same as [`locate`] but reads the image from disk. An unreadable file
/// counts as missing metadata.
pub fn locate_file(image: Option<&Path>, manual: Option<Point>) -> Result<Located> {
    let extracted = image.and_then(|path| match std::fs::read(path) {
        Ok(bytes) => extract_gps(&bytes),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "image unreadable, ignoring metadata");
            None
        }
    });
    settle(extracted, manual)
}

/// Blocking-pool extraction bounded by `timeout`. A timeout is treated
/// like missing metadata; the abandoned decode finishes in the background.
pub async fn locate_async(
    image: Option<Vec<u8>>,
    manual: Option<Point>,
    timeout: Duration,
) -> Result<Located> {
    let extracted = match image {
        Some(bytes) => {
            let task = tokio::task::spawn_blocking(move || extract_gps(&bytes));
            match tokio::time::timeout(timeout, task).await {
                Ok(joined) => joined.map_err(|e| ZoneError::Internal(format!("gps task: {e}")))?,
                Err(_) => {
                    tracing::warn!(timeout_ms = timeout.as_millis() as u64, "GPS extraction timed out");
                    None
                }
            }
        }
        None => None,
    };
    settle(extracted, manual)
}

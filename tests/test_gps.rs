// civic_zone_rust\tests\test_gps.rs
use std::io::Cursor;
use std::time::Duration;

use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};

use civic_zone_rust::error::ZoneError;
use civic_zone_rust::gps::{dms_to_decimal, extract_gps, locate, locate_async, locate_file, LocationSource};
use civic_zone_rust::types::Point;

fn ascii(s: &str) -> Value {
    Value::Ascii(vec![s.as_bytes().to_vec()])
}

fn dms(parts: [(u32, u32); 3]) -> Value {
    Value::Rational(parts.iter().map(|&(num, denom)| Rational { num, denom }).collect())
}

/// Minimal TIFF carrying a GPS IFD.
fn tiff_with_gps(lat: [(u32, u32); 3], lat_ref: &str, lon: [(u32, u32); 3], lon_ref: &str) -> Vec<u8> {
    let fields = [
        Field { tag: Tag::ImageDescription, ifd_num: In::PRIMARY, value: ascii("pothole") },
        Field { tag: Tag::GPSLatitudeRef, ifd_num: In::PRIMARY, value: ascii(lat_ref) },
        Field { tag: Tag::GPSLatitude, ifd_num: In::PRIMARY, value: dms(lat) },
        Field { tag: Tag::GPSLongitudeRef, ifd_num: In::PRIMARY, value: ascii(lon_ref) },
        Field { tag: Tag::GPSLongitude, ifd_num: In::PRIMARY, value: dms(lon) },
    ];
    let mut writer = Writer::new();
    for f in &fields {
        writer.push_field(f);
    }
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, false).unwrap();
    buf.into_inner()
}

fn tiff_without_gps() -> Vec<u8> {
    let field = Field { tag: Tag::ImageDescription, ifd_num: In::PRIMARY, value: ascii("no gps") };
    let mut writer = Writer::new();
    writer.push_field(&field);
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, false).unwrap();
    buf.into_inner()
}

fn tokyo() -> Vec<u8> {
    // 35°41'22.2"N 139°41'30"E
    tiff_with_gps([(35, 1), (41, 1), (222, 10)], "N", [(139, 1), (41, 1), (30, 1)], "E")
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn dms_conversion_and_hemisphere_sign() {
    assert!(close(dms_to_decimal(35.0, 41.0, 22.2, 'N'), 35.6895));
    assert!(close(dms_to_decimal(33.0, 52.0, 4.8, 'S'), -33.868));
    assert!(close(dms_to_decimal(151.0, 12.0, 36.0, 'E'), 151.21));
    assert!(close(dms_to_decimal(0.0, 7.0, 39.0, 'W'), -0.1275));
    assert!(close(dms_to_decimal(10.0, 30.0, 0.0, 's'), -10.5));
}

#[test]
fn extracts_point_from_tiff() {
    let p = extract_gps(&tokyo()).expect("gps");
    assert!(close(p.lat, 35.6895), "{}", p.lat);
    assert!(close(p.lon, 139.0 + 41.0 / 60.0 + 30.0 / 3600.0), "{}", p.lon);
}

#[test]
fn southern_western_hemisphere() {
    let img = tiff_with_gps([(33, 1), (52, 1), (48, 10)], "S", [(70, 1), (30, 1), (0, 1)], "W");
    let p = extract_gps(&img).unwrap();
    assert!(close(p.lat, -(33.0 + 52.0 / 60.0 + 4.8 / 3600.0)));
    assert!(close(p.lon, -70.5));
}

#[test]
fn missing_or_corrupt_metadata_yields_none() {
    assert!(extract_gps(&tiff_without_gps()).is_none());
    assert!(extract_gps(b"definitely not an image").is_none());
    assert!(extract_gps(&[]).is_none());

    // zero denominator
    let broken = tiff_with_gps([(35, 1), (41, 0), (0, 1)], "N", [(139, 1), (0, 1), (0, 1)], "E");
    assert!(extract_gps(&broken).is_none());

    // hemisphere ref that is neither N nor S
    let bad_ref = tiff_with_gps([(35, 1), (0, 1), (0, 1)], "X", [(139, 1), (0, 1), (0, 1)], "E");
    assert!(extract_gps(&bad_ref).is_none());

    // 95°N
    let out_of_range = tiff_with_gps([(95, 1), (0, 1), (0, 1)], "N", [(139, 1), (0, 1), (0, 1)], "E");
    assert!(extract_gps(&out_of_range).is_none());
}

#[test]
fn exif_wins_over_manual() {
    let manual = Some(Point::new(1.0, 2.0));
    let located = locate(Some(&tokyo()), manual).unwrap();
    assert_eq!(located.source, LocationSource::Exif);
    assert!(close(located.point.lat, 35.6895));
}

#[test]
fn falls_back_to_manual() {
    let manual = Point::new(-33.868, 151.21);
    let located = locate(Some(&tiff_without_gps()), Some(manual)).unwrap();
    assert_eq!(located.source, LocationSource::Manual);
    assert_eq!(located.point, manual);

    let located = locate(None, Some(manual)).unwrap();
    assert_eq!(located.source, LocationSource::Manual);
}

#[test]
fn no_location_at_all() {
    assert!(matches!(locate(None, None), Err(ZoneError::NoLocation)));
    assert!(matches!(locate(Some(&tiff_without_gps()), None), Err(ZoneError::NoLocation)));
}

#[test]
fn invalid_manual_coordinates() {
    let err = locate(None, Some(Point::new(91.0, 0.0))).unwrap_err();
    assert!(matches!(err, ZoneError::InvalidCoordinate { .. }));
    let err = locate(None, Some(Point::new(0.0, f64::NAN))).unwrap_err();
    assert!(matches!(err, ZoneError::InvalidCoordinate { .. }));
}

#[test]
fn locate_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photo.tif");
    std::fs::write(&path, tokyo()).unwrap();
    let located = locate_file(Some(&path), None).unwrap();
    assert_eq!(located.source, LocationSource::Exif);

    let missing = dir.path().join("gone.jpg");
    let located = locate_file(Some(&missing), Some(Point::new(10.0, 10.0))).unwrap();
    assert_eq!(located.source, LocationSource::Manual);
    assert!(matches!(locate_file(Some(&missing), None), Err(ZoneError::NoLocation)));
}

#[tokio::test]
async fn async_extraction() {
    let located = locate_async(Some(tokyo()), None, Duration::from_secs(5)).await.unwrap();
    assert_eq!(located.source, LocationSource::Exif);

    let located = locate_async(None, Some(Point::new(1.0, 1.0)), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(located.source, LocationSource::Manual);

    let err = locate_async(Some(b"junk".to_vec()), None, Duration::from_secs(5)).await.unwrap_err();
    assert!(matches!(err, ZoneError::NoLocation));
}

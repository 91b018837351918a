// civic_zone_rust\tests\test_import.rs
use std::io::Write;

use civic_zone_rust::error::ZoneError;
use civic_zone_rust::import::{import_drafts, import_file, parse_geojson};
use civic_zone_rust::types::{AuthorityDraft, AuthorityId, Geometry, Point};
use civic_zone_rust::ZoneIndex;

const THREE_WARDS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    { "type": "Feature", "properties": { "name": "North" },
      "geometry": { "type": "Polygon", "coordinates": [[[139.70, 35.70], [139.80, 35.70], [139.80, 35.80], [139.70, 35.80], [139.70, 35.70]]] } },
    { "type": "Feature", "properties": { "name": "Centre" },
      "geometry": { "type": "Polygon", "coordinates": [[[139.70, 35.60], [139.80, 35.60], [139.80, 35.70], [139.70, 35.70], [139.70, 35.60]],
                                                       [[139.74, 35.64], [139.76, 35.64], [139.76, 35.66], [139.74, 35.66], [139.74, 35.64]]] } },
    { "type": "Feature", "properties": { "name": "South" },
      "geometry": { "type": "Polygon", "coordinates": [[[139.70, 35.50], [139.80, 35.50], [139.75, 35.60], [139.70, 35.50]]] } }
  ]
}"#;

fn index_with_authority() -> (ZoneIndex, AuthorityId) {
    let index = ZoneIndex::default();
    let id = index
        .register_authority(AuthorityDraft::new("Tokyo Ward", "ward@example.com"))
        .unwrap();
    (index, id)
}

#[test]
fn n_features_make_n_zones_with_exact_coordinates() {
    let (index, auth) = index_with_authority();
    let parsed = parse_geojson(THREE_WARDS).unwrap();
    let expected: Vec<_> = parsed
        .drafts
        .iter()
        .map(|d| match &d.geometry {
            Geometry::Polygon(p) => p.clone(),
            Geometry::MultiPolygon(_) => unreachable!(),
        })
        .collect();

    let report = import_drafts(&index, auth, parsed).unwrap();
    assert_eq!(report.zone_count(), 3);
    assert!(report.skipped.is_empty());

    let zones = index.zones_for_authority(auth);
    assert_eq!(zones.len(), 3);
    let names: Vec<_> = zones.iter().map(|z| z.name.as_str()).collect();
    assert_eq!(names, vec!["North", "Centre", "South"]);
    for (zone, rings) in zones.iter().zip(&expected) {
        assert_eq!(&zone.rings, rings);
    }
    assert_eq!(zones[0].rings.outer[1], (139.80, 35.70));
    assert_eq!(zones[1].rings.holes.len(), 1);
}

#[test]
fn imported_zones_route_points() {
    let (index, auth) = index_with_authority();
    import_drafts(&index, auth, parse_geojson(THREE_WARDS).unwrap()).unwrap();
    assert!(index.find_containing(&Point::new(35.75, 139.75)).contains(&auth));
    // Centre の穴
    assert!(index.find_containing(&Point::new(35.65, 139.75)).is_empty());
}

#[test]
fn reimport_skips_existing_names() {
    let (index, auth) = index_with_authority();
    import_drafts(&index, auth, parse_geojson(THREE_WARDS).unwrap()).unwrap();
    let again = import_drafts(&index, auth, parse_geojson(THREE_WARDS).unwrap()).unwrap();
    assert_eq!(again.zone_count(), 0);
    assert_eq!(again.skipped.len(), 3);
    assert!(again.skipped.iter().all(|s| s.reason == "zone already exists"));
    assert_eq!(index.len(), 3);
}

#[test]
fn multipolygon_feature_splits_into_zones() {
    let doc = r#"{
      "type": "Feature",
      "properties": { "name": "Islands" },
      "geometry": { "type": "MultiPolygon", "coordinates": [
        [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]],
        [[[5, 5], [6, 5], [6, 6], [5, 6], [5, 5]]]
      ] }
    }"#;
    let (index, auth) = index_with_authority();
    let report = import_drafts(&index, auth, parse_geojson(doc).unwrap()).unwrap();
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].0, "Islands");
    assert_eq!(report.created[0].1.len(), 2);
    assert_eq!(index.len(), 2);
}

#[test]
fn unsupported_and_missing_geometry_are_skipped() {
    let doc = r#"{
      "type": "FeatureCollection",
      "features": [
        { "type": "Feature", "properties": { "name": "Pin" }, "geometry": { "type": "Point", "coordinates": [1, 1] } },
        { "type": "Feature", "properties": {}, "geometry": null },
        { "type": "Feature", "properties": null,
          "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [2, 0], [2, 2], [0, 2], [0, 0]]] } }
      ]
    }"#;
    let parsed = parse_geojson(doc).unwrap();
    assert_eq!(parsed.drafts.len(), 1);
    assert_eq!(parsed.drafts[0].name, "Zone 1");
    assert_eq!(parsed.drafts[0].feature, 2);
    assert_eq!(parsed.skipped.len(), 2);
    assert_eq!(parsed.skipped[0].index, 0);
    assert!(parsed.skipped[0].reason.contains("Point"));
    assert_eq!(parsed.skipped[1].index, 1);
}

#[test]
fn malformed_polygon_is_reported_not_fatal() {
    let doc = r#"{
      "type": "FeatureCollection",
      "features": [
        { "type": "Feature", "properties": { "name": "Open" },
          "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1]]] } },
        { "type": "Feature", "properties": { "name": "Good" },
          "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [2, 0], [2, 2], [0, 2], [0, 0]]] } }
      ]
    }"#;
    let (index, auth) = index_with_authority();
    let report = import_drafts(&index, auth, parse_geojson(doc).unwrap()).unwrap();
    assert_eq!(report.zone_count(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name.as_deref(), Some("Open"));
    assert!(report.skipped[0].reason.starts_with("malformed geometry"));
}

#[test]
fn document_level_errors() {
    assert!(matches!(parse_geojson("not json"), Err(ZoneError::Import(_))));
    let bare = r#"{ "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]] }"#;
    assert!(matches!(parse_geojson(bare), Err(ZoneError::Import(_))));

    let index = ZoneIndex::default();
    let err = import_drafts(&index, AuthorityId(5), parse_geojson(THREE_WARDS).unwrap()).unwrap_err();
    assert!(matches!(err, ZoneError::UnknownAuthority(AuthorityId(5))));
}

#[test]
fn retired_authority_cannot_import() {
    let (index, auth) = index_with_authority();
    index.retire_authority(auth).unwrap();
    let err = import_drafts(&index, auth, parse_geojson(THREE_WARDS).unwrap()).unwrap_err();
    assert!(matches!(err, ZoneError::AuthorityRetired(_)));
}

#[test]
fn import_from_file() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(THREE_WARDS.as_bytes()).unwrap();
    let (index, auth) = index_with_authority();
    let report = import_file(&index, auth, f.path()).unwrap();
    assert_eq!(report.zone_count(), 3);

    let missing = import_file(&index, auth, "/definitely/not/here.geojson").unwrap_err();
    assert!(matches!(missing, ZoneError::Import(_)));
}

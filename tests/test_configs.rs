// civic_zone_rust\tests\test_configs.rs
use std::path::PathBuf;
use std::time::Duration;

use civic_zone_rust::configs::{Config, ConfigError};

#[test]
fn missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config::load_from(dir.path().join("zone.toml")).unwrap();
    assert_eq!(cfg, Config::default());
    assert_eq!(cfg.state_path, PathBuf::from("zones.json"));
    assert_eq!(cfg.gps_timeout(), Duration::from_millis(2_000));
    assert!(cfg.validation_options().check_self_intersection);
}

#[test]
fn values_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zone.toml");
    std::fs::write(
        &path,
        r#"
state_path = "/var/lib/zones/state.json"
log_filter = "civic_zone_rust=debug"
log_json = true
gps_timeout_ms = 500
check_self_intersection = false
max_ring_vertices = 1000
"#,
    )
    .unwrap();
    let cfg = Config::load_from(&path).unwrap();
    assert_eq!(cfg.state_path, PathBuf::from("/var/lib/zones/state.json"));
    assert!(cfg.log_json);
    assert_eq!(cfg.gps_timeout(), Duration::from_millis(500));
    let opts = cfg.validation_options();
    assert!(!opts.check_self_intersection);
    assert_eq!(opts.max_ring_vertices, 1000);
}

#[test]
fn partial_file_keeps_other_defaults() {
    let cfg = Config::from_toml_str("gps_timeout_ms = 100").unwrap();
    assert_eq!(cfg.gps_timeout_ms, 100);
    assert_eq!(cfg.log_filter, "info");
    assert_eq!(cfg.max_ring_vertices, 50_000);
}

#[test]
fn invalid_values_are_rejected() {
    let cfg = Config { gps_timeout_ms: 0, ..Config::default() };
    assert!(matches!(cfg.validate(), Err(ConfigError::InvalidValue(_))));

    let cfg = Config { max_ring_vertices: 3, ..Config::default() };
    assert!(matches!(cfg.validate(), Err(ConfigError::InvalidValue(_))));

    let cfg = Config { log_filter: "  ".into(), ..Config::default() };
    assert!(matches!(cfg.validate(), Err(ConfigError::InvalidValue(_))));
}

#[test]
fn parse_errors_name_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zone.toml");
    std::fs::write(&path, "gps_timeout_ms = \"soon\"").unwrap();
    match Config::load_from(&path) {
        Err(ConfigError::Parse(file, _)) => assert!(file.ends_with("zone.toml")),
        other => panic!("unexpected {other:?}"),
    }

    std::fs::write(&path, "no_such_key = 1").unwrap();
    assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(..))));
}

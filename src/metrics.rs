// civic_zone_rust\src\metrics.rs
//! Prometheus gauge / counter initialisation.
use once_cell::sync::Lazy;
use prometheus::{
    opts, register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// 現在ルーティング対象になっている zone 数
pub static ZONES_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(opts!("zone_index_active_zones", "Zones currently used for routing"))
        .expect("register zone_index_active_zones")
});

/// op = add | replace | remove | retire | reload
pub static ZONE_WRITES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!("zone_index_writes_total", "Committed zone index writes"),
        &["op"]
    )
    .expect("register zone_index_writes_total")
});

pub static GEOMETRY_REJECTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "zone_geometry_rejected_total",
        "Polygons rejected by validation"
    ))
    .expect("register zone_geometry_rejected_total")
});

/// outcome = assigned | ambiguous | no_zone_match | invalid_coordinate
pub static RESOLUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!("zone_resolutions_total", "Point resolutions by outcome"),
        &["outcome"]
    )
    .expect("register zone_resolutions_total")
});

pub static RESOLVE_CANDIDATES: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "zone_resolve_candidates",
        "Authorities whose zones contained the resolved point",
        vec![0.0, 1.0, 2.0, 3.0, 5.0, 8.0]
    )
    .expect("register zone_resolve_candidates")
});

/// source = exif | manual | none
pub static LOCATION_SOURCES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!("issue_location_source_total", "Where issue coordinates came from"),
        &["source"]
    )
    .expect("register issue_location_source_total")
});

/// Text exposition of every registered metric (default registry).
pub fn gather_text() -> String {
    use prometheus::{Encoder, TextEncoder};
    let mut buf = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buf) {
        tracing::warn!(error = %e, "metrics encode failed");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

// civic_zone_rust\src\lib.rs
//! Crate entry – zone index, resolver, GPS extraction & public API.
#![forbid(unsafe_code)]

pub mod configs;
pub mod error;
pub mod geometry;
pub mod gps;
pub mod import;
pub mod intake;
pub mod metrics;
pub mod polygons;
pub mod resolver;
pub mod snapshot;
pub mod trace;
pub mod types;

pub use error::{Result, ZoneError};
pub use geometry::{point_in_polygon, ValidationOptions};
pub use gps::{extract_gps, locate, locate_async, Located, LocationSource};
pub use intake::{Issue, IssueIntake, IssueReport, IssueStatus, IssueUpdate};
pub use polygons::{IndexSnapshot, LoadReport, Zone, ZoneIndex};
pub use resolver::{Resolution, Resolver, UnassignedReason};
pub use snapshot::SnapshotFile;
pub use types::{
    Authority, AuthorityDraft, AuthorityId, Geometry, Point, PolygonRings, Position, Ring, ZoneId,
    ZoneRecord,
};

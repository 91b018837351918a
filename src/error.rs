// civic_zone_rust\src\error.rs
use thiserror::Error;

use crate::types::{AuthorityId, ZoneId};

/// Errors returned by the zone index, importer, snapshot store and
/// location extractor. None of them is fatal; every failure leaves the
/// index exactly as it was.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ZoneError {
    /// Ring shape / closure / coordinate problem. Never silently repaired.
    #[error("malformed geometry: {0}")]
    MalformedGeometry(String),

    /// Zone references an authority the index does not know.
    #[error("unknown authority: {0}")]
    UnknownAuthority(AuthorityId),

    /// Zone id not present in the index.
    #[error("unknown zone: {0}")]
    UnknownZone(ZoneId),

    /// Retired authorities keep their record but accept no new zones.
    #[error("authority {0} is retired")]
    AuthorityRetired(AuthorityId),

    /// User is not on the authorized list of the issue's authority.
    #[error("user `{user}` may not update issues of authority {authority}")]
    NotAuthorized { user: String, authority: AuthorityId },

    /// Status updates need an owning authority; triage the issue first.
    #[error("issue has no assigned authority")]
    IssueUnassigned,

    /// Neither image metadata nor manual coordinates gave a location.
    #[error("no location: image carries no usable GPS metadata and no manual coordinates were given")]
    NoLocation,

    /// Coordinate outside WGS84 range or not finite.
    #[error("invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    /// GeoJSON document could not be turned into zone drafts.
    #[error("import error: {0}")]
    Import(String),

    /// Reading / writing the persisted zone snapshot failed.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl ZoneError {
    /// Short machine-friendly tag, used for metric labels and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            ZoneError::MalformedGeometry(_) => "malformed_geometry",
            ZoneError::UnknownAuthority(_) => "unknown_authority",
            ZoneError::UnknownZone(_) => "unknown_zone",
            ZoneError::AuthorityRetired(_) => "authority_retired",
            ZoneError::NotAuthorized { .. } => "not_authorized",
            ZoneError::IssueUnassigned => "issue_unassigned",
            ZoneError::NoLocation => "no_location",
            ZoneError::InvalidCoordinate { .. } => "invalid_coordinate",
            ZoneError::Import(_) => "import",
            ZoneError::Snapshot(_) => "snapshot",
            ZoneError::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for ZoneError {
    fn from(e: std::io::Error) -> Self {
        ZoneError::Snapshot(e.to_string())
    }
}

impl From<serde_json::Error> for ZoneError {
    fn from(e: serde_json::Error) -> Self {
        ZoneError::Snapshot(e.to_string())
    }
}

pub type Result<T, E = ZoneError> = std::result::Result<T, E>;

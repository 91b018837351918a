// civic_zone_rust\src\intake.rs
//! Issue intake: location → resolution → `Issue`.
//!
//! Persisting the returned issue is the caller's job. The point is fixed
//! at creation. Afterwards triage may set the authority, and users
//! authorized for that authority post status updates.
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ZoneError};
use crate::gps::{self, Located, LocationSource};
use crate::polygons::ZoneIndex;
use crate::resolver::{NearestHint, Resolution, Resolver, UnassignedReason};
use crate::types::{AuthorityId, Point};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

/// One dashboard status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueUpdate {
    pub author: String,
    pub status: IssueStatus,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// What a citizen submits.
#[derive(Debug, Clone, Default)]
pub struct IssueReport {
    pub title: String,
    pub category: String,
    pub description: String,
    /// Raw upload bytes (JPEG / TIFF / HEIF / PNG / WebP).
    pub image: Option<Vec<u8>>,
    /// Coordinates typed or picked on a map by the reporter.
    pub manual: Option<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub title: String,
    pub category: String,
    pub description: String,
    point: Point,
    source: LocationSource,
    assigned_authority: Option<AuthorityId>,
    unassigned_reason: Option<UnassignedReason>,
    nearest: Option<NearestHint>,
    status: IssueStatus,
    created_at: DateTime<Utc>,
    /// Newest first.
    #[serde(default)]
    updates: Vec<IssueUpdate>,
}

impl Issue {
    fn new(title: String, category: String, description: String, located: Located, resolution: Resolution) -> Self {
        let (assigned_authority, unassigned_reason, nearest) = match resolution {
            Resolution::Assigned { authority, .. } => (Some(authority), None, None),
            Resolution::Unassigned { reason, nearest } => (None, Some(reason), nearest),
        };
        Self {
            title,
            category,
            description,
            point: located.point,
            source: located.source,
            assigned_authority,
            unassigned_reason,
            nearest,
            status: IssueStatus::Open,
            created_at: Utc::now(),
            updates: Vec::new(),
        }
    }

    pub fn point(&self) -> Point {
        self.point
    }

    pub fn location_source(&self) -> LocationSource {
        self.source
    }

    pub fn assigned_authority(&self) -> Option<AuthorityId> {
        self.assigned_authority
    }

    /// Set while the issue waits in the manual triage queue.
    pub fn unassigned_reason(&self) -> Option<UnassignedReason> {
        self.unassigned_reason
    }

    pub fn nearest_hint(&self) -> Option<&NearestHint> {
        self.nearest.as_ref()
    }

    pub fn status(&self) -> IssueStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Status history, newest first.
    pub fn updates(&self) -> &[IssueUpdate] {
        &self.updates
    }

    /// Record a status change by `user`, who must be authorized for the
    /// assigned authority.
    pub fn post_update(
        &mut self,
        index: &ZoneIndex,
        user: &str,
        status: IssueStatus,
        notes: impl Into<String>,
    ) -> Result<()> {
        let authority = self.assigned_authority.ok_or(ZoneError::IssueUnassigned)?;
        let auth = index
            .authority(authority)
            .ok_or(ZoneError::UnknownAuthority(authority))?;
        if !auth.authorized_users.contains(user) {
            tracing::warn!(user, authority = %authority, "status update refused");
            return Err(ZoneError::NotAuthorized {
                user: user.to_string(),
                authority,
            });
        }
        tracing::info!(user, authority = %authority, from = ?self.status, to = ?status, "issue status updated");
        self.updates.insert(
            0,
            IssueUpdate {
                author: user.to_string(),
                status,
                notes: notes.into(),
                created_at: Utc::now(),
            },
        );
        self.status = status;
        Ok(())
    }

    /// Manual triage. The authority must exist and still be active.
    pub fn assign_manually(&mut self, index: &ZoneIndex, authority: AuthorityId) -> Result<()> {
        let auth = index
            .authority(authority)
            .ok_or(ZoneError::UnknownAuthority(authority))?;
        if auth.retired {
            return Err(ZoneError::AuthorityRetired(authority));
        }
        tracing::info!(authority = %authority, previous = ?self.assigned_authority, "issue assigned manually");
        self.assigned_authority = Some(authority);
        self.unassigned_reason = None;
        self.nearest = None;
        Ok(())
    }
}

/// Glue between the location extractor and the resolver.
#[derive(Debug, Clone)]
pub struct IssueIntake {
    resolver: Resolver,
    gps_timeout: Duration,
}

impl IssueIntake {
    pub fn new(resolver: Resolver, gps_timeout: Duration) -> Self {
        Self {
            resolver,
            gps_timeout,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    fn finish(&self, report: IssueReport, located: Located) -> Issue {
        let resolution = self.resolver.resolve(&located.point);
        match &resolution {
            Resolution::Assigned { authority, .. } => {
                tracing::info!(authority = %authority, source = located.source.as_str(), "issue routed")
            }
            Resolution::Unassigned { reason, .. } => {
                tracing::info!(%reason, source = located.source.as_str(), "issue left for manual triage")
            }
        }
        Issue::new(report.title, report.category, report.description, located, resolution)
    }

    /// Synchronous intake. Fails only with `NoLocation` / `InvalidCoordinate`.
    pub fn submit(&self, report: IssueReport) -> Result<Issue> {
        let located = gps::locate(report.image.as_deref(), report.manual)?;
        Ok(self.finish(report, located))
    }

    /// Intake with the EXIF decode on the blocking pool, bounded by the
    /// configured GPS timeout.
    pub async fn submit_async(&self, mut report: IssueReport) -> Result<Issue> {
        let image = report.image.take();
        let located = gps::locate_async(image, report.manual, self.gps_timeout).await?;
        Ok(self.finish(report, located))
    }
}

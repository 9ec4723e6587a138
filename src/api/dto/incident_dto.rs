//! Incident DTOs. The resolution is flattened into nullable fields on the
//! wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{
    Incident, IncidentId, IncidentStatus, IncidentUpdate, ServiceId, Severity, UserId,
};
use crate::persistence::IncidentListing;
use crate::service::{IncidentDetail, IncidentDraft, IncidentPatch, IncidentQuery, ResolutionNotes};

/// Request body for `POST /api/incidents`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateIncidentRequest {
    /// Affected service.
    pub service_id: ServiceId,
    /// Short summary.
    #[serde(default)]
    pub title: String,
    /// What is happening.
    #[serde(default)]
    pub description: String,
    /// Impact tier.
    pub severity: Severity,
}

impl From<CreateIncidentRequest> for IncidentDraft {
    fn from(req: CreateIncidentRequest) -> Self {
        Self {
            service_id: req.service_id,
            title: req.title,
            description: req.description,
            severity: req.severity,
        }
    }
}

/// Request body for `PATCH /api/incidents/{id}`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateIncidentRequest {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
}

impl From<UpdateIncidentRequest> for IncidentPatch {
    fn from(req: UpdateIncidentRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
        }
    }
}

/// Request body for `POST /api/incidents/{id}/updates`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddUpdateRequest {
    /// Timeline message.
    #[serde(default)]
    pub message: String,
}

/// Request body for `PATCH /api/incidents/{id}/resolve`. May be empty.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ResolveIncidentRequest {
    /// Root cause, appended to the closing timeline entry.
    pub root_cause: Option<String>,
    /// Follow-up actions.
    pub prevention_notes: Option<String>,
}

impl From<ResolveIncidentRequest> for ResolutionNotes {
    fn from(req: ResolveIncidentRequest) -> Self {
        Self {
            root_cause: req.root_cause,
            prevention_notes: req.prevention_notes,
        }
    }
}

/// Request body for `PATCH /api/incidents/{id}/publish`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishRequest {
    /// Whether the incident appears on the public status page.
    pub is_published: bool,
}

/// Query string for `GET /api/incidents`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IncidentListParams {
    /// Only incidents of this service.
    pub service_id: Option<ServiceId>,
    /// Only incidents in this state.
    pub status: Option<IncidentStatus>,
    /// Only incidents of this severity.
    pub severity: Option<Severity>,
}

impl From<IncidentListParams> for IncidentQuery {
    fn from(params: IncidentListParams) -> Self {
        Self {
            service_id: params.service_id,
            status: params.status,
            severity: params.severity,
        }
    }
}

/// An incident on the wire.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IncidentDto {
    /// Incident id.
    pub id: IncidentId,
    /// Affected service.
    pub service_id: ServiceId,
    /// Name of the affected service, on list and detail views.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Impact tier.
    pub severity: Severity,
    /// `open` or `resolved`.
    pub status: IncidentStatus,
    /// Visible on the public status page.
    pub is_published: bool,
    /// Author.
    pub created_by: Option<UserId>,
    /// Resolver; set exactly when resolved.
    pub resolved_by: Option<UserId>,
    /// Resolution time; set exactly when resolved.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Root cause given at resolution.
    pub root_cause: Option<String>,
    /// Prevention notes given at resolution.
    pub prevention_notes: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl From<Incident> for IncidentDto {
    fn from(incident: Incident) -> Self {
        let status = incident.status();
        let resolution = incident.resolution;
        Self {
            id: incident.id,
            service_id: incident.service_id,
            service_name: None,
            title: incident.title,
            description: incident.description,
            severity: incident.severity,
            status,
            is_published: incident.is_published,
            created_by: incident.created_by,
            resolved_by: resolution.as_ref().map(|r| r.resolved_by),
            resolved_at: resolution.as_ref().map(|r| r.resolved_at),
            root_cause: resolution.as_ref().and_then(|r| r.root_cause.clone()),
            prevention_notes: resolution.and_then(|r| r.prevention_notes),
            created_at: incident.created_at,
            updated_at: incident.updated_at,
        }
    }
}

impl From<IncidentListing> for IncidentDto {
    fn from(listing: IncidentListing) -> Self {
        Self {
            service_name: Some(listing.service_name),
            ..Self::from(listing.incident)
        }
    }
}

/// An incident with its timeline.
#[derive(Debug, Serialize, ToSchema)]
pub struct IncidentDetailDto {
    /// The incident.
    #[serde(flatten)]
    pub incident: IncidentDto,
    /// Timeline, oldest first.
    pub updates: Vec<IncidentUpdate>,
}

impl From<IncidentDetail> for IncidentDetailDto {
    fn from(detail: IncidentDetail) -> Self {
        Self {
            incident: IncidentDto {
                service_name: Some(detail.service_name),
                ..IncidentDto::from(detail.incident)
            },
            updates: detail.updates,
        }
    }
}

//! Service registry DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::incident_dto::IncidentDto;
use crate::domain::{MonitoredService, ServiceStatus};
use crate::service::{ServiceDetail, ServiceDraft, ServicePatch};

/// Request body for `POST /api/services`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateServiceRequest {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Initial status; defaults to `up`.
    pub status: Option<ServiceStatus>,
}

impl From<CreateServiceRequest> for ServiceDraft {
    fn from(req: CreateServiceRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            status: req.status,
        }
    }
}

/// Request body for `PATCH /api/services/{id}`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateServiceRequest {
    /// New display name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
}

impl From<UpdateServiceRequest> for ServicePatch {
    fn from(req: UpdateServiceRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
        }
    }
}

/// Request body for `PATCH /api/services/{id}/status`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateServiceStatusRequest {
    /// New status.
    pub status: ServiceStatus,
}

/// A service with its most recent incidents.
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceDetailDto {
    /// The service.
    #[serde(flatten)]
    pub service: MonitoredService,
    /// Up to ten incidents, newest first.
    pub recent_incidents: Vec<IncidentDto>,
}

impl From<ServiceDetail> for ServiceDetailDto {
    fn from(detail: ServiceDetail) -> Self {
        Self {
            service: detail.service,
            recent_incidents: detail
                .recent_incidents
                .into_iter()
                .map(IncidentDto::from)
                .collect(),
        }
    }
}

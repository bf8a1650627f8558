//! Campaign submission and status handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use herald_common::{
    Campaign, CampaignId, CampaignRequest, CampaignStats, CampaignStatus, RecordedEvent,
};
use herald_dispatch::CampaignService;
use serde::{Deserialize, Serialize};

use crate::error::RequestError;

/// What `GET /api/campaigns/{id}` reports about a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSummary {
    pub campaign_id: CampaignId,
    pub name: String,
    pub status: CampaignStatus,
    pub stats: CampaignStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Campaign> for CampaignSummary {
    fn from(campaign: Campaign) -> Self {
        Self {
            campaign_id: campaign.id,
            name: campaign.name,
            status: campaign.status,
            stats: campaign.stats,
            scheduled_time: campaign.scheduled_time,
            created_at: campaign.created_at,
            started_at: campaign.started_at,
            finished_at: campaign.finished_at,
            error: campaign.error,
        }
    }
}

pub(crate) fn parse_id(raw: &str) -> Result<CampaignId, RequestError> {
    raw.parse().map_err(|_| RequestError::NotFound)
}

/// `POST /api/campaigns`
///
/// Answers 202 as soon as the campaign is accepted; sending happens in the
/// background.
pub(crate) async fn submit(
    State(service): State<Arc<CampaignService>>,
    request: Result<Json<CampaignRequest>, JsonRejection>,
) -> Result<Response, RequestError> {
    let Json(request) = request.map_err(|e| RequestError::BadRequest(e.body_text()))?;

    let receipt = service.submit(request).await.map_err(RequestError::Submit)?;
    Ok((StatusCode::ACCEPTED, Json(receipt)).into_response())
}

/// `GET /api/campaigns/{id}`
pub(crate) async fn status(
    State(service): State<Arc<CampaignService>>,
    Path(id): Path<String>,
) -> Result<Json<CampaignSummary>, RequestError> {
    let id = parse_id(&id)?;
    let campaign = service.campaign(&id).await.map_err(RequestError::Lookup)?;
    Ok(Json(campaign.into()))
}

/// `GET /api/campaigns/{id}/events`
pub(crate) async fn events(
    State(service): State<Arc<CampaignService>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RecordedEvent>>, RequestError> {
    let id = parse_id(&id)?;
    let events = service.events(&id).await.map_err(RequestError::Lookup)?;
    Ok(Json(events))
}

//! Open and click tracking endpoints
//!
//! These are the targets of the pixel and rewritten links that dispatch
//! embeds in outgoing messages.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use herald_common::incoming;
use herald_dispatch::CampaignService;
use serde::Deserialize;

use crate::{campaigns::parse_id, error::RequestError};

/// A 1x1 transparent GIF
pub(crate) const PIXEL: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct TrackingParams {
    cid: Option<String>,
    email: Option<String>,
    url: Option<String>,
}

fn is_http_url(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// `GET /track/open`
///
/// Always answers with the pixel, so a broken or stale link never shows up
/// as a broken image. The open is only recorded for a known campaign.
pub(crate) async fn open(
    State(service): State<Arc<CampaignService>>,
    Query(params): Query<TrackingParams>,
) -> Response {
    match (params.cid.as_deref().map(parse_id), params.email.as_deref()) {
        (Some(Ok(id)), Some(email)) => {
            if let Err(error) = service.record_open(&id, email).await {
                incoming!(level = DEBUG, campaign_id = %id, "Open not recorded: {error}");
            }
        }
        _ => incoming!(level = DEBUG, "Open pixel requested without a valid campaign"),
    }

    (
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        PIXEL,
    )
        .into_response()
}

/// `GET /track/click`
///
/// Records the click, then sends the reader on to the original link.
pub(crate) async fn click(
    State(service): State<Arc<CampaignService>>,
    Query(params): Query<TrackingParams>,
) -> Result<Response, RequestError> {
    let Some(url) = params.url.filter(|url| is_http_url(url)) else {
        return Err(RequestError::BadRequest(
            "url must be an http or https link".to_string(),
        ));
    };
    let id = parse_id(params.cid.as_deref().unwrap_or_default())?;
    let email = params.email.unwrap_or_default();

    service
        .record_click(&id, &email, &url)
        .await
        .map_err(RequestError::Lookup)?;

    Ok((StatusCode::FOUND, [(header::LOCATION, url)]).into_response())
}

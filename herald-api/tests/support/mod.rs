//! Shared fixtures for API tests
#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use herald_common::Signal;
use herald_dispatch::{CampaignService, DispatchConfig, LogTransport};
use herald_store::TestCampaignStore;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tower::ServiceExt;

pub const BASE_URL: &str = "http://herald.test";

pub struct TestApp {
    pub router: Router,
    pub service: Arc<CampaignService>,
    pub store: TestCampaignStore,
    pub shutdown: broadcast::Sender<Signal>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = TestCampaignStore::new();
        let (shutdown, _) = broadcast::channel(4);
        let config = DispatchConfig {
            tracking_base_url: BASE_URL.to_string(),
            ..DispatchConfig::default()
        };
        let service = Arc::new(CampaignService::new(
            config,
            Arc::new(store.clone()),
            Arc::new(LogTransport::new()),
            shutdown.clone(),
        ));

        Self {
            router: herald_api::router(service.clone(), Duration::from_secs(10)),
            service,
            store,
            shutdown,
        }
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> Response<Body> {
        self.post_raw(uri, body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, body: String) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn campaign_payload(emails: &[&str]) -> Value {
    json!({
        "recipients": emails
            .iter()
            .map(|email| json!({ "email": email }))
            .collect::<Vec<_>>(),
        "template": {
            "subject": "Hello {{name}}",
            "body": "<html><body><a href=\"https://example.com\">Go</a></body></html>"
        },
        "senderInfo": { "name": "Acme", "email": "news@acme.test" },
        "sendOptions": { "batchSize": 10, "delayMs": 100 },
        "campaignName": "Spring launch"
    })
}

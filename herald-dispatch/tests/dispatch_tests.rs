//! Integration tests for campaign intake and batch dispatch
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod support;

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use herald_common::{
    CampaignEvent, CampaignRequest, CampaignStatus, Recipient, SendOptionsRequest, SenderInfo,
    Signal, Template,
};
use herald_dispatch::{CampaignService, DispatchConfig, RetryPolicy};
use herald_store::{CampaignStore, TestCampaignStore};
use pretty_assertions::assert_eq;
use support::mock_transport::MockTransport;
use tokio::sync::broadcast;

const WAIT: Duration = Duration::from_secs(3600 * 3);

struct Harness {
    service: CampaignService,
    store: TestCampaignStore,
    transport: Arc<MockTransport>,
    shutdown: broadcast::Sender<Signal>,
}

fn harness_with(store: TestCampaignStore, transport: MockTransport) -> Harness {
    let transport = transport.build();
    let (shutdown, _) = broadcast::channel(4);
    let config = DispatchConfig {
        tracking_base_url: "https://t.example.com".to_string(),
        retry: RetryPolicy {
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        },
        ..DispatchConfig::default()
    };
    let service = CampaignService::new(
        config,
        Arc::new(store.clone()),
        transport.clone(),
        shutdown.clone(),
    );

    Harness {
        service,
        store,
        transport,
        shutdown,
    }
}

fn harness(transport: MockTransport) -> Harness {
    harness_with(TestCampaignStore::new(), transport)
}

fn request(recipients: usize, batch_size: usize, delay_ms: u64) -> CampaignRequest {
    CampaignRequest {
        recipients: (0..recipients)
            .map(|i| Recipient::new(format!("user{i}@example.com")))
            .collect(),
        template: Template::new("Hello {{name}}", "<p>Hi {{name}}, this is for {{email}}</p>"),
        sender_info: SenderInfo {
            name: "Acme".to_string(),
            email: "news@acme.test".to_string(),
            reply_to: None,
        },
        send_options: Some(SendOptionsRequest {
            delay_ms: Some(delay_ms),
            batch_size: Some(batch_size),
            track_opens: Some(false),
            track_clicks: Some(false),
        }),
        campaign_name: Some("Launch".to_string()),
        scheduled_time: None,
    }
}

fn progress_snapshots(events: &[herald_common::RecordedEvent]) -> Vec<(u64, u64)> {
    events
        .iter()
        .filter_map(|e| match e.event {
            CampaignEvent::Progress {
                sent,
                current_batch,
                ..
            } => Some((current_batch, sent)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_batches_are_sequential_and_rate_limited() {
    let h = harness(MockTransport::new().with_latency(Duration::from_millis(10)));

    let start = tokio::time::Instant::now();
    let receipt = h.service.submit(request(120, 50, 1000)).await.unwrap();
    assert_eq!(receipt.status, CampaignStatus::Processing);
    assert_eq!(receipt.total_recipients, 120);

    let campaign = h
        .store
        .wait_for_terminal(&receipt.campaign_id, WAIT)
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(campaign.status, CampaignStatus::Completed);
    assert_eq!(campaign.stats.sent_count, 120);
    assert_eq!(campaign.stats.failed_count, 0);
    assert_eq!(campaign.stats.total_batches, 3);
    assert_eq!(campaign.stats.current_batch, 3);

    let events = h.store.events(&receipt.campaign_id).await.unwrap();
    // Batch sizes 50, 50, 20
    assert_eq!(progress_snapshots(&events), vec![(1, 50), (2, 100), (3, 120)]);

    assert_eq!(h.transport.calls(), 120);
    assert_eq!(h.transport.max_concurrency(), 50);
    assert!(elapsed >= Duration::from_millis(2000), "took {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_event_order() {
    let h = harness(MockTransport::new());
    let receipt = h.service.submit(request(3, 2, 100)).await.unwrap();
    h.store
        .wait_for_terminal(&receipt.campaign_id, WAIT)
        .await
        .unwrap();

    let events = h.store.events(&receipt.campaign_id).await.unwrap();
    let kinds: Vec<_> = events.iter().map(|e| e.event.kind()).collect();
    assert_eq!(
        kinds,
        vec!["started", "sent", "sent", "progress", "sent", "progress", "completed"]
    );
    assert!(matches!(
        &events[0].event,
        CampaignEvent::Started { name, total_recipients: 3, total_batches: 2 } if name == "Launch"
    ));
    assert!(matches!(
        events[6].event,
        CampaignEvent::Completed { sent: 3, failed: 0 }
    ));
}

#[tokio::test]
async fn test_zero_recipients_rejected_without_sending() {
    let h = harness(MockTransport::new());

    let err = h.service.submit(request(0, 50, 1000)).await.unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(h.transport.calls(), 0);
    assert!(h.store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_one_bad_email_rejects_everything() {
    let h = harness(MockTransport::new());
    let mut req = request(10, 50, 1000);
    req.recipients[7].email = "user7@".to_string();

    let err = h.service.submit(req).await.unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(err.invalid_emails(), Some(&["user7@".to_string()][..]));

    tokio::task::yield_now().await;
    assert_eq!(h.transport.calls(), 0);
    assert!(h.store.list().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_resubmission_creates_new_campaign_and_resends() {
    let h = harness(MockTransport::new());

    let first = h.service.submit(request(2, 50, 100)).await.unwrap();
    let second = h.service.submit(request(2, 50, 100)).await.unwrap();
    assert_ne!(first.campaign_id, second.campaign_id);

    for id in [first.campaign_id, second.campaign_id] {
        let campaign = h.store.wait_for_terminal(&id, WAIT).await.unwrap();
        assert_eq!(campaign.stats.sent_count, 2);
    }
    assert_eq!(h.transport.calls(), 4);
    assert_eq!(h.store.list().await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failures_settle_without_aborting_siblings() {
    let h = harness(
        MockTransport::new()
            .failing_permanently("user1@example.com")
            .failing_temporarily("user2@example.com", 2)
            .failing_temporarily("user3@example.com", 5),
    );

    let receipt = h.service.submit(request(5, 50, 100)).await.unwrap();
    let campaign = h
        .store
        .wait_for_terminal(&receipt.campaign_id, WAIT)
        .await
        .unwrap();

    assert_eq!(campaign.status, CampaignStatus::Completed);
    assert_eq!(campaign.stats.sent_count, 3);
    assert_eq!(campaign.stats.failed_count, 2);
    assert_eq!(
        campaign.stats.sent_count + campaign.stats.failed_count,
        campaign.stats.total_recipients
    );

    let events = h.store.events(&receipt.campaign_id).await.unwrap();
    let attempts_for = |email: &str| {
        events.iter().find_map(|e| match &e.event {
            CampaignEvent::Sent {
                recipient, attempts, ..
            }
            | CampaignEvent::SendFailed {
                recipient, attempts, ..
            } if recipient == email => Some(*attempts),
            _ => None,
        })
    };
    assert_eq!(attempts_for("user0@example.com"), Some(1));
    assert_eq!(attempts_for("user1@example.com"), Some(1));
    assert_eq!(attempts_for("user2@example.com"), Some(3));
    assert_eq!(attempts_for("user3@example.com"), Some(3));

    // 1 + 1 + 3 + 3 + 1
    assert_eq!(h.transport.calls(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_messages_are_personalised() {
    let h = harness(MockTransport::new());
    let mut req = request(2, 50, 100);
    req.recipients[0].name = Some("Alice".to_string());

    let receipt = h.service.submit(req).await.unwrap();
    h.store
        .wait_for_terminal(&receipt.campaign_id, WAIT)
        .await
        .unwrap();

    let alice = h.transport.delivered_to("user0@example.com").unwrap();
    assert_eq!(alice.subject, "Hello Alice");
    assert_eq!(alice.html, "<p>Hi Alice, this is for user0@example.com</p>");
    assert_eq!(alice.from, "Acme <news@acme.test>");

    let other = h.transport.delivered_to("user1@example.com").unwrap();
    assert_eq!(other.subject, "Hello Dear Customer");
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_fails_campaign() {
    let h = harness_with(
        TestCampaignStore::new().failing_outcomes_after(60),
        MockTransport::new(),
    );

    let receipt = h.service.submit(request(120, 50, 1000)).await.unwrap();
    let campaign = h
        .store
        .wait_for_terminal(&receipt.campaign_id, WAIT)
        .await
        .unwrap();

    assert_eq!(campaign.status, CampaignStatus::Failed);
    assert_eq!(
        campaign.error.as_deref(),
        Some("Store error: Internal error: injected write failure")
    );
    assert_eq!(campaign.stats.sent_count, 60);
    // The second batch settles in full; the third never starts
    assert_eq!(h.transport.calls(), 100);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_send_settles_as_failed() {
    let h = harness(MockTransport::new().panicking_for("user1@example.com"));

    let receipt = h.service.submit(request(3, 50, 100)).await.unwrap();
    let campaign = h
        .store
        .wait_for_terminal(&receipt.campaign_id, WAIT)
        .await
        .unwrap();

    assert_eq!(campaign.status, CampaignStatus::Completed);
    assert_eq!(campaign.stats.sent_count, 2);
    assert_eq!(campaign.stats.failed_count, 1);

    let events = h.store.events(&receipt.campaign_id).await.unwrap();
    let failure = events
        .iter()
        .find_map(|e| match &e.event {
            CampaignEvent::SendFailed {
                recipient,
                error,
                attempts,
            } => Some((recipient.clone(), error.clone(), *attempts)),
            _ => None,
        })
        .unwrap();
    assert_eq!(failure.0, "user1@example.com");
    assert!(failure.1.starts_with("send task failed"), "{}", failure.1);
    assert_eq!(failure.2, 1);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_store_fails_campaign() {
    let h = harness_with(
        TestCampaignStore::new().panicking_on("progress"),
        MockTransport::new(),
    );

    let receipt = h.service.submit(request(3, 50, 100)).await.unwrap();
    let campaign = h
        .store
        .wait_for_terminal(&receipt.campaign_id, WAIT)
        .await
        .unwrap();

    assert_eq!(campaign.status, CampaignStatus::Failed);
    let error = campaign.error.unwrap();
    assert!(error.starts_with("dispatch task aborted"), "{error}");
    assert_eq!(campaign.stats.sent_count, 3);
    assert!(campaign.finished_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_between_batches() {
    let h = harness(MockTransport::new().with_latency(Duration::from_millis(10)));

    let receipt = h.service.submit(request(120, 50, 1000)).await.unwrap();

    // First batch settles after ~10ms; the delay before the second runs to 1010ms
    tokio::time::sleep(Duration::from_millis(500)).await;
    h.shutdown.send(Signal::Shutdown).unwrap();

    assert!(h.service.shutdown(Duration::from_secs(30)).await);

    let campaign = h.store.get(&receipt.campaign_id).await.unwrap();
    assert_eq!(campaign.status, CampaignStatus::Failed);
    assert_eq!(
        campaign.error.as_deref(),
        Some("dispatch interrupted by shutdown")
    );
    assert_eq!(campaign.stats.sent_count, 50);
    assert_eq!(campaign.stats.failed_count, 70);
    assert_eq!(h.transport.calls(), 50);
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_campaign_waits_for_its_time() {
    let h = harness(MockTransport::new());
    let mut req = request(3, 50, 100);
    let at = Utc::now() + chrono::TimeDelta::hours(1);
    req.scheduled_time = Some(at);

    let receipt = h.service.submit(req).await.unwrap();
    assert_eq!(receipt.status, CampaignStatus::Scheduled);
    assert_eq!(receipt.scheduled_time, Some(at));
    assert!(receipt.estimated_completion >= at);

    let stored = h.store.get(&receipt.campaign_id).await.unwrap();
    assert_eq!(stored.status, CampaignStatus::Scheduled);
    assert_eq!(h.transport.calls(), 0);

    let campaign = h
        .store
        .wait_for_terminal(&receipt.campaign_id, WAIT)
        .await
        .unwrap();
    assert_eq!(campaign.status, CampaignStatus::Completed);

    let events = h.store.events(&receipt.campaign_id).await.unwrap();
    assert!(matches!(
        events[0].event,
        CampaignEvent::Scheduled { scheduled_for } if scheduled_for == at
    ));
    assert_eq!(events[1].event.kind(), "started");
}

#[tokio::test(start_paused = true)]
async fn test_past_scheduled_time_fires_immediately() {
    let h = harness(MockTransport::new());
    let mut req = request(1, 50, 100);
    req.scheduled_time = Some(Utc::now() - chrono::TimeDelta::minutes(5));

    let receipt = h.service.submit(req).await.unwrap();
    assert_eq!(receipt.status, CampaignStatus::Scheduled);

    let campaign = h
        .store
        .wait_for_terminal(&receipt.campaign_id, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(campaign.status, CampaignStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_abandons_scheduled_campaign() {
    let h = harness(MockTransport::new());
    let mut req = request(3, 50, 100);
    req.scheduled_time = Some(Utc::now() + chrono::TimeDelta::hours(1));

    let receipt = h.service.submit(req).await.unwrap();
    h.shutdown.send(Signal::Shutdown).unwrap();
    assert!(h.service.shutdown(Duration::from_secs(5)).await);

    let campaign = h.store.get(&receipt.campaign_id).await.unwrap();
    assert_eq!(campaign.status, CampaignStatus::Scheduled);
    assert_eq!(h.transport.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_engagement_tracking() {
    let h = harness(MockTransport::new());
    let receipt = h.service.submit(request(1, 50, 100)).await.unwrap();
    let id = receipt.campaign_id;
    assert_eq!(
        receipt.tracking_url,
        format!("https://t.example.com/api/campaigns/{id}")
    );

    assert!(
        h.service
            .record_open(&id, "user0@example.com")
            .await
            .unwrap()
    );
    assert!(
        h.service
            .record_click(&id, "user0@example.com", "https://example.com")
            .await
            .unwrap()
    );

    let campaign = h.store.wait_for_terminal(&id, WAIT).await.unwrap();
    assert_eq!(campaign.stats.opens, 1);
    assert_eq!(campaign.stats.clicks, 1);

    let unknown = herald_common::CampaignId::generate();
    assert!(
        h.service
            .record_open(&unknown, "user0@example.com")
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test(start_paused = true)]
async fn test_repeat_engagement_recorded_once() {
    let h = harness(MockTransport::new());
    let id = h.service.submit(request(1, 50, 100)).await.unwrap().campaign_id;
    h.store.wait_for_terminal(&id, WAIT).await.unwrap();

    for _ in 0..5 {
        h.service
            .record_open(&id, "user0@example.com")
            .await
            .unwrap();
        h.service
            .record_click(&id, "user0@example.com", "https://example.com")
            .await
            .unwrap();
    }
    for i in 0..herald_common::MAX_TRACKED_LINKS + 10 {
        h.service
            .record_click(&id, "user0@example.com", &format!("https://example.com/{i}"))
            .await
            .unwrap();
    }

    let events = h.store.events(&id).await.unwrap();
    let opens = events
        .iter()
        .filter(|e| matches!(e.event, CampaignEvent::Opened { .. }))
        .count();
    let clicks = events
        .iter()
        .filter(|e| matches!(e.event, CampaignEvent::Clicked { .. }))
        .count();
    assert_eq!(opens, 1);
    assert_eq!(clicks, herald_common::MAX_TRACKED_LINKS);

    let campaign = h.store.get(&id).await.unwrap();
    assert_eq!(campaign.stats.opens, 1);
    assert_eq!(campaign.stats.clicks, herald_common::MAX_TRACKED_LINKS as u64);
}

#[tokio::test(start_paused = true)]
async fn test_engagement_from_non_recipient_rejected() {
    let h = harness(MockTransport::new());
    let id = h.service.submit(request(2, 50, 100)).await.unwrap().campaign_id;
    h.store.wait_for_terminal(&id, WAIT).await.unwrap();

    let err = h
        .service
        .record_click(&id, "stranger@example.com", "https://evil.test")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(
        h.service
            .record_open(&id, "stranger@example.com")
            .await
            .unwrap_err()
            .is_not_found()
    );

    let campaign = h.store.get(&id).await.unwrap();
    assert_eq!(campaign.stats.opens, 0);
    assert_eq!(campaign.stats.clicks, 0);
}

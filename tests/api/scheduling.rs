use chrono::{Duration, SecondsFormat};
use newsletter_campaigns::clock::Clock;
use serde_json::{json, Value};

use crate::helpers::{campaign_body, TestApp};

fn scheduled_in(test_app: &TestApp, offset: Duration) -> Value {
    let mut body = campaign_body();
    let schedule_at = test_app.clock.now() + offset;
    body["scheduleAt"] = json!(schedule_at.to_rfc3339_opts(SecondsFormat::Secs, true));
    body
}

#[tokio::test]
async fn future_campaign_is_held_until_its_schedule() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_email_provider(200).await;
    test_app.subscribe("a@test.com").await;

    let response = test_app
        .post_campaign(&scheduled_in(&test_app, Duration::hours(1)))
        .await;

    assert_eq!(201, response.status().as_u16());
    let receipt: Value = response.json().await.unwrap();
    assert_eq!(receipt["status"], "scheduled");
    assert!(receipt["sentAt"].is_null());

    let report = test_app.run_scheduler_tick().await;
    assert_eq!(report.due, 0);
    assert!(test_app.email_requests().await.is_empty());

    test_app.clock.advance(Duration::hours(1) + Duration::seconds(1));
    let report = test_app.run_scheduler_tick().await;

    assert_eq!(report.sent, 1);
    assert_eq!(test_app.email_requests().await.len(), 1);
}

#[tokio::test]
async fn campaign_scheduled_in_the_past_is_sent_immediately() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_email_provider(200).await;
    test_app.subscribe("a@test.com").await;

    let response = test_app
        .post_campaign(&scheduled_in(&test_app, Duration::minutes(-5)))
        .await;

    let receipt: Value = response.json().await.unwrap();
    assert_eq!(receipt["status"], "sent");
}

#[tokio::test]
async fn sent_campaign_is_never_sent_again() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_email_provider(200).await;
    test_app.subscribe("a@test.com").await;

    test_app.post_campaign(&campaign_body()).await;
    for _ in 0..3 {
        test_app.clock.advance(Duration::minutes(1));
        test_app.run_scheduler_tick().await;
    }

    assert_eq!(test_app.email_requests().await.len(), 1);
}

#[tokio::test]
async fn failed_campaign_is_retried_by_the_scheduler_until_it_gives_up() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_email_provider(500).await;
    test_app.subscribe("a@test.com").await;
    let max_attempts = test_app.config.get_delivery_policy().max_attempts as usize;

    let receipt: Value = test_app
        .post_campaign(&campaign_body())
        .await
        .json()
        .await
        .unwrap();

    for _ in 0..max_attempts + 2 {
        test_app.clock.advance(Duration::minutes(1));
        test_app.run_scheduler_tick().await;
    }

    assert_eq!(test_app.email_requests().await.len(), max_attempts);

    let campaign: Value = test_app
        .get_campaign(receipt["id"].as_str().unwrap())
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(campaign["state"], "failed");
    assert!(campaign["failedAt"].is_string());
    assert!(campaign["lastError"].is_string());
}

#[tokio::test]
async fn campaign_recovers_once_the_provider_is_back() {
    let test_app = TestApp::spawn_app().await;
    test_app.subscribe("a@test.com").await;

    // Unmatched requests get a 404 from the mock server
    let receipt: Value = test_app
        .post_campaign(&campaign_body())
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(receipt["status"], "retrying");

    test_app.mock_email_provider(200).await;
    let report = test_app.run_scheduler_tick().await;

    assert_eq!(report.sent, 1);
    let campaign: Value = test_app
        .get_campaign(receipt["id"].as_str().unwrap())
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(campaign["sent"], true);
}

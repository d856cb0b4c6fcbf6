use serde_json::{json, Value};

use crate::helpers::{campaign_body, TestApp};

#[tokio::test]
async fn campaign_without_schedule_is_sent_immediately() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_email_provider(200).await;
    test_app.subscribe("a@test.com").await;
    test_app.subscribe("b@test.com").await;

    let response = test_app.post_campaign(&campaign_body()).await;

    assert_eq!(201, response.status().as_u16());
    let receipt: Value = response.json().await.unwrap();
    assert_eq!(receipt["status"], "sent");
    assert_eq!(receipt["recipients"], 2);
    assert!(receipt["sentAt"].is_string());

    let requests = test_app.email_requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["subject"], "Spring news");
    assert_eq!(
        requests[0]["personalizations"].as_array().map(|p| p.len()),
        Some(2)
    );
}

#[tokio::test]
async fn rendered_email_carries_html_and_plain_text() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_email_provider(200).await;
    test_app.subscribe("a@test.com").await;

    test_app.post_campaign(&campaign_body()).await;

    let requests = test_app.email_requests().await;
    let content = requests[0]["content"].as_array().unwrap();
    let text = content[0]["value"].as_str().unwrap();
    let html = content[1]["value"].as_str().unwrap();

    assert!(html.contains("What we shipped"));
    assert!(html.contains("https://example.com/news"));
    assert!(!text.contains('<'));
    assert!(text.contains("First paragraph"));
}

#[tokio::test]
async fn explicit_target_reports_unknown_addresses() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_email_provider(200).await;
    test_app.subscribe("known@test.com").await;

    let mut body = campaign_body();
    body["target"] = json!({ "emails": ["Known@test.com", "unknown@test.com"] });

    let response = test_app.post_campaign(&body).await;

    assert_eq!(201, response.status().as_u16());
    let receipt: Value = response.json().await.unwrap();
    assert_eq!(receipt["recipients"], 1);
    assert_eq!(receipt["notFound"], json!(["unknown@test.com"]));
}

#[tokio::test]
async fn campaign_with_no_known_recipient_returns_422() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_email_provider(200).await;

    let mut body = campaign_body();
    body["target"] = json!({ "emails": ["nobody@test.com"] });

    let response = test_app.post_campaign(&body).await;

    assert_eq!(422, response.status().as_u16());
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["notFound"], json!(["nobody@test.com"]));
    assert!(test_app.email_requests().await.is_empty());

    let campaigns: Vec<Value> = test_app.get_campaigns().await.json().await.unwrap();
    assert!(campaigns.is_empty());
}

#[tokio::test]
async fn campaign_returns_400_when_body_is_invalid() {
    let test_app = TestApp::spawn_app().await;
    test_app.subscribe("a@test.com").await;

    let with = |key: &str, value: Value| {
        let mut body = campaign_body();
        body[key] = value;
        body
    };
    let without = |key: &str| {
        let mut body = campaign_body();
        body.as_object_mut().unwrap().remove(key);
        body
    };

    let test_cases: Vec<(Value, &str)> = vec![
        (without("subject"), "missing subject"),
        (with("title", json!("   ")), "blank title"),
        (with("ctaUrl", json!("example.com")), "cta url without scheme"),
        (with("imageUrl", json!("ftp://example.com/a.png")), "image url with unsupported scheme"),
        (with("target", json!({})), "empty target"),
        (with("target", json!({ "emails": [] })), "empty email list"),
        (with("target", json!({ "emails": ["not-an-email"] })), "malformed target email"),
        (with("target", json!({ "all": true, "emails": ["a@test.com"] })), "ambiguous target"),
        (with("scheduleAt", json!("tomorrow")), "unparseable schedule"),
    ];

    for (invalid_body, error_message) in test_cases {
        let response = test_app.post_campaign(&invalid_body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 status when payload was {}",
            error_message
        );
    }

    assert!(test_app.email_requests().await.is_empty());
}

#[tokio::test]
async fn failed_immediate_send_is_reported_as_retrying() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_email_provider(500).await;
    test_app.subscribe("a@test.com").await;

    let response = test_app.post_campaign(&campaign_body()).await;

    assert_eq!(201, response.status().as_u16());
    let receipt: Value = response.json().await.unwrap();
    assert_eq!(receipt["status"], "retrying");

    let id = receipt["id"].as_str().unwrap();
    let campaign: Value = test_app.get_campaign(id).await.json().await.unwrap();
    assert_eq!(campaign["sent"], false);
    assert_eq!(campaign["attempts"], 1);
    assert_eq!(campaign["state"], "due");
}

#[tokio::test]
async fn stored_campaign_can_be_read_back() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_email_provider(200).await;
    test_app.subscribe("a@test.com").await;

    let receipt: Value = test_app
        .post_campaign(&campaign_body())
        .await
        .json()
        .await
        .unwrap();
    let id = receipt["id"].as_str().unwrap();

    let response = test_app.get_campaign(id).await;
    assert_eq!(200, response.status().as_u16());

    let campaign: Value = response.json().await.unwrap();
    assert_eq!(campaign["subject"], "Spring news");
    assert_eq!(campaign["recipients"], json!(["a@test.com"]));
    assert_eq!(campaign["state"], "sent");

    let listed: Vec<Value> = test_app.get_campaigns().await.json().await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn unknown_campaign_returns_404() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app
        .get_campaign("6f1c3e1a-7c1d-4f3e-9a4b-2d1e0f9b8c7a")
        .await;

    assert_eq!(404, response.status().as_u16());
}

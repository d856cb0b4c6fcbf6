use chrono::Duration;
use serde_json::{json, Value};

use crate::helpers::TestApp;
use newsletter_campaigns::domain::subscriber_email::SubscriberEmail;
use newsletter_campaigns::store::SubscriberStore;

#[tokio::test]
async fn subscribe_returns_201_when_body_is_valid() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app
        .post_subscription(&json!({ "email": "frank@test.com" }))
        .await;

    assert_eq!(201, response.status().as_u16());
}

#[tokio::test]
async fn subscribe_persists_the_normalized_email() {
    let test_app = TestApp::spawn_app().await;

    test_app
        .post_subscription(&json!({ "email": "  Frank@Test.com " }))
        .await;

    let subscribers = test_app.storage.subscribers.all().await.unwrap();
    let expected = SubscriberEmail::parse(String::from("frank@test.com")).unwrap();

    assert_eq!(subscribers.len(), 1);
    assert_eq!(subscribers[0].email, expected);
}

#[tokio::test]
async fn subscribe_returns_400_when_body_is_missing_or_invalid() {
    let test_app = TestApp::spawn_app().await;

    // Table-driven: every payload here must be rejected with 400
    let test_cases: Vec<(Value, &str)> = vec![
        (json!({}), "missing email parameter"),
        (json!({ "email": "" }), "empty email"),
        (json!({ "email": "test.com" }), "email without an @"),
        (json!({ "email": 42 }), "email is not a string"),
    ];

    for (invalid_body, error_message) in test_cases {
        let response = test_app.post_subscription(&invalid_body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 status when payload was {}",
            error_message
        );

        let body: Value = response.json().await.expect("Error body is not JSON.");
        assert!(body.get("error").is_some(), "{} has no error reason", error_message);
    }
}

#[tokio::test]
async fn subscribing_twice_returns_409_and_keeps_one_record() {
    let test_app = TestApp::spawn_app().await;

    test_app.subscribe("frank@test.com").await;
    let response = test_app
        .post_subscription(&json!({ "email": "FRANK@test.com" }))
        .await;

    assert_eq!(409, response.status().as_u16());
    assert_eq!(test_app.storage.subscribers.all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn subscribers_are_listed_newest_first() {
    let test_app = TestApp::spawn_app().await;

    test_app.subscribe("first@test.com").await;
    test_app.clock.advance(Duration::seconds(1));
    test_app.subscribe("second@test.com").await;

    let response = test_app.get_subscribers().await;
    assert_eq!(200, response.status().as_u16());

    let body: Vec<Value> = response.json().await.unwrap();
    let emails: Vec<&str> = body
        .iter()
        .filter_map(|subscriber| subscriber["email"].as_str())
        .collect();

    assert_eq!(emails, vec!["second@test.com", "first@test.com"]);
    assert!(body[0].get("subscribedAt").is_some());
}

use chrono::Duration;
use serde_json::{json, Value};

use crate::helpers::TestApp;

fn contact_body(name: &str) -> Value {
    json!({
        "name": name,
        "email": "visitor@test.com",
        "phone": "+34 600 000 000",
        "message": "I would like to know more."
    })
}

#[tokio::test]
async fn contact_message_is_stored_and_returned() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app.post_contact(&contact_body("Ana")).await;

    assert_eq!(201, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["name"], "Ana");
    assert!(body.get("createdAt").is_some());
}

#[tokio::test]
async fn contact_returns_400_when_a_field_is_missing_or_invalid() {
    let test_app = TestApp::spawn_app().await;

    let test_cases: Vec<(Value, &str)> = vec![
        (
            json!({ "email": "visitor@test.com", "phone": "1", "message": "Hi" }),
            "missing name",
        ),
        (
            json!({ "name": "Ana", "email": "not-an-email", "phone": "1", "message": "Hi" }),
            "invalid email",
        ),
        (
            json!({ "name": "Ana", "email": "visitor@test.com", "phone": "1", "message": "  " }),
            "blank message",
        ),
    ];

    for (invalid_body, error_message) in test_cases {
        let response = test_app.post_contact(&invalid_body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 status when payload was {}",
            error_message
        );
    }
}

#[tokio::test]
async fn contact_messages_are_listed_newest_first() {
    let test_app = TestApp::spawn_app().await;

    test_app.post_contact(&contact_body("First")).await;
    test_app.clock.advance(Duration::seconds(1));
    test_app.post_contact(&contact_body("Second")).await;

    let body: Vec<Value> = test_app.get_contacts().await.json().await.unwrap();
    let names: Vec<&str> = body
        .iter()
        .filter_map(|message| message["name"].as_str())
        .collect();

    assert_eq!(names, vec!["Second", "First"]);
}

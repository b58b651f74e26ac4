mod support;

use domain::NotificationCategory;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use support::{user, TestApp};

async fn get_json(client: &Client, url: &str, token: &str) -> Value {
    client
        .get(url)
        .bearer_auth(token)
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json body")
}

#[tokio::test]
async fn direct_message_and_catch_up_flow() {
    let app = TestApp::spawn().await;
    let client = Client::new();
    let (alice, bob) = (user(), user());
    let (token_a, token_b) = (app.token_for(alice), app.token_for(bob));

    // Alice 给 Bob 发起直聊
    let response = client
        .post(app.http_url("/api/rooms/direct"))
        .bearer_auth(&token_a)
        .json(&json!({"recipient_id": bob.to_string(), "content": "are you available for an interview?"}))
        .send()
        .await
        .expect("direct message");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.expect("json");
    let room_id = created["room"]["id"].as_str().expect("room id").to_string();
    assert_eq!(created["room"]["kind"], "direct");

    // 重复发起复用同一个房间
    let again: Value = client
        .post(app.http_url("/api/rooms/direct"))
        .bearer_auth(&token_b)
        .json(&json!({"recipient_id": alice.to_string(), "content": "yes, tomorrow works"}))
        .send()
        .await
        .expect("second direct message")
        .json()
        .await
        .expect("json");
    assert_eq!(again["room"]["id"].as_str().unwrap(), room_id);

    // Bob 的房间列表和联系人
    let rooms = get_json(&client, &app.http_url("/api/rooms"), &token_b).await;
    assert_eq!(rooms.as_array().unwrap().len(), 1);

    let contacts = get_json(&client, &app.http_url("/api/contacts"), &token_b).await;
    let contacts = contacts.as_array().unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0]["user_id"], alice.to_string());
    assert_eq!(contacts[0]["unread_count"], 1);
    assert_eq!(
        contacts[0]["last_message"]["content"],
        "yes, tomorrow works"
    );

    // 历史读取（顺带推进送达），再整房已读
    let messages = get_json(
        &client,
        &app.http_url(&format!("/api/rooms/{room_id}/messages")),
        &token_b,
    )
    .await;
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["content"], "are you available for an interview?");

    let read: Value = client
        .post(app.http_url(&format!("/api/rooms/{room_id}/read")))
        .bearer_auth(&token_b)
        .send()
        .await
        .expect("mark read")
        .json()
        .await
        .expect("json");
    assert_eq!(read["marked"], 1);

    let contacts = get_json(&client, &app.http_url("/api/contacts"), &token_b).await;
    assert_eq!(contacts.as_array().unwrap()[0]["unread_count"], 0);
}

#[tokio::test]
async fn notifications_surface_and_read_all() {
    let app = TestApp::spawn().await;
    let client = Client::new();
    let alice = user();
    let token = app.token_for(alice);

    app.state
        .notification_service
        .notify(alice, "Your application moved forward", NotificationCategory::ApplicationStatus)
        .await
        .expect("notify");
    app.state
        .notification_service
        .notify(alice, "New job invitation", NotificationCategory::JobInvitation)
        .await
        .expect("notify");

    let list = get_json(&client, &app.http_url("/api/notifications"), &token).await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["content"], "New job invitation");
    assert_eq!(list[0]["read"], false);

    let marked: Value = client
        .post(app.http_url("/api/notifications/read-all"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("read all")
        .json()
        .await
        .expect("json");
    assert_eq!(marked["marked"], 2);

    let list = get_json(&client, &app.http_url("/api/notifications"), &token).await;
    assert!(list.as_array().unwrap().iter().all(|n| n["read"] == true));
}

#[tokio::test]
async fn presence_row_is_created_on_first_read() {
    let app = TestApp::spawn().await;
    let client = Client::new();
    let alice = user();

    let presence = get_json(
        &client,
        &app.http_url("/api/presence"),
        &app.token_for(alice),
    )
    .await;
    assert_eq!(presence["user_id"], alice.to_string());
    assert_eq!(presence["is_online"], false);
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(app.http_url("/api/rooms"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let health = client
        .get(app.http_url("/health"))
        .send()
        .await
        .expect("health");
    assert_eq!(health.status(), StatusCode::OK);
}

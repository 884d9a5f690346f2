//! Channel creation policy and message flow tests.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::{app, read_json, seed_user, test_state};

fn authed_post(uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn authed_get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn channel_domain_is_derived_from_the_creator_email() {
    let state = test_state();
    let (user_id, token) = seed_user(&state, "Ana", "user@example.com");

    let response = app(state)
        .oneshot(authed_post("/channels", &token, json!({ "name": "general" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["domain"], "example.com");
    assert_eq!(body["created_by"], user_id.to_string());
}

#[tokio::test]
async fn submitting_a_foreign_domain_is_rejected() {
    let state = test_state();
    let (_, token) = seed_user(&state, "Ana", "user@example.com");

    let response = app(state.clone())
        .oneshot(authed_post(
            "/channels",
            &token,
            json!({ "name": "general", "domain": "evil.org" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(state.db.list_channels_for_domain("evil.org").unwrap().is_empty());
    assert!(state.db.list_channels_for_domain("example.com").unwrap().is_empty());
}

#[tokio::test]
async fn echoing_the_own_domain_back_is_allowed() {
    let state = test_state();
    let (_, token) = seed_user(&state, "Ana", "user@Example.COM");

    let response = app(state)
        .oneshot(authed_post(
            "/channels",
            &token,
            json!({ "name": "general", "domain": "example.com" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn unauthenticated_channel_creation_is_rejected() {
    let state = test_state();

    let response = app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/channels")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"name":"general"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn channel_listing_only_shows_the_callers_domain() {
    let state = test_state();
    let (_, token_a) = seed_user(&state, "Ana", "ana@example.com");
    let (_, token_b) = seed_user(&state, "Bo", "bo@other.org");

    let r = app(state.clone())
        .oneshot(authed_post("/channels", &token_a, json!({ "name": "general" })))
        .await
        .unwrap();
    assert_eq!(r.status(), StatusCode::CREATED);

    let visible = read_json(
        app(state.clone())
            .oneshot(authed_get("/channels", &token_a))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(visible.as_array().unwrap().len(), 1);

    let hidden = read_json(
        app(state)
            .oneshot(authed_get("/channels", &token_b))
            .await
            .unwrap(),
    )
    .await;
    assert!(hidden.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn whitespace_only_message_is_never_stored() {
    let state = test_state();
    let (_, token) = seed_user(&state, "Ana", "ana@example.com");

    let created = read_json(
        app(state.clone())
            .oneshot(authed_post("/channels", &token, json!({ "name": "general" })))
            .await
            .unwrap(),
    )
    .await;
    let channel_id = created["id"].as_str().unwrap().to_string();

    let response = app(state.clone())
        .oneshot(authed_post(
            &format!("/channels/{channel_id}/messages"),
            &token,
            json!({ "content": "   \n\t " }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(state.db.get_channel_messages(&channel_id).unwrap().is_empty());
}

#[tokio::test]
async fn history_comes_back_in_send_order_with_author_fields() {
    let state = test_state();
    let (user_id, token) = seed_user(&state, "Ana", "ana@example.com");
    state
        .db
        .set_profile_avatar(&user_id.to_string(), Some("https://cdn.test/ana.png"))
        .unwrap();

    let created = read_json(
        app(state.clone())
            .oneshot(authed_post("/channels", &token, json!({ "name": "general" })))
            .await
            .unwrap(),
    )
    .await;
    let channel_id = created["id"].as_str().unwrap().to_string();

    for content in ["one", "two", "three"] {
        let r = app(state.clone())
            .oneshot(authed_post(
                &format!("/channels/{channel_id}/messages"),
                &token,
                json!({ "content": content }),
            ))
            .await
            .unwrap();
        assert_eq!(r.status(), StatusCode::CREATED);
    }

    let history = read_json(
        app(state.clone())
            .oneshot(authed_get(&format!("/channels/{channel_id}/messages"), &token))
            .await
            .unwrap(),
    )
    .await;

    let contents: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["one", "two", "three"]);
    assert_eq!(history[0]["author_name"], "Ana");
    assert_eq!(history[0]["author_avatar_url"], "https://cdn.test/ana.png");
}

#[tokio::test]
async fn live_timestamp_matches_stored_history() {
    let state = test_state();
    let (_, token) = seed_user(&state, "Ana", "ana@example.com");

    let created = read_json(
        app(state.clone())
            .oneshot(authed_post("/channels", &token, json!({ "name": "general" })))
            .await
            .unwrap(),
    )
    .await;
    let channel_id = created["id"].as_str().unwrap().to_string();

    let sent = read_json(
        app(state.clone())
            .oneshot(authed_post(
                &format!("/channels/{channel_id}/messages"),
                &token,
                json!({ "content": "hello" }),
            ))
            .await
            .unwrap(),
    )
    .await;

    let history = read_json(
        app(state)
            .oneshot(authed_get(&format!("/channels/{channel_id}/messages"), &token))
            .await
            .unwrap(),
    )
    .await;

    // The send response and the history view describe the same instant.
    assert_eq!(history[0]["created_at"], sent["created_at"]);
    assert_eq!(history[0]["id"], sent["id"]);
}

#[tokio::test]
async fn foreign_domain_channels_are_unreachable() {
    let state = test_state();
    let (_, token_a) = seed_user(&state, "Ana", "ana@example.com");
    let (_, token_b) = seed_user(&state, "Bo", "bo@other.org");

    let created = read_json(
        app(state.clone())
            .oneshot(authed_post("/channels", &token_a, json!({ "name": "general" })))
            .await
            .unwrap(),
    )
    .await;
    let channel_id = created["id"].as_str().unwrap().to_string();

    let response = app(state.clone())
        .oneshot(authed_get(&format!("/channels/{channel_id}/messages"), &token_b))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(state)
        .oneshot(authed_post(
            &format!("/channels/{channel_id}/messages"),
            &token_b,
            json!({ "content": "hi" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

mod common;

use axum::http::StatusCode;
use common::{body_json, TestApp};

#[tokio::test]
async fn attaching_the_same_tag_twice_leaves_one_association() {
    let app = TestApp::new().await;
    let entry_id = app.create_entry(serde_json::json!({})).await;

    for _ in 0..2 {
        let resp = app
            .post_json(
                &format!("/entries/{entry_id}/tags"),
                serde_json::json!({ "name": "travel" }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    assert_eq!(app.count("SELECT COUNT(*) FROM entry_tags").await, 1);
    assert_eq!(app.count("SELECT COUNT(*) FROM tags").await, 1);
}

#[tokio::test]
async fn tag_names_are_normalized_before_lookup() {
    let app = TestApp::new().await;
    let entry_id = app.create_entry(serde_json::json!({})).await;

    for name in [" Travel ", "TRAVEL", "travel"] {
        let resp = app
            .post_json(
                &format!("/entries/{entry_id}/tags"),
                serde_json::json!({ "name": name }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    assert_eq!(app.count("SELECT COUNT(*) FROM tags").await, 1);

    let detail = body_json(app.get(&format!("/entries/{entry_id}")).await).await;
    assert_eq!(detail["tags"], serde_json::json!(["travel"]));
}

#[tokio::test]
async fn empty_tag_name_is_rejected() {
    let app = TestApp::new().await;
    let entry_id = app.create_entry(serde_json::json!({})).await;

    let resp = app
        .post_json(
            &format!("/entries/{entry_id}/tags"),
            serde_json::json!({ "name": "   " }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn detach_is_idempotent_and_keeps_the_tag_row() {
    let app = TestApp::new().await;
    let entry_id = app
        .create_entry(serde_json::json!({ "tags": ["travel"] }))
        .await;

    let resp = app
        .delete(&format!("/entries/{entry_id}/tags/travel"))
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.count("SELECT COUNT(*) FROM entry_tags").await, 0);
    assert_eq!(app.count("SELECT COUNT(*) FROM tags").await, 1);

    // detaching again, or detaching a tag that never existed, is a no-op
    let resp = app
        .delete(&format!("/entries/{entry_id}/tags/travel"))
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = app
        .delete(&format!("/entries/{entry_id}/tags/unknown"))
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn tag_operations_on_unknown_entry_are_not_found() {
    let app = TestApp::new().await;

    let resp = app
        .post_json(
            "/entries/no-such-id/tags",
            serde_json::json!({ "name": "travel" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    // the rejected attach must not leave a tag row behind
    assert_eq!(app.count("SELECT COUNT(*) FROM tags").await, 0);

    let resp = app.delete("/entries/no-such-id/tags/travel").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tag_list_reports_usage_counts() {
    let app = TestApp::new().await;
    app.create_entry(serde_json::json!({ "tags": ["travel", "coast"] }))
        .await;
    app.create_entry(serde_json::json!({ "tags": ["travel"] }))
        .await;

    let json = body_json(app.get("/tags").await).await;
    let tags = json.as_array().unwrap();
    assert_eq!(tags.len(), 2);
    // ordered by name
    assert_eq!(tags[0]["name"], "coast");
    assert_eq!(tags[0]["entry_count"], 1);
    assert_eq!(tags[1]["name"], "travel");
    assert_eq!(tags[1]["entry_count"], 2);
}

//! Layered configuration over HTTP: defaults, Strapi and registry overrides.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn defaults_apply_when_strapi_is_unavailable() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get("/config", &app.member).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["effective"]["project.stages"][0], "lead");
    assert_eq!(body["sources"]["project.stages"]["source"], "default");
    assert_eq!(body["meta"]["strapiAvailable"], false);
}

#[tokio::test]
async fn strapi_overrides_defaults() {
    let app = TestApp::spawn_with_strapi(&[("project.priorities", json!(["p1", "p2"]))]).await;

    let (status, body) = app.get("/config/project.priorities", &app.member).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], json!(["p1", "p2"]));
    assert_eq!(body["source"], "strapi");
}

#[tokio::test]
async fn admin_override_wins_and_is_visible_immediately() {
    let app = TestApp::spawn_with_strapi(&[("task.statuses", json!(["cms"]))]).await;

    // Warm the resolution cache first.
    let (_, before) = app.get("/config", &app.member).await;
    assert_eq!(before["sources"]["task.statuses"]["source"], "strapi");

    let (status, entry) = app
        .put_json(
            "/config/registry",
            &app.admin,
            json!({ "key": "task.statuses", "value": ["open", "closed"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["scope"], "account");
    assert_eq!(entry["updatedBy"], app.admin.user_id.to_string());

    let (_, after) = app.get("/config", &app.member).await;
    assert_eq!(after["effective"]["task.statuses"], json!(["open", "closed"]));
    assert_eq!(after["sources"]["task.statuses"]["source"], "db");
}

#[tokio::test]
async fn user_scope_override_only_applies_to_that_user() {
    let app = TestApp::spawn().await;

    let (status, _) = app
        .put_json(
            "/config/registry",
            &app.admin,
            json!({
                "key": "ui.layout.sidebar",
                "value": ["tasks"],
                "scope": "user",
                "userId": app.member.user_id
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, mine) = app.get("/config/ui.layout.sidebar", &app.member).await;
    assert_eq!(mine["value"], json!(["tasks"]));
    assert_eq!(mine["source"], "db");

    let (_, theirs) = app.get("/config/ui.layout.sidebar", &app.admin).await;
    assert_eq!(theirs["source"], "default");
}

#[tokio::test]
async fn project_scope_requires_project_id() {
    let app = TestApp::spawn().await;

    let (status, _) = app
        .put_json(
            "/config/registry",
            &app.admin,
            json!({ "key": "project.stages", "value": [], "scope": "project" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_key_is_rejected() {
    let app = TestApp::spawn().await;

    let (status, _) = app
        .put_json(
            "/config/registry",
            &app.admin,
            json!({ "key": "Not A Key", "value": 1 }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn members_cannot_write_overrides() {
    let app = TestApp::spawn().await;

    let (status, _) = app
        .put_json(
            "/config/registry",
            &app.member,
            json!({ "key": "project.stages", "value": [] }),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_key_is_not_found() {
    let app = TestApp::spawn().await;

    let (status, _) = app.get("/config/does.not_exist", &app.member).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_context_headers_are_unauthorized() {
    let app = TestApp::spawn().await;

    let (status, _) = app.get_anonymous("/config").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn outsider_cannot_write_overrides() {
    let app = TestApp::spawn().await;
    let outsider = access_service::models::Membership::new(
        app.organization_id,
        Uuid::new_v4(),
        access_service::models::MemberRole::Admin,
    );

    // Not stored, so the caller has no membership in the organization.
    let (status, _) = app
        .put_json("/config/registry", &outsider, json!({ "key": "project.stages", "value": [] }))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

//! Combined guard: feature flag, then permissions, then subview visibility.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn member_without_permissions_is_denied() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get("/access/crm", &app.member).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], false);
    assert_eq!(body["decision"], "denied");
    assert_eq!(body["reason"], "access_denied");
    assert_eq!(body["action"], "read");
}

#[tokio::test]
async fn admin_is_allowed_everywhere() {
    let app = TestApp::spawn().await;

    let (_, body) = app
        .get("/access/profitability?action=delete&subview=margins", &app.admin)
        .await;

    assert_eq!(body["allowed"], true);
    assert_eq!(body["decision"], "allowed");
    assert_eq!(body["readOnly"], false);
    assert!(body.get("reason").is_none());
}

#[tokio::test]
async fn disabled_feature_flag_denies_even_admins() {
    let app = TestApp::spawn().await;
    app.put_json(
        "/config/registry",
        &app.admin,
        json!({ "key": "feature_flags.crm_module", "value": false }),
    )
    .await;

    let (_, body) = app.get("/access/crm", &app.admin).await;

    assert_eq!(body["allowed"], false);
    assert_eq!(body["reason"], "feature_disabled");
}

#[tokio::test]
async fn strapi_flag_applies_when_no_override_exists() {
    let app = TestApp::spawn_with_strapi(&[("feature_flags.roadmap_module", json!(false))]).await;

    let (_, body) = app.get("/access/roadmap", &app.admin).await;

    assert_eq!(body["reason"], "feature_disabled");
}

#[tokio::test]
async fn write_requires_read_and_the_action() {
    let app = TestApp::spawn().await;
    let uri = format!("/memberships/{}/permissions/notes", app.member.member_id);
    app.put_json(&uri, &app.admin, json!({ "read": true })).await;

    let (_, read) = app.get("/access/notes", &app.member).await;
    assert_eq!(read["allowed"], true);
    assert_eq!(read["readOnly"], true);

    let (_, create) = app.get("/access/notes?action=create", &app.member).await;
    assert_eq!(create["allowed"], false);
    assert_eq!(create["reason"], "access_denied");

    // An action grant without read is still denied.
    app.put_json(&uri, &app.admin, json!({ "create": true })).await;
    let (_, create) = app.get("/access/notes?action=create", &app.member).await;
    assert_eq!(create["reason"], "access_denied");
}

#[tokio::test]
async fn hidden_subview_is_reported_separately() {
    let app = TestApp::spawn().await;
    let uri = format!("/memberships/{}/permissions/profitability", app.member.member_id);
    app.put_json(&uri, &app.admin, json!({ "read": true })).await;

    let (_, summary) = app
        .get("/access/profitability?subview=summary", &app.member)
        .await;
    assert_eq!(summary["allowed"], true);

    let (_, margins) = app
        .get("/access/profitability?subview=margins", &app.member)
        .await;
    assert_eq!(margins["allowed"], false);
    assert_eq!(margins["reason"], "subview_unavailable");
    assert_eq!(margins["subview"], "margins");
}

#[tokio::test]
async fn unlisted_subview_is_visible() {
    let app = TestApp::spawn().await;
    let uri = format!("/memberships/{}/permissions/crm", app.member.member_id);
    app.put_json(&uri, &app.admin, json!({ "read": true })).await;

    let (_, body) = app.get("/access/crm?subview=forecast", &app.member).await;

    assert_eq!(body["allowed"], true);
}

#[tokio::test]
async fn unknown_action_is_bad_request() {
    let app = TestApp::spawn().await;

    let (status, _) = app.get("/access/crm?action=archive", &app.member).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_module_is_not_found() {
    let app = TestApp::spawn().await;

    let (status, _) = app.get("/access/payroll", &app.member).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

//! Permission matrix reads and administrative updates.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn new_member_has_no_access_anywhere() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get("/memberships/current/permissions", &app.member).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["memberId"], app.member.member_id.to_string());
    assert_eq!(body["role"], "member");
    assert_eq!(body["permissions"], json!({}));
    assert_eq!(body["accessLevels"]["crm"], "no_access");
}

#[tokio::test]
async fn admin_reports_full_access() {
    let app = TestApp::spawn().await;

    let (_, body) = app.get("/memberships/current/permissions", &app.admin).await;

    assert_eq!(body["accessLevels"]["profitability"], "full");
}

#[tokio::test]
async fn admin_sets_module_permissions() {
    let app = TestApp::spawn().await;
    let uri = format!("/memberships/{}/permissions/notes", app.member.member_id);

    let (status, matrix) = app
        .put_json(&uri, &app.admin, json!({ "read": true, "update": true }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        matrix["notes"],
        json!({ "read": true, "create": false, "update": true, "delete": false })
    );

    let (_, body) = app.get("/memberships/current/permissions", &app.member).await;
    assert_eq!(body["permissions"]["notes"]["update"], true);
    assert_eq!(body["accessLevels"]["notes"], "read_write");
}

#[tokio::test]
async fn read_only_grant_is_reported_as_read_only() {
    let app = TestApp::spawn().await;
    let uri = format!("/memberships/{}/permissions/tasks", app.member.member_id);
    app.put_json(&uri, &app.admin, json!({ "read": true })).await;

    let (_, body) = app.get("/memberships/current/permissions", &app.member).await;

    assert_eq!(body["accessLevels"]["tasks"], "read_only");
}

#[tokio::test]
async fn members_cannot_change_permissions() {
    let app = TestApp::spawn().await;
    let uri = format!("/memberships/{}/permissions/crm", app.member.member_id);

    let (status, _) = app.put_json(&uri, &app.member, json!({ "read": true })).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_member_or_module_is_not_found() {
    let app = TestApp::spawn().await;

    let unknown_member = format!("/memberships/{}/permissions/crm", Uuid::new_v4());
    let (status, _) = app.put_json(&unknown_member, &app.admin, json!({ "read": true })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let unknown_module = format!("/memberships/{}/permissions/payroll", app.member.member_id);
    let (status, _) = app.put_json(&unknown_module, &app.admin, json!({ "read": true })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn caller_without_membership_is_forbidden() {
    let app = TestApp::spawn().await;
    let stranger = access_service::models::Membership::new(
        app.organization_id,
        Uuid::new_v4(),
        access_service::models::MemberRole::Member,
    );

    let (status, _) = app.get("/memberships/current/permissions", &stranger).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

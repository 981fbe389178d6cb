//! Integration tests for the community directory and member management

mod common;

use auzolan_core::types::{CommunityRole, MembershipStatus};
use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn test_list_creates_base_communities_once() {
    let app = TestApp::new().await;

    let (status, first) = app.send(Method::GET, "/api/communities", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = first
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Obanos", "Com. Vecinos"]);

    let (_, second) = app.send(Method::GET, "/api/communities", None, None).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_join_is_idempotent() {
    let app = TestApp::new().await;
    let home = app.create_community("Obanos").await;
    let other = app.create_community("Com. Vecinos").await;
    let (_, token) = app.member("ane@example.com", home).await;

    let uri = format!("/api/communities/{}/join", other);
    let (status, body) = app.post(&uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"community_id": other, "status": "approved"}));
    assert_eq!(app.post(&uri, &token, json!({})).await.1, body);

    let (status, _) = app.post("/api/communities/999/join", &token, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_members_require_moderator() {
    let app = TestApp::new().await;
    let community = app.create_community("Obanos").await;
    let (_, member) = app.member("ane@example.com", community).await;
    let (_, moderator) = app.moderator("mod@example.com", community).await;

    let uri = format!("/api/communities/{}/members", community);
    assert_eq!(app.get(&uri, &member).await.0, StatusCode::FORBIDDEN);

    let (status, page) = app.get(&uri, &moderator).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 2);
    // Ordered by role, then email
    assert_eq!(page["results"][0]["email"], "ane@example.com");
    assert_eq!(page["results"][1]["role_in_community"], "moderator");

    assert_eq!(
        app.get("/api/communities/999/members", &moderator).await.0,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_moderator_edits_member() {
    let app = TestApp::new().await;
    let community = app.create_community("Obanos").await;
    let (member_id, _) = app.member("ane@example.com", community).await;
    let (_, moderator) = app.moderator("mod@example.com", community).await;

    let uri = format!("/api/communities/{}/members/{}", community, member_id);
    let (status, body) = app
        .patch(
            &uri,
            &moderator,
            json!({"display_name": "Ane E.", "status": "expelled"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Ane E.");
    assert_eq!(body["status"], "expelled");

    // Role changes are reserved to superadmins
    let (status, _) = app
        .patch(&uri, &moderator, json!({"role_in_community": "moderator"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.patch(&uri, &moderator, json!({"status": "bogus"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["status"].is_array());
}

#[tokio::test]
async fn test_superadmin_rules_on_member_edit() {
    let app = TestApp::new().await;
    let community = app.create_community("Obanos").await;
    let (member_id, _) = app.member("ane@example.com", community).await;
    let (_, moderator) = app.moderator("mod@example.com", community).await;
    let (admin_id, admin) = app.superadmin("root@example.com").await;
    app.set_membership(admin_id, community, MembershipStatus::Approved, CommunityRole::Member)
        .await;

    let admin_uri = format!("/api/communities/{}/members/{}", community, admin_id);
    let (status, _) = app.patch(&admin_uri, &moderator, json!({"bio": "x"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let member_uri = format!("/api/communities/{}/members/{}", community, member_id);
    let (status, body) = app
        .patch(&member_uri, &admin, json!({"role_in_community": "moderator"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role_in_community"], "moderator");

    let missing = format!("/api/communities/{}/members/999", community);
    assert_eq!(
        app.patch(&missing, &admin, json!({"bio": "x"})).await.0,
        StatusCode::NOT_FOUND
    );
}

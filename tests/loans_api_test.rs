//! Integration tests for item loans

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::{json, Value};

async fn create_item(app: &TestApp, token: &str, community_id: i64, title: &str) -> Value {
    let (status, item) = app
        .post(
            "/api/loans",
            token,
            json!({"community_id": community_id, "title": title, "description": "Works fine"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", item);
    item
}

async fn request_loan(app: &TestApp, token: &str, item_id: i64) -> i64 {
    let (status, body) = app
        .post(
            &format!("/api/loans/{}/requests", item_id),
            token,
            json!({"message": "Could I borrow it?"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_create_and_list_items() {
    let app = TestApp::new().await;
    let community = app.create_community("Obanos").await;
    let (_, owner) = app.member("ane@example.com", community).await;
    let (_, other) = app.member("jon@example.com", community).await;

    let item = create_item(&app, &owner, community, "Drill").await;
    assert_eq!(item["status"], "available");
    assert_eq!(item["owner_display_name"], "ane");
    assert_eq!(item["borrower_display_name"], "");
    create_item(&app, &other, community, "Ladder").await;

    let base = format!("/api/loans?community_id={}", community);
    let (status, page) = app.get(&base, &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 2);
    assert_eq!(page["results"][0]["title"], "Ladder");

    let (_, mine) = app.get(&format!("{}&mine=1", base), &owner).await;
    assert_eq!(mine["count"], 1);

    // Unknown status values do not filter
    let (_, unknown) = app.get(&format!("{}&status=broken", base), &owner).await;
    assert_eq!(unknown["count"], 2);
    let (_, loaned) = app.get(&format!("{}&status=loaned", base), &owner).await;
    assert_eq!(loaned["count"], 0);

    assert_eq!(app.get("/api/loans", &owner).await.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_owner_manages_item() {
    let app = TestApp::new().await;
    let community = app.create_community("Obanos").await;
    let (_, owner) = app.member("ane@example.com", community).await;
    let (_, other) = app.member("jon@example.com", community).await;

    let item = create_item(&app, &owner, community, "Drill").await;
    let uri = format!("/api/loans/{}", item["id"]);

    let (status, body) = app.patch(&uri, &other, json!({"title": "My drill"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Only the lender can edit this item.");

    let (status, body) = app.patch(&uri, &owner, json!({"title": "Cordless drill"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Cordless drill");

    assert_eq!(
        app.get(&format!("{}/requests", uri), &other).await.0,
        StatusCode::FORBIDDEN
    );

    let (_, detail) = app.get(&uri, &other).await;
    assert_eq!(detail["can_request"], true);
    assert_eq!(detail["can_manage_item"], false);
    let (_, detail) = app.get(&uri, &owner).await;
    assert_eq!(detail["can_request"], false);
    assert_eq!(detail["can_manage_requests"], true);
    assert_eq!(detail["can_mark_returned"], false);
}

#[tokio::test]
async fn test_loan_lifecycle() {
    let app = TestApp::new().await;
    let community = app.create_community("Obanos").await;
    let (_, owner) = app.member("ane@example.com", community).await;
    let (borrower_id, borrower) = app.member("jon@example.com", community).await;
    let (_, other) = app.member("miren@example.com", community).await;

    let item = create_item(&app, &owner, community, "Drill").await;
    let item_id = item["id"].as_i64().unwrap();
    let uri = format!("/api/loans/{}", item_id);

    // Owners cannot borrow their own item
    let (status, _) = app
        .post(&format!("{}/requests", uri), &owner, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let chosen = request_loan(&app, &borrower, item_id).await;
    let passed_over = request_loan(&app, &other, item_id).await;
    let (status, _) = app
        .post(&format!("{}/requests", uri), &borrower, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, detail) = app.get(&uri, &borrower).await;
    assert_eq!(detail["can_request"], false);
    assert_eq!(detail["item"]["pending_requests_count"], 2);

    let (status, requests) = app.get(&format!("{}/requests", uri), &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(requests["count"], 2);
    assert_eq!(requests["results"][0]["id"], passed_over);

    let (status, item) = app
        .post(&format!("{}/requests/{}/accept", uri, chosen), &owner, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["status"], "loaned");
    assert_eq!(item["borrower_user_id"], borrower_id);
    assert_eq!(item["borrower_display_name"], "jon");
    assert!(!item["loaned_at"].is_null());
    assert_eq!(item["pending_requests_count"], 0);

    let (_, requests) = app.get(&format!("{}/requests", uri), &owner).await;
    for request in requests["results"].as_array().unwrap() {
        let expected = if request["id"] == chosen { "accepted" } else { "rejected" };
        assert_eq!(request["status"], expected);
        assert!(!request["responded_at"].is_null());
    }

    // Nothing more to accept or reject while loaned
    let (status, _) = app
        .post(
            &format!("{}/requests/{}/reject", uri, passed_over),
            &owner,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .post(&format!("{}/requests", uri), &other, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(
        app.post(&format!("{}/mark-returned", uri), &borrower, json!({}))
            .await
            .0,
        StatusCode::FORBIDDEN
    );
    let (status, item) = app
        .post(&format!("{}/mark-returned", uri), &owner, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["status"], "available");
    assert!(item["borrower_user_id"].is_null());
    assert!(!item["returned_at"].is_null());

    let (status, _) = app
        .post(&format!("{}/mark-returned", uri), &owner, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reject_loan_request() {
    let app = TestApp::new().await;
    let community = app.create_community("Obanos").await;
    let other_community = app.create_community("Com. Vecinos").await;
    let (_, owner) = app.member("ane@example.com", community).await;
    let (_, requester) = app.member("jon@example.com", community).await;
    let (_, stranger) = app.member("miren@example.com", other_community).await;

    let item = create_item(&app, &owner, community, "Tent").await;
    let item_id = item["id"].as_i64().unwrap();
    let request_id = request_loan(&app, &requester, item_id).await;

    let reject_uri = format!("/api/loans/{}/requests/{}/reject", item_id, request_id);
    let (status, body) = app.post(&reject_uri, &owner, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rejected");

    let (status, _) = app.post(&reject_uri, &owner, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A rejected requester may ask again
    request_loan(&app, &requester, item_id).await;

    assert_eq!(
        app.get(&format!("/api/loans/{}", item_id), &stranger).await.0,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.get("/api/loans/999", &owner).await.0,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loan_requests_from_one_borrower() {
    let app = TestApp::new().await;
    let community = app.create_community("Obanos").await;
    let (_, owner) = app.member("ane@example.com", community).await;
    let (_, borrower) = app.member("jon@example.com", community).await;

    let item = create_item(&app, &owner, community, "Drill").await;
    let uri = format!("/api/loans/{}", item["id"]);

    let statuses = app
        .post_concurrently(vec![format!("{}/requests", uri); 8], &borrower)
        .await;
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::CREATED).count(),
        1,
        "{:?}",
        statuses
    );
    assert!(
        statuses
            .iter()
            .all(|s| *s == StatusCode::CREATED || *s == StatusCode::BAD_REQUEST),
        "{:?}",
        statuses
    );

    let (_, detail) = app.get(&uri, &owner).await;
    assert_eq!(detail["item"]["pending_requests_count"], 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_accepts_lend_to_a_single_borrower() {
    let app = TestApp::new().await;
    let community = app.create_community("Obanos").await;
    let (_, owner) = app.member("ane@example.com", community).await;

    let item = create_item(&app, &owner, community, "Drill").await;
    let item_id = item["id"].as_i64().unwrap();

    let mut uris = Vec::new();
    for n in 0..8 {
        let (_, borrower) = app
            .member(&format!("borrower{}@example.com", n), community)
            .await;
        let loan_request = request_loan(&app, &borrower, item_id).await;
        uris.push(format!(
            "/api/loans/{}/requests/{}/accept",
            item_id, loan_request
        ));
    }

    let statuses = app.post_concurrently(uris, &owner).await;
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::OK).count(),
        1,
        "{:?}",
        statuses
    );
    assert!(
        statuses
            .iter()
            .all(|s| *s == StatusCode::OK || *s == StatusCode::BAD_REQUEST),
        "{:?}",
        statuses
    );

    let (_, detail) = app.get(&format!("/api/loans/{}", item_id), &owner).await;
    assert_eq!(detail["item"]["status"], "loaned");
    assert_eq!(detail["item"]["pending_requests_count"], 0);
}

//! Integration tests for help requests, offers and moderation

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn test_list_requires_community_and_membership() {
    let app = TestApp::new().await;
    let home = app.create_community("Obanos").await;
    let other = app.create_community("Com. Vecinos").await;
    let (_, token) = app.member("ane@example.com", home).await;

    let (status, body) = app.get("/api/requests", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "community_id is required.");

    let (status, _) = app.get("/api/requests?community_id=abc", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get(&format!("/api/requests?community_id={}", other), &token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_request_checks_community() {
    let app = TestApp::new().await;
    let home = app.create_community("Obanos").await;
    let other = app.create_community("Com. Vecinos").await;
    let (_, token) = app.member("ane@example.com", home).await;

    let payload = |community: i64| {
        json!({
            "community_id": community,
            "title": "Shopping",
            "description": "Weekly shopping",
            "category": "Errands",
        })
    };

    let (status, body) = app.post("/api/requests", &token, payload(999)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["community_id"].is_array());

    let (status, _) = app.post("/api/requests", &token, payload(other)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.post("/api/requests", &token, payload(home)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "open");
    assert_eq!(body["created_by_display_name"], "ane");
    assert_eq!(body["offers_count"], 0);

    let (status, body) = app
        .post(
            "/api/requests",
            &token,
            json!({"community_id": home, "title": "  ", "description": "x", "category": "x"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["title"].is_array());
}

#[tokio::test]
async fn test_list_filters_and_pagination() {
    let app = TestApp::new().await;
    let community = app.create_community("Obanos").await;
    let (_, ane) = app.member("ane@example.com", community).await;
    let (_, jon) = app.member("jon@example.com", community).await;

    for n in 0..11 {
        app.create_request(&ane, community, &format!("Request {}", n)).await;
    }
    app.create_request(&jon, community, "Jon's request").await;

    let base = format!("/api/requests?community_id={}", community);
    let (status, page) = app.get(&base, &ane).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 12);
    assert_eq!(page["results"].as_array().unwrap().len(), 10);
    assert_eq!(page["results"][0]["title"], "Jon's request");
    assert_eq!(page["next"], format!("{}&page=2", base));
    assert!(page["previous"].is_null());

    let (_, second) = app.get(&format!("{}&page=2", base), &ane).await;
    assert_eq!(second["results"].as_array().unwrap().len(), 2);
    assert!(second["next"].is_null());
    assert_eq!(second["previous"], base);

    let (status, body) = app.get(&format!("{}&page=3", base), &ane).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Invalid page.");

    let (_, mine) = app.get(&format!("{}&mine=s%C3%AD", base), &jon).await;
    assert_eq!(mine["count"], 1);

    let (_, oldest) = app.get(&format!("{}&order=oldest&page_size=1", base), &ane).await;
    assert_eq!(oldest["results"][0]["title"], "Request 0");

    let (_, open) = app.get(&format!("{}&status=resolved", base), &ane).await;
    assert_eq!(open["count"], 0);
}

#[tokio::test]
async fn test_offer_and_accept_flow() {
    let app = TestApp::new().await;
    let community = app.create_community("Obanos").await;
    let (_, creator) = app.member("ane@example.com", community).await;
    let (_, first) = app.member("jon@example.com", community).await;
    let (_, second) = app.member("miren@example.com", community).await;

    let request_id = app.create_request(&creator, community, "Shopping").await;
    let offers_uri = format!("/api/requests/{}/offers", request_id);

    // Creators cannot volunteer for themselves
    let (status, _) = app.post(&offers_uri, &creator, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let accepted = app.offer(&first, request_id).await;
    let rejected = app.offer(&second, request_id).await;
    let (status, _) = app.post(&offers_uri, &first, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, detail) = app
        .get(&format!("/api/requests/{}", request_id), &second)
        .await;
    assert_eq!(detail["offers_count"], 2);
    assert_eq!(detail["can_offer"], false);
    assert_eq!(detail["can_accept"], false);

    // Volunteers cannot see or accept offers
    assert_eq!(app.get(&offers_uri, &first).await.0, StatusCode::FORBIDDEN);
    let accept_uri = format!("/api/requests/{}/accept-offer/{}", request_id, accepted);
    assert_eq!(
        app.post(&accept_uri, &first, json!({})).await.0,
        StatusCode::FORBIDDEN
    );

    let (status, request) = app.post(&accept_uri, &creator, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(request["status"], "in_progress");
    assert_eq!(request["accepted_offer_id"], accepted);

    let (status, offers) = app.get(&offers_uri, &creator).await;
    assert_eq!(status, StatusCode::OK);
    for offer in offers.as_array().unwrap() {
        let expected = if offer["id"] == accepted { "accepted" } else { "rejected" };
        assert_eq!(offer["status"], expected);
    }
    assert!(offers
        .as_array()
        .unwrap()
        .iter()
        .any(|o| o["id"] == rejected));

    // No more offers or acceptances once in progress
    let (status, _) = app
        .post(
            &format!("/api/requests/{}/accept-offer/{}", request_id, rejected),
            &creator,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, detail) = app
        .get(&format!("/api/requests/{}", request_id), &creator)
        .await;
    assert_eq!(detail["can_accept"], false);
    assert_eq!(detail["can_close"], true);
}

#[tokio::test]
async fn test_accept_offer_from_another_request_is_not_found() {
    let app = TestApp::new().await;
    let community = app.create_community("Obanos").await;
    let (_, creator) = app.member("ane@example.com", community).await;
    let (_, volunteer) = app.member("jon@example.com", community).await;

    let first = app.create_request(&creator, community, "First").await;
    let second = app.create_request(&creator, community, "Second").await;
    let offer = app.offer(&volunteer, first).await;

    let (status, _) = app
        .post(
            &format!("/api/requests/{}/accept-offer/{}", second, offer),
            &creator,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_and_close() {
    let app = TestApp::new().await;
    let community = app.create_community("Obanos").await;
    let (_, creator) = app.member("ane@example.com", community).await;
    let (_, other) = app.member("jon@example.com", community).await;

    let request_id = app.create_request(&creator, community, "Shopping").await;
    let uri = format!("/api/requests/{}", request_id);

    let (status, _) = app.patch(&uri, &other, json!({"title": "Mine now"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .patch(&uri, &creator, json!({"title": "Big shopping", "location_radius_km": 3}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Big shopping");
    assert_eq!(body["location_radius_km"], 3);

    let (_, body) = app
        .patch(&uri, &creator, json!({"location_radius_km": null}))
        .await;
    assert!(body["location_radius_km"].is_null());
    assert_eq!(body["title"], "Big shopping");

    let close_uri = format!("{}/close", uri);
    let (status, _) = app.post(&close_uri, &creator, json!({"status": "open"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.post(&close_uri, &other, json!({"status": "resolved"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(&close_uri, &creator, json!({"status": "cancelled"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert!(!body["closed_at"].is_null());

    // Closed requests are frozen
    let (status, _) = app.patch(&uri, &creator, json!({"title": "Again"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .post(&close_uri, &creator, json!({"status": "resolved"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_moderation_close_and_delete() {
    let app = TestApp::new().await;
    let community = app.create_community("Obanos").await;
    let (_, creator) = app.member("ane@example.com", community).await;
    let (_, volunteer) = app.member("jon@example.com", community).await;
    let (_, moderator) = app.moderator("mod@example.com", community).await;

    let closed = app.create_request(&creator, community, "Spam").await;
    let close_uri = format!("/api/moderation/requests/{}/close", closed);

    assert_eq!(
        app.post(&close_uri, &volunteer, json!({})).await.0,
        StatusCode::FORBIDDEN
    );
    let (status, _) = app.post(&close_uri, &moderator, json!({"status": "open"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.post(&close_uri, &moderator, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let deleted = app.create_request(&creator, community, "Delete me").await;
    let offer = app.offer(&volunteer, deleted).await;
    app.post(
        &format!("/api/requests/{}/accept-offer/{}", deleted, offer),
        &creator,
        json!({}),
    )
    .await;
    let (_, handle) = app
        .get(&format!("/api/requests/{}/conversation", deleted), &creator)
        .await;
    let conversation = handle["conversation_id"].as_i64().unwrap();
    app.post(
        &format!("/api/conversations/{}/messages", conversation),
        &creator,
        json!({"body": "Hello"}),
    )
    .await;
    app.post(
        &format!("/api/requests/{}/reports", deleted),
        &volunteer,
        json!({"reason": "other"}),
    )
    .await;

    let delete_uri = format!("/api/moderation/requests/{}", deleted);
    assert_eq!(app.delete(&delete_uri, &creator).await.0, StatusCode::FORBIDDEN);
    let (status, body) = app.delete(&delete_uri, &moderator).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    assert_eq!(
        app.get(&format!("/api/requests/{}", deleted), &creator).await.0,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get(&format!("/api/conversations/{}/messages", conversation), &creator)
            .await
            .0,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_radius_accepts_numeric_strings() {
    let app = TestApp::new().await;
    let community = app.create_community("Obanos").await;
    let (_, token) = app.member("ane@example.com", community).await;

    let payload = |radius: serde_json::Value| {
        json!({
            "community_id": community,
            "title": "Shopping",
            "description": "Weekly shopping",
            "category": "Errands",
            "location_radius_km": radius,
        })
    };

    let (status, body) = app.post("/api/requests", &token, payload(json!("5"))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["location_radius_km"], 5);

    let (status, body) = app.post("/api/requests", &token, payload(json!("far"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["location_radius_km"].is_array());

    let (status, body) = app.post("/api/requests", &token, payload(json!(null))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["location_radius_km"].is_null());

    let uri = format!("/api/requests/{}", body["id"]);
    let (status, body) = app
        .patch(&uri, &token, json!({"location_radius_km": "12"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["location_radius_km"], 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_accepts_pick_a_single_offer() {
    let app = TestApp::new().await;
    let community = app.create_community("Obanos").await;
    let (_, creator) = app.member("ane@example.com", community).await;
    let request_id = app.create_request(&creator, community, "Shopping").await;

    let mut uris = Vec::new();
    for n in 0..8 {
        let (_, volunteer) = app
            .member(&format!("volunteer{}@example.com", n), community)
            .await;
        let offer = app.offer(&volunteer, request_id).await;
        uris.push(format!("/api/requests/{}/accept-offer/{}", request_id, offer));
    }

    let statuses = app.post_concurrently(uris, &creator).await;
    let accepted = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    assert_eq!(accepted, 1, "{:?}", statuses);
    assert!(
        statuses
            .iter()
            .all(|s| *s == StatusCode::OK || *s == StatusCode::BAD_REQUEST),
        "{:?}",
        statuses
    );

    let (_, offers) = app
        .get(&format!("/api/requests/{}/offers", request_id), &creator)
        .await;
    let offers = offers.as_array().unwrap();
    assert_eq!(offers.iter().filter(|o| o["status"] == "accepted").count(), 1);
    assert_eq!(offers.iter().filter(|o| o["status"] == "rejected").count(), 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_offers_from_one_volunteer() {
    let app = TestApp::new().await;
    let community = app.create_community("Obanos").await;
    let (_, creator) = app.member("ane@example.com", community).await;
    let (_, volunteer) = app.member("jon@example.com", community).await;
    let request_id = app.create_request(&creator, community, "Shopping").await;

    let uris = vec![format!("/api/requests/{}/offers", request_id); 8];
    let statuses = app.post_concurrently(uris, &volunteer).await;
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::CREATED).count(),
        1,
        "{:?}",
        statuses
    );
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == StatusCode::BAD_REQUEST)
            .count(),
        7,
        "{:?}",
        statuses
    );

    let (_, detail) = app
        .get(&format!("/api/requests/{}", request_id), &creator)
        .await;
    assert_eq!(detail["offers_count"], 1);
}

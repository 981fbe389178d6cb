//! Common test utilities and helpers
//!
//! Every test gets its own temporary database and drives the real router
//! through `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use auzolan_core::{
    api::{build_router, AppState},
    auth::PasswordHasher,
    services::accounts,
    storage::communities,
    types::{CommunityRole, MembershipStatus},
    AppConfig, Storage,
};
use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method, Request, StatusCode,
    },
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "Secret123!";

/// Low iteration count keeps hashing fast in tests
const TEST_ITERATIONS: u32 = 1_000;

pub struct TestApp {
    pub router: Router,
    pub storage: Arc<Storage>,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let storage = Arc::new(
            Storage::open(dir.path().join("auzolan_test.db"), 4).expect("Failed to open storage"),
        );
        storage
            .run_migrations()
            .await
            .expect("Failed to run migrations");

        let mut config = AppConfig::defaults().expect("Failed to build config");
        config.auth.secret = "integration-test-secret".to_string();
        config.auth.password_iterations = TEST_ITERATIONS;

        let state = AppState::new(storage.clone(), &config);
        let router = build_router(state.clone(), true);

        Self {
            router,
            storage,
            state,
            _dir: dir,
        }
    }

    pub fn hasher(&self) -> PasswordHasher {
        PasswordHasher::new(TEST_ITERATIONS)
    }

    /// Send a request and decode the JSON body (`Null` when empty)
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(token), None).await
    }

    /// POST to every uri at once, each on its own task; statuses in uri order
    pub async fn post_concurrently(&self, uris: Vec<String>, token: &str) -> Vec<StatusCode> {
        let handles: Vec<_> = uris
            .into_iter()
            .map(|uri| {
                let request = Request::builder()
                    .method(Method::POST)
                    .uri(uri)
                    .header(AUTHORIZATION, format!("Bearer {}", token))
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap();
                let router = self.router.clone();
                tokio::spawn(async move { router.oneshot(request).await.unwrap().status() })
            })
            .collect();

        let mut statuses = Vec::with_capacity(handles.len());
        for handle in handles {
            statuses.push(handle.await.unwrap());
        }
        statuses
    }

    pub async fn create_community(&self, name: &str) -> i64 {
        let name = name.to_string();
        self.storage
            .interact(move |conn| communities::insert_community(conn, &name, "", Utc::now()))
            .await
            .unwrap()
    }

    /// Register through the API and return the new user id
    pub async fn register(&self, email: &str, community_id: i64) -> i64 {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "email": email,
                    "password": PASSWORD,
                    "display_name": email.split('@').next().unwrap(),
                    "community_id": community_id,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body["id"].as_i64().unwrap()
    }

    pub async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/token",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["access"].as_str().unwrap().to_string()
    }

    /// Registered member of `community_id`: (user id, access token)
    pub async fn member(&self, email: &str, community_id: i64) -> (i64, String) {
        let id = self.register(email, community_id).await;
        (id, self.login(email).await)
    }

    pub async fn moderator(&self, email: &str, community_id: i64) -> (i64, String) {
        let (id, token) = self.member(email, community_id).await;
        self.set_membership(id, community_id, MembershipStatus::Approved, CommunityRole::Moderator)
            .await;
        (id, token)
    }

    pub async fn superadmin(&self, email: &str) -> (i64, String) {
        let id = accounts::create_superadmin(&self.storage, self.hasher(), email, PASSWORD, None)
            .await
            .unwrap();
        (id, self.login(email).await)
    }

    pub async fn set_membership(
        &self,
        user_id: i64,
        community_id: i64,
        status: MembershipStatus,
        role: CommunityRole,
    ) {
        self.storage
            .interact(move |conn| {
                communities::upsert_membership(
                    conn,
                    user_id,
                    community_id,
                    status,
                    role,
                    None,
                    Utc::now(),
                )
            })
            .await
            .unwrap();
    }

    /// Create an open request and return its id
    pub async fn create_request(&self, token: &str, community_id: i64, title: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/requests",
                token,
                json!({
                    "community_id": community_id,
                    "title": title,
                    "description": "Some help needed",
                    "category": "Errands",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create request failed: {}", body);
        body["id"].as_i64().unwrap()
    }

    pub async fn offer(&self, token: &str, request_id: i64) -> i64 {
        let (status, body) = self
            .post(
                &format!("/api/requests/{}/offers", request_id),
                token,
                json!({ "message": "I can help" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "offer failed: {}", body);
        body["id"].as_i64().unwrap()
    }
}

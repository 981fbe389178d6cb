//! HTTP API server

use super::state::AppState;
use super::{accounts, chat, communities, loans, reports, requests};
use crate::config::ServerConfig;
use axum::{
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Build the full `/api` router
pub fn build_router(state: AppState, cors_permissive: bool) -> Router {
    let router = Router::new()
        // Accounts
        .route("/api/auth/register", post(accounts::register))
        .route("/api/auth/token", post(accounts::token))
        .route("/api/auth/token/refresh", post(accounts::refresh))
        .route("/api/me", get(accounts::me))
        .route(
            "/api/profile",
            get(accounts::get_profile).patch(accounts::update_profile),
        )
        // Communities
        .route("/api/communities", get(communities::list))
        .route("/api/communities/:id/join", post(communities::join))
        .route("/api/communities/:id/members", get(communities::members))
        .route(
            "/api/communities/:id/members/:user_id",
            patch(communities::update_member),
        )
        // Requests and offers
        .route("/api/requests", get(requests::list).post(requests::create))
        .route(
            "/api/requests/:id",
            get(requests::detail).patch(requests::update),
        )
        .route("/api/requests/:id/close", post(requests::close))
        .route(
            "/api/requests/:id/offers",
            get(requests::list_offers).post(requests::create_offer),
        )
        .route(
            "/api/requests/:id/accept-offer/:offer_id",
            post(requests::accept_offer),
        )
        .route("/api/requests/:id/conversation", get(chat::conversation))
        .route("/api/requests/:id/reports", post(reports::create))
        // Chat
        .route(
            "/api/conversations/:id/messages",
            get(chat::list_messages).post(chat::post_message),
        )
        // Moderation
        .route("/api/reports", get(reports::list))
        .route("/api/reports/:id/status", post(reports::update_status))
        .route(
            "/api/moderation/requests/:id/close",
            post(requests::moderation_close),
        )
        .route(
            "/api/moderation/requests/:id",
            delete(requests::moderation_delete),
        )
        // Loans
        .route("/api/loans", get(loans::list).post(loans::create))
        .route("/api/loans/:id", get(loans::detail).patch(loans::update))
        .route(
            "/api/loans/:id/requests",
            get(loans::list_requests).post(loans::create_request),
        )
        .route(
            "/api/loans/:id/requests/:request_id/accept",
            post(loans::accept_request),
        )
        .route(
            "/api/loans/:id/requests/:request_id/reject",
            post(loans::reject_request),
        )
        .route("/api/loans/:id/mark-returned", post(loans::mark_returned))
        // Health check
        .route("/api/health", get(health_handler))
        // State
        .with_state(state)
        // Middleware
        .layer(TraceLayer::new_for_http());

    if cors_permissive {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// API server
pub struct ApiServer {
    addr: SocketAddr,
    router: Router,
}

impl ApiServer {
    pub fn new(config: &ServerConfig, state: AppState) -> Self {
        Self {
            addr: config.addr,
            router: build_router(state, config.cors_permissive),
        }
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn serve(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!("API server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

/// Health check handler
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

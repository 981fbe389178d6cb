//! Request extractors that report failures as `AuzolanError`

use super::state::AppState;
use crate::error::{AuzolanError, Result};
use crate::services::accounts;
use crate::types::Actor;
use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Request,
    },
    http::{header::AUTHORIZATION, request::Parts, Uri},
};
use serde::de::DeserializeOwned;

/// The authenticated caller, from an `Authorization: Bearer <access>` header
#[derive(Debug, Clone)]
pub struct AuthUser(pub Actor);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuzolanError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let missing =
            || AuzolanError::Unauthorized("Authentication credentials were not provided.".to_string());

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(missing)?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(missing)?;

        let actor = accounts::authenticate(&state.storage, &state.tokens, token).await?;
        Ok(AuthUser(actor))
    }
}

/// JSON body whose rejections render like every other API error
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AuzolanError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for AuzolanError {
    fn from(rejection: JsonRejection) -> Self {
        AuzolanError::BadRequest(rejection.body_text())
    }
}

/// Path parameters; a segment that does not parse is a plain 404
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AuzolanError))]
pub struct ApiPath<T>(pub T);

impl From<PathRejection> for AuzolanError {
    fn from(_: PathRejection) -> Self {
        AuzolanError::not_found()
    }
}

/// JSON body that may be omitted entirely; an empty body means defaults
pub struct OptionalJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AuzolanError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| AuzolanError::BadRequest(rejection.body_text()))?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(T::default()));
        }
        serde_json::from_slice(&body)
            .map(OptionalJson)
            .map_err(|e| AuzolanError::BadRequest(format!("JSON parse error - {}", e)))
    }
}

/// Path and query of the request, the base for pagination links
pub fn link_base(uri: &Uri) -> &str {
    uri.path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path())
}

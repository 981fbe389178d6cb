//! Registration, tokens, `me` and the caller's profile

use super::extract::{ApiJson, AuthUser};
use super::state::AppState;
use crate::auth::TokenPair;
use crate::error::Result;
use crate::services::accounts::{
    self, AccessToken, LoginInput, ProfilePatch, RefreshInput, RegisterInput, Registered,
};
use crate::types::{Me, Profile};
use axum::{extract::State, http::StatusCode, Json};

pub async fn register(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RegisterInput>,
) -> Result<(StatusCode, Json<Registered>)> {
    let registered = accounts::register(&state.storage, state.passwords, input).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

pub async fn token(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<LoginInput>,
) -> Result<Json<TokenPair>> {
    let pair = accounts::login(&state.storage, state.passwords, &state.tokens, input).await?;
    Ok(Json(pair))
}

pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RefreshInput>,
) -> Result<Json<AccessToken>> {
    Ok(Json(accounts::refresh(&state.tokens, input)?))
}

pub async fn me(State(state): State<AppState>, AuthUser(actor): AuthUser) -> Result<Json<Me>> {
    Ok(Json(accounts::me(&state.storage, &actor).await?))
}

pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<Profile>> {
    Ok(Json(accounts::get_profile(&state.storage, &actor).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(patch): ApiJson<ProfilePatch>,
) -> Result<Json<Profile>> {
    Ok(Json(accounts::update_profile(&state.storage, &actor, patch).await?))
}

//! Help requests, offers and moderator actions on requests

use super::extract::{link_base, ApiJson, ApiPath, AuthUser, OptionalJson};
use super::state::AppState;
use crate::error::Result;
use crate::pagination::{Page, PageQuery};
use crate::services::requests::{
    self, CloseInput, CreateRequestInput, OfferInput, RequestListQuery, UpdateRequestInput,
};
use crate::types::{HelpRequest, RequestDetail, VolunteerOffer};
use axum::{
    extract::{Query, State},
    http::{StatusCode, Uri},
    Json,
};

pub async fn list(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<RequestListQuery>,
    Query(page): Query<PageQuery>,
    uri: Uri,
) -> Result<Json<Page<HelpRequest>>> {
    let page = state.page(&page)?;
    let results = requests::list_requests(&state.storage, &actor, query, page).await?;
    Ok(Json(results.into_page(link_base(&uri))))
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(input): ApiJson<CreateRequestInput>,
) -> Result<(StatusCode, Json<HelpRequest>)> {
    let request = requests::create_request(&state.storage, &actor, input).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn detail(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(request_id): ApiPath<i64>,
) -> Result<Json<RequestDetail>> {
    Ok(Json(requests::request_detail(&state.storage, &actor, request_id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(request_id): ApiPath<i64>,
    ApiJson(input): ApiJson<UpdateRequestInput>,
) -> Result<Json<HelpRequest>> {
    let request = requests::update_request(&state.storage, &actor, request_id, input).await?;
    Ok(Json(request))
}

pub async fn close(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(request_id): ApiPath<i64>,
    OptionalJson(input): OptionalJson<CloseInput>,
) -> Result<Json<HelpRequest>> {
    let request = requests::close_request(&state.storage, &actor, request_id, input).await?;
    Ok(Json(request))
}

pub async fn list_offers(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(request_id): ApiPath<i64>,
) -> Result<Json<Vec<VolunteerOffer>>> {
    Ok(Json(requests::list_offers(&state.storage, &actor, request_id).await?))
}

pub async fn create_offer(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(request_id): ApiPath<i64>,
    OptionalJson(input): OptionalJson<OfferInput>,
) -> Result<(StatusCode, Json<VolunteerOffer>)> {
    let offer = requests::create_offer(&state.storage, &actor, request_id, input).await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

pub async fn accept_offer(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath((request_id, offer_id)): ApiPath<(i64, i64)>,
) -> Result<Json<HelpRequest>> {
    let request = requests::accept_offer(&state.storage, &actor, request_id, offer_id).await?;
    Ok(Json(request))
}

pub async fn moderation_close(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(request_id): ApiPath<i64>,
    OptionalJson(input): OptionalJson<CloseInput>,
) -> Result<Json<HelpRequest>> {
    let request = requests::moderation_close(&state.storage, &actor, request_id, input).await?;
    Ok(Json(request))
}

pub async fn moderation_delete(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(request_id): ApiPath<i64>,
) -> Result<StatusCode> {
    requests::moderation_delete(&state.storage, &actor, request_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

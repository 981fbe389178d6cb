//! Loan items and loan requests

use super::extract::{link_base, ApiJson, ApiPath, AuthUser, OptionalJson};
use super::state::AppState;
use crate::error::Result;
use crate::pagination::{Page, PageQuery};
use crate::services::loans::{
    self, CreateLoanInput, LoanListQuery, LoanRequestInput, UpdateLoanInput,
};
use crate::types::{LoanDetail, LoanItem, LoanRequest};
use axum::{
    extract::{Query, State},
    http::{StatusCode, Uri},
    Json,
};

pub async fn list(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<LoanListQuery>,
    Query(page): Query<PageQuery>,
    uri: Uri,
) -> Result<Json<Page<LoanItem>>> {
    let page = state.page(&page)?;
    let items = loans::list_items(&state.storage, &actor, query, page).await?;
    Ok(Json(items.into_page(link_base(&uri))))
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(input): ApiJson<CreateLoanInput>,
) -> Result<(StatusCode, Json<LoanItem>)> {
    let item = loans::create_item(&state.storage, &actor, input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn detail(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(item_id): ApiPath<i64>,
) -> Result<Json<LoanDetail>> {
    Ok(Json(loans::item_detail(&state.storage, &actor, item_id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(item_id): ApiPath<i64>,
    ApiJson(input): ApiJson<UpdateLoanInput>,
) -> Result<Json<LoanItem>> {
    Ok(Json(loans::update_item(&state.storage, &actor, item_id, input).await?))
}

pub async fn list_requests(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(item_id): ApiPath<i64>,
    Query(page): Query<PageQuery>,
    uri: Uri,
) -> Result<Json<Page<LoanRequest>>> {
    let page = state.page(&page)?;
    let results = loans::list_loan_requests(&state.storage, &actor, item_id, page).await?;
    Ok(Json(results.into_page(link_base(&uri))))
}

pub async fn create_request(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(item_id): ApiPath<i64>,
    OptionalJson(input): OptionalJson<LoanRequestInput>,
) -> Result<(StatusCode, Json<LoanRequest>)> {
    let request = loans::create_loan_request(&state.storage, &actor, item_id, input).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn accept_request(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath((item_id, loan_request_id)): ApiPath<(i64, i64)>,
) -> Result<Json<LoanItem>> {
    let item = loans::accept_loan_request(&state.storage, &actor, item_id, loan_request_id).await?;
    Ok(Json(item))
}

pub async fn reject_request(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath((item_id, loan_request_id)): ApiPath<(i64, i64)>,
) -> Result<Json<LoanRequest>> {
    let request =
        loans::reject_loan_request(&state.storage, &actor, item_id, loan_request_id).await?;
    Ok(Json(request))
}

pub async fn mark_returned(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(item_id): ApiPath<i64>,
) -> Result<Json<LoanItem>> {
    Ok(Json(loans::mark_returned(&state.storage, &actor, item_id).await?))
}

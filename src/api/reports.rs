//! Filing reports and the moderation queue

use super::extract::{link_base, ApiJson, ApiPath, AuthUser};
use super::state::AppState;
use crate::error::Result;
use crate::pagination::{Page, PageQuery};
use crate::services::reports::{self, ReportInput, ReportListQuery, ReportStatusInput};
use crate::types::Report;
use axum::{
    extract::{Query, State},
    http::{StatusCode, Uri},
    Json,
};

pub async fn create(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(request_id): ApiPath<i64>,
    ApiJson(input): ApiJson<ReportInput>,
) -> Result<(StatusCode, Json<Report>)> {
    let report = reports::create_report(&state.storage, &actor, request_id, input).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<ReportListQuery>,
    Query(page): Query<PageQuery>,
    uri: Uri,
) -> Result<Json<Page<Report>>> {
    let page = state.page(&page)?;
    let results = reports::list_reports(&state.storage, &actor, query, page).await?;
    Ok(Json(results.into_page(link_base(&uri))))
}

pub async fn update_status(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(report_id): ApiPath<i64>,
    ApiJson(input): ApiJson<ReportStatusInput>,
) -> Result<Json<Report>> {
    let report = reports::update_report_status(&state.storage, &actor, report_id, input).await?;
    Ok(Json(report))
}

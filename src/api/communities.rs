//! Community directory and member management

use super::extract::{link_base, ApiJson, ApiPath, AuthUser};
use super::state::AppState;
use crate::error::Result;
use crate::pagination::{Page, PageQuery};
use crate::services::communities::{self, JoinResult, MemberPatch};
use crate::types::{Community, CommunityMember};
use axum::{
    extract::{Query, State},
    http::Uri,
    Json,
};

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Community>>> {
    Ok(Json(communities::list_communities(&state.storage).await?))
}

pub async fn join(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(community_id): ApiPath<i64>,
) -> Result<Json<JoinResult>> {
    Ok(Json(communities::join(&state.storage, &actor, community_id).await?))
}

pub async fn members(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(community_id): ApiPath<i64>,
    Query(page): Query<PageQuery>,
    uri: Uri,
) -> Result<Json<Page<CommunityMember>>> {
    let page = state.page(&page)?;
    let members = communities::list_members(&state.storage, &actor, community_id, page).await?;
    Ok(Json(members.into_page(link_base(&uri))))
}

pub async fn update_member(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath((community_id, user_id)): ApiPath<(i64, i64)>,
    ApiJson(patch): ApiJson<MemberPatch>,
) -> Result<Json<CommunityMember>> {
    let member =
        communities::update_member(&state.storage, &actor, community_id, user_id, patch).await?;
    Ok(Json(member))
}

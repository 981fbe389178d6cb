//! Community directory, joining and member management

use super::permissions::require_moderator;
use super::validate::{choice, present_blankable, present_text};
use crate::error::{AuzolanError, Result};
use crate::pagination::{PageRequest, Paginated};
use crate::storage::{communities, users, Storage};
use crate::types::{Actor, Community, CommunityMember, CommunityRole, MembershipStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Communities that always exist
pub const BASE_COMMUNITIES: &[(&str, &str)] = &[
    ("Obanos", "Local community of Obanos."),
    ("Com. Vecinos", "Neighbourhood community."),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinResult {
    pub community_id: i64,
    pub status: MembershipStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberPatch {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub status: Option<String>,
    pub role_in_community: Option<String>,
}

/// Public community list; the base communities are created on first use
pub async fn list_communities(storage: &Storage) -> Result<Vec<Community>> {
    storage
        .interact(|conn| {
            let now = Utc::now();
            for (name, description) in BASE_COMMUNITIES {
                communities::ensure_community(conn, name, description, now)?;
            }
            communities::list_communities(conn)
        })
        .await
}

/// Join a community; an existing membership is returned as it is
pub async fn join(storage: &Storage, actor: &Actor, community_id: i64) -> Result<JoinResult> {
    let user_id = actor.id;
    let membership = storage
        .interact(move |conn| {
            if !communities::community_exists(conn, community_id)? {
                return Err(AuzolanError::not_found());
            }
            communities::ensure_membership(
                conn,
                user_id,
                community_id,
                MembershipStatus::Approved,
                CommunityRole::Member,
                Utc::now(),
            )
        })
        .await?;

    Ok(JoinResult {
        community_id: membership.community_id,
        status: membership.status,
    })
}

pub async fn list_members(
    storage: &Storage,
    actor: &Actor,
    community_id: i64,
    page: PageRequest,
) -> Result<Paginated<CommunityMember>> {
    let actor = actor.clone();
    storage
        .interact(move |conn| {
            if !communities::community_exists(conn, community_id)? {
                return Err(AuzolanError::not_found());
            }
            require_moderator(conn, &actor, community_id)?;

            let count = communities::count_members(conn, community_id)?;
            page.ensure_in_range(count)?;
            let results =
                communities::list_members(conn, community_id, page.limit(), page.offset())?;
            Ok(Paginated {
                request: page,
                count,
                results,
            })
        })
        .await
}

/// Moderator edit of a member's profile and membership
///
/// Only superadmins may change roles or touch another superadmin.
pub async fn update_member(
    storage: &Storage,
    actor: &Actor,
    community_id: i64,
    user_id: i64,
    patch: MemberPatch,
) -> Result<CommunityMember> {
    let actor = actor.clone();
    let member = storage
        .interact(move |conn| {
            if !communities::community_exists(conn, community_id)? {
                return Err(AuzolanError::not_found());
            }
            require_moderator(conn, &actor, community_id)?;
            if communities::get_membership(conn, user_id, community_id)?.is_none() {
                return Err(AuzolanError::not_found());
            }

            let display_name = present_text("display_name", patch.display_name, Some(80))?;
            let bio = present_blankable("bio", patch.bio, 280)?;
            let status = patch
                .status
                .map(|s| choice("status", &s, MembershipStatus::parse))
                .transpose()?;
            let role = patch
                .role_in_community
                .map(|r| choice("role_in_community", &r, CommunityRole::parse))
                .transpose()?;

            let target = users::get_user(conn, user_id)?.ok_or_else(AuzolanError::not_found)?;
            if target.is_superadmin && !actor.is_superadmin {
                return Err(AuzolanError::Forbidden(
                    "You cannot edit a superadmin.".to_string(),
                ));
            }
            if role.is_some() && !actor.is_superadmin {
                return Err(AuzolanError::Forbidden(
                    "Only a superadmin can change community roles.".to_string(),
                ));
            }

            let now = Utc::now();
            let tx = conn.transaction()?;
            if display_name.is_some() || bio.is_some() {
                users::ensure_profile(&tx, &target, now)?;
                users::update_profile(&tx, user_id, display_name.as_deref(), bio.as_deref(), now)?;
            }
            communities::update_membership(&tx, community_id, user_id, status, role, now)?;
            tx.commit()?;

            communities::get_member(conn, community_id, user_id)?
                .ok_or_else(AuzolanError::not_found)
        })
        .await?;

    info!(
        community_id,
        member_user_id = member.user_id,
        status = %member.status,
        role = %member.role_in_community,
        "Community member updated"
    );
    Ok(member)
}

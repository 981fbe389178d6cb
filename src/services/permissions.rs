//! Community-scoped permission checks
//!
//! Superadmins pass every membership and moderation check. Everything here
//! runs on a pooled connection, inside the operation that needs the answer.

use crate::error::{AuzolanError, Result};
use crate::storage::{communities, requests};
use crate::types::{Actor, CommunityRole, HelpRequest};
use rusqlite::Connection;

/// Parse a community id arriving as text
pub fn normalize_community_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

/// Required `community_id` query parameter
pub fn require_community_param(raw: Option<&str>) -> Result<i64> {
    let raw = raw
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AuzolanError::BadRequest("community_id is required.".to_string()))?;
    normalize_community_id(raw)
        .ok_or_else(|| AuzolanError::BadRequest("Invalid community_id.".to_string()))
}

pub fn has_approved_membership(conn: &Connection, actor: &Actor, community_id: i64) -> Result<bool> {
    if actor.is_superadmin {
        return Ok(true);
    }
    communities::has_approved_membership(conn, actor.id, community_id, None)
}

pub fn is_moderator_in_community(
    conn: &Connection,
    actor: &Actor,
    community_id: i64,
) -> Result<bool> {
    if actor.is_superadmin {
        return Ok(true);
    }
    communities::has_approved_membership(conn, actor.id, community_id, Some(CommunityRole::Moderator))
}

/// Every community for superadmins, else the ones the actor moderates
pub fn moderated_community_ids(conn: &Connection, actor: &Actor) -> Result<Vec<i64>> {
    if actor.is_superadmin {
        return communities::all_community_ids(conn);
    }
    communities::moderated_community_ids(conn, actor.id)
}

pub fn require_member(conn: &Connection, actor: &Actor, community_id: i64) -> Result<()> {
    if has_approved_membership(conn, actor, community_id)? {
        Ok(())
    } else {
        Err(AuzolanError::not_member())
    }
}

pub fn require_moderator(conn: &Connection, actor: &Actor, community_id: i64) -> Result<()> {
    if is_moderator_in_community(conn, actor, community_id)? {
        Ok(())
    } else {
        Err(AuzolanError::not_moderator())
    }
}

/// Creator, accepted volunteer, or superadmin
pub fn is_participant(conn: &Connection, actor: &Actor, request: &HelpRequest) -> Result<bool> {
    if actor.is_superadmin || request.created_by_user_id == actor.id {
        return Ok(true);
    }
    Ok(requests::accepted_volunteer(conn, request.id)? == Some(actor.id))
}

pub fn is_owner_or_superadmin(actor: &Actor, owner_user_id: i64) -> bool {
    actor.is_superadmin || actor.id == owner_user_id
}

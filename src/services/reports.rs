//! Reporting requests and the moderators' report queue

use super::permissions::{moderated_community_ids, normalize_community_id, require_moderator};
use super::validate::{choice, optional_text};
use crate::error::{AuzolanError, Result};
use crate::pagination::{PageRequest, Paginated};
use crate::storage::reports::ReportScope;
use crate::storage::{communities, reports, requests, Storage};
use crate::types::{Actor, Report, ReportReason, ReportStatus};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

const DESCRIPTION_MAX: usize = 500;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportInput {
    pub reason: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportListQuery {
    pub community_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportStatusInput {
    pub status: Option<String>,
}

/// Decide which reports the actor may list
///
/// `moderated` is the actor's moderated community ids (all ids for a
/// superadmin).
fn resolve_scope(
    actor: &Actor,
    moderated: &[i64],
    community_param: Option<&str>,
) -> Result<ReportScope> {
    if !actor.is_superadmin && moderated.is_empty() {
        return Err(AuzolanError::Forbidden(
            "You do not have moderation permissions.".to_string(),
        ));
    }

    match community_param.filter(|raw| !raw.is_empty()) {
        None if actor.is_superadmin => Ok(ReportScope::All),
        None => Ok(ReportScope::Communities(moderated.to_vec())),
        Some(raw) => {
            let community_id = normalize_community_id(raw)
                .ok_or_else(|| AuzolanError::BadRequest("Invalid community_id.".to_string()))?;
            if !actor.is_superadmin && !moderated.contains(&community_id) {
                return Err(AuzolanError::not_moderator());
            }
            Ok(ReportScope::Communities(vec![community_id]))
        }
    }
}

/// File a report; only approved members of the request's community may
pub async fn create_report(
    storage: &Storage,
    actor: &Actor,
    request_id: i64,
    input: ReportInput,
) -> Result<Report> {
    let actor_id = actor.id;
    let report = storage
        .interact(move |conn| {
            let request =
                requests::get_request(conn, request_id)?.ok_or_else(AuzolanError::not_found)?;
            // A real membership is required here, superadmin or not
            if !communities::has_approved_membership(conn, actor_id, request.community_id, None)? {
                return Err(AuzolanError::not_member());
            }

            let reason = match input.reason.as_deref() {
                None | Some("") => {
                    return Err(AuzolanError::validation("reason", "This field is required."))
                }
                Some(raw) => choice("reason", raw, ReportReason::parse)?,
            };
            let description = optional_text("description", input.description, DESCRIPTION_MAX)?;

            let id =
                reports::insert_report(conn, actor_id, request_id, reason, &description, Utc::now())?;
            reports::get_report(conn, id)?.ok_or_else(AuzolanError::not_found)
        })
        .await?;

    info!(
        report_id = report.id,
        request_id,
        reason = %report.reason,
        "Report filed"
    );
    Ok(report)
}

/// Reports in the actor's moderation scope, newest first
pub async fn list_reports(
    storage: &Storage,
    actor: &Actor,
    query: ReportListQuery,
    page: PageRequest,
) -> Result<Paginated<Report>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| choice("status", s, ReportStatus::parse))
        .transpose()?;
    let actor = actor.clone();

    storage
        .interact(move |conn| {
            let moderated = moderated_community_ids(conn, &actor)?;
            let scope = resolve_scope(&actor, &moderated, query.community_id.as_deref())?;

            let count = reports::count_reports(conn, &scope, status)?;
            page.ensure_in_range(count)?;
            let results = reports::list_reports(conn, &scope, status, page.limit(), page.offset())?;
            Ok(Paginated {
                request: page,
                count,
                results,
            })
        })
        .await
}

pub async fn update_report_status(
    storage: &Storage,
    actor: &Actor,
    report_id: i64,
    input: ReportStatusInput,
) -> Result<Report> {
    let actor_user_id = actor.id;
    let actor = actor.clone();
    let report = storage
        .interact(move |conn| {
            let report = reports::get_report(conn, report_id)?.ok_or_else(AuzolanError::not_found)?;
            require_moderator(conn, &actor, report.request_community_id)?;

            let status = input
                .status
                .as_deref()
                .and_then(ReportStatus::parse)
                .ok_or_else(|| AuzolanError::BadRequest("Invalid status.".to_string()))?;

            reports::update_report_status(conn, report_id, status, Utc::now())?;
            reports::get_report(conn, report_id)?.ok_or_else(AuzolanError::not_found)
        })
        .await?;

    info!(
        report_id,
        actor_user_id,
        status = %report.status,
        "Report status updated"
    );
    Ok(report)
}

//! Peer-to-peer loans of items inside a community

use super::permissions::{is_owner_or_superadmin, require_community_param, require_member};
use super::validate::{
    integer_field, is_truthy, optional_text, present_blankable, present_text, required_text,
};
use crate::error::{AuzolanError, Result};
use crate::pagination::{PageRequest, Paginated};
use crate::storage::loans::LoanFilter;
use crate::storage::{communities, loans, Storage};
use crate::types::{Actor, LoanDetail, LoanItem, LoanRequest, LoanRequestStatus, LoanStatus};
use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

const TITLE_MAX: usize = 120;
const DESCRIPTION_MAX: usize = 500;
const MESSAGE_MAX: usize = 280;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoanListQuery {
    pub community_id: Option<String>,
    pub status: Option<String>,
    pub mine: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateLoanInput {
    pub community_id: Option<Value>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLoanInput {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoanRequestInput {
    pub message: Option<String>,
}

fn load_item(conn: &Connection, item_id: i64) -> Result<LoanItem> {
    loans::get_item(conn, item_id)?.ok_or_else(AuzolanError::not_found)
}

/// Load the item and check the caller belongs to its community
fn member_item(conn: &Connection, actor: &Actor, item_id: i64) -> Result<LoanItem> {
    let item = load_item(conn, item_id)?;
    require_member(conn, actor, item.community_id)?;
    Ok(item)
}

/// Load the item and check the caller may manage it
fn managed_item(conn: &Connection, actor: &Actor, item_id: i64, action: &str) -> Result<LoanItem> {
    let item = member_item(conn, actor, item_id)?;
    if !is_owner_or_superadmin(actor, item.owner_user_id) {
        return Err(AuzolanError::Forbidden(format!(
            "Only the lender can {}.",
            action
        )));
    }
    Ok(item)
}

fn duplicate_pending() -> AuzolanError {
    AuzolanError::BadRequest("You already have a pending request for this item.".to_string())
}

fn pending_request(conn: &Connection, item_id: i64, loan_request_id: i64) -> Result<LoanRequest> {
    let request =
        loans::get_loan_request(conn, item_id, loan_request_id)?.ok_or_else(AuzolanError::not_found)?;
    if request.status != LoanRequestStatus::Pending {
        return Err(AuzolanError::BadRequest(
            "The loan request is not pending.".to_string(),
        ));
    }
    Ok(request)
}

pub async fn list_items(
    storage: &Storage,
    actor: &Actor,
    query: LoanListQuery,
    page: PageRequest,
) -> Result<Paginated<LoanItem>> {
    let community_id = require_community_param(query.community_id.as_deref())?;
    let actor = actor.clone();

    storage
        .interact(move |conn| {
            require_member(conn, &actor, community_id)?;

            let filter = LoanFilter {
                community_id,
                // Unknown status values are ignored rather than rejected
                status: query.status.as_deref().and_then(LoanStatus::parse),
                owner: is_truthy(query.mine.as_deref()).then_some(actor.id),
                oldest_first: query.order.as_deref() == Some("oldest"),
            };

            let count = loans::count_items(conn, &filter)?;
            page.ensure_in_range(count)?;
            let results = loans::list_items(conn, &filter, page.limit(), page.offset())?;
            Ok(Paginated {
                request: page,
                count,
                results,
            })
        })
        .await
}

pub async fn create_item(storage: &Storage, actor: &Actor, input: CreateLoanInput) -> Result<LoanItem> {
    let community_id = integer_field("community_id", input.community_id.as_ref())?;
    let title = required_text("title", input.title, Some(TITLE_MAX))?;
    let description = optional_text("description", input.description, DESCRIPTION_MAX)?;
    let actor = actor.clone();

    let item = storage
        .interact(move |conn| {
            if !communities::community_exists(conn, community_id)? {
                return Err(AuzolanError::validation(
                    "community_id",
                    format!("Invalid pk \"{}\" - object does not exist.", community_id),
                ));
            }
            require_member(conn, &actor, community_id)?;

            let id = loans::insert_item(
                conn,
                community_id,
                actor.id,
                &title,
                &description,
                Utc::now(),
            )?;
            load_item(conn, id)
        })
        .await?;

    info!(item_id = item.id, community_id, "Loan item created");
    Ok(item)
}

/// Item plus the actions open to the caller
pub async fn item_detail(storage: &Storage, actor: &Actor, item_id: i64) -> Result<LoanDetail> {
    let actor = actor.clone();
    storage
        .interact(move |conn| {
            let item = member_item(conn, &actor, item_id)?;

            let has_pending = loans::has_pending_request(conn, item_id, actor.id)?;
            let can_request = item.status == LoanStatus::Available
                && item.owner_user_id != actor.id
                && !has_pending;
            let can_manage_item = is_owner_or_superadmin(&actor, item.owner_user_id);
            let can_mark_returned = can_manage_item && item.status == LoanStatus::Loaned;

            Ok(LoanDetail {
                item,
                can_request,
                can_manage_item,
                can_manage_requests: can_manage_item,
                can_mark_returned,
            })
        })
        .await
}

pub async fn update_item(
    storage: &Storage,
    actor: &Actor,
    item_id: i64,
    input: UpdateLoanInput,
) -> Result<LoanItem> {
    let actor = actor.clone();
    storage
        .interact(move |conn| {
            managed_item(conn, &actor, item_id, "edit this item")?;

            let title = present_text("title", input.title, Some(TITLE_MAX))?;
            let description = present_blankable("description", input.description, DESCRIPTION_MAX)?;
            loans::update_item(conn, item_id, title.as_deref(), description.as_deref(), Utc::now())?;
            load_item(conn, item_id)
        })
        .await
}

/// Requests on an item, for its owner
pub async fn list_loan_requests(
    storage: &Storage,
    actor: &Actor,
    item_id: i64,
    page: PageRequest,
) -> Result<Paginated<LoanRequest>> {
    let actor = actor.clone();
    storage
        .interact(move |conn| {
            managed_item(conn, &actor, item_id, "see loan requests")?;

            let count = loans::count_loan_requests(conn, item_id)?;
            page.ensure_in_range(count)?;
            let results = loans::list_loan_requests(conn, item_id, page.limit(), page.offset())?;
            Ok(Paginated {
                request: page,
                count,
                results,
            })
        })
        .await
}

pub async fn create_loan_request(
    storage: &Storage,
    actor: &Actor,
    item_id: i64,
    input: LoanRequestInput,
) -> Result<LoanRequest> {
    let actor = actor.clone();
    let request = storage
        .interact(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let item = member_item(&tx, &actor, item_id)?;
            if item.status != LoanStatus::Available {
                return Err(AuzolanError::BadRequest(
                    "The item is not available.".to_string(),
                ));
            }
            if item.owner_user_id == actor.id && !actor.is_superadmin {
                return Err(AuzolanError::BadRequest(
                    "You cannot request your own item.".to_string(),
                ));
            }
            if loans::has_pending_request(&tx, item_id, actor.id)? {
                return Err(duplicate_pending());
            }

            let message = optional_text("message", input.message, MESSAGE_MAX)?;
            let id = loans::insert_loan_request(&tx, item_id, actor.id, &message, Utc::now())
                .map_err(|e| if e.is_constraint_violation() { duplicate_pending() } else { e })?;
            tx.commit()?;

            loans::get_loan_request(conn, item_id, id)?.ok_or_else(AuzolanError::not_found)
        })
        .await?;

    info!(item_id, loan_request_id = request.id, "Loan requested");
    Ok(request)
}

/// Accept a loan request in a single immediate transaction
///
/// Other pending requests are rejected and the item is handed to the
/// requester.
pub async fn accept_loan_request(
    storage: &Storage,
    actor: &Actor,
    item_id: i64,
    loan_request_id: i64,
) -> Result<LoanItem> {
    let actor = actor.clone();
    let item = storage
        .interact(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let item = managed_item(&tx, &actor, item_id, "accept loan requests")?;
            if item.status != LoanStatus::Available {
                return Err(AuzolanError::BadRequest(
                    "The item is not available to accept requests.".to_string(),
                ));
            }
            let request = pending_request(&tx, item_id, loan_request_id)?;

            let now = Utc::now();
            loans::respond_loan_request(&tx, loan_request_id, LoanRequestStatus::Accepted, now)?;
            loans::reject_other_pending(&tx, item_id, loan_request_id, now)?;
            loans::mark_loaned(&tx, item_id, request.requester_user_id, now)?;
            tx.commit()?;

            load_item(conn, item_id)
        })
        .await?;

    info!(
        item_id,
        loan_request_id,
        borrower_user_id = ?item.borrower_user_id,
        "Loan request accepted"
    );
    Ok(item)
}

pub async fn reject_loan_request(
    storage: &Storage,
    actor: &Actor,
    item_id: i64,
    loan_request_id: i64,
) -> Result<LoanRequest> {
    let actor = actor.clone();
    let request = storage
        .interact(move |conn| {
            managed_item(conn, &actor, item_id, "reject loan requests")?;
            pending_request(conn, item_id, loan_request_id)?;

            loans::respond_loan_request(
                conn,
                loan_request_id,
                LoanRequestStatus::Rejected,
                Utc::now(),
            )?;
            loans::get_loan_request(conn, item_id, loan_request_id)?
                .ok_or_else(AuzolanError::not_found)
        })
        .await?;

    info!(item_id, loan_request_id, "Loan request rejected");
    Ok(request)
}

pub async fn mark_returned(storage: &Storage, actor: &Actor, item_id: i64) -> Result<LoanItem> {
    let actor = actor.clone();
    let item = storage
        .interact(move |conn| {
            let item = managed_item(conn, &actor, item_id, "mark the return")?;
            if item.status != LoanStatus::Loaned {
                return Err(AuzolanError::BadRequest(
                    "The item is not marked as loaned.".to_string(),
                ));
            }

            loans::mark_returned(conn, item_id, Utc::now())?;
            load_item(conn, item_id)
        })
        .await?;

    info!(item_id, "Loan item returned");
    Ok(item)
}

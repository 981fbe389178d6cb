//! Help requests, volunteer offers and moderator actions on requests

use super::permissions::{
    is_moderator_in_community, is_owner_or_superadmin, require_community_param, require_member,
    require_moderator,
};
use super::validate::{
    deserialize_nullable, integer_field, is_truthy, nullable_integer_field, optional_text,
    present_blankable, present_text, required_text,
};
use crate::error::{AuzolanError, Result};
use crate::pagination::{PageRequest, Paginated};
use crate::storage::requests::{NewRequest, RequestChanges, RequestFilter};
use crate::storage::{chat, communities, requests, Storage};
use crate::types::{Actor, HelpRequest, OfferStatus, RequestDetail, RequestStatus, VolunteerOffer};
use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

const TITLE_MAX: usize = 120;
const CATEGORY_MAX: usize = 60;
const SHORT_TEXT_MAX: usize = 120;
const OFFER_MESSAGE_MAX: usize = 280;

/// Raw list query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestListQuery {
    pub community_id: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub mine: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateRequestInput {
    pub community_id: Option<Value>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub time_window_text: Option<String>,
    pub location_area_text: Option<String>,
    pub location_radius_km: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRequestInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub time_window_text: Option<String>,
    pub location_area_text: Option<String>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub location_radius_km: Option<Option<Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloseInput {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfferInput {
    pub message: Option<String>,
}

fn load_request(conn: &Connection, request_id: i64) -> Result<HelpRequest> {
    requests::get_request(conn, request_id)?.ok_or_else(AuzolanError::not_found)
}

fn duplicate_offer() -> AuzolanError {
    AuzolanError::BadRequest("You already made an offer on this request.".to_string())
}

/// Closing target: resolved or cancelled only
fn closing_status(value: Option<&str>, message: &str) -> Result<RequestStatus> {
    value
        .and_then(RequestStatus::parse)
        .filter(RequestStatus::is_closing)
        .ok_or_else(|| AuzolanError::BadRequest(message.to_string()))
}

fn ensure_closable(request: &HelpRequest) -> Result<()> {
    if request.status.is_active() {
        Ok(())
    } else {
        Err(AuzolanError::BadRequest(
            "The request cannot be closed in its current state.".to_string(),
        ))
    }
}

fn ensure_open(request: &HelpRequest) -> Result<()> {
    if request.status == RequestStatus::Open {
        Ok(())
    } else {
        Err(AuzolanError::BadRequest("The request is not open.".to_string()))
    }
}

pub async fn list_requests(
    storage: &Storage,
    actor: &Actor,
    query: RequestListQuery,
    page: PageRequest,
) -> Result<Paginated<HelpRequest>> {
    let community_id = require_community_param(query.community_id.as_deref())?;
    let actor = actor.clone();

    storage
        .interact(move |conn| {
            require_member(conn, &actor, community_id)?;

            let filter = RequestFilter {
                community_id,
                status: query.status.filter(|s| !s.is_empty()),
                category: query.category.filter(|c| !c.is_empty()),
                created_by: is_truthy(query.mine.as_deref()).then_some(actor.id),
                oldest_first: query.order.as_deref() == Some("oldest"),
            };

            let count = requests::count_requests(conn, &filter)?;
            page.ensure_in_range(count)?;
            let results = requests::list_requests(conn, &filter, page.limit(), page.offset())?;
            Ok(Paginated {
                request: page,
                count,
                results,
            })
        })
        .await
}

pub async fn create_request(
    storage: &Storage,
    actor: &Actor,
    input: CreateRequestInput,
) -> Result<HelpRequest> {
    let community_id = integer_field("community_id", input.community_id.as_ref())?;
    let new = NewRequest {
        community_id,
        title: required_text("title", input.title, Some(TITLE_MAX))?,
        description: required_text("description", input.description, None)?,
        category: required_text("category", input.category, Some(CATEGORY_MAX))?,
        time_window_text: optional_text("time_window_text", input.time_window_text, SHORT_TEXT_MAX)?,
        location_area_text: optional_text(
            "location_area_text",
            input.location_area_text,
            SHORT_TEXT_MAX,
        )?,
        location_radius_km: nullable_integer_field(
            "location_radius_km",
            input.location_radius_km.as_ref(),
        )?,
    };
    let actor = actor.clone();

    let request = storage
        .interact(move |conn| {
            if !communities::community_exists(conn, community_id)? {
                return Err(AuzolanError::validation(
                    "community_id",
                    format!("Invalid pk \"{}\" - object does not exist.", community_id),
                ));
            }
            require_member(conn, &actor, community_id)?;

            let id = requests::insert_request(conn, actor.id, &new, Utc::now())?;
            load_request(conn, id)
        })
        .await?;

    info!(
        request_id = request.id,
        community_id = request.community_id,
        "Request created"
    );
    Ok(request)
}

/// Request plus the actions open to the caller
pub async fn request_detail(
    storage: &Storage,
    actor: &Actor,
    request_id: i64,
) -> Result<RequestDetail> {
    let actor = actor.clone();
    storage
        .interact(move |conn| {
            let request = load_request(conn, request_id)?;
            require_member(conn, &actor, request.community_id)?;

            let is_creator = request.created_by_user_id == actor.id;
            let can_offer = request.status == RequestStatus::Open
                && !is_creator
                && !requests::has_offer_from(conn, request.id, actor.id)?;
            let can_accept = request.status == RequestStatus::Open
                && is_owner_or_superadmin(&actor, request.created_by_user_id);
            let can_close = request.status.is_active()
                && is_owner_or_superadmin(&actor, request.created_by_user_id);
            let can_moderate = is_moderator_in_community(conn, &actor, request.community_id)?;

            Ok(RequestDetail {
                offers_count: request.offers_count,
                accepted_offer_id: request.accepted_offer_id,
                request,
                can_offer,
                can_accept,
                can_close,
                can_moderate,
            })
        })
        .await
}

pub async fn update_request(
    storage: &Storage,
    actor: &Actor,
    request_id: i64,
    input: UpdateRequestInput,
) -> Result<HelpRequest> {
    let actor = actor.clone();
    storage
        .interact(move |conn| {
            let request = load_request(conn, request_id)?;
            require_member(conn, &actor, request.community_id)?;
            if !is_owner_or_superadmin(&actor, request.created_by_user_id) {
                return Err(AuzolanError::Forbidden(
                    "Only the creator can edit this request.".to_string(),
                ));
            }
            if request.status != RequestStatus::Open {
                return Err(AuzolanError::BadRequest(
                    "Only open requests can be edited.".to_string(),
                ));
            }

            let changes = RequestChanges {
                title: present_text("title", input.title, Some(TITLE_MAX))?,
                description: present_text("description", input.description, None)?,
                category: present_text("category", input.category, Some(CATEGORY_MAX))?,
                time_window_text: present_blankable(
                    "time_window_text",
                    input.time_window_text,
                    SHORT_TEXT_MAX,
                )?,
                location_area_text: present_blankable(
                    "location_area_text",
                    input.location_area_text,
                    SHORT_TEXT_MAX,
                )?,
                location_radius_km: input
                    .location_radius_km
                    .map(|radius| nullable_integer_field("location_radius_km", radius.as_ref()))
                    .transpose()?,
            };

            requests::update_request(conn, request_id, &changes, Utc::now())?;
            load_request(conn, request_id)
        })
        .await
}

/// Creator (or superadmin) closes their own request
pub async fn close_request(
    storage: &Storage,
    actor: &Actor,
    request_id: i64,
    input: CloseInput,
) -> Result<HelpRequest> {
    let actor = actor.clone();
    let request = storage
        .interact(move |conn| {
            let request = load_request(conn, request_id)?;
            require_member(conn, &actor, request.community_id)?;
            if !is_owner_or_superadmin(&actor, request.created_by_user_id) {
                return Err(AuzolanError::Forbidden(
                    "Only the creator can close this request.".to_string(),
                ));
            }
            let status = closing_status(input.status.as_deref(), "Invalid status.")?;
            ensure_closable(&request)?;

            requests::close_request(conn, request_id, status, Utc::now())?;
            load_request(conn, request_id)
        })
        .await?;

    info!(request_id, status = %request.status, "Request closed");
    Ok(request)
}

/// Offers on a request, visible to its creator and to moderators
pub async fn list_offers(
    storage: &Storage,
    actor: &Actor,
    request_id: i64,
) -> Result<Vec<VolunteerOffer>> {
    let actor = actor.clone();
    storage
        .interact(move |conn| {
            let request = load_request(conn, request_id)?;
            require_member(conn, &actor, request.community_id)?;
            if request.created_by_user_id != actor.id
                && !is_moderator_in_community(conn, &actor, request.community_id)?
            {
                return Err(AuzolanError::Forbidden(
                    "You do not have permission to see these offers.".to_string(),
                ));
            }
            requests::list_offers(conn, request_id)
        })
        .await
}

pub async fn create_offer(
    storage: &Storage,
    actor: &Actor,
    request_id: i64,
    input: OfferInput,
) -> Result<VolunteerOffer> {
    let actor = actor.clone();
    let offer = storage
        .interact(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let request = load_request(&tx, request_id)?;
            require_member(&tx, &actor, request.community_id)?;
            ensure_open(&request)?;
            if request.created_by_user_id == actor.id && !actor.is_superadmin {
                return Err(AuzolanError::BadRequest(
                    "You cannot volunteer for your own request.".to_string(),
                ));
            }
            if requests::has_offer_from(&tx, request_id, actor.id)? {
                return Err(duplicate_offer());
            }

            let message = optional_text("message", input.message, OFFER_MESSAGE_MAX)?;
            let id = requests::insert_offer(&tx, request_id, actor.id, &message, Utc::now())
                .map_err(|e| if e.is_constraint_violation() { duplicate_offer() } else { e })?;
            tx.commit()?;

            requests::get_offer(conn, id)?.ok_or_else(AuzolanError::not_found)
        })
        .await?;

    info!(request_id, offer_id = offer.id, "Offer created");
    Ok(offer)
}

/// Accept one offer in a single immediate transaction
///
/// The chosen offer becomes accepted, every other offer is rejected, the
/// request moves to in_progress and its conversation is opened.
pub async fn accept_offer(
    storage: &Storage,
    actor: &Actor,
    request_id: i64,
    offer_id: i64,
) -> Result<HelpRequest> {
    let actor = actor.clone();
    let request = storage
        .interact(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let request = load_request(&tx, request_id)?;
            require_member(&tx, &actor, request.community_id)?;
            if !is_owner_or_superadmin(&actor, request.created_by_user_id) {
                return Err(AuzolanError::Forbidden(
                    "Only the creator can accept offers.".to_string(),
                ));
            }
            ensure_open(&request)?;

            let offer = requests::get_offer(&tx, offer_id)?
                .filter(|offer| offer.request_id == request_id)
                .ok_or_else(AuzolanError::not_found)?;
            if offer.status != OfferStatus::Offered {
                return Err(AuzolanError::BadRequest(
                    "The offer is no longer available.".to_string(),
                ));
            }

            let now = Utc::now();
            requests::set_offer_status(&tx, offer_id, OfferStatus::Accepted, now)?;
            requests::reject_other_offers(&tx, request_id, offer_id, now)?;
            requests::start_progress(&tx, request_id, offer_id, now)?;
            chat::get_or_create_conversation(&tx, request_id, now)?;
            tx.commit()?;

            load_request(conn, request_id)
        })
        .await?;

    info!(request_id, offer_id, "Offer accepted");
    Ok(request)
}

/// Moderator close; the status defaults to cancelled
pub async fn moderation_close(
    storage: &Storage,
    actor: &Actor,
    request_id: i64,
    input: CloseInput,
) -> Result<HelpRequest> {
    let actor_user_id = actor.id;
    let actor = actor.clone();
    let request = storage
        .interact(move |conn| {
            let request = load_request(conn, request_id)?;
            require_moderator(conn, &actor, request.community_id)?;
            let status = closing_status(
                Some(input.status.as_deref().unwrap_or(RequestStatus::Cancelled.as_str())),
                "Invalid status for moderation.",
            )?;
            ensure_closable(&request)?;

            requests::close_request(conn, request_id, status, Utc::now())?;
            load_request(conn, request_id)
        })
        .await?;

    info!(
        request_id,
        actor_user_id,
        status = %request.status,
        "Moderation closed request"
    );
    Ok(request)
}

/// Moderator delete of a request and everything attached to it
pub async fn moderation_delete(storage: &Storage, actor: &Actor, request_id: i64) -> Result<()> {
    let actor_user_id = actor.id;
    let actor = actor.clone();
    let community_id = storage
        .interact(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let request = load_request(&tx, request_id)?;
            require_moderator(&tx, &actor, request.community_id)?;
            requests::delete_request(&tx, request_id)?;
            tx.commit()?;
            Ok(request.community_id)
        })
        .await?;

    info!(
        request_id,
        community_id,
        actor_user_id,
        "Moderation deleted request"
    );
    Ok(())
}

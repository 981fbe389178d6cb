//! Conversation between a request's creator and its accepted volunteer

use super::permissions::{is_participant, require_member};
use super::validate::required_text;
use crate::error::{AuzolanError, Result};
use crate::pagination::{PageRequest, Paginated};
use crate::storage::{chat, requests, Storage};
use crate::types::{Actor, HelpRequest, Message};
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationHandle {
    pub conversation_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageInput {
    pub body: Option<String>,
}

fn access_denied() -> AuzolanError {
    AuzolanError::Forbidden("Access denied.".to_string())
}

/// Load the conversation's request and check the caller may take part
fn authorize(conn: &Connection, actor: &Actor, conversation_id: i64) -> Result<HelpRequest> {
    let (_, request_id) =
        chat::get_conversation(conn, conversation_id)?.ok_or_else(AuzolanError::not_found)?;
    let request = requests::get_request(conn, request_id)?.ok_or_else(AuzolanError::not_found)?;

    require_member(conn, actor, request.community_id)?;
    if !is_participant(conn, actor, &request)? {
        return Err(access_denied());
    }
    Ok(request)
}

/// Get-or-create the conversation of a request with an accepted volunteer
pub async fn conversation_for_request(
    storage: &Storage,
    actor: &Actor,
    request_id: i64,
) -> Result<ConversationHandle> {
    let actor = actor.clone();
    storage
        .interact(move |conn| {
            let request =
                requests::get_request(conn, request_id)?.ok_or_else(AuzolanError::not_found)?;
            require_member(conn, &actor, request.community_id)?;
            if request.accepted_offer_id.is_none() {
                return Err(AuzolanError::BadRequest(
                    "There is no accepted volunteer yet.".to_string(),
                ));
            }
            if !is_participant(conn, &actor, &request)? {
                return Err(access_denied());
            }

            let conversation_id = chat::get_or_create_conversation(conn, request_id, Utc::now())?;
            Ok(ConversationHandle { conversation_id })
        })
        .await
}

/// Messages, newest first
pub async fn list_messages(
    storage: &Storage,
    actor: &Actor,
    conversation_id: i64,
    page: PageRequest,
) -> Result<Paginated<Message>> {
    let actor = actor.clone();
    storage
        .interact(move |conn| {
            authorize(conn, &actor, conversation_id)?;

            let count = chat::count_messages(conn, conversation_id)?;
            page.ensure_in_range(count)?;
            let results = chat::list_messages(conn, conversation_id, page.limit(), page.offset())?;
            Ok(Paginated {
                request: page,
                count,
                results,
            })
        })
        .await
}

/// Post a message while help is in progress or after it was resolved
pub async fn post_message(
    storage: &Storage,
    actor: &Actor,
    conversation_id: i64,
    input: MessageInput,
) -> Result<Message> {
    let actor = actor.clone();
    let message = storage
        .interact(move |conn| {
            let request = authorize(conn, &actor, conversation_id)?;
            if !request.status.allows_chat() {
                return Err(AuzolanError::BadRequest("Chat is not enabled.".to_string()));
            }

            let body = required_text("body", input.body, None)?;
            chat::insert_message(conn, conversation_id, actor.id, &body, Utc::now())
        })
        .await?;

    debug!(
        conversation_id,
        message_id = message.id,
        sender_user_id = message.sender_user_id,
        "Message posted"
    );
    Ok(message)
}

//! Request conversations and their messages

use super::extract::{link_base, ApiJson, ApiPath, AuthUser};
use super::state::AppState;
use crate::error::Result;
use crate::pagination::{Page, PageQuery};
use crate::services::chat::{self, ConversationHandle, MessageInput};
use crate::types::Message;
use axum::{
    extract::{Query, State},
    http::{StatusCode, Uri},
    Json,
};

pub async fn conversation(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(request_id): ApiPath<i64>,
) -> Result<Json<ConversationHandle>> {
    Ok(Json(chat::conversation_for_request(&state.storage, &actor, request_id).await?))
}

pub async fn list_messages(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(conversation_id): ApiPath<i64>,
    Query(page): Query<PageQuery>,
    uri: Uri,
) -> Result<Json<Page<Message>>> {
    let page = state.page(&page)?;
    let messages = chat::list_messages(&state.storage, &actor, conversation_id, page).await?;
    Ok(Json(messages.into_page(link_base(&uri))))
}

pub async fn post_message(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(conversation_id): ApiPath<i64>,
    ApiJson(input): ApiJson<MessageInput>,
) -> Result<(StatusCode, Json<Message>)> {
    let message = chat::post_message(&state.storage, &actor, conversation_id, input).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

//! Conversations and messages

use crate::error::Result;
use crate::types::Message;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Conversation row: `(id, request_id)`
pub type ConversationRef = (i64, i64);

/// Get-or-create the conversation attached to a request
pub fn get_or_create_conversation(
    conn: &Connection,
    request_id: i64,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO conversations (request_id, created_at) VALUES (?1, ?2)",
        params![request_id, now],
    )?;
    Ok(conn.query_row(
        "SELECT id FROM conversations WHERE request_id = ?1",
        [request_id],
        |row| row.get(0),
    )?)
}

pub fn get_conversation(conn: &Connection, id: i64) -> Result<Option<ConversationRef>> {
    Ok(conn
        .query_row(
            "SELECT id, request_id FROM conversations WHERE id = ?1",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?)
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_user_id: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn insert_message(
    conn: &Connection,
    conversation_id: i64,
    sender_user_id: i64,
    body: &str,
    now: DateTime<Utc>,
) -> Result<Message> {
    conn.execute(
        "INSERT INTO messages (conversation_id, sender_user_id, body, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![conversation_id, sender_user_id, body, now],
    )?;

    Ok(Message {
        id: conn.last_insert_rowid(),
        conversation_id,
        sender_user_id,
        body: body.to_string(),
        created_at: now,
    })
}

pub fn count_messages(conn: &Connection, conversation_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
        [conversation_id],
        |row| row.get(0),
    )?)
}

/// Messages newest first
pub fn list_messages(
    conn: &Connection,
    conversation_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, conversation_id, sender_user_id, body, created_at
        FROM messages WHERE conversation_id = ?1
        ORDER BY created_at DESC, id DESC
        LIMIT ?2 OFFSET ?3
        "#,
    )?;
    let rows = stmt.query_map(params![conversation_id, limit, offset], message_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

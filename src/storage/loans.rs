//! Loan items and loan requests

use crate::error::Result;
use crate::types::{resolve_display_name, LoanItem, LoanRequest, LoanRequestStatus, LoanStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// List filter; `community_id` is always required
#[derive(Debug, Clone, Default)]
pub struct LoanFilter {
    pub community_id: i64,
    pub status: Option<LoanStatus>,
    pub owner: Option<i64>,
    pub oldest_first: bool,
}

const ITEM_SELECT: &str = r#"
    SELECT i.id, i.community_id, i.owner_user_id, ou.email, op.display_name,
           i.title, i.description, i.status,
           i.borrower_user_id, bu.email, bp.display_name,
           i.loaned_at, i.returned_at,
           (SELECT COUNT(*) FROM loan_requests lr
             WHERE lr.item_id = i.id AND lr.status = 'pending') AS pending_requests_count,
           i.created_at, i.updated_at
    FROM loan_items i
    JOIN users ou ON ou.id = i.owner_user_id
    LEFT JOIN profiles op ON op.user_id = ou.id
    LEFT JOIN users bu ON bu.id = i.borrower_user_id
    LEFT JOIN profiles bp ON bp.user_id = bu.id
"#;

const FILTER_CLAUSE: &str = r#"
    WHERE i.community_id = ?1
      AND (?2 IS NULL OR i.status = ?2)
      AND (?3 IS NULL OR i.owner_user_id = ?3)
"#;

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<LoanItem> {
    let owner_user_id: i64 = row.get(2)?;
    let owner_email: String = row.get(3)?;
    let owner_name: Option<String> = row.get(4)?;
    let borrower_user_id: Option<i64> = row.get(8)?;
    let borrower_email: Option<String> = row.get(9)?;
    let borrower_name: Option<String> = row.get(10)?;

    let borrower_display_name = match (borrower_user_id, borrower_email) {
        (Some(id), Some(email)) => resolve_display_name(id, &email, borrower_name.as_deref()),
        _ => String::new(),
    };

    Ok(LoanItem {
        id: row.get(0)?,
        community_id: row.get(1)?,
        owner_user_id,
        owner_display_name: resolve_display_name(
            owner_user_id,
            &owner_email,
            owner_name.as_deref(),
        ),
        title: row.get(5)?,
        description: row.get(6)?,
        status: row.get(7)?,
        borrower_user_id,
        borrower_display_name,
        loaned_at: row.get(11)?,
        returned_at: row.get(12)?,
        pending_requests_count: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

pub fn insert_item(
    conn: &Connection,
    community_id: i64,
    owner_user_id: i64,
    title: &str,
    description: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO loan_items (community_id, owner_user_id, title, description, status, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, 'available', ?5, ?5)
        "#,
        params![community_id, owner_user_id, title, description, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_item(conn: &Connection, id: i64) -> Result<Option<LoanItem>> {
    let sql = format!("{} WHERE i.id = ?1", ITEM_SELECT);
    Ok(conn.query_row(&sql, [id], item_from_row).optional()?)
}

pub fn count_items(conn: &Connection, filter: &LoanFilter) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM loan_items i {}", FILTER_CLAUSE);
    Ok(conn.query_row(
        &sql,
        params![filter.community_id, filter.status, filter.owner],
        |row| row.get(0),
    )?)
}

pub fn list_items(
    conn: &Connection,
    filter: &LoanFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<LoanItem>> {
    let order = if filter.oldest_first {
        "i.created_at ASC, i.id ASC"
    } else {
        "i.created_at DESC, i.id DESC"
    };
    let sql = format!(
        "{} {} ORDER BY {} LIMIT ?4 OFFSET ?5",
        ITEM_SELECT, FILTER_CLAUSE, order
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![filter.community_id, filter.status, filter.owner, limit, offset],
        item_from_row,
    )?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Partial edit of title/description; `None` keeps the stored value
pub fn update_item(
    conn: &Connection,
    id: i64,
    title: Option<&str>,
    description: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        r#"
        UPDATE loan_items SET
            title = COALESCE(?1, title),
            description = COALESCE(?2, description),
            updated_at = ?3
        WHERE id = ?4
        "#,
        params![title, description, now, id],
    )?;
    Ok(())
}

/// Hand the item to a borrower
pub fn mark_loaned(
    conn: &Connection,
    id: i64,
    borrower_user_id: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        r#"
        UPDATE loan_items SET
            status = 'loaned', borrower_user_id = ?1,
            loaned_at = ?2, returned_at = NULL, updated_at = ?2
        WHERE id = ?3
        "#,
        params![borrower_user_id, now, id],
    )?;
    Ok(())
}

pub fn mark_returned(conn: &Connection, id: i64, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        r#"
        UPDATE loan_items SET
            status = 'available', borrower_user_id = NULL,
            returned_at = ?1, updated_at = ?1
        WHERE id = ?2
        "#,
        params![now, id],
    )?;
    Ok(())
}

const REQUEST_SELECT: &str = r#"
    SELECT lr.id, lr.item_id, lr.requester_user_id, u.email, p.display_name,
           lr.message, lr.status, lr.responded_at, lr.created_at, lr.updated_at
    FROM loan_requests lr
    JOIN users u ON u.id = lr.requester_user_id
    LEFT JOIN profiles p ON p.user_id = u.id
"#;

fn loan_request_from_row(row: &Row<'_>) -> rusqlite::Result<LoanRequest> {
    let requester_user_id: i64 = row.get(2)?;
    let email: String = row.get(3)?;
    let display_name: Option<String> = row.get(4)?;

    Ok(LoanRequest {
        id: row.get(0)?,
        item_id: row.get(1)?,
        requester_user_id,
        requester_display_name: resolve_display_name(
            requester_user_id,
            &email,
            display_name.as_deref(),
        ),
        message: row.get(5)?,
        status: row.get(6)?,
        responded_at: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub fn insert_loan_request(
    conn: &Connection,
    item_id: i64,
    requester_user_id: i64,
    message: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO loan_requests (item_id, requester_user_id, message, status, created_at, updated_at)
        VALUES (?1, ?2, ?3, 'pending', ?4, ?4)
        "#,
        params![item_id, requester_user_id, message, now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Loan request scoped to its item
pub fn get_loan_request(
    conn: &Connection,
    item_id: i64,
    id: i64,
) -> Result<Option<LoanRequest>> {
    let sql = format!("{} WHERE lr.id = ?1 AND lr.item_id = ?2", REQUEST_SELECT);
    Ok(conn
        .query_row(&sql, [id, item_id], loan_request_from_row)
        .optional()?)
}

pub fn has_pending_request(conn: &Connection, item_id: i64, user_id: i64) -> Result<bool> {
    Ok(conn.query_row(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM loan_requests
            WHERE item_id = ?1 AND requester_user_id = ?2 AND status = 'pending'
        )
        "#,
        [item_id, user_id],
        |row| row.get(0),
    )?)
}

pub fn count_loan_requests(conn: &Connection, item_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM loan_requests WHERE item_id = ?1",
        [item_id],
        |row| row.get(0),
    )?)
}

/// Requests on an item, newest first
pub fn list_loan_requests(
    conn: &Connection,
    item_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<LoanRequest>> {
    let sql = format!(
        "{} WHERE lr.item_id = ?1 ORDER BY lr.created_at DESC, lr.id DESC LIMIT ?2 OFFSET ?3",
        REQUEST_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![item_id, limit, offset], loan_request_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Record an answer to a loan request
pub fn respond_loan_request(
    conn: &Connection,
    id: i64,
    status: LoanRequestStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE loan_requests SET status = ?1, responded_at = ?2, updated_at = ?2 WHERE id = ?3",
        params![status, now, id],
    )?;
    Ok(())
}

/// Reject every other pending request on the item
pub fn reject_other_pending(
    conn: &Connection,
    item_id: i64,
    keep_request_id: i64,
    now: DateTime<Utc>,
) -> Result<usize> {
    Ok(conn.execute(
        r#"
        UPDATE loan_requests SET status = 'rejected', responded_at = ?1, updated_at = ?1
        WHERE item_id = ?2 AND status = 'pending' AND id != ?3
        "#,
        params![now, item_id, keep_request_id],
    )?)
}

/// Remove every item of a community; loan requests cascade
pub fn delete_items_in_community(conn: &Connection, community_id: i64) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM loan_items WHERE community_id = ?1",
        [community_id],
    )?)
}

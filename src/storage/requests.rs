//! Help requests and volunteer offers

use crate::error::Result;
use crate::types::{resolve_display_name, HelpRequest, OfferStatus, RequestStatus, VolunteerOffer};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Fields a creator supplies for a new request
#[derive(Debug, Clone, Default)]
pub struct NewRequest {
    pub community_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub time_window_text: String,
    pub location_area_text: String,
    pub location_radius_km: Option<i64>,
}

/// Partial edit of an open request; `None` keeps the stored value
///
/// `location_radius_km` is doubly optional: `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct RequestChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub time_window_text: Option<String>,
    pub location_area_text: Option<String>,
    pub location_radius_km: Option<Option<i64>>,
}

/// List filter; `community_id` is always required
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub community_id: i64,
    pub status: Option<String>,
    pub category: Option<String>,
    pub created_by: Option<i64>,
    pub oldest_first: bool,
}

const REQUEST_SELECT: &str = r#"
    SELECT r.id, r.community_id, r.created_by_user_id, u.email, p.display_name,
           r.title, r.description, r.category, r.time_window_text, r.location_area_text,
           r.location_radius_km, r.status, r.accepted_offer_id,
           (SELECT COUNT(*) FROM volunteer_offers o WHERE o.request_id = r.id) AS offers_count,
           r.created_at, r.updated_at, r.closed_at
    FROM requests r
    JOIN users u ON u.id = r.created_by_user_id
    LEFT JOIN profiles p ON p.user_id = u.id
"#;

const FILTER_CLAUSE: &str = r#"
    WHERE r.community_id = ?1
      AND (?2 IS NULL OR r.status = ?2)
      AND (?3 IS NULL OR r.category = ?3)
      AND (?4 IS NULL OR r.created_by_user_id = ?4)
"#;

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<HelpRequest> {
    let created_by_user_id: i64 = row.get(2)?;
    let email: String = row.get(3)?;
    let display_name: Option<String> = row.get(4)?;

    Ok(HelpRequest {
        id: row.get(0)?,
        community_id: row.get(1)?,
        created_by_user_id,
        created_by_display_name: resolve_display_name(
            created_by_user_id,
            &email,
            display_name.as_deref(),
        ),
        title: row.get(5)?,
        description: row.get(6)?,
        category: row.get(7)?,
        time_window_text: row.get(8)?,
        location_area_text: row.get(9)?,
        location_radius_km: row.get(10)?,
        status: row.get(11)?,
        accepted_offer_id: row.get(12)?,
        offers_count: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
        closed_at: row.get(16)?,
    })
}

pub fn insert_request(
    conn: &Connection,
    created_by: i64,
    new: &NewRequest,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO requests (
            community_id, created_by_user_id, title, description, category,
            time_window_text, location_area_text, location_radius_km,
            status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'open', ?9, ?9)
        "#,
        params![
            new.community_id,
            created_by,
            new.title,
            new.description,
            new.category,
            new.time_window_text,
            new.location_area_text,
            new.location_radius_km,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_request(conn: &Connection, id: i64) -> Result<Option<HelpRequest>> {
    let sql = format!("{} WHERE r.id = ?1", REQUEST_SELECT);
    Ok(conn.query_row(&sql, [id], request_from_row).optional()?)
}

pub fn count_requests(conn: &Connection, filter: &RequestFilter) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM requests r {}", FILTER_CLAUSE);
    Ok(conn.query_row(
        &sql,
        params![
            filter.community_id,
            filter.status,
            filter.category,
            filter.created_by
        ],
        |row| row.get(0),
    )?)
}

pub fn list_requests(
    conn: &Connection,
    filter: &RequestFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<HelpRequest>> {
    let order = if filter.oldest_first {
        "r.created_at ASC, r.id ASC"
    } else {
        "r.created_at DESC, r.id DESC"
    };
    let sql = format!(
        "{} {} ORDER BY {} LIMIT ?5 OFFSET ?6",
        REQUEST_SELECT, FILTER_CLAUSE, order
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![
            filter.community_id,
            filter.status,
            filter.category,
            filter.created_by,
            limit,
            offset
        ],
        request_from_row,
    )?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn update_request(
    conn: &Connection,
    id: i64,
    changes: &RequestChanges,
    now: DateTime<Utc>,
) -> Result<()> {
    let radius_set = changes.location_radius_km.is_some();
    let radius = changes.location_radius_km.flatten();

    conn.execute(
        r#"
        UPDATE requests SET
            title = COALESCE(?1, title),
            description = COALESCE(?2, description),
            category = COALESCE(?3, category),
            time_window_text = COALESCE(?4, time_window_text),
            location_area_text = COALESCE(?5, location_area_text),
            location_radius_km = CASE WHEN ?6 THEN ?7 ELSE location_radius_km END,
            updated_at = ?8
        WHERE id = ?9
        "#,
        params![
            changes.title,
            changes.description,
            changes.category,
            changes.time_window_text,
            changes.location_area_text,
            radius_set,
            radius,
            now,
            id,
        ],
    )?;
    Ok(())
}

/// Move a request to resolved/cancelled and stamp `closed_at`
pub fn close_request(
    conn: &Connection,
    id: i64,
    status: RequestStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE requests SET status = ?1, closed_at = ?2, updated_at = ?2 WHERE id = ?3",
        params![status, now, id],
    )?;
    Ok(())
}

/// Mark the request as being helped by the given offer
pub fn start_progress(
    conn: &Connection,
    id: i64,
    accepted_offer_id: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE requests SET status = 'in_progress', accepted_offer_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![accepted_offer_id, now, id],
    )?;
    Ok(())
}

/// Delete a request and everything hanging off it
///
/// Run inside a transaction. Children are removed explicitly because the
/// request and its accepted offer reference each other.
pub fn delete_request(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM messages WHERE conversation_id IN (SELECT id FROM conversations WHERE request_id = ?1)",
        [id],
    )?;
    conn.execute("DELETE FROM conversations WHERE request_id = ?1", [id])?;
    conn.execute("DELETE FROM reports WHERE request_id = ?1", [id])?;
    conn.execute(
        "UPDATE requests SET accepted_offer_id = NULL WHERE id = ?1",
        [id],
    )?;
    conn.execute("DELETE FROM volunteer_offers WHERE request_id = ?1", [id])?;
    conn.execute("DELETE FROM requests WHERE id = ?1", [id])?;
    Ok(())
}

/// Ids of every request in a community, oldest first
pub fn request_ids_in_community(conn: &Connection, community_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM requests WHERE community_id = ?1 ORDER BY id")?;
    let rows = stmt.query_map([community_id], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

const OFFER_SELECT: &str = r#"
    SELECT o.id, o.request_id, o.volunteer_user_id, u.email, p.display_name,
           o.message, o.status, o.created_at, o.updated_at
    FROM volunteer_offers o
    JOIN users u ON u.id = o.volunteer_user_id
    LEFT JOIN profiles p ON p.user_id = u.id
"#;

fn offer_from_row(row: &Row<'_>) -> rusqlite::Result<VolunteerOffer> {
    let volunteer_user_id: i64 = row.get(2)?;
    let email: String = row.get(3)?;
    let display_name: Option<String> = row.get(4)?;

    Ok(VolunteerOffer {
        id: row.get(0)?,
        request_id: row.get(1)?,
        volunteer_user_id,
        volunteer_display_name: resolve_display_name(
            volunteer_user_id,
            &email,
            display_name.as_deref(),
        ),
        message: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub fn insert_offer(
    conn: &Connection,
    request_id: i64,
    volunteer_user_id: i64,
    message: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO volunteer_offers (request_id, volunteer_user_id, message, status, created_at, updated_at)
        VALUES (?1, ?2, ?3, 'offered', ?4, ?4)
        "#,
        params![request_id, volunteer_user_id, message, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_offer(conn: &Connection, id: i64) -> Result<Option<VolunteerOffer>> {
    let sql = format!("{} WHERE o.id = ?1", OFFER_SELECT);
    Ok(conn.query_row(&sql, [id], offer_from_row).optional()?)
}

/// Offers on a request, newest first
pub fn list_offers(conn: &Connection, request_id: i64) -> Result<Vec<VolunteerOffer>> {
    let sql = format!(
        "{} WHERE o.request_id = ?1 ORDER BY o.created_at DESC, o.id DESC",
        OFFER_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([request_id], offer_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn has_offer_from(conn: &Connection, request_id: i64, user_id: i64) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM volunteer_offers WHERE request_id = ?1 AND volunteer_user_id = ?2)",
        [request_id, user_id],
        |row| row.get(0),
    )?)
}

pub fn set_offer_status(
    conn: &Connection,
    offer_id: i64,
    status: OfferStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE volunteer_offers SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status, now, offer_id],
    )?;
    Ok(())
}

/// Reject every offer on the request except `keep_offer_id`
pub fn reject_other_offers(
    conn: &Connection,
    request_id: i64,
    keep_offer_id: i64,
    now: DateTime<Utc>,
) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE volunteer_offers SET status = 'rejected', updated_at = ?1 WHERE request_id = ?2 AND id != ?3",
        params![now, request_id, keep_offer_id],
    )?)
}

/// Volunteer of the request's accepted offer, if any
pub fn accepted_volunteer(conn: &Connection, request_id: i64) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            r#"
            SELECT o.volunteer_user_id
            FROM requests r JOIN volunteer_offers o ON o.id = r.accepted_offer_id
            WHERE r.id = ?1
            "#,
            [request_id],
            |row| row.get(0),
        )
        .optional()?)
}

//! Communities and memberships

use crate::error::Result;
use crate::types::{
    resolve_display_name, Community, CommunityMember, CommunityRole, Membership,
    MembershipStatus, MembershipSummary,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Get-or-create a community by exact name
pub fn ensure_community(
    conn: &Connection,
    name: &str,
    description: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM communities WHERE name = ?1 ORDER BY id LIMIT 1",
            [name],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    insert_community(conn, name, description, now)
}

pub fn insert_community(
    conn: &Connection,
    name: &str,
    description: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO communities (name, description, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![name, description, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_communities(conn: &Connection) -> Result<Vec<Community>> {
    let mut stmt = conn.prepare("SELECT id, name, description FROM communities ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(Community {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn get_community(conn: &Connection, id: i64) -> Result<Option<Community>> {
    Ok(conn
        .query_row(
            "SELECT id, name, description FROM communities WHERE id = ?1",
            [id],
            |row| {
                Ok(Community {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                })
            },
        )
        .optional()?)
}

pub fn community_exists(conn: &Connection, id: i64) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM communities WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?)
}

pub fn all_community_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM communities ORDER BY id")?;
    let ids = stmt.query_map([], |row| row.get(0))?;
    Ok(ids.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn membership_from_row(row: &Row<'_>) -> rusqlite::Result<Membership> {
    Ok(Membership {
        user_id: row.get(0)?,
        community_id: row.get(1)?,
        status: row.get(2)?,
        role_in_community: row.get(3)?,
        joined_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub fn get_membership(
    conn: &Connection,
    user_id: i64,
    community_id: i64,
) -> Result<Option<Membership>> {
    Ok(conn
        .query_row(
            r#"
            SELECT user_id, community_id, status, role_in_community, joined_at, updated_at
            FROM memberships WHERE user_id = ?1 AND community_id = ?2
            "#,
            [user_id, community_id],
            membership_from_row,
        )
        .optional()?)
}

/// Get-or-create a membership; an existing row is returned untouched
pub fn ensure_membership(
    conn: &Connection,
    user_id: i64,
    community_id: i64,
    status: MembershipStatus,
    role: CommunityRole,
    now: DateTime<Utc>,
) -> Result<Membership> {
    conn.execute(
        r#"
        INSERT OR IGNORE INTO memberships
            (user_id, community_id, status, role_in_community, joined_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?5)
        "#,
        params![user_id, community_id, status, role, now],
    )?;

    Ok(get_membership(conn, user_id, community_id)?
        .ok_or(rusqlite::Error::QueryReturnedNoRows)?)
}

/// Create or overwrite a membership's status and role
pub fn upsert_membership(
    conn: &Connection,
    user_id: i64,
    community_id: i64,
    status: MembershipStatus,
    role: CommunityRole,
    joined_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO memberships
            (user_id, community_id, status, role_in_community, joined_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(user_id, community_id) DO UPDATE SET
            status = excluded.status,
            role_in_community = excluded.role_in_community,
            joined_at = COALESCE(excluded.joined_at, joined_at),
            updated_at = excluded.updated_at
        "#,
        params![user_id, community_id, status, role, joined_at, now],
    )?;
    Ok(())
}

/// Does the user hold an approved membership (optionally with a given role)?
pub fn has_approved_membership(
    conn: &Connection,
    user_id: i64,
    community_id: i64,
    role: Option<CommunityRole>,
) -> Result<bool> {
    Ok(conn.query_row(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM memberships
            WHERE user_id = ?1 AND community_id = ?2 AND status = 'approved'
              AND (?3 IS NULL OR role_in_community = ?3)
        )
        "#,
        params![user_id, community_id, role],
        |row| row.get(0),
    )?)
}

/// Communities where the user is an approved moderator
pub fn moderated_community_ids(conn: &Connection, user_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT community_id FROM memberships
        WHERE user_id = ?1 AND status = 'approved' AND role_in_community = 'moderator'
        ORDER BY community_id
        "#,
    )?;
    let ids = stmt.query_map([user_id], |row| row.get(0))?;
    Ok(ids.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// The user's memberships with community names, ordered by community
pub fn memberships_for_user(conn: &Connection, user_id: i64) -> Result<Vec<MembershipSummary>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT m.community_id, c.name, m.status, m.role_in_community
        FROM memberships m JOIN communities c ON c.id = m.community_id
        WHERE m.user_id = ?1
        ORDER BY m.community_id
        "#,
    )?;
    let rows = stmt.query_map([user_id], |row| {
        let role: CommunityRole = row.get(3)?;
        Ok(MembershipSummary {
            community_id: row.get(0)?,
            community_name: row.get(1)?,
            status: row.get(2)?,
            role_in_community: role.as_str().to_string(),
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

const MEMBER_SELECT: &str = r#"
    SELECT u.id, u.email, p.display_name, p.bio,
           m.status, m.role_in_community, m.joined_at, m.updated_at
    FROM memberships m
    JOIN users u ON u.id = m.user_id
    LEFT JOIN profiles p ON p.user_id = u.id
"#;

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<CommunityMember> {
    let user_id: i64 = row.get(0)?;
    let email: String = row.get(1)?;
    let display_name: Option<String> = row.get(2)?;
    let bio: Option<String> = row.get(3)?;

    Ok(CommunityMember {
        user_id,
        display_name: resolve_display_name(user_id, &email, display_name.as_deref()),
        email,
        bio: bio.unwrap_or_default(),
        status: row.get(4)?,
        role_in_community: row.get(5)?,
        joined_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub fn count_members(conn: &Connection, community_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM memberships WHERE community_id = ?1",
        [community_id],
        |row| row.get(0),
    )?)
}

/// Members ordered by role, then email
pub fn list_members(
    conn: &Connection,
    community_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<CommunityMember>> {
    let sql = format!(
        "{} WHERE m.community_id = ?1 ORDER BY m.role_in_community, u.email LIMIT ?2 OFFSET ?3",
        MEMBER_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![community_id, limit, offset], member_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn get_member(
    conn: &Connection,
    community_id: i64,
    user_id: i64,
) -> Result<Option<CommunityMember>> {
    let sql = format!("{} WHERE m.community_id = ?1 AND m.user_id = ?2", MEMBER_SELECT);
    Ok(conn
        .query_row(&sql, [community_id, user_id], member_from_row)
        .optional()?)
}

/// Partial membership update; `None` keeps the stored value
pub fn update_membership(
    conn: &Connection,
    community_id: i64,
    user_id: i64,
    status: Option<MembershipStatus>,
    role: Option<CommunityRole>,
    now: DateTime<Utc>,
) -> Result<()> {
    if status.is_none() && role.is_none() {
        return Ok(());
    }

    conn.execute(
        r#"
        UPDATE memberships SET
            status = COALESCE(?1, status),
            role_in_community = COALESCE(?2, role_in_community),
            updated_at = ?3
        WHERE community_id = ?4 AND user_id = ?5
        "#,
        params![status, role, now, community_id, user_id],
    )?;
    Ok(())
}

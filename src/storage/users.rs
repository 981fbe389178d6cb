//! Accounts and profiles

use crate::error::Result;
use crate::types::{default_display_name, Profile, User};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_COLUMNS: &str = "id, email, password_hash, is_superadmin, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        is_superadmin: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Insert a user; `email` must already be normalised to lower case
pub fn insert_user(
    conn: &Connection,
    email: &str,
    password_hash: &str,
    is_superadmin: bool,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (email, password_hash, is_superadmin, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![email, password_hash, is_superadmin, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user(conn: &Connection, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    Ok(conn.query_row(&sql, [id], user_from_row).optional()?)
}

/// Case-insensitive lookup (the column is `COLLATE NOCASE`)
pub fn find_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
    Ok(conn.query_row(&sql, [email], user_from_row).optional()?)
}

pub fn email_exists(conn: &Connection, email: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        [email],
        |row| row.get(0),
    )?)
}

pub fn set_password_hash(conn: &Connection, user_id: i64, password_hash: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![password_hash, user_id],
    )?;
    Ok(())
}

pub fn set_superadmin(conn: &Connection, user_id: i64, is_superadmin: bool) -> Result<()> {
    conn.execute(
        "UPDATE users SET is_superadmin = ?1 WHERE id = ?2",
        params![is_superadmin, user_id],
    )?;
    Ok(())
}

/// Profile display name, if the user has a profile row
pub fn get_display_name(conn: &Connection, user_id: i64) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT display_name FROM profiles WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )
        .optional()?)
}

/// Create or overwrite the profile row
pub fn upsert_profile(
    conn: &Connection,
    user_id: i64,
    display_name: &str,
    bio: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO profiles (user_id, display_name, bio, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(user_id) DO UPDATE SET
            display_name = excluded.display_name,
            bio = excluded.bio,
            updated_at = excluded.updated_at
        "#,
        params![user_id, display_name, bio, now],
    )?;
    Ok(())
}

/// Fetch the profile, creating it with a default display name when missing
pub fn ensure_profile(conn: &Connection, user: &User, now: DateTime<Utc>) -> Result<Profile> {
    conn.execute(
        "INSERT OR IGNORE INTO profiles (user_id, display_name, bio, updated_at) VALUES (?1, ?2, '', ?3)",
        params![user.id, default_display_name(user.id, &user.email), now],
    )?;

    let (display_name, bio): (String, String) = conn.query_row(
        "SELECT display_name, bio FROM profiles WHERE user_id = ?1",
        [user.id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(Profile {
        id: user.id,
        email: user.email.clone(),
        display_name,
        bio,
    })
}

/// Apply a partial profile update; the row must exist
pub fn update_profile(
    conn: &Connection,
    user_id: i64,
    display_name: Option<&str>,
    bio: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    if display_name.is_none() && bio.is_none() {
        return Ok(());
    }

    conn.execute(
        r#"
        UPDATE profiles SET
            display_name = COALESCE(?1, display_name),
            bio = COALESCE(?2, bio),
            updated_at = ?3
        WHERE user_id = ?4
        "#,
        params![display_name, bio, now, user_id],
    )?;
    Ok(())
}

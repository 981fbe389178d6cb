//! Moderation reports

use crate::error::Result;
use crate::types::{resolve_display_name, Report, ReportReason, ReportStatus};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

/// Which communities a report listing may see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportScope {
    All,
    Communities(Vec<i64>),
}

const REPORT_SELECT: &str = r#"
    SELECT rep.id, rep.reporter_user_id, u.email, p.display_name,
           rep.request_id, r.title, r.status, r.community_id, c.name,
           rep.reason, rep.description, rep.status, rep.created_at, rep.updated_at
    FROM reports rep
    JOIN users u ON u.id = rep.reporter_user_id
    LEFT JOIN profiles p ON p.user_id = u.id
    JOIN requests r ON r.id = rep.request_id
    JOIN communities c ON c.id = r.community_id
"#;

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<Report> {
    let reporter_user_id: i64 = row.get(1)?;
    let email: String = row.get(2)?;
    let display_name: Option<String> = row.get(3)?;

    Ok(Report {
        id: row.get(0)?,
        reporter_user_id,
        reporter_display_name: resolve_display_name(
            reporter_user_id,
            &email,
            display_name.as_deref(),
        ),
        request_id: row.get(4)?,
        request_title: row.get(5)?,
        request_status: row.get(6)?,
        request_community_id: row.get(7)?,
        request_community_name: row.get(8)?,
        reason: row.get(9)?,
        description: row.get(10)?,
        status: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

pub fn insert_report(
    conn: &Connection,
    reporter_user_id: i64,
    request_id: i64,
    reason: ReportReason,
    description: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO reports (reporter_user_id, request_id, reason, description, status, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, 'open', ?5, ?5)
        "#,
        params![reporter_user_id, request_id, reason, description, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_report(conn: &Connection, id: i64) -> Result<Option<Report>> {
    let sql = format!("{} WHERE rep.id = ?1", REPORT_SELECT);
    Ok(conn.query_row(&sql, [id], report_from_row).optional()?)
}

/// Build the WHERE clause and positional values for a scoped listing
fn scope_filter(scope: &ReportScope, status: Option<ReportStatus>) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let ReportScope::Communities(ids) = scope {
        if ids.is_empty() {
            clauses.push("0".to_string());
        } else {
            let placeholders = vec!["?"; ids.len()].join(", ");
            clauses.push(format!("r.community_id IN ({})", placeholders));
            values.extend(ids.iter().map(|id| Value::Integer(*id)));
        }
    }

    if let Some(status) = status {
        clauses.push("rep.status = ?".to_string());
        values.push(Value::Text(status.as_str().to_string()));
    }

    let clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (clause, values)
}

pub fn count_reports(
    conn: &Connection,
    scope: &ReportScope,
    status: Option<ReportStatus>,
) -> Result<i64> {
    let (clause, values) = scope_filter(scope, status);
    let sql = format!(
        "SELECT COUNT(*) FROM reports rep JOIN requests r ON r.id = rep.request_id {}",
        clause
    );
    Ok(conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?)
}

/// Reports in scope, newest first
pub fn list_reports(
    conn: &Connection,
    scope: &ReportScope,
    status: Option<ReportStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Report>> {
    let (clause, mut values) = scope_filter(scope, status);
    values.push(Value::Integer(limit));
    values.push(Value::Integer(offset));

    let sql = format!(
        "{} {} ORDER BY rep.created_at DESC, rep.id DESC LIMIT ? OFFSET ?",
        REPORT_SELECT, clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), report_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn update_report_status(
    conn: &Connection,
    id: i64,
    status: ReportStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE reports SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status, now, id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_filter_clauses() {
        let (clause, values) = scope_filter(&ReportScope::All, None);
        assert!(clause.is_empty());
        assert!(values.is_empty());

        let (clause, values) =
            scope_filter(&ReportScope::Communities(vec![2, 5]), Some(ReportStatus::Open));
        assert_eq!(clause, "WHERE r.community_id IN (?, ?) AND rep.status = ?");
        assert_eq!(values.len(), 3);

        let (clause, _) = scope_filter(&ReportScope::Communities(vec![]), None);
        assert_eq!(clause, "WHERE 0");
    }
}

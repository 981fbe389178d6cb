//! Demo data for local development
//!
//! The dataset lives in `seed/demo.toml` and is compiled into the binary.
//! Seeding is repeatable: requests and loan items of the demo community are
//! wiped first, while demo users keep their existing passwords.

use crate::auth::PasswordHasher;
use crate::error::{AuzolanError, Result};
use crate::storage::{chat, communities, loans, reports, requests, users, Storage};
use crate::types::{
    CommunityRole, LoanRequestStatus, MembershipStatus, OfferStatus, ReportReason, RequestStatus,
};
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// Embedded demo dataset
pub const DEMO_FIXTURE: &str = include_str!("../seed/demo.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct DemoFixture {
    pub password: String,
    pub member_since_days_ago: i64,
    pub community: DemoCommunity,
    pub users: Vec<DemoUser>,
    #[serde(default)]
    pub requests: Vec<DemoRequest>,
    #[serde(default)]
    pub reports: Vec<DemoReport>,
    #[serde(default)]
    pub loans: Vec<DemoLoan>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoCommunity {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoUser {
    pub email: String,
    pub display_name: String,
    #[serde(default = "default_role")]
    pub role: CommunityRole,
}

fn default_role() -> CommunityRole {
    CommunityRole::Member
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub time_window_text: String,
    #[serde(default)]
    pub location_area_text: String,
    pub location_radius_km: Option<i64>,
    pub status: RequestStatus,
    pub creator: String,
    pub created_days_ago: i64,
    pub closed_days_ago: Option<i64>,
    /// Index into `offers`
    pub accepted_offer: Option<usize>,
    #[serde(default)]
    pub offers: Vec<DemoOffer>,
    #[serde(default)]
    pub messages: Vec<DemoMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoOffer {
    pub volunteer: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoMessage {
    pub sender: String,
    pub body: String,
    pub days_after: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoReport {
    pub reporter: String,
    /// Index into `requests`
    pub request: usize,
    pub reason: ReportReason,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoLoan {
    pub owner: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub created_days_ago: i64,
    /// Requester whose request was accepted
    pub borrower: Option<String>,
    #[serde(default)]
    pub requests: Vec<DemoLoanRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoLoanRequest {
    pub requester: String,
    #[serde(default)]
    pub message: String,
}

/// What a seed run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub community_id: i64,
    pub users: usize,
    pub requests: usize,
    pub reports: usize,
    pub loans: usize,
}

impl DemoFixture {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| AuzolanError::Other(format!("Invalid demo fixture: {}", e)))
    }

    pub fn embedded() -> Result<Self> {
        Self::parse(DEMO_FIXTURE)
    }
}

/// Load the embedded demo dataset
pub async fn seed_demo(storage: &Storage, hasher: PasswordHasher) -> Result<SeedSummary> {
    let fixture = DemoFixture::embedded()?;
    seed_fixture(storage, hasher, fixture).await
}

pub async fn seed_fixture(
    storage: &Storage,
    hasher: PasswordHasher,
    fixture: DemoFixture,
) -> Result<SeedSummary> {
    let summary = storage
        .interact(move |conn| {
            let tx = conn.transaction()?;
            let summary = apply(&tx, hasher, &fixture, Utc::now())?;
            tx.commit()?;
            Ok(summary)
        })
        .await?;

    info!(
        community_id = summary.community_id,
        users = summary.users,
        requests = summary.requests,
        reports = summary.reports,
        loans = summary.loans,
        "Demo data loaded"
    );
    Ok(summary)
}

fn days_ago(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days)
}

/// Demo user ids by email
struct Roster(HashMap<String, i64>);

impl Roster {
    fn id(&self, email: &str) -> Result<i64> {
        self.0
            .get(email)
            .copied()
            .ok_or_else(|| AuzolanError::Other(format!("Unknown demo user: {}", email)))
    }
}

fn apply(
    conn: &Connection,
    hasher: PasswordHasher,
    fixture: &DemoFixture,
    now: DateTime<Utc>,
) -> Result<SeedSummary> {
    let community_id = communities::ensure_community(
        conn,
        &fixture.community.name,
        &fixture.community.description,
        now,
    )?;

    for request_id in requests::request_ids_in_community(conn, community_id)? {
        requests::delete_request(conn, request_id)?;
    }
    let removed_items = loans::delete_items_in_community(conn, community_id)?;
    debug!(community_id, removed_items, "Cleared previous demo data");

    let roster = seed_users(conn, hasher, fixture, community_id, now)?;

    let mut request_ids = Vec::with_capacity(fixture.requests.len());
    for demo in &fixture.requests {
        request_ids.push(seed_request(conn, &roster, community_id, demo, now)?);
    }

    for demo in &fixture.reports {
        let request_id = *request_ids.get(demo.request).ok_or_else(|| {
            AuzolanError::Other(format!("Report points at missing request #{}", demo.request))
        })?;
        reports::insert_report(
            conn,
            roster.id(&demo.reporter)?,
            request_id,
            demo.reason,
            &demo.description,
            now,
        )?;
    }

    for demo in &fixture.loans {
        seed_loan(conn, &roster, community_id, demo, now)?;
    }

    Ok(SeedSummary {
        community_id,
        users: fixture.users.len(),
        requests: request_ids.len(),
        reports: fixture.reports.len(),
        loans: fixture.loans.len(),
    })
}

fn seed_users(
    conn: &Connection,
    hasher: PasswordHasher,
    fixture: &DemoFixture,
    community_id: i64,
    now: DateTime<Utc>,
) -> Result<Roster> {
    let joined_at = days_ago(now, fixture.member_since_days_ago);
    let mut roster = HashMap::new();

    for demo in &fixture.users {
        let email = demo.email.to_lowercase();
        let user_id = match users::find_user_by_email(conn, &email)? {
            Some(existing) => existing.id,
            None => {
                let hash = hasher.hash(&fixture.password)?;
                users::insert_user(conn, &email, &hash, false, now)?
            }
        };

        if let Some(user) = users::get_user(conn, user_id)? {
            users::ensure_profile(conn, &user, now)?;
        }
        users::update_profile(conn, user_id, Some(&demo.display_name), None, now)?;
        communities::upsert_membership(
            conn,
            user_id,
            community_id,
            MembershipStatus::Approved,
            demo.role,
            Some(joined_at),
            now,
        )?;

        roster.insert(demo.email.clone(), user_id);
    }

    Ok(Roster(roster))
}

fn seed_request(
    conn: &Connection,
    roster: &Roster,
    community_id: i64,
    demo: &DemoRequest,
    now: DateTime<Utc>,
) -> Result<i64> {
    let created_at = days_ago(now, demo.created_days_ago);
    let new = requests::NewRequest {
        community_id,
        title: demo.title.clone(),
        description: demo.description.clone(),
        category: demo.category.clone(),
        time_window_text: demo.time_window_text.clone(),
        location_area_text: demo.location_area_text.clone(),
        location_radius_km: demo.location_radius_km,
    };
    let request_id = requests::insert_request(conn, roster.id(&demo.creator)?, &new, created_at)?;

    let mut offer_ids = Vec::with_capacity(demo.offers.len());
    for offer in &demo.offers {
        offer_ids.push(requests::insert_offer(
            conn,
            request_id,
            roster.id(&offer.volunteer)?,
            &offer.message,
            created_at,
        )?);
    }

    if let Some(index) = demo.accepted_offer {
        let offer_id = *offer_ids.get(index).ok_or_else(|| {
            AuzolanError::Other(format!("\"{}\" has no offer #{}", demo.title, index))
        })?;
        requests::set_offer_status(conn, offer_id, OfferStatus::Accepted, created_at)?;
        requests::reject_other_offers(conn, request_id, offer_id, created_at)?;
        requests::start_progress(conn, request_id, offer_id, created_at)?;

        let conversation_id = chat::get_or_create_conversation(conn, request_id, created_at)?;
        for (position, message) in demo.messages.iter().enumerate() {
            // Keep messages of the same day in fixture order
            let sent_at = created_at
                + Duration::days(message.days_after)
                + Duration::minutes(position as i64);
            chat::insert_message(
                conn,
                conversation_id,
                roster.id(&message.sender)?,
                &message.body,
                sent_at,
            )?;
        }
    }

    if demo.status.is_closing() {
        let closed_at = days_ago(now, demo.closed_days_ago.unwrap_or(demo.created_days_ago));
        requests::close_request(conn, request_id, demo.status, closed_at)?;
    }

    Ok(request_id)
}

fn seed_loan(
    conn: &Connection,
    roster: &Roster,
    community_id: i64,
    demo: &DemoLoan,
    now: DateTime<Utc>,
) -> Result<()> {
    let created_at = days_ago(now, demo.created_days_ago);
    let item_id = loans::insert_item(
        conn,
        community_id,
        roster.id(&demo.owner)?,
        &demo.title,
        &demo.description,
        created_at,
    )?;

    let mut accepted = None;
    for (position, request) in demo.requests.iter().enumerate() {
        let requested_at = created_at + Duration::days(position as i64 + 1);
        let id = loans::insert_loan_request(
            conn,
            item_id,
            roster.id(&request.requester)?,
            &request.message,
            requested_at,
        )?;
        if demo.borrower.as_deref() == Some(request.requester.as_str()) {
            accepted = Some((id, requested_at));
        }
    }

    if let Some(borrower) = demo.borrower.as_deref() {
        let (request_id, requested_at) = accepted.ok_or_else(|| {
            AuzolanError::Other(format!("\"{}\" has no request from {}", demo.title, borrower))
        })?;
        let loaned_at = requested_at + Duration::hours(2);
        loans::respond_loan_request(conn, request_id, LoanRequestStatus::Accepted, loaned_at)?;
        loans::reject_other_pending(conn, item_id, request_id, loaned_at)?;
        loans::mark_loaned(conn, item_id, roster.id(borrower)?, loaned_at)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_fixture_is_consistent() {
        let fixture = DemoFixture::embedded().unwrap();
        let emails: Vec<&str> = fixture.users.iter().map(|u| u.email.as_str()).collect();

        for request in &fixture.requests {
            assert!(emails.contains(&request.creator.as_str()), "{}", request.creator);
            if let Some(index) = request.accepted_offer {
                assert!(index < request.offers.len(), "{}", request.title);
            }
            if request.status.is_closing() {
                assert!(request.closed_days_ago.is_some(), "{}", request.title);
            }
        }
        for report in &fixture.reports {
            assert!(report.request < fixture.requests.len());
        }
        for loan in &fixture.loans {
            if let Some(borrower) = &loan.borrower {
                assert!(loan.requests.iter().any(|r| &r.requester == borrower));
            }
        }
    }

    #[test]
    fn test_fixture_covers_every_request_state() {
        let fixture = DemoFixture::embedded().unwrap();
        for status in RequestStatus::ALL {
            assert!(
                fixture.requests.iter().any(|r| r.status == *status),
                "missing {}",
                status
            );
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            DemoFixture::parse("password = 3"),
            Err(AuzolanError::Other(_))
        ));
    }
}

//! Core data types for the Auzolan backend
//!
//! This module defines the entities (communities, help requests, offers,
//! conversations, reports and loans), their status enums and the row shapes
//! returned by the HTTP API.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Declares a string-backed status enum that round-trips through serde and SQLite
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Parse the wire/database representation
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                $name::parse(text).ok_or_else(|| {
                    FromSqlError::Other(format!("invalid {} value: {}", stringify!($name), text).into())
                })
            }
        }
    };
}

text_enum! {
    /// Membership lifecycle inside a community
    MembershipStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Expelled => "expelled",
    }
}

text_enum! {
    /// Role a member holds inside a community
    CommunityRole {
        Member => "member",
        Moderator => "moderator",
    }
}

text_enum! {
    /// Help request lifecycle: open -> in_progress -> resolved | cancelled
    RequestStatus {
        Open => "open",
        InProgress => "in_progress",
        Resolved => "resolved",
        Cancelled => "cancelled",
    }
}

text_enum! {
    OfferStatus {
        Offered => "offered",
        Accepted => "accepted",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
    }
}

text_enum! {
    ReportStatus {
        Open => "open",
        InReview => "in_review",
        Closed => "closed",
    }
}

text_enum! {
    ReportReason {
        Payments => "payments",
        Advertising => "advertising",
        ProhibitedContent => "prohibited_content",
        Harassment => "harassment",
        Other => "other",
    }
}

text_enum! {
    /// Loan item lifecycle: available -> loaned -> available
    LoanStatus {
        Available => "available",
        Loaned => "loaned",
    }
}

text_enum! {
    LoanRequestStatus {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
    }
}

impl RequestStatus {
    /// Open and in-progress requests can still be closed
    pub fn is_active(&self) -> bool {
        matches!(self, RequestStatus::Open | RequestStatus::InProgress)
    }

    /// Terminal states a close operation may move to
    pub fn is_closing(&self) -> bool {
        matches!(self, RequestStatus::Resolved | RequestStatus::Cancelled)
    }

    /// Chat is writable while help is happening and after it succeeded
    pub fn allows_chat(&self) -> bool {
        matches!(self, RequestStatus::InProgress | RequestStatus::Resolved)
    }
}

/// The authenticated caller of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub email: String,
    pub is_superadmin: bool,
}

/// Stored account
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub is_superadmin: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id,
            email: self.email.clone(),
            is_superadmin: self.is_superadmin,
        }
    }
}

/// Display name shown next to a user's content
///
/// Profile name if set, else email, else a numbered placeholder.
pub fn resolve_display_name(user_id: i64, email: &str, display_name: Option<&str>) -> String {
    match display_name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ if !email.is_empty() => email.to_string(),
        _ => format!("User #{}", user_id),
    }
}

/// Name given to a profile created on demand
pub fn default_display_name(user_id: i64, email: &str) -> String {
    match email.split_once('@') {
        Some((local, _)) if !local.is_empty() => local.to_string(),
        _ => format!("User {}", user_id),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub bio: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Community {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// One entry of the caller's community list in `/api/me`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MembershipSummary {
    pub community_id: i64,
    pub community_name: String,
    pub status: MembershipStatus,
    /// `member`, `moderator`, or `superadmin` for superadmins
    pub role_in_community: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Me {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub is_superadmin: bool,
    pub communities: Vec<MembershipSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Membership {
    pub user_id: i64,
    pub community_id: i64,
    pub status: MembershipStatus,
    pub role_in_community: CommunityRole,
    pub joined_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Member row shown to moderators
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommunityMember {
    pub user_id: i64,
    pub email: String,
    pub display_name: String,
    pub bio: String,
    pub status: MembershipStatus,
    pub role_in_community: CommunityRole,
    pub joined_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HelpRequest {
    pub id: i64,
    pub community_id: i64,
    pub created_by_user_id: i64,
    pub created_by_display_name: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub time_window_text: String,
    pub location_area_text: String,
    pub location_radius_km: Option<i64>,
    pub status: RequestStatus,
    pub accepted_offer_id: Option<i64>,
    pub offers_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Request detail with what the caller may do next
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestDetail {
    pub request: HelpRequest,
    pub offers_count: i64,
    pub accepted_offer_id: Option<i64>,
    pub can_offer: bool,
    pub can_accept: bool,
    pub can_close: bool,
    pub can_moderate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolunteerOffer {
    pub id: i64,
    pub request_id: i64,
    pub volunteer_user_id: i64,
    pub volunteer_display_name: String,
    pub message: String,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_user_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub id: i64,
    pub reporter_user_id: i64,
    pub reporter_display_name: String,
    pub request_id: i64,
    pub request_title: String,
    pub request_status: RequestStatus,
    pub request_community_id: i64,
    pub request_community_name: String,
    pub reason: ReportReason,
    pub description: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoanItem {
    pub id: i64,
    pub community_id: i64,
    pub owner_user_id: i64,
    pub owner_display_name: String,
    pub title: String,
    pub description: String,
    pub status: LoanStatus,
    pub borrower_user_id: Option<i64>,
    pub borrower_display_name: String,
    pub loaned_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub pending_requests_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Loan item detail with what the caller may do next
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoanDetail {
    pub item: LoanItem,
    pub can_request: bool,
    pub can_manage_item: bool,
    pub can_manage_requests: bool,
    pub can_mark_returned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoanRequest {
    pub id: i64,
    pub item_id: i64,
    pub requester_user_id: i64,
    pub requester_display_name: String,
    pub message: String,
    pub status: LoanRequestStatus,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

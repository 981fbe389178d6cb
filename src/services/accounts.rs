//! Registration, login, token refresh and the caller's own profile

use super::validate::{
    deserialize_present, integer_field, normalize_email, present_blankable, present_text,
    required_text, validate_password,
};
use crate::auth::{PasswordHasher, TokenKind, TokenPair, TokenSigner};
use crate::error::{AuzolanError, Result};
use crate::storage::{communities, users, Storage};
use crate::types::{Actor, CommunityRole, Me, MembershipStatus, MembershipSummary, Profile};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

const DISPLAY_NAME_MAX: usize = 80;
const BIO_MAX: usize = 280;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterInput {
    pub email: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub community_id: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Registered {
    pub id: i64,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshInput {
    pub refresh: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub email: bool,
}

fn email_taken() -> AuzolanError {
    AuzolanError::validation("email", "This email is already registered.")
}

/// Create a user with profile and an approved membership
pub async fn register(
    storage: &Storage,
    hasher: PasswordHasher,
    input: RegisterInput,
) -> Result<Registered> {
    let email = normalize_email("email", input.email)?;
    let password = input
        .password
        .ok_or_else(|| AuzolanError::validation("password", "This field is required."))?;
    validate_password("password", &password)?;
    let display_name = required_text("display_name", input.display_name, Some(DISPLAY_NAME_MAX))?;
    let community_id = integer_field("community_id", input.community_id.as_ref())?;

    let registered = storage
        .interact(move |conn| {
            if users::email_exists(conn, &email)? {
                return Err(email_taken());
            }
            if !communities::community_exists(conn, community_id)? {
                return Err(AuzolanError::validation("community_id", "Invalid community."));
            }

            let password_hash = hasher.hash(&password)?;
            let now = Utc::now();

            let tx = conn.transaction()?;
            let user_id = users::insert_user(&tx, &email, &password_hash, false, now)
                .map_err(|e| if e.is_constraint_violation() { email_taken() } else { e })?;
            users::upsert_profile(&tx, user_id, &display_name, "", now)?;
            communities::ensure_membership(
                &tx,
                user_id,
                community_id,
                MembershipStatus::Approved,
                CommunityRole::Member,
                now,
            )?;
            tx.commit()?;

            Ok(Registered {
                id: user_id,
                email,
                display_name,
            })
        })
        .await?;

    info!(user_id = registered.id, community_id, "User registered");
    Ok(registered)
}

/// Exchange email and password for an access/refresh pair
pub async fn login(
    storage: &Storage,
    hasher: PasswordHasher,
    signer: &TokenSigner,
    input: LoginInput,
) -> Result<TokenPair> {
    let email = required_text("email", input.email, None)?.to_lowercase();
    let password = input
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AuzolanError::validation("password", "This field is required."))?;

    let user_id = storage
        .interact(move |conn| {
            let rejected = || {
                AuzolanError::Unauthorized(
                    "No active account found with the given credentials".to_string(),
                )
            };
            let user = users::find_user_by_email(conn, &email)?.ok_or_else(rejected)?;
            if !hasher.verify(&password, &user.password_hash)? {
                return Err(rejected());
            }
            Ok(user.id)
        })
        .await?;

    signer.issue_pair(user_id)
}

/// Issue a fresh access token from a refresh token
pub fn refresh(signer: &TokenSigner, input: RefreshInput) -> Result<AccessToken> {
    let token = required_text("refresh", input.refresh, None)?;
    let claims = signer.verify(&token, TokenKind::Refresh)?;
    Ok(AccessToken {
        access: signer.issue(claims.sub, TokenKind::Access)?,
    })
}

/// Resolve a bearer access token to the acting user
pub async fn authenticate(storage: &Storage, signer: &TokenSigner, token: &str) -> Result<Actor> {
    let claims = signer
        .verify(token, TokenKind::Access)
        .map_err(|_| AuzolanError::InvalidToken("Given token not valid for any token type".to_string()))?;

    let user_id = claims.sub;
    let user = storage
        .interact(move |conn| users::get_user(conn, user_id))
        .await?
        .ok_or_else(|| AuzolanError::InvalidToken("User not found".to_string()))?;

    Ok(user.actor())
}

pub async fn me(storage: &Storage, actor: &Actor) -> Result<Me> {
    let actor = actor.clone();
    storage
        .interact(move |conn| {
            let communities = if actor.is_superadmin {
                communities::list_communities(conn)?
                    .into_iter()
                    .map(|c| MembershipSummary {
                        community_id: c.id,
                        community_name: c.name,
                        status: MembershipStatus::Approved,
                        role_in_community: "superadmin".to_string(),
                    })
                    .collect()
            } else {
                communities::memberships_for_user(conn, actor.id)?
            };

            Ok(Me {
                id: actor.id,
                display_name: users::get_display_name(conn, actor.id)?.unwrap_or_default(),
                email: actor.email,
                is_superadmin: actor.is_superadmin,
                communities,
            })
        })
        .await
}

pub async fn get_profile(storage: &Storage, actor: &Actor) -> Result<Profile> {
    let user_id = actor.id;
    storage
        .interact(move |conn| {
            let user = users::get_user(conn, user_id)?.ok_or_else(AuzolanError::not_found)?;
            users::ensure_profile(conn, &user, Utc::now())
        })
        .await
}

/// Update display name and bio; the email is read-only
pub async fn update_profile(storage: &Storage, actor: &Actor, patch: ProfilePatch) -> Result<Profile> {
    if patch.email {
        return Err(AuzolanError::BadRequest("Email cannot be changed.".to_string()));
    }
    let display_name = present_text("display_name", patch.display_name, Some(DISPLAY_NAME_MAX))?;
    let bio = present_blankable("bio", patch.bio, BIO_MAX)?;

    let user_id = actor.id;
    storage
        .interact(move |conn| {
            let user = users::get_user(conn, user_id)?.ok_or_else(AuzolanError::not_found)?;
            let now = Utc::now();
            users::ensure_profile(conn, &user, now)?;
            users::update_profile(conn, user_id, display_name.as_deref(), bio.as_deref(), now)?;
            users::ensure_profile(conn, &user, now)
        })
        .await
}

/// Create a superadmin, or promote an existing account and reset its password
pub async fn create_superadmin(
    storage: &Storage,
    hasher: PasswordHasher,
    email: &str,
    password: &str,
    display_name: Option<&str>,
) -> Result<i64> {
    let email = normalize_email("email", Some(email.to_string()))?;
    validate_password("password", password)?;
    let password = password.to_string();
    let display_name = display_name.map(str::to_string);

    let user_id = storage
        .interact(move |conn| {
            let password_hash = hasher.hash(&password)?;
            let now = Utc::now();
            let tx = conn.transaction()?;

            let user_id = match users::find_user_by_email(&tx, &email)? {
                Some(existing) => {
                    users::set_password_hash(&tx, existing.id, &password_hash)?;
                    users::set_superadmin(&tx, existing.id, true)?;
                    existing.id
                }
                None => users::insert_user(&tx, &email, &password_hash, true, now)?,
            };

            if let Some(user) = users::get_user(&tx, user_id)? {
                users::ensure_profile(&tx, &user, now)?;
            }
            if let Some(name) = display_name.as_deref() {
                users::update_profile(&tx, user_id, Some(name), None, now)?;
            }

            tx.commit()?;
            Ok(user_id)
        })
        .await?;

    info!(user_id, "Superadmin account ready");
    Ok(user_id)
}

//! Field validation shared by the services
//!
//! Text is trimmed before checks; errors carry the offending field name and
//! surface as `{field: [message]}` bodies.

use crate::error::{AuzolanError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("Valid email regex")
});

pub const MIN_PASSWORD_LEN: usize = 8;

fn too_long(field: &str, max: usize) -> AuzolanError {
    AuzolanError::validation(
        field,
        format!("Ensure this field has no more than {} characters.", max),
    )
}

/// Required, non-blank text of at most `max` characters
pub fn required_text(field: &str, value: Option<String>, max: Option<usize>) -> Result<String> {
    let value = value
        .ok_or_else(|| AuzolanError::validation(field, "This field is required."))?
        .trim()
        .to_string();
    if value.is_empty() {
        return Err(AuzolanError::validation(field, "This field may not be blank."));
    }
    check_len(field, &value, max)?;
    Ok(value)
}

/// Optional text; blank is allowed and absence becomes the empty string
pub fn optional_text(field: &str, value: Option<String>, max: usize) -> Result<String> {
    let value = value.unwrap_or_default().trim().to_string();
    check_len(field, &value, Some(max))?;
    Ok(value)
}

/// Text that may be omitted but, when present, must satisfy `required_text`
pub fn present_text(field: &str, value: Option<String>, max: Option<usize>) -> Result<Option<String>> {
    value
        .map(|value| required_text(field, Some(value), max))
        .transpose()
}

/// Text that may be omitted or blank
pub fn present_blankable(field: &str, value: Option<String>, max: usize) -> Result<Option<String>> {
    value
        .map(|value| optional_text(field, Some(value), max))
        .transpose()
}

pub fn check_len(field: &str, value: &str, max: Option<usize>) -> Result<()> {
    match max {
        Some(max) if value.chars().count() > max => Err(too_long(field, max)),
        _ => Ok(()),
    }
}

/// Validate and lower-case an email address
pub fn normalize_email(field: &str, value: Option<String>) -> Result<String> {
    let email = required_text(field, value, Some(254))?;
    if !EMAIL_REGEX.is_match(&email) {
        return Err(AuzolanError::validation(field, "Enter a valid email address."));
    }
    Ok(email.to_lowercase())
}

pub fn validate_password(field: &str, password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuzolanError::validation(
            field,
            format!(
                "This password is too short. It must contain at least {} characters.",
                MIN_PASSWORD_LEN
            ),
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(AuzolanError::validation(field, "This password is entirely numeric."));
    }
    Ok(())
}

/// Parse a choice field through its enum parser
pub fn choice<T>(field: &str, value: &str, parse: fn(&str) -> Option<T>) -> Result<T> {
    parse(value).ok_or_else(|| {
        AuzolanError::validation(field, format!("\"{}\" is not a valid choice.", value))
    })
}

/// Integer field that also accepts numeric strings
pub fn integer_field(field: &str, value: Option<&Value>) -> Result<i64> {
    let invalid = || AuzolanError::validation(field, "A valid integer is required.");
    match value {
        None | Some(Value::Null) => Err(AuzolanError::validation(field, "This field is required.")),
        Some(Value::Number(n)) => n.as_i64().ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

/// Like `integer_field`, but absent or null means no value
pub fn nullable_integer_field(field: &str, value: Option<&Value>) -> Result<Option<i64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(_) => integer_field(field, value).map(Some),
    }
}

/// `deserialize_with` helper: `true` whenever the key is present, even as null
pub fn deserialize_present<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    IgnoredAny::deserialize(deserializer)?;
    Ok(true)
}

/// `deserialize_with` helper telling an explicit null apart from a missing key
pub fn deserialize_nullable<'de, T, D>(
    deserializer: D,
) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Query flag values that mean "yes"
pub fn is_truthy(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "True" | "yes" | "si" | "sí"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReportReason;

    #[test]
    fn test_required_text() {
        assert_eq!(
            required_text("title", Some("  Groceries ".into()), Some(120)).unwrap(),
            "Groceries"
        );
        assert!(matches!(
            required_text("title", None, None),
            Err(AuzolanError::Validation { ref message, .. }) if message == "This field is required."
        ));
        assert!(matches!(
            required_text("title", Some("   ".into()), None),
            Err(AuzolanError::Validation { ref message, .. }) if message == "This field may not be blank."
        ));
        assert!(required_text("title", Some("x".repeat(121)), Some(120)).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text("message", None, 280).unwrap(), "");
        assert!(optional_text("message", Some("y".repeat(280)), 280).is_ok());
        assert!(matches!(
            optional_text("message", Some("y".repeat(281)), 280),
            Err(AuzolanError::Validation { ref field, .. }) if field == "message"
        ));
        assert_eq!(present_blankable("bio", Some("".into()), 280).unwrap(), Some(String::new()));
        assert_eq!(present_text("display_name", None, Some(80)).unwrap(), None);
    }

    #[test]
    fn test_email() {
        assert_eq!(
            normalize_email("email", Some("Ana@Example.COM".into())).unwrap(),
            "ana@example.com"
        );
        assert!(normalize_email("email", Some("not-an-email".into())).is_err());
        assert!(normalize_email("email", Some("a@b".into())).is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("password", "Demo1234!").is_ok());
        assert!(validate_password("password", "short").is_err());
        assert!(validate_password("password", "1234567890").is_err());
    }

    #[test]
    fn test_integer_field() {
        assert_eq!(integer_field("community_id", Some(&Value::from(3))).unwrap(), 3);
        assert_eq!(integer_field("community_id", Some(&Value::from("7"))).unwrap(), 7);
        assert_eq!(nullable_integer_field("radius", None).unwrap(), None);
        assert_eq!(nullable_integer_field("radius", Some(&Value::Null)).unwrap(), None);
        assert_eq!(nullable_integer_field("radius", Some(&Value::from(" 5 "))).unwrap(), Some(5));
        assert!(nullable_integer_field("radius", Some(&Value::from("far"))).is_err());
        assert!(integer_field("community_id", Some(&Value::from("seven"))).is_err());
        assert!(integer_field("community_id", Some(&Value::Bool(true))).is_err());
        assert!(integer_field("community_id", None).is_err());
    }

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "deserialize_present")]
        email: bool,
        #[serde(default, deserialize_with = "deserialize_nullable")]
        radius: Option<Option<i64>>,
    }

    #[test]
    fn test_presence_helpers() {
        let patch: Patch = serde_json::from_str(r#"{"email": null, "radius": null}"#).unwrap();
        assert!(patch.email);
        assert_eq!(patch.radius, Some(None));

        let patch: Patch = serde_json::from_str(r#"{"radius": 4}"#).unwrap();
        assert!(!patch.email);
        assert_eq!(patch.radius, Some(Some(4)));

        let patch: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(patch.radius, None);
    }

    #[test]
    fn test_truthy_flags() {
        for flag in ["1", "true", "True", "yes", "si", "sí"] {
            assert!(is_truthy(Some(flag)));
        }
        assert!(!is_truthy(Some("0")));
        assert!(!is_truthy(Some("TRUE")));
        assert!(!is_truthy(None));
    }

    #[test]
    fn test_choice() {
        assert_eq!(
            choice("reason", "harassment", ReportReason::parse).unwrap(),
            ReportReason::Harassment
        );
        let err = choice("reason", "spam", ReportReason::parse).unwrap_err();
        assert!(matches!(err, AuzolanError::Validation { ref field, .. } if field == "reason"));
    }
}

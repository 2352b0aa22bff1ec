//! Field rules shared by the create, update, and reject payloads.
//!
//! Lengths are counted in Unicode scalar values, not bytes, so Vietnamese
//! titles get the same budget as ASCII ones.

use std::borrow::Cow;
use validator::ValidationError;

use crate::models::request::{
    RequestType, MAX_ATTACHED_FILE_CHARS, MAX_CONTENT_CHARS, MAX_REJECTION_REASON_CHARS,
    MAX_TITLE_CHARS,
};

/// Validates that a trimmed value is non-empty and at most `max` characters.
pub fn validate_required_text(value: &str, max: usize) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("required").with_message(Cow::Borrowed("is required")));
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::new("too_long")
            .with_message(Cow::Owned(format!("must be at most {max} characters"))));
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    validate_required_text(title, MAX_TITLE_CHARS)
}

pub fn validate_content(content: &str) -> Result<(), ValidationError> {
    validate_required_text(content, MAX_CONTENT_CHARS)
}

/// Rejection reasons are trimmed and limited to 1..=500 characters; the
/// entity applies its own minimum on top.
pub fn validate_rejection_reason(reason: &str) -> Result<(), ValidationError> {
    validate_required_text(reason, MAX_REJECTION_REASON_CHARS)
}

/// Attachments are optional; an empty value means "no attachment".
pub fn validate_attached_file(path: &str) -> Result<(), ValidationError> {
    if path.trim().chars().count() > MAX_ATTACHED_FILE_CHARS {
        return Err(ValidationError::new("too_long").with_message(Cow::Owned(format!(
            "must be at most {MAX_ATTACHED_FILE_CHARS} characters"
        ))));
    }
    Ok(())
}

pub fn validate_request_type(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<RequestType>()
        .map(|_| ())
        .map_err(|_| {
            ValidationError::new("unknown_request_type").with_message(Cow::Borrowed(
                "must be one of LeaveOfAbsence, BusinessTrip, Support, SalaryIncrease, Other",
            ))
        })
}

use tracing::instrument;
use validator::{Validate, ValidationErrors};

use crate::error::AppError;

pub const REQUIRED_FIELDS_NOTICE: &str = "All fields are required.";

/// Browsers submit untouched inputs as empty strings; treat those the same
/// as a missing field so `#[validate(required)]` catches both. Whitespace is
/// a value and passes through untouched.
pub fn empty_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// For optional free text, where whitespace alone carries nothing worth storing.
pub fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Picks the single notice shown to the user. Missing fields win over any
/// other complaint so an empty form never reports a password-length error.
pub fn first_notice(errors: &ValidationErrors) -> String {
    let field_errors = errors.field_errors();

    let mut fields: Vec<_> = field_errors.iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    let all = || fields.iter().flat_map(|(_, errs)| errs.iter());

    all()
        .find(|e| e.code == "required")
        .or_else(|| all().next())
        .and_then(|e| e.message.as_ref())
        .map(|m| m.to_string())
        .unwrap_or_else(|| "Invalid form submission.".to_string())
}

pub trait FormValidateExt: Validate + Sized {
    fn validate_form(self) -> Result<Self, AppError>;
}

impl<T: Validate> FormValidateExt for T {
    #[instrument(skip_all)]
    fn validate_form(self) -> Result<Self, AppError> {
        match self.validate() {
            Ok(()) => Ok(self),
            Err(errors) => Err(AppError::Validation(first_notice(&errors))),
        }
    }
}

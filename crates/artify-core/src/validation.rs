// SPDX-License-Identifier: AGPL-3.0
// Artify Core - Local form validation
//
// Checked before any request is issued so bad input never costs a round trip.

use crate::types::AppError;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// Fail when a required field is blank
pub fn require_field(name: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", name)));
    }
    Ok(())
}

/// Presence plus minimum length
pub fn validate_password(password: &str) -> Result<(), AppError> {
    require_field("password", password)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must contain at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// New password checks used by registration and reset forms
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), AppError> {
    validate_password(password)?;
    require_field("password confirmation", confirmation)?;
    if password != confirmation {
        return Err(AppError::Validation("passwords do not match".to_string()));
    }
    Ok(())
}

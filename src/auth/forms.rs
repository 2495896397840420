//! Client-side checks run before a form is submitted. Field names and
//! messages match what the backend returns for the same mistakes.

use super::models::{ChangePasswordRequest, LoginRequest, PreferencesUpdate, RegisterRequest};
use crate::error::{AppError, ValidationErrors};

const BLANK: &str = "This field may not be blank.";

pub const MIN_ALERT_RADIUS_KM: u32 = 1;
pub const MAX_ALERT_RADIUS_KM: u32 = 100;

fn require(errors: &mut ValidationErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, BLANK);
    }
}

pub fn validate_login(request: &LoginRequest) -> Result<(), AppError> {
    let mut errors = ValidationErrors::default();
    require(&mut errors, "username", &request.username);
    require(&mut errors, "password", &request.password);
    errors.into_result()
}

pub fn validate_registration(request: &RegisterRequest) -> Result<(), AppError> {
    let mut errors = ValidationErrors::default();
    require(&mut errors, "username", &request.username);
    require(&mut errors, "email", &request.email);
    require(&mut errors, "first_name", &request.first_name);
    require(&mut errors, "last_name", &request.last_name);
    require(&mut errors, "password", &request.password);
    require(&mut errors, "password2", &request.password2);

    if !request.email.trim().is_empty() && !request.email.contains('@') {
        errors.add("email", "Enter a valid email address.");
    }
    if request.password != request.password2 {
        errors.add("password", "Password fields didn't match.");
    }
    if let Some(phone) = request.phone_number.as_deref() {
        if !phone.is_empty() && !phone.starts_with('+') {
            errors.add("phone_number", "Phone number must start with country code (e.g., +48)");
        }
    }
    errors.into_result()
}

pub fn validate_password_change(request: &ChangePasswordRequest) -> Result<(), AppError> {
    let mut errors = ValidationErrors::default();
    require(&mut errors, "old_password", &request.old_password);
    require(&mut errors, "new_password", &request.new_password);
    if request.new_password != request.new_password2 {
        errors.add("new_password", "New password fields didn't match.");
    }
    errors.into_result()
}

pub fn validate_preferences(update: &PreferencesUpdate) -> Result<(), AppError> {
    match update.alert_radius {
        Some(radius) if !(MIN_ALERT_RADIUS_KM..=MAX_ALERT_RADIUS_KM).contains(&radius) => Err(
            AppError::validation("alert_radius", "Alert radius must be between 1 and 100 kilometers."),
        ),
        _ => Ok(()),
    }
}

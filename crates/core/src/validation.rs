//! Input validators for signup, login and device registration.
//!
//! Each validator returns `Err` with a human-readable message suitable for a
//! 400 response body.

use validator::ValidateEmail;

/// Minimum password length for email/password accounts.
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Upper bound to keep Argon2 hashing cost bounded.
pub const MAX_PASSWORD_LENGTH: usize = 128;

pub const MAX_NAME_LENGTH: usize = 255;

pub const MAX_DEVICE_ID_LENGTH: usize = 128;

/// Canonical form of an email address used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.validate_email() {
        Ok(())
    } else {
        Err("Please enter a valid email address".to_string())
    }
}

/// Validate that a password meets the strength requirements: length bounds
/// plus at least one uppercase letter, one lowercase letter and one digit.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        ));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters long"
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err("Password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one number".to_string());
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name is required".to_string());
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(format!("Name must be at most {MAX_NAME_LENGTH} characters"));
    }
    Ok(())
}

/// Device ids are opaque client-generated identifiers.
pub fn validate_device_id(device_id: &str) -> Result<(), String> {
    if device_id.is_empty() || device_id.len() > MAX_DEVICE_ID_LENGTH {
        return Err(format!(
            "Device id must be between 1 and {MAX_DEVICE_ID_LENGTH} characters"
        ));
    }
    if device_id.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err("Device id must not contain whitespace".to_string());
    }
    Ok(())
}

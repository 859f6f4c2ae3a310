//! Common validation utilities.

use validator::ValidationError;

/// Minimum length of a feature flag name, in characters.
pub const MIN_FLAG_NAME_LENGTH: usize = 3;

/// Maximum length of a feature flag name, in characters.
pub const MAX_FLAG_NAME_LENGTH: usize = 100;

/// Validates a feature flag name.
///
/// Names must be 3-100 characters long (counted as Unicode scalar values,
/// not bytes) and must not be blank.
pub fn validate_flag_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("name_required");
        err.message = Some("Name is required".into());
        return Err(err);
    }

    let length = name.chars().count();
    if !(MIN_FLAG_NAME_LENGTH..=MAX_FLAG_NAME_LENGTH).contains(&length) {
        let mut err = ValidationError::new("name_length");
        err.message = Some("Name must be between 3 and 100 characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a rollout percentage is within 0 to 100.
pub fn validate_percentage(percentage: f64) -> Result<(), ValidationError> {
    if (0.0..=100.0).contains(&percentage) {
        Ok(())
    } else {
        let mut err = ValidationError::new("percentage_range");
        err.message = Some("Percentage must be between 0 and 100".into());
        Err(err)
    }
}

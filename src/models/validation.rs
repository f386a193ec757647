//! Validation helpers for live-events models
//!
//! Field rules are declared with the `validator` derive on the models; this
//! module turns the crate's report into the model error types.

use super::error::{ValidationError, ValidationErrorKind, ValidationErrors};

/// Lowest accepted event identifier
pub const MIN_EVENT_ID: i64 = 1000;

/// Highest accepted event identifier
pub const MAX_EVENT_ID: i64 = 9999;

/// Check a bare event identifier against the accepted range
pub fn validate_event_id(event_id: i64) -> Result<i64, ValidationError> {
    if (MIN_EVENT_ID..=MAX_EVENT_ID).contains(&event_id) {
        Ok(event_id)
    } else {
        Err(ValidationError::with_context(
            ValidationErrorKind::OutOfRange,
            "event_id",
            format!(
                "{} is outside {}..={}",
                event_id, MIN_EVENT_ID, MAX_EVENT_ID
            ),
        ))
    }
}

/// Flatten a `validator` report into model validation errors
pub fn collect_errors(report: validator::ValidationErrors) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    for (field, field_errors) in report.field_errors() {
        for error in field_errors.iter() {
            let kind = ValidationErrorKind::from_code(&error.code);
            let model_error = match &error.message {
                Some(message) => ValidationError::with_context(kind, field.to_string(), message.to_string()),
                None => ValidationError::new(kind, field.to_string()),
            };
            errors.add(model_error);
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_event_id() {
        assert_eq!(validate_event_id(1000), Ok(1000));
        assert_eq!(validate_event_id(9999), Ok(9999));

        let error = validate_event_id(42).unwrap_err();
        assert_eq!(error.kind, ValidationErrorKind::OutOfRange);
        assert_eq!(error.field, "event_id");
    }

    #[test]
    fn test_collect_errors_keeps_field_names() {
        use validator::Validate;

        let request = crate::models::TrackingRequest::new(12, true);
        let report = request.validate().unwrap_err();
        let errors = collect_errors(report);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors.errors()[0].field, "event_id");
        assert_eq!(errors.errors()[0].kind, ValidationErrorKind::OutOfRange);
    }
}

//! Validation error types for live-events models
//!
//! This module defines error types specifically for data validation,
//! separate from the general application errors.

use std::fmt;
use thiserror::Error;

/// Main validation error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The kind of validation error
    pub kind: ValidationErrorKind,
    /// The field that failed validation
    pub field: String,
    /// Optional additional context
    pub context: Option<String>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(kind: ValidationErrorKind, field: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            context: None,
        }
    }

    /// Create a validation error with additional context
    pub fn with_context(
        kind: ValidationErrorKind,
        field: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            field: field.into(),
            context: Some(context.into()),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(ctx) => write!(
                f,
                "Validation failed for field '{}': {} - {}",
                self.field, self.kind, ctx
            ),
            None => write!(
                f,
                "Validation failed for field '{}': {}",
                self.field, self.kind
            ),
        }
    }
}

/// Specific validation error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Numeric value outside its allowed range
    #[error("Value out of range")]
    OutOfRange,

    /// Field is required but missing or empty
    #[error("Required field is missing")]
    RequiredField,

    /// Field value is too short
    #[error("Value is below minimum length")]
    TooShort,

    /// Custom validation error
    #[error("{0}")]
    Custom(String),
}

impl ValidationErrorKind {
    /// Map a `validator` rule code onto a kind
    pub fn from_code(code: &str) -> Self {
        match code {
            "range" => ValidationErrorKind::OutOfRange,
            "required" => ValidationErrorKind::RequiredField,
            "length" => ValidationErrorKind::TooShort,
            other => ValidationErrorKind::Custom(other.to_string()),
        }
    }
}

/// Collection of validation errors
#[derive(Debug, Default, Clone)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Create a new empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validation error to the collection
    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Check if there are any errors
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Get all errors
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "No validation errors")
        } else {
            write!(f, "Validation failed with {} error(s):", self.errors.len())?;
            for error in &self.errors {
                write!(f, "\n  - {}", error)?;
            }
            Ok(())
        }
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        let mut errors = Self::new();
        errors.add(error);
        errors
    }
}

/// Convert validation errors to application errors
impl From<ValidationError> for crate::error::Error {
    fn from(err: ValidationError) -> Self {
        crate::error::Error::validation(err.to_string())
    }
}

impl From<ValidationErrors> for crate::error::Error {
    fn from(err: ValidationErrors) -> Self {
        crate::error::Error::validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let error = ValidationError::with_context(
            ValidationErrorKind::OutOfRange,
            "event_id",
            "expected 1000..=9999",
        );
        let display = error.to_string();
        assert!(display.contains("event_id"));
        assert!(display.contains("out of range"));
        assert!(display.contains("1000..=9999"));
    }

    #[test]
    fn test_kind_from_code() {
        assert_eq!(ValidationErrorKind::from_code("range"), ValidationErrorKind::OutOfRange);
        assert_eq!(ValidationErrorKind::from_code("length"), ValidationErrorKind::TooShort);
        assert_eq!(
            ValidationErrorKind::from_code("email"),
            ValidationErrorKind::Custom("email".to_string())
        );
    }

    #[test]
    fn test_validation_errors_into_app_error() {
        let errors: ValidationErrors =
            ValidationError::new(ValidationErrorKind::RequiredField, "current_score").into();
        assert_eq!(errors.len(), 1);

        let app_error = crate::error::Error::from(errors);
        assert!(app_error.should_dlq());
        assert!(app_error.to_string().contains("current_score"));
    }
}

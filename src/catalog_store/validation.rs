//! Validation for catalog entities.
//!
//! Entities are validated as a whole after a patch has been applied, so every
//! problem with the resulting record is reported at once rather than one at a
//! time. Reference checks need the database and live in the store.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// A single field-level validation problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField {
        field: &'static str,
    },
    NonPositiveValue {
        field: &'static str,
        value: i64,
    },
    NegativeValue {
        field: &'static str,
        value: i64,
    },
    InvalidDate {
        field: &'static str,
        value: String,
    },
    InvalidId {
        field: &'static str,
        value: String,
    },
    MissingReference {
        field: &'static str,
        entity_type: &'static str,
        id: String,
    },
    InvalidVersionToken {
        value: String,
    },
    MissingVersionToken,
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::EmptyField { field }
            | ValidationError::NonPositiveValue { field, .. }
            | ValidationError::NegativeValue { field, .. }
            | ValidationError::InvalidDate { field, .. }
            | ValidationError::InvalidId { field, .. }
            | ValidationError::MissingReference { field, .. } => field,
            ValidationError::InvalidVersionToken { .. } | ValidationError::MissingVersionToken => {
                "updatedAt"
            }
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField { field } => {
                write!(f, "Field '{}' is required but was empty", field)
            }
            ValidationError::NonPositiveValue { field, value } => {
                write!(f, "Field '{}' must be positive, got {}", field, value)
            }
            ValidationError::NegativeValue { field, value } => {
                write!(f, "Field '{}' must be non-negative, got {}", field, value)
            }
            ValidationError::InvalidDate { field, value } => {
                write!(f, "Field '{}' must be a YYYY-MM-DD date, got '{}'", field, value)
            }
            ValidationError::InvalidId { field, value } => {
                write!(f, "Field '{}' is not a valid identifier: '{}'", field, value)
            }
            ValidationError::MissingReference {
                entity_type, id, ..
            } => {
                write!(f, "Referenced {} '{}' does not exist", entity_type, id)
            }
            ValidationError::InvalidVersionToken { value } => {
                write!(f, "'{}' is not an ISO-8601 timestamp", value)
            }
            ValidationError::MissingVersionToken => {
                write!(f, "An updatedAt version token is required")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Wire form of a validation problem, as listed under `details`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// A non-empty set of validation problems for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// `None` when there's nothing to report.
    pub fn from_vec(errors: Vec<ValidationError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(ValidationErrors(errors))
        }
    }

    pub fn single(error: ValidationError) -> Self {
        ValidationErrors(vec![error])
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn details(&self) -> Vec<FieldError> {
        self.0
            .iter()
            .map(|e| FieldError {
                field: e.field(),
                message: e.to_string(),
            })
            .collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

pub(crate) fn require_non_empty(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: &str,
) {
    if value.trim().is_empty() {
        errors.push(ValidationError::EmptyField { field });
    }
}

/// Optional text fields may be absent, but not blank.
pub(crate) fn require_non_blank(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: &Option<String>,
) {
    if let Some(value) = value {
        require_non_empty(errors, field, value);
    }
}

pub(crate) fn require_positive(errors: &mut Vec<ValidationError>, field: &'static str, value: i64) {
    if value < 1 {
        errors.push(ValidationError::NonPositiveValue { field, value });
    }
}

pub(crate) fn require_non_negative(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: Option<i64>,
) {
    if let Some(value) = value {
        if value < 0 {
            errors.push(ValidationError::NegativeValue { field, value });
        }
    }
}

pub(crate) fn require_date(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: &Option<String>,
) {
    if let Some(value) = value {
        if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
            errors.push(ValidationError::InvalidDate {
                field,
                value: value.clone(),
            });
        }
    }
}

/// Caller supplied ids must be usable in a URL path segment.
pub fn validate_id(value: &str) -> Result<(), ValidationError> {
    let valid = !value.is_empty()
        && value.len() <= 64
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidId {
            field: "id",
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_non_empty_rejects_whitespace() {
        let mut errors = vec![];
        require_non_empty(&mut errors, "name", "   ");
        assert_eq!(errors, vec![ValidationError::EmptyField { field: "name" }]);
    }

    #[test]
    fn test_optional_fields_are_only_checked_when_present() {
        let mut errors = vec![];
        require_non_blank(&mut errors, "description", &None);
        require_date(&mut errors, "heldOn", &None);
        require_non_negative(&mut errors, "durationMs", None);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_require_date() {
        let mut errors = vec![];
        require_date(&mut errors, "heldOn", &Some("2023-12-30".to_string()));
        assert!(errors.is_empty());

        require_date(&mut errors, "heldOn", &Some("2023-13-01".to_string()));
        require_date(&mut errors, "heldOn", &Some("30/12/2023".to_string()));
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field(), "heldOn");
    }

    #[test]
    fn test_numeric_bounds() {
        let mut errors = vec![];
        require_positive(&mut errors, "discNumber", 1);
        require_non_negative(&mut errors, "durationMs", Some(0));
        assert!(errors.is_empty());

        require_positive(&mut errors, "trackNumber", 0);
        require_non_negative(&mut errors, "durationMs", Some(-5));
        assert_eq!(
            errors,
            vec![
                ValidationError::NonPositiveValue {
                    field: "trackNumber",
                    value: 0
                },
                ValidationError::NegativeValue {
                    field: "durationMs",
                    value: -5
                },
            ]
        );
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("ar_001").is_ok());
        assert!(validate_id("ar-0f3a").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id("ar 001").is_err());
        assert!(validate_id("../etc").is_err());
    }

    #[test]
    fn test_details_carry_field_and_message() {
        let errors = ValidationErrors::from_vec(vec![
            ValidationError::EmptyField { field: "name" },
            ValidationError::InvalidVersionToken {
                value: "soon".to_string(),
            },
        ])
        .unwrap();

        let details = errors.details();
        assert_eq!(details[0].field, "name");
        assert_eq!(details[0].message, "Field 'name' is required but was empty");
        assert_eq!(details[1].field, "updatedAt");
    }

    #[test]
    fn test_empty_list_is_not_an_error() {
        assert!(ValidationErrors::from_vec(vec![]).is_none());
    }
}

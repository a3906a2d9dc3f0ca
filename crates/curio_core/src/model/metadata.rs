//! Item metadata values validated against a collection schema.
//!
//! # Responsibility
//! - Type-check and constraint-check a field→value map against a
//!   `MetadataSchema`.
//! - Expose read-only accessors over the validated map.
//!
//! # Invariants
//! - Every required schema field is present in a constructed value set.
//! - Keys not declared by the schema are rejected.
//! - Validation is fail-fast: the first violation is reported, nothing is
//!   partially accepted.

use crate::model::schema::{
    compiled_pattern, FieldDefinition, MetadataFieldType, MetadataSchema, ValidationRules,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One concrete metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MetadataValue {
    Text(String),
    Number(f64),
    Date(DateTime<Utc>),
    Boolean(bool),
}

impl MetadataValue {
    /// Field type this value satisfies.
    pub fn field_type(&self) -> MetadataFieldType {
        match self {
            Self::Text(_) => MetadataFieldType::Text,
            Self::Number(_) => MetadataFieldType::Number,
            Self::Date(_) => MetadataFieldType::Date,
            Self::Boolean(_) => MetadataFieldType::Boolean,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<DateTime<Utc>> for MetadataValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

/// Metadata value rejected by schema validation.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValidationError {
    MissingRequired(String),
    UndeclaredField(String),
    TypeMismatch {
        field: String,
        expected: MetadataFieldType,
        actual: MetadataFieldType,
    },
    TooShort {
        field: String,
        min: usize,
    },
    TooLong {
        field: String,
        max: usize,
    },
    PatternMismatch {
        field: String,
        pattern: String,
    },
    /// Pattern stored in the schema no longer compiles.
    InvalidPattern {
        field: String,
        pattern: String,
    },
    BelowMinimum {
        field: String,
        min: f64,
    },
    AboveMaximum {
        field: String,
        max: f64,
    },
    NonFiniteNumber(String),
}

impl MetadataValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            Self::MissingRequired(field)
            | Self::UndeclaredField(field)
            | Self::NonFiniteNumber(field) => field,
            Self::TypeMismatch { field, .. }
            | Self::TooShort { field, .. }
            | Self::TooLong { field, .. }
            | Self::PatternMismatch { field, .. }
            | Self::InvalidPattern { field, .. }
            | Self::BelowMinimum { field, .. }
            | Self::AboveMaximum { field, .. } => field,
        }
    }
}

impl Display for MetadataValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired(field) => write!(f, "Required field '{field}' is missing"),
            Self::UndeclaredField(field) => {
                write!(f, "Field '{field}' is not declared in the schema")
            }
            Self::TypeMismatch {
                field,
                expected,
                actual,
            } => write!(f, "Field '{field}' must be of type {expected}, got {actual}"),
            Self::TooShort { field, min } => {
                write!(f, "Field '{field}' must be at least {min} characters long")
            }
            Self::TooLong { field, max } => {
                write!(f, "Field '{field}' must be at most {max} characters long")
            }
            Self::PatternMismatch { field, pattern } => {
                write!(f, "Field '{field}' does not match pattern `{pattern}`")
            }
            Self::InvalidPattern { field, pattern } => {
                write!(f, "Field '{field}' declares an invalid pattern `{pattern}`")
            }
            Self::BelowMinimum { field, min } => {
                write!(f, "Field '{field}' must be at least {min}")
            }
            Self::AboveMaximum { field, max } => write!(f, "Field '{field}' must be at most {max}"),
            Self::NonFiniteNumber(field) => write!(f, "Field '{field}' must be a finite number"),
        }
    }
}

impl Error for MetadataValidationError {}

/// Field→value map that passed validation against a schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetadataValues {
    values: BTreeMap<String, MetadataValue>,
}

impl MetadataValues {
    /// Validates `values` against `schema`.
    ///
    /// Required fields are checked first (in name order), then each supplied
    /// value is checked for declaration, type and constraints.
    pub fn new(
        values: BTreeMap<String, MetadataValue>,
        schema: &MetadataSchema,
    ) -> Result<Self, MetadataValidationError> {
        for name in schema.required_fields() {
            if !values.contains_key(name) {
                return Err(MetadataValidationError::MissingRequired(name.to_string()));
            }
        }

        for (name, value) in &values {
            let definition = schema
                .field(name)
                .ok_or_else(|| MetadataValidationError::UndeclaredField(name.clone()))?;
            check_value(name, definition, value)?;
        }

        Ok(Self { values })
    }

    /// Wraps values loaded from storage that were validated on write.
    pub(crate) fn from_trusted(values: BTreeMap<String, MetadataValue>) -> Self {
        Self { values }
    }

    pub fn all_values(&self) -> &BTreeMap<String, MetadataValue> {
        &self.values
    }

    pub fn value(&self, name: &str) -> Option<&MetadataValue> {
        self.values.get(name)
    }

    pub fn has_value(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Returns the value under `name` when it holds a date.
    pub fn date_value(&self, name: &str) -> Option<DateTime<Utc>> {
        self.value(name).and_then(MetadataValue::as_date)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, MetadataValue> {
        self.values
    }
}

fn check_value(
    name: &str,
    definition: &FieldDefinition,
    value: &MetadataValue,
) -> Result<(), MetadataValidationError> {
    match (definition.field_type, value) {
        (MetadataFieldType::Text, MetadataValue::Text(text)) => {
            check_text(name, definition.validation.as_ref(), text)
        }
        (MetadataFieldType::Number, MetadataValue::Number(number)) => {
            check_number(name, definition.validation.as_ref(), *number)
        }
        (MetadataFieldType::Date, MetadataValue::Date(_))
        | (MetadataFieldType::Boolean, MetadataValue::Boolean(_)) => Ok(()),
        (expected, actual) => Err(MetadataValidationError::TypeMismatch {
            field: name.to_string(),
            expected,
            actual: actual.field_type(),
        }),
    }
}

fn check_text(
    name: &str,
    rules: Option<&ValidationRules>,
    text: &str,
) -> Result<(), MetadataValidationError> {
    let Some(rules) = rules else {
        return Ok(());
    };

    let length = text.chars().count();
    if let Some(min) = rules.min_length {
        if length < min {
            return Err(MetadataValidationError::TooShort {
                field: name.to_string(),
                min,
            });
        }
    }
    if let Some(max) = rules.max_length {
        if length > max {
            return Err(MetadataValidationError::TooLong {
                field: name.to_string(),
                max,
            });
        }
    }

    if let Some(pattern) = rules.pattern.as_deref() {
        let regex = compiled_pattern(pattern).map_err(|_| MetadataValidationError::InvalidPattern {
            field: name.to_string(),
            pattern: pattern.to_string(),
        })?;
        if !regex.is_match(text) {
            return Err(MetadataValidationError::PatternMismatch {
                field: name.to_string(),
                pattern: pattern.to_string(),
            });
        }
    }

    Ok(())
}

fn check_number(
    name: &str,
    rules: Option<&ValidationRules>,
    number: f64,
) -> Result<(), MetadataValidationError> {
    if !number.is_finite() {
        return Err(MetadataValidationError::NonFiniteNumber(name.to_string()));
    }
    let Some(rules) = rules else {
        return Ok(());
    };

    if let Some(min) = rules.min_value {
        if number < min {
            return Err(MetadataValidationError::BelowMinimum {
                field: name.to_string(),
                min,
            });
        }
    }
    if let Some(max) = rules.max_value {
        if number > max {
            return Err(MetadataValidationError::AboveMaximum {
                field: name.to_string(),
                max,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{MetadataValidationError, MetadataValue};
    use crate::model::schema::MetadataFieldType;
    use chrono::{TimeZone, Utc};

    #[test]
    fn value_serialization_is_tagged() {
        let date = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let json = serde_json::to_value(MetadataValue::Date(date)).unwrap();
        assert_eq!(json["type"], "date");
        assert_eq!(json["value"], "2026-03-01T12:00:00Z");

        let decoded: MetadataValue = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.as_date(), Some(date));
    }

    #[test]
    fn error_exposes_offending_field() {
        let err = MetadataValidationError::TypeMismatch {
            field: "pages".to_string(),
            expected: MetadataFieldType::Number,
            actual: MetadataFieldType::Text,
        };
        assert_eq!(err.field(), "pages");
        assert_eq!(err.to_string(), "Field 'pages' must be of type number, got text");
    }
}

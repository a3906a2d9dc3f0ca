//! Domain error kinds shared by aggregates.
//!
//! Declaration and value errors live beside the schema/metadata code that
//! raises them; this module holds aggregate invariant failures and the
//! `DomainError` union returned where more than one kind can surface.

use crate::model::metadata::MetadataValidationError;
use crate::model::notification::NotificationStatus;
use crate::model::schema::SchemaDeclarationError;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Aggregate invariant failure raised by constructors and update methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Name is blank after trim or longer than the entity limit.
    NameLength {
        entity: &'static str,
        max: usize,
        actual: usize,
    },
    /// Collection description exceeds its limit.
    DescriptionTooLong { max: usize, actual: usize },
    /// Notification message is blank or exceeds its limit.
    MessageLength { max: usize, actual: usize },
    /// Notification scheduled at or before the current instant.
    ScheduleNotInFuture { scheduled_for: DateTime<Utc> },
    /// Status machine rejected the requested edge.
    IllegalStatusTransition {
        from: NotificationStatus,
        to: NotificationStatus,
    },
    /// Reschedule attempted outside `pending`.
    RescheduleNotPending(NotificationStatus),
    /// Schema replacement adds required fields while items exist.
    RequiredFieldsAdded(Vec<String>),
}

impl Display for InvariantViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameLength {
                entity,
                max,
                actual,
            } => write!(
                f,
                "{entity} name must be between 1 and {max} characters, got {actual}"
            ),
            Self::DescriptionTooLong { max, actual } => write!(
                f,
                "collection description must be at most {max} characters, got {actual}"
            ),
            Self::MessageLength { max, actual } => write!(
                f,
                "notification message must be between 1 and {max} characters, got {actual}"
            ),
            Self::ScheduleNotInFuture { scheduled_for } => write!(
                f,
                "scheduled time must be in the future: {}",
                scheduled_for.to_rfc3339()
            ),
            Self::IllegalStatusTransition { from, to } => {
                write!(f, "cannot transition notification from {from} to {to}")
            }
            Self::RescheduleNotPending(status) => write!(
                f,
                "only pending notifications can be rescheduled, current status is {status}"
            ),
            Self::RequiredFieldsAdded(fields) => write!(
                f,
                "cannot add required fields to schema when items exist: {}",
                fields.join(", ")
            ),
        }
    }
}

impl Error for InvariantViolation {}

/// Union of every failure an aggregate operation can report.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    Schema(SchemaDeclarationError),
    Metadata(MetadataValidationError),
    Invariant(InvariantViolation),
}

impl Display for DomainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schema(err) => write!(f, "{err}"),
            Self::Metadata(err) => write!(f, "{err}"),
            Self::Invariant(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DomainError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Schema(err) => Some(err),
            Self::Metadata(err) => Some(err),
            Self::Invariant(err) => Some(err),
        }
    }
}

impl From<SchemaDeclarationError> for DomainError {
    fn from(value: SchemaDeclarationError) -> Self {
        Self::Schema(value)
    }
}

impl From<MetadataValidationError> for DomainError {
    fn from(value: MetadataValidationError) -> Self {
        Self::Metadata(value)
    }
}

impl From<InvariantViolation> for DomainError {
    fn from(value: InvariantViolation) -> Self {
        Self::Invariant(value)
    }
}

/// Trims `value` and enforces a `1..=max` char-count bound for entity names.
pub(crate) fn normalize_name(
    entity: &'static str,
    value: &str,
    max: usize,
) -> Result<String, InvariantViolation> {
    let trimmed = value.trim();
    let actual = trimmed.chars().count();
    if actual == 0 || actual > max {
        return Err(InvariantViolation::NameLength { entity, max, actual });
    }
    Ok(trimmed.to_string())
}

//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls and aggregate operations into use cases.
//! - Enforce ownership: a caller only ever sees its own records.
//! - Report failures as typed `ServiceError` kinds instead of strings.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Records owned by another user are reported as `NotFound`.

use crate::model::error::{DomainError, InvariantViolation};
use crate::model::metadata::MetadataValidationError;
use crate::model::schema::SchemaDeclarationError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod collection_service;
pub mod item_service;
pub mod notification_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error returned by every use-case service.
#[derive(Debug)]
pub enum ServiceError {
    /// Target record is missing or owned by someone else.
    NotFound { entity: &'static str, id: Uuid },
    /// Declaration, value or invariant failure from the domain model.
    Domain(DomainError),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the invariant violation when this error carries one.
    pub fn invariant(&self) -> Option<&InvariantViolation> {
        match self {
            Self::Domain(DomainError::Invariant(err)) => Some(err),
            _ => None,
        }
    }

    /// Returns the metadata validation failure when this error carries one.
    pub fn metadata(&self) -> Option<&MetadataValidationError> {
        match self {
            Self::Domain(DomainError::Metadata(err)) => Some(err),
            _ => None,
        }
    }

    /// Returns the schema declaration failure when this error carries one.
    pub fn schema(&self) -> Option<&SchemaDeclarationError> {
        match self {
            Self::Domain(DomainError::Schema(err)) => Some(err),
            _ => None,
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Domain(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent state: {details}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Domain(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Validation(err) => Self::Domain(DomainError::Invariant(err)),
            other => Self::Repo(other),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        Self::Domain(value)
    }
}

impl From<InvariantViolation> for ServiceError {
    fn from(value: InvariantViolation) -> Self {
        Self::Domain(value.into())
    }
}

impl From<MetadataValidationError> for ServiceError {
    fn from(value: MetadataValidationError) -> Self {
        Self::Domain(value.into())
    }
}

impl From<SchemaDeclarationError> for ServiceError {
    fn from(value: SchemaDeclarationError) -> Self {
        Self::Domain(value.into())
    }
}

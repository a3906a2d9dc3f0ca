//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define keyed lookup/write/delete contracts the use-case layer needs.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call the aggregate `validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.

use crate::clock::from_epoch_ms;
use crate::db::DbError;
use crate::model::error::InvariantViolation;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod collection_repo;
pub mod item_repo;
pub mod notification_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by all storage contracts.
#[derive(Debug)]
pub enum RepoError {
    /// Aggregate failed its own invariant check on write or read.
    Validation(InvariantViolation),
    Db(DbError),
    NotFound {
        entity: &'static str,
        id: Uuid,
    },
    /// Write collided with a uniqueness guard.
    Conflict(String),
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "conflicting write: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "required table `{table}` is missing; run migrations first")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<InvariantViolation> for RepoError {
    fn from(value: InvariantViolation) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn parse_timestamp(value: i64, column: &'static str) -> RepoResult<DateTime<Utc>> {
    from_epoch_ms(value).ok_or_else(|| {
        RepoError::InvalidData(format!("timestamp `{value}` out of range in {column}"))
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(value: &str, column: &'static str) -> RepoResult<T> {
    serde_json::from_str(value)
        .map_err(|err| RepoError::InvalidData(format!("invalid json in {column}: {err}")))
}

fn to_json<T: serde::Serialize>(value: &T, column: &'static str) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode {column}: {err}")))
}

fn ensure_tables(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    for &table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

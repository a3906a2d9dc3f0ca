//! Domain model for collections, items and their notifications.
//!
//! # Responsibility
//! - Define the aggregates and value objects the use-case layer works with.
//! - Enforce every construction and update invariant at the type boundary.
//!
//! # Invariants
//! - Aggregates are immutable; updates return new instances.
//! - Constructors fail closed and never yield partially valid values.
//! - Item metadata is only accepted after validation against a schema.

pub mod collection;
pub mod error;
pub mod item;
pub mod metadata;
pub mod notification;
pub mod schema;

/// Identifier of the user owning collections, items and notifications.
pub type UserId = uuid::Uuid;

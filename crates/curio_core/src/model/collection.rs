//! Collection aggregate.
//!
//! # Responsibility
//! - Own one `MetadataSchema` that every item in the collection conforms to.
//! - Provide copy-on-write update helpers.
//!
//! # Invariants
//! - `name` is 1..=100 chars after trim, `description` at most 500 chars.
//! - Update helpers never mutate `self`; they return a new instance with a
//!   refreshed `updated_at`.
//! - The schema is replaced wholesale and only through the evolution guard.

use crate::clock::now_utc;
use crate::model::error::{normalize_name, InvariantViolation};
use crate::model::schema::MetadataSchema;
use crate::model::UserId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub type CollectionId = Uuid;

pub const COLLECTION_NAME_MAX_CHARS: usize = 100;
pub const COLLECTION_DESCRIPTION_MAX_CHARS: usize = 500;

/// User-owned container declaring the metadata shape of its items.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub(crate) id: CollectionId,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) owner_id: UserId,
    pub(crate) metadata_schema: MetadataSchema,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Collection {
    /// Creates a collection with a generated ID.
    pub fn new(
        owner_id: UserId,
        name: &str,
        description: &str,
        metadata_schema: MetadataSchema,
    ) -> Result<Self, InvariantViolation> {
        let now = now_utc();
        Ok(Self {
            id: Uuid::new_v4(),
            name: normalize_name("collection", name, COLLECTION_NAME_MAX_CHARS)?,
            description: check_description(description)?,
            owner_id,
            metadata_schema,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> CollectionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    pub fn metadata_schema(&self) -> &MetadataSchema {
        &self.metadata_schema
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn update_name(&self, name: &str) -> Result<Self, InvariantViolation> {
        Ok(Self {
            name: normalize_name("collection", name, COLLECTION_NAME_MAX_CHARS)?,
            updated_at: now_utc(),
            ..self.clone()
        })
    }

    pub fn update_description(&self, description: &str) -> Result<Self, InvariantViolation> {
        Ok(Self {
            description: check_description(description)?,
            updated_at: now_utc(),
            ..self.clone()
        })
    }

    /// Replaces the schema after running the evolution guard.
    ///
    /// `existing_item_count` is the number of items currently stored in this
    /// collection. The returned schema version is one above the current one.
    pub fn update_metadata_schema(
        &self,
        schema: MetadataSchema,
        existing_item_count: u64,
    ) -> Result<Self, InvariantViolation> {
        self.metadata_schema
            .check_evolution(&schema, existing_item_count)?;
        let now = now_utc();
        Ok(Self {
            metadata_schema: schema.succeed(&self.metadata_schema, now),
            updated_at: now,
            ..self.clone()
        })
    }

    /// Re-checks field bounds, used on storage read paths.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        normalize_name("collection", &self.name, COLLECTION_NAME_MAX_CHARS)?;
        check_description(&self.description)?;
        Ok(())
    }
}

fn check_description(value: &str) -> Result<String, InvariantViolation> {
    let actual = value.chars().count();
    if actual > COLLECTION_DESCRIPTION_MAX_CHARS {
        return Err(InvariantViolation::DescriptionTooLong {
            max: COLLECTION_DESCRIPTION_MAX_CHARS,
            actual,
        });
    }
    Ok(value.to_string())
}

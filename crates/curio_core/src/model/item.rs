//! Item aggregate.
//!
//! # Invariants
//! - `collection_id` and `owner_id` are fixed at creation; no method changes
//!   them.
//! - `name` is 1..=200 chars after trim.
//! - `update_metadata` re-validates against the supplied schema even when the
//!   caller already did, so a stale schema cannot slip values through.

use crate::clock::now_utc;
use crate::model::collection::CollectionId;
use crate::model::error::{normalize_name, InvariantViolation};
use crate::model::metadata::{MetadataValidationError, MetadataValues};
use crate::model::schema::MetadataSchema;
use crate::model::UserId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub type ItemId = Uuid;

pub const ITEM_NAME_MAX_CHARS: usize = 200;

/// Record stored in exactly one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub(crate) id: ItemId,
    pub(crate) name: String,
    pub(crate) collection_id: CollectionId,
    pub(crate) owner_id: UserId,
    pub(crate) metadata: MetadataValues,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Item {
    /// Creates an item with a generated ID from already validated metadata.
    pub fn new(
        owner_id: UserId,
        collection_id: CollectionId,
        name: &str,
        metadata: MetadataValues,
    ) -> Result<Self, InvariantViolation> {
        let now = now_utc();
        Ok(Self {
            id: Uuid::new_v4(),
            name: normalize_name("item", name, ITEM_NAME_MAX_CHARS)?,
            collection_id,
            owner_id,
            metadata,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection_id(&self) -> CollectionId {
        self.collection_id
    }

    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    pub fn metadata(&self) -> &MetadataValues {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn update_name(&self, name: &str) -> Result<Self, InvariantViolation> {
        Ok(Self {
            name: normalize_name("item", name, ITEM_NAME_MAX_CHARS)?,
            updated_at: now_utc(),
            ..self.clone()
        })
    }

    pub fn update_metadata(
        &self,
        metadata: MetadataValues,
        schema: &MetadataSchema,
    ) -> Result<Self, MetadataValidationError> {
        let metadata = MetadataValues::new(metadata.into_inner(), schema)?;
        Ok(Self {
            metadata,
            updated_at: now_utc(),
            ..self.clone()
        })
    }

    /// Re-checks field bounds, used on storage read paths.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        normalize_name("item", &self.name, ITEM_NAME_MAX_CHARS)?;
        Ok(())
    }
}

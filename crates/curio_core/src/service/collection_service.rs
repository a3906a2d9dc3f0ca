//! Collection use-case service.
//!
//! # Responsibility
//! - Create, read, update and delete collections for one owner.
//! - Apply the schema evolution guard with the collection's live item count.
//! - Cascade deletes to items and their notifications.
//!
//! # Invariants
//! - Adding a required field is rejected while the collection holds items.
//! - Deletion order is notifications, then items, then the collection, so no
//!   orphaned notification is left behind even without FK cascades.
//! - The evolution check and the schema write are not atomic; stores shared
//!   across processes must serialize updates per collection.

use crate::model::collection::{Collection, CollectionId};
use crate::model::schema::{FieldDefinition, MetadataSchema};
use crate::model::UserId;
use crate::repo::collection_repo::CollectionRepository;
use crate::repo::item_repo::ItemRepository;
use crate::repo::notification_repo::NotificationRepository;
use crate::service::{ServiceError, ServiceResult};
use log::{info, warn};
use std::collections::BTreeMap;

/// Partial update request; `None` leaves the attribute unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Full replacement field set for the metadata schema.
    pub fields: Option<BTreeMap<String, FieldDefinition>>,
}

/// Counts of records removed by a collection delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionDeletion {
    pub items_removed: usize,
    pub notifications_removed: usize,
}

/// Collection service facade over repository implementations.
pub struct CollectionService<C, I, N> {
    collections: C,
    items: I,
    notifications: N,
}

impl<C, I, N> CollectionService<C, I, N>
where
    C: CollectionRepository,
    I: ItemRepository,
    N: NotificationRepository,
{
    pub fn new(collections: C, items: I, notifications: N) -> Self {
        Self {
            collections,
            items,
            notifications,
        }
    }

    /// Declares a schema from `fields` and stores a new collection.
    pub fn create_collection(
        &self,
        owner_id: UserId,
        name: &str,
        description: &str,
        fields: BTreeMap<String, FieldDefinition>,
    ) -> ServiceResult<Collection> {
        let schema = MetadataSchema::new(fields)?;
        let collection = Collection::new(owner_id, name, description, schema)?;
        let id = self.collections.create_collection(&collection)?;

        info!(
            "event=collection_create module=service status=ok collection_id={id} fields={}",
            collection.metadata_schema().all_fields().len()
        );
        self.collections
            .get_collection(id)?
            .ok_or(ServiceError::InconsistentState(
                "created collection not found in read-back",
            ))
    }

    /// Gets one collection owned by `owner_id`.
    pub fn get_collection(&self, owner_id: UserId, id: CollectionId) -> ServiceResult<Collection> {
        self.collections
            .get_collection(id)?
            .filter(|collection| collection.owner_id() == owner_id)
            .ok_or(ServiceError::NotFound {
                entity: "collection",
                id,
            })
    }

    pub fn list_collections(&self, owner_id: UserId) -> ServiceResult<Vec<Collection>> {
        Ok(self.collections.list_by_owner(owner_id)?)
    }

    /// Applies a partial update.
    ///
    /// When `fields` is present the schema is replaced under the evolution
    /// guard and its version is bumped.
    pub fn update_collection(
        &self,
        owner_id: UserId,
        id: CollectionId,
        update: CollectionUpdate,
    ) -> ServiceResult<Collection> {
        let mut collection = self.get_collection(owner_id, id)?;

        if let Some(name) = update.name.as_deref() {
            collection = collection.update_name(name)?;
        }
        if let Some(description) = update.description.as_deref() {
            collection = collection.update_description(description)?;
        }
        if let Some(fields) = update.fields {
            let schema = MetadataSchema::new(fields)?;
            let item_count = self.items.count_by_collection(id)?;
            collection = collection
                .update_metadata_schema(schema, item_count)
                .map_err(|err| {
                    warn!(
                        "event=collection_schema_update module=service status=rejected collection_id={id} items={item_count} error={err}"
                    );
                    err
                })?;
        }

        self.collections.update_collection(&collection)?;
        info!(
            "event=collection_update module=service status=ok collection_id={id} schema_version={}",
            collection.metadata_schema().version()
        );
        Ok(collection)
    }

    /// Deletes a collection with its items and their notifications.
    pub fn delete_collection(
        &self,
        owner_id: UserId,
        id: CollectionId,
    ) -> ServiceResult<CollectionDeletion> {
        let collection = self.get_collection(owner_id, id)?;

        let mut deletion = CollectionDeletion::default();
        for item in self.items.list_by_collection(collection.id())? {
            deletion.notifications_removed += self.notifications.delete_by_item(item.id())?;
        }
        deletion.items_removed = self.items.delete_by_collection(collection.id())?;
        self.collections.delete_collection(collection.id())?;

        info!(
            "event=collection_delete module=service status=ok collection_id={id} items_removed={} notifications_removed={}",
            deletion.items_removed, deletion.notifications_removed
        );
        Ok(deletion)
    }
}

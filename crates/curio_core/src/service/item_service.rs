//! Item use-case service.
//!
//! # Invariants
//! - Metadata is validated against the owning collection's *current* schema
//!   on every create and update.
//! - An item can only be created in a collection owned by the caller.
//! - Deleting an item deletes its notifications first.

use crate::model::collection::{Collection, CollectionId};
use crate::model::item::{Item, ItemId};
use crate::model::metadata::{MetadataValue, MetadataValues};
use crate::model::UserId;
use crate::repo::collection_repo::CollectionRepository;
use crate::repo::item_repo::ItemRepository;
use crate::repo::notification_repo::NotificationRepository;
use crate::service::{ServiceError, ServiceResult};
use log::info;
use std::collections::BTreeMap;

/// Partial update request; `None` leaves the attribute unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemUpdate {
    pub name: Option<String>,
    /// Full replacement metadata map.
    pub metadata: Option<BTreeMap<String, MetadataValue>>,
}

/// Item service facade over repository implementations.
pub struct ItemService<C, I, N> {
    collections: C,
    items: I,
    notifications: N,
}

impl<C, I, N> ItemService<C, I, N>
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

    /// Validates `metadata` against the collection schema and stores an item.
    pub fn create_item(
        &self,
        owner_id: UserId,
        collection_id: CollectionId,
        name: &str,
        metadata: BTreeMap<String, MetadataValue>,
    ) -> ServiceResult<Item> {
        let collection = self.owned_collection(owner_id, collection_id)?;
        let metadata = MetadataValues::new(metadata, collection.metadata_schema())?;
        let item = Item::new(owner_id, collection.id(), name, metadata)?;
        let id = self.items.create_item(&item)?;

        info!(
            "event=item_create module=service status=ok item_id={id} collection_id={collection_id}"
        );
        self.items
            .get_item(id)?
            .ok_or(ServiceError::InconsistentState(
                "created item not found in read-back",
            ))
    }

    /// Gets one item owned by `owner_id`.
    pub fn get_item(&self, owner_id: UserId, id: ItemId) -> ServiceResult<Item> {
        self.items
            .get_item(id)?
            .filter(|item| item.owner_id() == owner_id)
            .ok_or(ServiceError::NotFound { entity: "item", id })
    }

    pub fn list_items(&self, owner_id: UserId) -> ServiceResult<Vec<Item>> {
        Ok(self.items.list_by_owner(owner_id)?)
    }

    pub fn list_collection_items(
        &self,
        owner_id: UserId,
        collection_id: CollectionId,
    ) -> ServiceResult<Vec<Item>> {
        let collection = self.owned_collection(owner_id, collection_id)?;
        Ok(self.items.list_by_collection(collection.id())?)
    }

    /// Applies a partial update; metadata is re-validated against the
    /// collection's current schema.
    pub fn update_item(
        &self,
        owner_id: UserId,
        id: ItemId,
        update: ItemUpdate,
    ) -> ServiceResult<Item> {
        let mut item = self.get_item(owner_id, id)?;

        if let Some(name) = update.name.as_deref() {
            item = item.update_name(name)?;
        }
        if let Some(metadata) = update.metadata {
            let collection = self
                .collections
                .get_collection(item.collection_id())?
                .ok_or(ServiceError::InconsistentState(
                    "item references a missing collection",
                ))?;
            let schema = collection.metadata_schema();
            let values = MetadataValues::new(metadata, schema)?;
            item = item.update_metadata(values, schema)?;
        }

        self.items.update_item(&item)?;
        info!("event=item_update module=service status=ok item_id={id}");
        Ok(item)
    }

    /// Deletes an item after removing its notifications.
    ///
    /// Returns the number of notifications removed.
    pub fn delete_item(&self, owner_id: UserId, id: ItemId) -> ServiceResult<usize> {
        let item = self.get_item(owner_id, id)?;
        let notifications_removed = self.notifications.delete_by_item(item.id())?;
        self.items.delete_item(item.id())?;

        info!(
            "event=item_delete module=service status=ok item_id={id} notifications_removed={notifications_removed}"
        );
        Ok(notifications_removed)
    }

    fn owned_collection(
        &self,
        owner_id: UserId,
        collection_id: CollectionId,
    ) -> ServiceResult<Collection> {
        self.collections
            .get_collection(collection_id)?
            .filter(|collection| collection.owner_id() == owner_id)
            .ok_or(ServiceError::NotFound {
                entity: "collection",
                id: collection_id,
            })
    }
}

//! Item repository contract and SQLite implementation.
//!
//! # Invariants
//! - `collection_id` and `owner_id` are written once on insert and never by
//!   `update_item`.
//! - Metadata is stored as tagged JSON values; it was validated against the
//!   collection schema before the write.

use super::{ensure_tables, parse_json, parse_timestamp, parse_uuid, to_json, RepoError, RepoResult};
use crate::clock::to_epoch_ms;
use crate::model::collection::CollectionId;
use crate::model::item::{Item, ItemId};
use crate::model::metadata::{MetadataValue, MetadataValues};
use crate::model::UserId;
use rusqlite::{params, Connection, Row};
use std::collections::BTreeMap;

const ITEM_SELECT_SQL: &str = "SELECT
    id,
    collection_id,
    owner_id,
    name,
    metadata,
    created_at,
    updated_at
FROM items";

/// Storage contract for items.
pub trait ItemRepository {
    fn create_item(&self, item: &Item) -> RepoResult<ItemId>;
    /// Overwrites name, metadata and `updated_at`.
    fn update_item(&self, item: &Item) -> RepoResult<()>;
    fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>>;
    /// Lists items of one owner ordered by `created_at ASC, id ASC`.
    fn list_by_owner(&self, owner_id: UserId) -> RepoResult<Vec<Item>>;
    /// Lists items of one collection ordered by `created_at ASC, id ASC`.
    fn list_by_collection(&self, collection_id: CollectionId) -> RepoResult<Vec<Item>>;
    fn count_by_collection(&self, collection_id: CollectionId) -> RepoResult<u64>;
    fn delete_item(&self, id: ItemId) -> RepoResult<()>;
    /// Deletes every item in a collection and returns how many were removed.
    fn delete_by_collection(&self, collection_id: CollectionId) -> RepoResult<usize>;
}

/// SQLite-backed item repository.
pub struct SqliteItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteItemRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["collections", "items"])?;
        Ok(Self { conn })
    }

    fn query_items(&self, filter: &str, key: String) -> RepoResult<Vec<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE {filter} = ?1
             ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([key])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn create_item(&self, item: &Item) -> RepoResult<ItemId> {
        item.validate()?;
        let metadata_json = to_json(item.metadata.all_values(), "items.metadata")?;

        self.conn.execute(
            "INSERT INTO items (
                id,
                collection_id,
                owner_id,
                name,
                metadata,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                item.id.to_string(),
                item.collection_id.to_string(),
                item.owner_id.to_string(),
                item.name.as_str(),
                metadata_json,
                to_epoch_ms(item.created_at),
                to_epoch_ms(item.updated_at),
            ],
        )?;

        Ok(item.id)
    }

    fn update_item(&self, item: &Item) -> RepoResult<()> {
        item.validate()?;
        let metadata_json = to_json(item.metadata.all_values(), "items.metadata")?;

        let changed = self.conn.execute(
            "UPDATE items
             SET
                name = ?1,
                metadata = ?2,
                updated_at = ?3
             WHERE id = ?4;",
            params![
                item.name.as_str(),
                metadata_json,
                to_epoch_ms(item.updated_at),
                item.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "item",
                id: item.id,
            });
        }
        Ok(())
    }

    fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ITEM_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?));
        }
        Ok(None)
    }

    fn list_by_owner(&self, owner_id: UserId) -> RepoResult<Vec<Item>> {
        self.query_items("owner_id", owner_id.to_string())
    }

    fn list_by_collection(&self, collection_id: CollectionId) -> RepoResult<Vec<Item>> {
        self.query_items("collection_id", collection_id.to_string())
    }

    fn count_by_collection(&self, collection_id: CollectionId) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM items WHERE collection_id = ?1;",
            [collection_id.to_string()],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative item count `{count}`")))
    }

    fn delete_item(&self, id: ItemId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM items WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "item", id });
        }
        Ok(())
    }

    fn delete_by_collection(&self, collection_id: CollectionId) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM items WHERE collection_id = ?1;",
            [collection_id.to_string()],
        )?;
        Ok(removed)
    }
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    let id_text: String = row.get("id")?;
    let collection_text: String = row.get("collection_id")?;
    let owner_text: String = row.get("owner_id")?;
    let metadata_text: String = row.get("metadata")?;
    let values: BTreeMap<String, MetadataValue> = parse_json(&metadata_text, "items.metadata")?;

    let item = Item {
        id: parse_uuid(&id_text, "items.id")?,
        name: row.get("name")?,
        collection_id: parse_uuid(&collection_text, "items.collection_id")?,
        owner_id: parse_uuid(&owner_text, "items.owner_id")?,
        metadata: MetadataValues::from_trusted(values),
        created_at: parse_timestamp(row.get("created_at")?, "items.created_at")?,
        updated_at: parse_timestamp(row.get("updated_at")?, "items.updated_at")?,
    };
    item.validate()?;
    Ok(item)
}

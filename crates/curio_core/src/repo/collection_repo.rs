//! Collection repository contract and SQLite implementation.
//!
//! # Invariants
//! - The metadata schema is stored as JSON and re-validated when loaded.
//! - Deleting a collection relies on the caller (or FK cascade) to clear
//!   items and notifications.

use super::{ensure_tables, parse_json, parse_timestamp, parse_uuid, to_json, RepoError, RepoResult};
use crate::clock::to_epoch_ms;
use crate::model::collection::{Collection, CollectionId};
use crate::model::schema::MetadataSchema;
use crate::model::UserId;
use rusqlite::{params, Connection, Row};

const COLLECTION_SELECT_SQL: &str = "SELECT
    id,
    owner_id,
    name,
    description,
    metadata_schema,
    created_at,
    updated_at
FROM collections";

/// Storage contract for collections.
pub trait CollectionRepository {
    fn create_collection(&self, collection: &Collection) -> RepoResult<CollectionId>;
    /// Overwrites name, description, schema and `updated_at`.
    fn update_collection(&self, collection: &Collection) -> RepoResult<()>;
    fn get_collection(&self, id: CollectionId) -> RepoResult<Option<Collection>>;
    /// Lists collections of one owner ordered by `created_at ASC, id ASC`.
    fn list_by_owner(&self, owner_id: UserId) -> RepoResult<Vec<Collection>>;
    fn delete_collection(&self, id: CollectionId) -> RepoResult<()>;
}

/// SQLite-backed collection repository.
pub struct SqliteCollectionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCollectionRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["collections"])?;
        Ok(Self { conn })
    }
}

impl CollectionRepository for SqliteCollectionRepository<'_> {
    fn create_collection(&self, collection: &Collection) -> RepoResult<CollectionId> {
        collection.validate()?;
        let schema_json = to_json(&collection.metadata_schema, "collections.metadata_schema")?;

        self.conn.execute(
            "INSERT INTO collections (
                id,
                owner_id,
                name,
                description,
                metadata_schema,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                collection.id.to_string(),
                collection.owner_id.to_string(),
                collection.name.as_str(),
                collection.description.as_str(),
                schema_json,
                to_epoch_ms(collection.created_at),
                to_epoch_ms(collection.updated_at),
            ],
        )?;

        Ok(collection.id)
    }

    fn update_collection(&self, collection: &Collection) -> RepoResult<()> {
        collection.validate()?;
        let schema_json = to_json(&collection.metadata_schema, "collections.metadata_schema")?;

        let changed = self.conn.execute(
            "UPDATE collections
             SET
                name = ?1,
                description = ?2,
                metadata_schema = ?3,
                updated_at = ?4
             WHERE id = ?5;",
            params![
                collection.name.as_str(),
                collection.description.as_str(),
                schema_json,
                to_epoch_ms(collection.updated_at),
                collection.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "collection",
                id: collection.id,
            });
        }
        Ok(())
    }

    fn get_collection(&self, id: CollectionId) -> RepoResult<Option<Collection>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COLLECTION_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_collection_row(row)?));
        }
        Ok(None)
    }

    fn list_by_owner(&self, owner_id: UserId) -> RepoResult<Vec<Collection>> {
        let mut stmt = self.conn.prepare(&format!(
            "{COLLECTION_SELECT_SQL}
             WHERE owner_id = ?1
             ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([owner_id.to_string()])?;
        let mut collections = Vec::new();
        while let Some(row) = rows.next()? {
            collections.push(parse_collection_row(row)?);
        }
        Ok(collections)
    }

    fn delete_collection(&self, id: CollectionId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM collections WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "collection",
                id,
            });
        }
        Ok(())
    }
}

fn parse_collection_row(row: &Row<'_>) -> RepoResult<Collection> {
    let id_text: String = row.get("id")?;
    let owner_text: String = row.get("owner_id")?;
    let schema_text: String = row.get("metadata_schema")?;
    let metadata_schema: MetadataSchema =
        parse_json(&schema_text, "collections.metadata_schema")?;

    let collection = Collection {
        id: parse_uuid(&id_text, "collections.id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        owner_id: parse_uuid(&owner_text, "collections.owner_id")?,
        metadata_schema,
        created_at: parse_timestamp(row.get("created_at")?, "collections.created_at")?,
        updated_at: parse_timestamp(row.get("updated_at")?, "collections.updated_at")?,
    };
    collection.validate()?;
    Ok(collection)
}

//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `curio_core` linkage with a deterministic health check.
//! - Optionally run one end-to-end generation pass on a demo collection.
//!
//! Usage: `curio_cli [config.json]`

use chrono::TimeDelta;
use curio_core::clock::now_utc;
use curio_core::db::{open_db, open_db_in_memory};
use curio_core::{
    CollectionService, CoreConfig, FieldDefinition, ItemService, MetadataFieldType,
    MetadataValue, NotificationService, SqliteCollectionRepository, SqliteItemRepository,
    SqliteNotificationRepository,
};
use log::info;
use std::collections::BTreeMap;
use std::error::Error;
use uuid::Uuid;

fn main() -> Result<(), Box<dyn Error>> {
    println!("curio_core ping={}", curio_core::ping());
    println!("curio_core version={}", curio_core::core_version());

    let Some(config_path) = std::env::args().nth(1) else {
        return Ok(());
    };
    let config = CoreConfig::from_json_str(&std::fs::read_to_string(&config_path)?)?;
    if let Some(log_dir) = config.log_dir.as_deref() {
        curio_core::init_logging(&config.log_level, &log_dir.to_string_lossy())?;
    }

    let conn = match config.database_path.as_deref() {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };

    let owner_id = Uuid::new_v4();
    let collections = CollectionService::new(
        SqliteCollectionRepository::try_new(&conn)?,
        SqliteItemRepository::try_new(&conn)?,
        SqliteNotificationRepository::try_new(&conn)?,
    );
    let items = ItemService::new(
        SqliteCollectionRepository::try_new(&conn)?,
        SqliteItemRepository::try_new(&conn)?,
        SqliteNotificationRepository::try_new(&conn)?,
    );
    let notifications = NotificationService::with_policy(
        SqliteItemRepository::try_new(&conn)?,
        SqliteNotificationRepository::try_new(&conn)?,
        config.notifications,
    );

    let mut fields = BTreeMap::new();
    fields.insert(
        "expirationDate".to_string(),
        FieldDefinition::required(MetadataFieldType::Date),
    );
    let pantry = collections.create_collection(owner_id, "Pantry", "demo", fields)?;

    let mut metadata = BTreeMap::new();
    metadata.insert(
        "expirationDate".to_string(),
        MetadataValue::Date(now_utc() + TimeDelta::days(10)),
    );
    items.create_item(owner_id, pantry.id(), "Milk", metadata)?;

    let report = notifications.generate_for_owner(owner_id)?;
    info!(
        "event=cli_generate module=cli status=ok generated={}",
        report.generated_count
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

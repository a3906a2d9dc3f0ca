//! Notification repository contract and SQLite implementation.
//!
//! # Invariants
//! - At most one `pending` notification exists per `(item_id, type)`; a
//!   second insert surfaces as `RepoError::Conflict`.
//! - Lists are ordered by `scheduled_for ASC, id ASC`.

use super::{ensure_tables, parse_json, parse_timestamp, parse_uuid, to_json, RepoError, RepoResult};
use crate::clock::to_epoch_ms;
use crate::model::item::ItemId;
use crate::model::notification::{
    Notification, NotificationId, NotificationStatus, NotificationType,
};
use crate::model::UserId;
use rusqlite::{ffi, params, Connection, ErrorCode, Row};
use serde_json::Value;
use std::collections::BTreeMap;

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    item_id,
    type,
    message,
    scheduled_for,
    delivered_at,
    status,
    metadata,
    created_at,
    updated_at
FROM notifications";

/// Storage contract for notifications.
pub trait NotificationRepository {
    fn create_notification(&self, notification: &Notification) -> RepoResult<NotificationId>;
    /// Overwrites schedule, status, `delivered_at` and `updated_at`.
    fn update_notification(&self, notification: &Notification) -> RepoResult<()>;
    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>>;
    fn list_by_user(&self, user_id: UserId) -> RepoResult<Vec<Notification>>;
    fn list_by_item(&self, item_id: ItemId) -> RepoResult<Vec<Notification>>;
    /// Deletes every notification of an item and returns how many were removed.
    fn delete_by_item(&self, item_id: ItemId) -> RepoResult<usize>;
}

/// SQLite-backed notification repository.
pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["items", "notifications"])?;
        Ok(Self { conn })
    }

    fn query_notifications(&self, filter: &str, key: String) -> RepoResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTIFICATION_SELECT_SQL}
             WHERE {filter} = ?1
             ORDER BY scheduled_for ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([key])?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(parse_notification_row(row)?);
        }
        Ok(notifications)
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn create_notification(&self, notification: &Notification) -> RepoResult<NotificationId> {
        notification.validate()?;
        let metadata_json = to_json(&notification.metadata, "notifications.metadata")?;

        let inserted = self.conn.execute(
            "INSERT INTO notifications (
                id,
                user_id,
                item_id,
                type,
                message,
                scheduled_for,
                delivered_at,
                status,
                metadata,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                notification.id.to_string(),
                notification.user_id.to_string(),
                notification.item_id.to_string(),
                notification.kind.as_str(),
                notification.message.as_str(),
                to_epoch_ms(notification.scheduled_for),
                notification.delivered_at.map(to_epoch_ms),
                notification.status.as_str(),
                metadata_json,
                to_epoch_ms(notification.created_at),
                to_epoch_ms(notification.updated_at),
            ],
        );

        match inserted {
            Ok(_) => Ok(notification.id),
            Err(err) if is_unique_violation(&err) => Err(RepoError::Conflict(format!(
                "pending {} notification already exists for item {}",
                notification.kind, notification.item_id
            ))),
            Err(err) => Err(err.into()),
        }
    }

    fn update_notification(&self, notification: &Notification) -> RepoResult<()> {
        notification.validate()?;

        let changed = self.conn.execute(
            "UPDATE notifications
             SET
                scheduled_for = ?1,
                delivered_at = ?2,
                status = ?3,
                updated_at = ?4
             WHERE id = ?5;",
            params![
                to_epoch_ms(notification.scheduled_for),
                notification.delivered_at.map(to_epoch_ms),
                notification.status.as_str(),
                to_epoch_ms(notification.updated_at),
                notification.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "notification",
                id: notification.id,
            });
        }
        Ok(())
    }

    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTIFICATION_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_notification_row(row)?));
        }
        Ok(None)
    }

    fn list_by_user(&self, user_id: UserId) -> RepoResult<Vec<Notification>> {
        self.query_notifications("user_id", user_id.to_string())
    }

    fn list_by_item(&self, item_id: ItemId) -> RepoResult<Vec<Notification>> {
        self.query_notifications("item_id", item_id.to_string())
    }

    fn delete_by_item(&self, item_id: ItemId) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM notifications WHERE item_id = ?1;",
            [item_id.to_string()],
        )?;
        Ok(removed)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == ErrorCode::ConstraintViolation
                && inner.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let id_text: String = row.get("id")?;
    let user_text: String = row.get("user_id")?;
    let item_text: String = row.get("item_id")?;

    let type_text: String = row.get("type")?;
    let kind = NotificationType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid notification type `{type_text}` in notifications.type"
        ))
    })?;

    let status_text: String = row.get("status")?;
    let status = NotificationStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid notification status `{status_text}` in notifications.status"
        ))
    })?;

    let delivered_at = match row.get::<_, Option<i64>>("delivered_at")? {
        Some(value) => Some(parse_timestamp(value, "notifications.delivered_at")?),
        None => None,
    };

    let metadata_text: String = row.get("metadata")?;
    let metadata: BTreeMap<String, Value> =
        parse_json(&metadata_text, "notifications.metadata")?;

    let notification = Notification {
        id: parse_uuid(&id_text, "notifications.id")?,
        user_id: parse_uuid(&user_text, "notifications.user_id")?,
        item_id: parse_uuid(&item_text, "notifications.item_id")?,
        kind,
        message: row.get("message")?,
        scheduled_for: parse_timestamp(row.get("scheduled_for")?, "notifications.scheduled_for")?,
        delivered_at,
        status,
        metadata,
        created_at: parse_timestamp(row.get("created_at")?, "notifications.created_at")?,
        updated_at: parse_timestamp(row.get("updated_at")?, "notifications.updated_at")?,
    };
    notification.validate()?;
    Ok(notification)
}

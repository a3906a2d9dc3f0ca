//! Notification generation and lifecycle use cases.
//!
//! # Responsibility
//! - Derive expiration/maintenance notifications from item metadata.
//! - List notifications and drive their delivery lifecycle.
//!
//! # Invariants
//! - Trigger aliases are tried in fixed order; the first alias holding a date
//!   wins and later aliases are not consulted.
//! - At most one pending notification per item and type; reruns with
//!   unchanged data create nothing.
//! - A notification is only created when `trigger - lead` is still in the
//!   future. Items already inside the lead window (or past due) get no
//!   notification from a run.

use crate::clock::now_utc;
use crate::model::item::{Item, ItemId};
use crate::model::metadata::MetadataValues;
use crate::model::notification::{Notification, NotificationDraft, NotificationId, NotificationType};
use crate::model::UserId;
use crate::repo::item_repo::ItemRepository;
use crate::repo::notification_repo::NotificationRepository;
use crate::repo::RepoError;
use crate::service::{ServiceError, ServiceResult};
use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata keys checked for an expiration date, in precedence order.
pub const EXPIRATION_ALIASES: &[&str] = &["expirationDate", "expiry", "expires"];
/// Metadata keys checked for a maintenance date, in precedence order.
pub const MAINTENANCE_ALIASES: &[&str] = &["maintenanceDate", "nextMaintenance"];

pub const DEFAULT_EXPIRATION_LEAD_DAYS: u32 = 3;
pub const DEFAULT_MAINTENANCE_LEAD_DAYS: u32 = 7;

/// Lead times applied by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPolicy {
    pub expiration_lead_days: u32,
    pub maintenance_lead_days: u32,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            expiration_lead_days: DEFAULT_EXPIRATION_LEAD_DAYS,
            maintenance_lead_days: DEFAULT_MAINTENANCE_LEAD_DAYS,
        }
    }
}

/// Summary of one newly created notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedNotification {
    pub id: NotificationId,
    pub item_id: ItemId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    pub scheduled_for: DateTime<Utc>,
}

impl From<&Notification> for GeneratedNotification {
    fn from(value: &Notification) -> Self {
        Self {
            id: value.id(),
            item_id: value.item_id(),
            kind: value.kind(),
            message: value.message().to_string(),
            scheduled_for: value.scheduled_for(),
        }
    }
}

/// Result of one generation run; lists only records created by that run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub generated_count: usize,
    pub notifications: Vec<GeneratedNotification>,
}

impl GenerationReport {
    fn push(&mut self, notification: &Notification) {
        self.notifications.push(notification.into());
        self.generated_count = self.notifications.len();
    }
}

/// Date-driven notification kinds the generator derives from metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TriggerKind {
    Expiration,
    Maintenance,
}

impl TriggerKind {
    fn notification_type(self) -> NotificationType {
        match self {
            Self::Expiration => NotificationType::Expiration,
            Self::Maintenance => NotificationType::Maintenance,
        }
    }

    fn message(self, item_name: &str, trigger: DateTime<Utc>) -> String {
        let date = trigger.format("%Y-%m-%d");
        match self {
            Self::Expiration => format!("{item_name} will expire on {date}"),
            Self::Maintenance => format!("{item_name} is due for maintenance on {date}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TriggerRule {
    kind: TriggerKind,
    aliases: &'static [&'static str],
    lead_days: u32,
}

/// Returns the first alias in `aliases` that holds a date, with its value.
pub fn resolve_trigger(
    metadata: &MetadataValues,
    aliases: &[&'static str],
) -> Option<(&'static str, DateTime<Utc>)> {
    aliases
        .iter()
        .find_map(|&alias| metadata.date_value(alias).map(|date| (alias, date)))
}

/// Notification service facade over repository implementations.
pub struct NotificationService<I, N> {
    items: I,
    notifications: N,
    policy: NotificationPolicy,
}

impl<I, N> NotificationService<I, N>
where
    I: ItemRepository,
    N: NotificationRepository,
{
    pub fn new(items: I, notifications: N) -> Self {
        Self::with_policy(items, notifications, NotificationPolicy::default())
    }

    pub fn with_policy(items: I, notifications: N, policy: NotificationPolicy) -> Self {
        Self {
            items,
            notifications,
            policy,
        }
    }

    pub fn policy(&self) -> NotificationPolicy {
        self.policy
    }

    /// Scans the owner's items and creates due notifications.
    pub fn generate_for_owner(&self, owner_id: UserId) -> ServiceResult<GenerationReport> {
        self.generate_for_owner_at(owner_id, now_utc())
    }

    /// Same as [`NotificationService::generate_for_owner`] relative to `now`.
    pub fn generate_for_owner_at(
        &self,
        owner_id: UserId,
        now: DateTime<Utc>,
    ) -> ServiceResult<GenerationReport> {
        let items = self.items.list_by_owner(owner_id)?;
        let mut report = GenerationReport::default();

        for item in &items {
            let triggers: Vec<(TriggerRule, &'static str, DateTime<Utc>)> = self
                .rules()
                .into_iter()
                .filter_map(|rule| {
                    resolve_trigger(item.metadata(), rule.aliases)
                        .map(|(alias, date)| (rule, alias, date))
                })
                .collect();
            if triggers.is_empty() {
                continue;
            }

            let existing = self.notifications.list_by_item(item.id())?;
            for (rule, alias, trigger) in triggers {
                let created = self.apply_rule(item, &existing, rule, alias, trigger, now)?;
                if let Some(created) = created {
                    report.push(&created);
                }
            }
        }

        info!(
            "event=notifications_generate module=service status=ok owner_id={owner_id} items={} generated={}",
            items.len(),
            report.generated_count
        );
        Ok(report)
    }

    /// Lists a user's notifications ordered by schedule.
    pub fn list_for_user(&self, user_id: UserId) -> ServiceResult<Vec<Notification>> {
        Ok(self.notifications.list_by_user(user_id)?)
    }

    /// Lists notifications of one item owned by `user_id`.
    pub fn list_for_item(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> ServiceResult<Vec<Notification>> {
        let owned = self
            .items
            .get_item(item_id)?
            .is_some_and(|item| item.owner_id() == user_id);
        if !owned {
            return Err(ServiceError::NotFound {
                entity: "item",
                id: item_id,
            });
        }
        Ok(self.notifications.list_by_item(item_id)?)
    }

    pub fn mark_delivered(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> ServiceResult<Notification> {
        let current = self.owned_notification(user_id, id)?;
        self.persist(current.mark_delivered(now_utc())?)
    }

    pub fn mark_failed(&self, user_id: UserId, id: NotificationId) -> ServiceResult<Notification> {
        let current = self.owned_notification(user_id, id)?;
        self.persist(current.mark_failed(now_utc())?)
    }

    pub fn reschedule(
        &self,
        user_id: UserId,
        id: NotificationId,
        scheduled_for: DateTime<Utc>,
    ) -> ServiceResult<Notification> {
        let current = self.owned_notification(user_id, id)?;
        self.persist(current.reschedule(scheduled_for)?)
    }

    /// Deletes every notification of an item; returns how many were removed.
    pub fn delete_for_item(&self, item_id: ItemId) -> ServiceResult<usize> {
        Ok(self.notifications.delete_by_item(item_id)?)
    }

    fn rules(&self) -> [TriggerRule; 2] {
        [
            TriggerRule {
                kind: TriggerKind::Expiration,
                aliases: EXPIRATION_ALIASES,
                lead_days: self.policy.expiration_lead_days,
            },
            TriggerRule {
                kind: TriggerKind::Maintenance,
                aliases: MAINTENANCE_ALIASES,
                lead_days: self.policy.maintenance_lead_days,
            },
        ]
    }

    fn apply_rule(
        &self,
        item: &Item,
        existing: &[Notification],
        rule: TriggerRule,
        alias: &'static str,
        trigger: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<Notification>> {
        let item_id = item.id();
        let kind = rule.kind.notification_type();

        if existing
            .iter()
            .any(|notification| notification.kind() == kind && notification.is_pending())
        {
            debug!(
                "event=notification_skip module=service item_id={item_id} type={kind} reason=already_pending"
            );
            return Ok(None);
        }

        let lead = TimeDelta::days(i64::from(rule.lead_days));
        let notify_at = match trigger.checked_sub_signed(lead) {
            Some(value) if value > now => value,
            _ => {
                debug!(
                    "event=notification_skip module=service item_id={item_id} type={kind} reason=inside_lead_window trigger={}",
                    trigger.to_rfc3339()
                );
                return Ok(None);
            }
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("itemName".to_string(), Value::from(item.name()));
        metadata.insert("triggerField".to_string(), Value::from(alias));
        metadata.insert("triggerDate".to_string(), Value::from(trigger.to_rfc3339()));
        metadata.insert("leadDays".to_string(), Value::from(rule.lead_days));

        let notification = Notification::new_at(
            NotificationDraft {
                user_id: item.owner_id(),
                item_id,
                kind,
                message: rule.kind.message(item.name(), trigger),
                scheduled_for: notify_at,
                metadata,
            },
            now,
        )?;

        match self.notifications.create_notification(&notification) {
            Ok(_) => Ok(Some(notification)),
            Err(RepoError::Conflict(details)) => {
                warn!(
                    "event=notification_skip module=service item_id={item_id} type={kind} reason=conflict details={details}"
                );
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn owned_notification(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> ServiceResult<Notification> {
        self.notifications
            .get_notification(id)?
            .filter(|notification| notification.user_id() == user_id)
            .ok_or(ServiceError::NotFound {
                entity: "notification",
                id,
            })
    }

    fn persist(&self, notification: Notification) -> ServiceResult<Notification> {
        self.notifications.update_notification(&notification)?;
        info!(
            "event=notification_update module=service status=ok notification_id={} state={}",
            notification.id(),
            notification.status()
        );
        Ok(notification)
    }
}

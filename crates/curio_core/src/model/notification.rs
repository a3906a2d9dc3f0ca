//! Notification aggregate and its status machine.
//!
//! # Responsibility
//! - Hold one scheduled message tied to an item.
//! - Enforce the `pending -> delivered | failed` lifecycle.
//!
//! # Invariants
//! - `message` is 1..=500 chars.
//! - `scheduled_for` is strictly after the construction instant.
//! - A notification leaves `pending` at most once; terminal states are final.
//! - Only pending notifications can be rescheduled, and only into the future.

use crate::clock::now_utc;
use crate::model::error::InvariantViolation;
use crate::model::item::ItemId;
use crate::model::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type NotificationId = Uuid;

pub const NOTIFICATION_MESSAGE_MAX_CHARS: usize = 500;

/// Why a notification exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Expiration,
    Maintenance,
    Reminder,
    Custom,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expiration => "expiration",
            Self::Maintenance => "maintenance",
            Self::Reminder => "reminder",
            Self::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "expiration" => Some(Self::Expiration),
            "maintenance" => Some(Self::Maintenance),
            "reminder" => Some(Self::Reminder),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

impl Display for NotificationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    /// Initial state.
    Pending,
    /// Terminal.
    Delivered,
    /// Terminal.
    Failed,
}

impl NotificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "delivered" => Some(Self::Delivered),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns true only for `pending -> delivered` and `pending -> failed`.
    pub fn can_transition_to(self, target: NotificationStatus) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Delivered) | (Self::Pending, Self::Failed)
        )
    }
}

impl Display for NotificationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for [`Notification::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub kind: NotificationType,
    pub message: String,
    pub scheduled_for: DateTime<Utc>,
    pub metadata: BTreeMap<String, Value>,
}

/// Scheduled one-shot message tied to an item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub(crate) id: NotificationId,
    pub(crate) user_id: UserId,
    pub(crate) item_id: ItemId,
    #[serde(rename = "type")]
    pub(crate) kind: NotificationType,
    pub(crate) message: String,
    pub(crate) scheduled_for: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) delivered_at: Option<DateTime<Utc>>,
    pub(crate) status: NotificationStatus,
    pub(crate) metadata: BTreeMap<String, Value>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Notification {
    /// Creates a pending notification, using the current time as "now".
    pub fn new(draft: NotificationDraft) -> Result<Self, InvariantViolation> {
        Self::new_at(draft, now_utc())
    }

    /// Creates a pending notification relative to `now`.
    pub fn new_at(
        draft: NotificationDraft,
        now: DateTime<Utc>,
    ) -> Result<Self, InvariantViolation> {
        check_message(&draft.message)?;
        check_future(draft.scheduled_for, now)?;
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: draft.user_id,
            item_id: draft.item_id,
            kind: draft.kind,
            message: draft.message,
            scheduled_for: draft.scheduled_for,
            delivered_at: None,
            status: NotificationStatus::Pending,
            metadata: draft.metadata,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> NotificationId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn kind(&self) -> NotificationType {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn scheduled_for(&self) -> DateTime<Utc> {
        self.scheduled_for
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn status(&self) -> NotificationStatus {
        self.status
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_pending(&self) -> bool {
        self.status == NotificationStatus::Pending
    }

    pub fn can_transition_to(&self, target: NotificationStatus) -> bool {
        self.status.can_transition_to(target)
    }

    /// Moves `pending -> delivered` and records `delivered_at = now`.
    pub fn mark_delivered(&self, now: DateTime<Utc>) -> Result<Self, InvariantViolation> {
        let mut next = self.transition(NotificationStatus::Delivered, now)?;
        next.delivered_at = Some(now);
        Ok(next)
    }

    /// Moves `pending -> failed`.
    pub fn mark_failed(&self, now: DateTime<Utc>) -> Result<Self, InvariantViolation> {
        self.transition(NotificationStatus::Failed, now)
    }

    pub fn reschedule(&self, scheduled_for: DateTime<Utc>) -> Result<Self, InvariantViolation> {
        self.reschedule_at(scheduled_for, now_utc())
    }

    /// Moves a pending notification to a new strictly-future time.
    pub fn reschedule_at(
        &self,
        scheduled_for: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, InvariantViolation> {
        if !self.is_pending() {
            return Err(InvariantViolation::RescheduleNotPending(self.status));
        }
        check_future(scheduled_for, now)?;
        Ok(Self {
            scheduled_for,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Re-checks bounds that hold for the whole lifetime, used on read paths.
    ///
    /// The future-schedule rule only applies at construction and is not
    /// re-checked here.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        check_message(&self.message)
    }

    fn transition(
        &self,
        target: NotificationStatus,
        now: DateTime<Utc>,
    ) -> Result<Self, InvariantViolation> {
        if !self.can_transition_to(target) {
            return Err(InvariantViolation::IllegalStatusTransition {
                from: self.status,
                to: target,
            });
        }
        Ok(Self {
            status: target,
            updated_at: now,
            ..self.clone()
        })
    }
}

fn check_message(message: &str) -> Result<(), InvariantViolation> {
    let actual = message.chars().count();
    if message.trim().is_empty() || actual > NOTIFICATION_MESSAGE_MAX_CHARS {
        return Err(InvariantViolation::MessageLength {
            max: NOTIFICATION_MESSAGE_MAX_CHARS,
            actual,
        });
    }
    Ok(())
}

fn check_future(
    scheduled_for: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), InvariantViolation> {
    if scheduled_for <= now {
        return Err(InvariantViolation::ScheduleNotInFuture { scheduled_for });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{NotificationStatus, NotificationType};

    #[test]
    fn status_machine_allows_only_pending_edges() {
        use NotificationStatus::*;
        let all = [Pending, Delivered, Failed];
        for from in all {
            for to in all {
                let expected = from == Pending && to != Pending;
                assert_eq!(from.can_transition_to(to), expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn enum_strings_round_trip() {
        for kind in [
            NotificationType::Expiration,
            NotificationType::Maintenance,
            NotificationType::Reminder,
            NotificationType::Custom,
        ] {
            assert_eq!(NotificationType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(NotificationStatus::parse("archived"), None);
    }
}

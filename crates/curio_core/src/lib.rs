//! Core domain logic for curio collections.
//! This crate is the single source of truth for metadata validation and
//! notification scheduling invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::collection::{Collection, CollectionId};
pub use model::error::{DomainError, InvariantViolation};
pub use model::item::{Item, ItemId};
pub use model::metadata::{MetadataValidationError, MetadataValue, MetadataValues};
pub use model::notification::{
    Notification, NotificationDraft, NotificationId, NotificationStatus, NotificationType,
};
pub use model::schema::{
    FieldDefinition, MetadataFieldType, MetadataSchema, SchemaDeclarationError, ValidationRule,
    ValidationRules,
};
pub use model::UserId;
pub use repo::collection_repo::{CollectionRepository, SqliteCollectionRepository};
pub use repo::item_repo::{ItemRepository, SqliteItemRepository};
pub use repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
pub use repo::{RepoError, RepoResult};
pub use service::collection_service::{CollectionDeletion, CollectionService, CollectionUpdate};
pub use service::item_service::{ItemService, ItemUpdate};
pub use service::notification_service::{
    GeneratedNotification, GenerationReport, NotificationPolicy, NotificationService,
};
pub use service::{ServiceError, ServiceResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

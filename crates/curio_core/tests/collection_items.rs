use chrono::{TimeDelta, Utc};
use curio_core::db::open_db_in_memory;
use curio_core::{
    CollectionRepository, CollectionService, CollectionUpdate, FieldDefinition, InvariantViolation,
    ItemRepository, ItemService, ItemUpdate, MetadataFieldType, MetadataValidationError,
    MetadataValue, NotificationRepository, NotificationService, RepoError,
    SqliteCollectionRepository, SqliteItemRepository, SqliteNotificationRepository, ValidationRules,
};
use rusqlite::Connection;
use std::collections::BTreeMap;
use uuid::Uuid;

type Collections<'a> = CollectionService<
    SqliteCollectionRepository<'a>,
    SqliteItemRepository<'a>,
    SqliteNotificationRepository<'a>,
>;
type Items<'a> = ItemService<
    SqliteCollectionRepository<'a>,
    SqliteItemRepository<'a>,
    SqliteNotificationRepository<'a>,
>;

fn collection_service(conn: &Connection) -> Collections<'_> {
    CollectionService::new(
        SqliteCollectionRepository::try_new(conn).unwrap(),
        SqliteItemRepository::try_new(conn).unwrap(),
        SqliteNotificationRepository::try_new(conn).unwrap(),
    )
}

fn item_service(conn: &Connection) -> Items<'_> {
    ItemService::new(
        SqliteCollectionRepository::try_new(conn).unwrap(),
        SqliteItemRepository::try_new(conn).unwrap(),
        SqliteNotificationRepository::try_new(conn).unwrap(),
    )
}

fn fields(entries: Vec<(&str, FieldDefinition)>) -> BTreeMap<String, FieldDefinition> {
    entries
        .into_iter()
        .map(|(name, definition)| (name.to_string(), definition))
        .collect()
}

fn values(entries: Vec<(&str, MetadataValue)>) -> BTreeMap<String, MetadataValue> {
    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn book_fields() -> BTreeMap<String, FieldDefinition> {
    fields(vec![
        ("author", FieldDefinition::required(MetadataFieldType::Text)),
        ("pages", FieldDefinition::optional(MetadataFieldType::Number)),
    ])
}

#[test]
fn create_and_read_back_collection_and_items() {
    let conn = open_db_in_memory().unwrap();
    let collections = collection_service(&conn);
    let items = item_service(&conn);
    let owner = Uuid::new_v4();

    let books = collections
        .create_collection(owner, " Books ", "shelf", book_fields())
        .unwrap();
    assert_eq!(books.name(), "Books");
    assert_eq!(books.metadata_schema().version(), 1);
    assert_eq!(collections.get_collection(owner, books.id()).unwrap(), books);

    let dune = items
        .create_item(
            owner,
            books.id(),
            "Dune",
            values(vec![
                ("author", "Frank Herbert".into()),
                ("pages", 412.into()),
            ]),
        )
        .unwrap();
    assert_eq!(dune.collection_id(), books.id());
    assert_eq!(items.get_item(owner, dune.id()).unwrap(), dune);
    assert_eq!(items.list_items(owner).unwrap(), vec![dune.clone()]);
    assert_eq!(
        items.list_collection_items(owner, books.id()).unwrap(),
        vec![dune]
    );
    assert_eq!(collections.list_collections(owner).unwrap().len(), 1);
}

#[test]
fn stored_numbers_read_back_bit_exact() {
    let conn = open_db_in_memory().unwrap();
    let collections = collection_service(&conn);
    let items = item_service(&conn);
    let owner = Uuid::new_v4();
    let books = collections
        .create_collection(owner, "Books", "", book_fields())
        .unwrap();

    for pages in [1.0715660391465826e-75, 0.1 + 0.2, 1.7976931348623157e308] {
        let input = values(vec![
            ("author", "Herbert".into()),
            ("pages", MetadataValue::Number(pages)),
        ]);
        let created = items
            .create_item(owner, books.id(), "Dune", input.clone())
            .unwrap();
        assert_eq!(created.metadata().all_values(), &input);

        let stored = items.get_item(owner, created.id()).unwrap();
        let read_back = stored
            .metadata()
            .value("pages")
            .and_then(MetadataValue::as_number)
            .unwrap();
        assert_eq!(read_back.to_bits(), pages.to_bits());
    }
}

#[test]
fn create_item_validates_against_collection_schema() {
    let conn = open_db_in_memory().unwrap();
    let collections = collection_service(&conn);
    let items = item_service(&conn);
    let owner = Uuid::new_v4();
    let books = collections
        .create_collection(owner, "Books", "", book_fields())
        .unwrap();

    let err = items
        .create_item(owner, books.id(), "Untitled", BTreeMap::new())
        .unwrap_err();
    assert_eq!(
        err.metadata(),
        Some(&MetadataValidationError::MissingRequired("author".to_string()))
    );
    assert!(err.to_string().contains("Required field 'author' is missing"));

    let err = items
        .create_item(
            owner,
            books.id(),
            "Dune",
            values(vec![("author", "X".into()), ("isbn", "123".into())]),
        )
        .unwrap_err();
    assert!(matches!(
        err.metadata(),
        Some(MetadataValidationError::UndeclaredField(_))
    ));
    assert!(items.list_items(owner).unwrap().is_empty());
}

#[test]
fn invalid_schema_declaration_is_rejected_on_create() {
    let conn = open_db_in_memory().unwrap();
    let collections = collection_service(&conn);
    let owner = Uuid::new_v4();

    let bad = FieldDefinition::optional(MetadataFieldType::Boolean).with_validation(
        ValidationRules {
            min_length: Some(2),
            ..ValidationRules::default()
        },
    );
    let err = collections
        .create_collection(owner, "Flags", "", fields(vec![("done", bad)]))
        .unwrap_err();

    assert!(err.schema().is_some());
    assert!(collections.list_collections(owner).unwrap().is_empty());
}

#[test]
fn schema_evolution_guard_counts_existing_items() {
    let conn = open_db_in_memory().unwrap();
    let collections = collection_service(&conn);
    let items = item_service(&conn);
    let owner = Uuid::new_v4();
    let books = collections
        .create_collection(owner, "Books", "", book_fields())
        .unwrap();

    // Empty collection: required fields may be added freely.
    let mut with_year = book_fields();
    with_year.insert(
        "year".to_string(),
        FieldDefinition::required(MetadataFieldType::Number),
    );
    let updated = collections
        .update_collection(
            owner,
            books.id(),
            CollectionUpdate {
                fields: Some(with_year.clone()),
                ..CollectionUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(updated.metadata_schema().version(), 2);

    items
        .create_item(
            owner,
            books.id(),
            "Dune",
            values(vec![("author", "Herbert".into()), ("year", 1965.into())]),
        )
        .unwrap();

    let mut with_genre = with_year.clone();
    with_genre.insert(
        "genre".to_string(),
        FieldDefinition::required(MetadataFieldType::Text),
    );
    let err = collections
        .update_collection(
            owner,
            books.id(),
            CollectionUpdate {
                fields: Some(with_genre),
                ..CollectionUpdate::default()
            },
        )
        .unwrap_err();
    assert_eq!(
        err.invariant(),
        Some(&InvariantViolation::RequiredFieldsAdded(vec![
            "genre".to_string()
        ]))
    );
    assert!(err
        .to_string()
        .contains("cannot add required fields to schema when items exist"));
    let stored = collections.get_collection(owner, books.id()).unwrap();
    assert_eq!(stored.metadata_schema().version(), 2);

    let mut with_optional = with_year.clone();
    with_optional.insert(
        "genre".to_string(),
        FieldDefinition::optional(MetadataFieldType::Text),
    );
    let relaxed = collections
        .update_collection(
            owner,
            books.id(),
            CollectionUpdate {
                name: Some("Library".to_string()),
                fields: Some(with_optional),
                ..CollectionUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(relaxed.name(), "Library");
    assert_eq!(relaxed.metadata_schema().version(), 3);

    let mut without_pages = with_year;
    without_pages.remove("pages");
    let trimmed = collections
        .update_collection(
            owner,
            books.id(),
            CollectionUpdate {
                fields: Some(without_pages),
                ..CollectionUpdate::default()
            },
        )
        .unwrap();
    assert!(trimmed.metadata_schema().field("pages").is_none());
    assert_eq!(
        collections
            .get_collection(owner, books.id())
            .unwrap()
            .metadata_schema()
            .version(),
        4
    );
}

#[test]
fn item_update_revalidates_metadata_against_current_schema() {
    let conn = open_db_in_memory().unwrap();
    let collections = collection_service(&conn);
    let items = item_service(&conn);
    let owner = Uuid::new_v4();
    let books = collections
        .create_collection(owner, "Books", "", book_fields())
        .unwrap();
    let dune = items
        .create_item(owner, books.id(), "Dune", values(vec![("author", "X".into())]))
        .unwrap();

    let err = items
        .update_item(
            owner,
            dune.id(),
            ItemUpdate {
                metadata: Some(values(vec![("author", 7.into())])),
                ..ItemUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err.metadata(),
        Some(MetadataValidationError::TypeMismatch { .. })
    ));

    let renamed = items
        .update_item(
            owner,
            dune.id(),
            ItemUpdate {
                name: Some("Dune Messiah".to_string()),
                metadata: Some(values(vec![
                    ("author", "Frank Herbert".into()),
                    ("pages", 256.into()),
                ])),
            },
        )
        .unwrap();
    let stored = items.get_item(owner, dune.id()).unwrap();
    assert_eq!(stored, renamed);
    assert_eq!(stored.name(), "Dune Messiah");
    assert_eq!(
        stored.metadata().value("pages").and_then(MetadataValue::as_number),
        Some(256.0)
    );
}

#[test]
fn records_of_other_owners_are_not_found() {
    let conn = open_db_in_memory().unwrap();
    let collections = collection_service(&conn);
    let items = item_service(&conn);
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let books = collections
        .create_collection(owner, "Books", "", book_fields())
        .unwrap();
    let dune = items
        .create_item(owner, books.id(), "Dune", values(vec![("author", "X".into())]))
        .unwrap();

    assert!(collections
        .get_collection(stranger, books.id())
        .unwrap_err()
        .is_not_found());
    assert!(items.get_item(stranger, dune.id()).unwrap_err().is_not_found());
    assert!(items
        .create_item(stranger, books.id(), "Stolen", values(vec![("author", "Y".into())]))
        .unwrap_err()
        .is_not_found());
    assert!(collections
        .delete_collection(stranger, books.id())
        .unwrap_err()
        .is_not_found());
    assert!(items.delete_item(stranger, dune.id()).unwrap_err().is_not_found());
    assert!(collections.list_collections(stranger).unwrap().is_empty());
    assert_eq!(items.list_items(owner).unwrap().len(), 1);
}

#[test]
fn deleting_collection_cascades_to_items_and_notifications() {
    let conn = open_db_in_memory().unwrap();
    let collections = collection_service(&conn);
    let items = item_service(&conn);
    let notifications = NotificationService::new(
        SqliteItemRepository::try_new(&conn).unwrap(),
        SqliteNotificationRepository::try_new(&conn).unwrap(),
    );
    let owner = Uuid::new_v4();

    let pantry = collections
        .create_collection(
            owner,
            "Pantry",
            "",
            fields(vec![(
                "expirationDate",
                FieldDefinition::required(MetadataFieldType::Date),
            )]),
        )
        .unwrap();
    let milk = items
        .create_item(
            owner,
            pantry.id(),
            "Milk",
            values(vec![(
                "expirationDate",
                (Utc::now() + TimeDelta::days(10)).into(),
            )]),
        )
        .unwrap();
    assert_eq!(notifications.generate_for_owner(owner).unwrap().generated_count, 1);

    let deletion = collections.delete_collection(owner, pantry.id()).unwrap();
    assert_eq!(deletion.items_removed, 1);
    assert_eq!(deletion.notifications_removed, 1);

    let collection_repo = SqliteCollectionRepository::try_new(&conn).unwrap();
    let item_repo = SqliteItemRepository::try_new(&conn).unwrap();
    let notification_repo = SqliteNotificationRepository::try_new(&conn).unwrap();
    assert!(collection_repo.get_collection(pantry.id()).unwrap().is_none());
    assert!(item_repo.get_item(milk.id()).unwrap().is_none());
    assert!(notification_repo.list_by_item(milk.id()).unwrap().is_empty());
    assert!(notification_repo.list_by_user(owner).unwrap().is_empty());
}

#[test]
fn repository_reports_missing_rows_as_not_found() {
    let conn = open_db_in_memory().unwrap();
    let collection_repo = SqliteCollectionRepository::try_new(&conn).unwrap();
    let item_repo = SqliteItemRepository::try_new(&conn).unwrap();

    let missing = Uuid::new_v4();
    assert!(matches!(
        collection_repo.delete_collection(missing),
        Err(RepoError::NotFound { .. })
    ));
    assert!(matches!(
        item_repo.delete_item(missing),
        Err(RepoError::NotFound { .. })
    ));
    assert_eq!(item_repo.count_by_collection(missing).unwrap(), 0);
}

#[test]
fn repositories_require_migrated_tables() {
    let conn = Connection::open_in_memory().unwrap();
    assert!(matches!(
        SqliteCollectionRepository::try_new(&conn),
        Err(RepoError::MissingRequiredTable(_))
    ));
}

use chrono::{TimeZone, Utc};
use curio_core::{
    FieldDefinition, MetadataFieldType, MetadataSchema, MetadataValidationError, MetadataValue,
    MetadataValues, ValidationRules,
};
use std::collections::BTreeMap;

fn schema(entries: Vec<(&str, FieldDefinition)>) -> MetadataSchema {
    MetadataSchema::new(
        entries
            .into_iter()
            .map(|(name, definition)| (name.to_string(), definition))
            .collect(),
    )
    .unwrap()
}

fn values(entries: Vec<(&str, MetadataValue)>) -> BTreeMap<String, MetadataValue> {
    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn pantry_schema() -> MetadataSchema {
    schema(vec![
        ("expirationDate", FieldDefinition::required(MetadataFieldType::Date)),
        ("quantity", FieldDefinition::optional(MetadataFieldType::Number)),
        ("opened", FieldDefinition::optional(MetadataFieldType::Boolean)),
        ("brand", FieldDefinition::optional(MetadataFieldType::Text)),
    ])
}

#[test]
fn conforming_values_are_kept_exactly() {
    let expires = Utc.with_ymd_and_hms(2026, 12, 24, 0, 0, 0).unwrap();
    let input = values(vec![
        ("expirationDate", MetadataValue::Date(expires)),
        ("quantity", MetadataValue::from(2)),
        ("opened", MetadataValue::from(false)),
        ("brand", MetadataValue::from("Acme")),
    ]);

    let metadata = MetadataValues::new(input.clone(), &pantry_schema()).unwrap();

    assert_eq!(metadata.all_values(), &input);
    assert_eq!(metadata.date_value("expirationDate"), Some(expires));
    assert_eq!(
        metadata.value("quantity").and_then(MetadataValue::as_number),
        Some(2.0)
    );
    assert_eq!(
        metadata.value("opened").and_then(MetadataValue::as_bool),
        Some(false)
    );
    assert_eq!(
        metadata.value("brand").and_then(MetadataValue::as_text),
        Some("Acme")
    );
    assert_eq!(metadata.value("brand").and_then(MetadataValue::as_bool), None);
    assert!(metadata.has_value("opened"));
    assert!(!metadata.has_value("notes"));
    assert!(!metadata.is_empty());
    assert_eq!(metadata.into_inner(), input);
}

#[test]
fn optional_only_schema_accepts_empty_values() {
    let schema = schema(vec![(
        "notes",
        FieldDefinition::optional(MetadataFieldType::Text),
    )]);
    let metadata = MetadataValues::new(BTreeMap::new(), &schema).unwrap();

    assert!(metadata.is_empty());
    assert!(metadata.all_values().is_empty());
    assert_eq!(metadata.value("notes"), None);
}

#[test]
fn missing_required_field_is_named_in_error() {
    let err = MetadataValues::new(
        values(vec![("brand", MetadataValue::from("Acme"))]),
        &pantry_schema(),
    )
    .unwrap_err();

    assert_eq!(
        err,
        MetadataValidationError::MissingRequired("expirationDate".to_string())
    );
    assert_eq!(err.to_string(), "Required field 'expirationDate' is missing");
}

#[test]
fn optional_fields_may_be_omitted() {
    let expires = Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap();
    let metadata = MetadataValues::new(
        values(vec![("expirationDate", MetadataValue::Date(expires))]),
        &pantry_schema(),
    )
    .unwrap();
    assert_eq!(metadata.all_values().len(), 1);
}

#[test]
fn type_mismatch_is_rejected_for_each_declared_type() {
    let cases = vec![
        ("expirationDate", MetadataValue::from("2026-12-24")),
        ("quantity", MetadataValue::from("two")),
        ("opened", MetadataValue::from(1)),
        ("brand", MetadataValue::from(true)),
    ];
    let expires = Utc.with_ymd_and_hms(2026, 12, 24, 0, 0, 0).unwrap();

    for (field, bad_value) in cases {
        let mut input = values(vec![("expirationDate", MetadataValue::Date(expires))]);
        input.insert(field.to_string(), bad_value);

        let err = MetadataValues::new(input, &pantry_schema()).unwrap_err();
        assert!(
            matches!(err, MetadataValidationError::TypeMismatch { .. }),
            "field {field}: {err}"
        );
        assert_eq!(err.field(), field);
    }
}

#[test]
fn text_min_length_boundary() {
    let schema = schema(vec![(
        "summary",
        FieldDefinition::required(MetadataFieldType::Text).with_validation(ValidationRules {
            min_length: Some(10),
            ..ValidationRules::default()
        }),
    )]);

    let short = MetadataValues::new(values(vec![("summary", "short".into())]), &schema);
    assert_eq!(
        short.unwrap_err(),
        MetadataValidationError::TooShort {
            field: "summary".to_string(),
            min: 10,
        }
    );

    let exact = MetadataValues::new(values(vec![("summary", "0123456789".into())]), &schema);
    assert!(exact.is_ok());
}

#[test]
fn text_max_length_and_pattern_are_enforced() {
    let schema = schema(vec![(
        "isbn",
        FieldDefinition::optional(MetadataFieldType::Text).with_validation(ValidationRules {
            max_length: Some(13),
            pattern: Some(r"^\d+$".to_string()),
            ..ValidationRules::default()
        }),
    )]);

    let too_long = MetadataValues::new(values(vec![("isbn", "97801234567890".into())]), &schema);
    assert!(matches!(
        too_long,
        Err(MetadataValidationError::TooLong { max: 13, .. })
    ));

    let not_digits = MetadataValues::new(values(vec![("isbn", "97801A".into())]), &schema);
    let err = not_digits.unwrap_err();
    assert!(matches!(err, MetadataValidationError::PatternMismatch { .. }));
    assert!(err.to_string().contains("does not match pattern"));

    assert!(MetadataValues::new(values(vec![("isbn", "9780123456789".into())]), &schema).is_ok());
}

#[test]
fn pattern_matches_anywhere_unless_anchored() {
    let schema = schema(vec![(
        "tag",
        FieldDefinition::optional(MetadataFieldType::Text).with_validation(ValidationRules {
            pattern: Some("rare".to_string()),
            ..ValidationRules::default()
        }),
    )]);

    assert!(MetadataValues::new(values(vec![("tag", "very rare book".into())]), &schema).is_ok());
}

#[test]
fn number_range_is_inclusive() {
    let schema = schema(vec![(
        "rating",
        FieldDefinition::optional(MetadataFieldType::Number).with_validation(ValidationRules {
            min_value: Some(1.0),
            max_value: Some(5.0),
            ..ValidationRules::default()
        }),
    )]);

    for ok in [1.0, 3.5, 5.0] {
        assert!(MetadataValues::new(values(vec![("rating", ok.into())]), &schema).is_ok());
    }
    assert!(matches!(
        MetadataValues::new(values(vec![("rating", 0.5.into())]), &schema),
        Err(MetadataValidationError::BelowMinimum { .. })
    ));
    assert!(matches!(
        MetadataValues::new(values(vec![("rating", 5.5.into())]), &schema),
        Err(MetadataValidationError::AboveMaximum { .. })
    ));
    assert!(matches!(
        MetadataValues::new(values(vec![("rating", f64::INFINITY.into())]), &schema),
        Err(MetadataValidationError::NonFiniteNumber(_))
    ));
}

#[test]
fn undeclared_keys_are_rejected() {
    let expires = Utc.with_ymd_and_hms(2026, 12, 24, 0, 0, 0).unwrap();
    let err = MetadataValues::new(
        values(vec![
            ("expirationDate", MetadataValue::Date(expires)),
            ("colour", MetadataValue::from("red")),
        ]),
        &pantry_schema(),
    )
    .unwrap_err();

    assert_eq!(
        err,
        MetadataValidationError::UndeclaredField("colour".to_string())
    );
}

#[test]
fn missing_required_is_reported_before_value_errors() {
    let err = MetadataValues::new(
        values(vec![("quantity", MetadataValue::from("lots"))]),
        &pantry_schema(),
    )
    .unwrap_err();
    assert!(matches!(err, MetadataValidationError::MissingRequired(_)));
}

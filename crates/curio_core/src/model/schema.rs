//! Per-collection metadata schema.
//!
//! # Responsibility
//! - Declare which metadata fields a collection accepts and their types.
//! - Reject rule declarations that do not fit the declared field type.
//! - Guard schema replacement against breaking existing items.
//!
//! # Invariants
//! - A constructed `MetadataSchema` only holds well-formed field declarations.
//! - Deserialization routes through the same checks as `MetadataSchema::new`.
//! - `version` starts at 1 and grows by one on every replacement.

use crate::clock::now_utc;
use crate::model::error::InvariantViolation;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, PoisonError};

const PATTERN_CACHE_CAPACITY: usize = 256;

static PATTERN_CACHE: Lazy<Mutex<HashMap<String, Regex>>> = Lazy::new(Default::default);

/// Closed set of value types a metadata field may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataFieldType {
    Text,
    Number,
    Date,
    Boolean,
}

impl MetadataFieldType {
    /// Stable lowercase name used in messages and storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
        }
    }

    fn applicable_rules(self) -> &'static [ValidationRule] {
        match self {
            Self::Text => &[
                ValidationRule::MinLength,
                ValidationRule::MaxLength,
                ValidationRule::Pattern,
            ],
            Self::Number => &[ValidationRule::MinValue, ValidationRule::MaxValue],
            Self::Date | Self::Boolean => &[],
        }
    }
}

impl Display for MetadataFieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of the individual constraints inside `ValidationRules`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationRule {
    MinLength,
    MaxLength,
    MinValue,
    MaxValue,
    Pattern,
}

impl ValidationRule {
    /// Wire name of the rule, matching the serialized `ValidationRules` keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MinLength => "minLength",
            Self::MaxLength => "maxLength",
            Self::MinValue => "minValue",
            Self::MaxValue => "maxValue",
            Self::Pattern => "pattern",
        }
    }
}

impl Display for ValidationRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional per-type constraints attached to a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    /// Minimum text length in chars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum text length in chars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Inclusive numeric lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    /// Inclusive numeric upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    /// Regular expression a text value must contain a match for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl ValidationRules {
    /// Rules that carry a value, in declaration order.
    pub fn declared(&self) -> Vec<ValidationRule> {
        let mut declared = Vec::new();
        if self.min_length.is_some() {
            declared.push(ValidationRule::MinLength);
        }
        if self.max_length.is_some() {
            declared.push(ValidationRule::MaxLength);
        }
        if self.min_value.is_some() {
            declared.push(ValidationRule::MinValue);
        }
        if self.max_value.is_some() {
            declared.push(ValidationRule::MaxValue);
        }
        if self.pattern.is_some() {
            declared.push(ValidationRule::Pattern);
        }
        declared
    }
}

/// Declaration of one metadata field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(rename = "type")]
    pub field_type: MetadataFieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRules>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDefinition {
    /// Declares an optional field of `field_type`.
    pub fn optional(field_type: MetadataFieldType) -> Self {
        Self {
            field_type,
            required: false,
            validation: None,
            description: None,
        }
    }

    /// Declares a required field of `field_type`.
    pub fn required(field_type: MetadataFieldType) -> Self {
        Self {
            required: true,
            ..Self::optional(field_type)
        }
    }

    pub fn with_validation(mut self, rules: ValidationRules) -> Self {
        self.validation = Some(rules);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Malformed field declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaDeclarationError {
    /// Field name is empty after trim.
    BlankFieldName,
    /// Rule declared on a field type it does not apply to.
    RuleNotApplicable {
        field: String,
        rule: ValidationRule,
        field_type: MetadataFieldType,
    },
    /// Lower bound exceeds upper bound.
    InvertedRange {
        field: String,
        min: ValidationRule,
        max: ValidationRule,
    },
    /// Numeric bound is NaN or infinite.
    NonFiniteBound { field: String, rule: ValidationRule },
    /// Pattern does not compile.
    InvalidPattern {
        field: String,
        pattern: String,
        reason: String,
    },
    /// Persisted schema carries version 0.
    InvalidVersion(u32),
}

impl Display for SchemaDeclarationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankFieldName => write!(f, "field name must not be blank"),
            Self::RuleNotApplicable {
                field,
                rule,
                field_type,
            } => write!(
                f,
                "field '{field}': {rule} is not applicable to {field_type} fields"
            ),
            Self::InvertedRange { field, min, max } => {
                write!(f, "field '{field}': {min} must not exceed {max}")
            }
            Self::NonFiniteBound { field, rule } => {
                write!(f, "field '{field}': {rule} must be a finite number")
            }
            Self::InvalidPattern {
                field,
                pattern,
                reason,
            } => write!(f, "field '{field}': invalid pattern `{pattern}`: {reason}"),
            Self::InvalidVersion(version) => {
                write!(f, "schema version must be >= 1, got {version}")
            }
        }
    }
}

impl Error for SchemaDeclarationError {}

/// Validated set of field declarations owned by one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredMetadataSchema")]
pub struct MetadataSchema {
    fields: BTreeMap<String, FieldDefinition>,
    version: u32,
    last_modified: DateTime<Utc>,
}

impl MetadataSchema {
    /// Validates `fields` and returns a version 1 schema stamped now.
    pub fn new(fields: BTreeMap<String, FieldDefinition>) -> Result<Self, SchemaDeclarationError> {
        Self::new_at(fields, now_utc())
    }

    /// Same as [`MetadataSchema::new`] with an explicit modification time.
    pub fn new_at(
        fields: BTreeMap<String, FieldDefinition>,
        now: DateTime<Utc>,
    ) -> Result<Self, SchemaDeclarationError> {
        for (name, definition) in &fields {
            validate_declaration(name, definition)?;
        }
        Ok(Self {
            fields,
            version: 1,
            last_modified: now,
        })
    }

    /// Every declared field keyed by name.
    pub fn all_fields(&self) -> &BTreeMap<String, FieldDefinition> {
        &self.fields
    }

    /// Names of required fields in ascending order.
    pub fn required_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, definition)| definition.required)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Required fields of `proposed` that are not required here.
    pub fn added_required_fields(&self, proposed: &MetadataSchema) -> Vec<String> {
        let current = self.required_fields();
        proposed
            .required_fields()
            .into_iter()
            .filter(|name| !current.contains(name))
            .map(str::to_string)
            .collect()
    }

    /// Checks whether `proposed` may replace this schema.
    ///
    /// Only newly required fields are blocked, and only when the collection
    /// already holds items. Dropping fields or relaxing `required` always
    /// passes.
    pub fn check_evolution(
        &self,
        proposed: &MetadataSchema,
        existing_item_count: u64,
    ) -> Result<(), InvariantViolation> {
        if existing_item_count == 0 {
            return Ok(());
        }
        let added = self.added_required_fields(proposed);
        if added.is_empty() {
            Ok(())
        } else {
            Err(InvariantViolation::RequiredFieldsAdded(added))
        }
    }

    /// Re-stamps `self` as the replacement of `previous`.
    pub(crate) fn succeed(mut self, previous: &MetadataSchema, now: DateTime<Utc>) -> Self {
        self.version = previous.version.saturating_add(1);
        self.last_modified = now;
        self
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredMetadataSchema {
    #[serde(default)]
    fields: BTreeMap<String, FieldDefinition>,
    version: u32,
    last_modified: DateTime<Utc>,
}

impl TryFrom<StoredMetadataSchema> for MetadataSchema {
    type Error = SchemaDeclarationError;

    fn try_from(value: StoredMetadataSchema) -> Result<Self, Self::Error> {
        if value.version == 0 {
            return Err(SchemaDeclarationError::InvalidVersion(value.version));
        }
        let mut schema = Self::new_at(value.fields, value.last_modified)?;
        schema.version = value.version;
        Ok(schema)
    }
}

fn validate_declaration(
    name: &str,
    definition: &FieldDefinition,
) -> Result<(), SchemaDeclarationError> {
    if name.trim().is_empty() {
        return Err(SchemaDeclarationError::BlankFieldName);
    }
    let Some(rules) = definition.validation.as_ref() else {
        return Ok(());
    };

    let applicable = definition.field_type.applicable_rules();
    for rule in rules.declared() {
        if !applicable.contains(&rule) {
            return Err(SchemaDeclarationError::RuleNotApplicable {
                field: name.to_string(),
                rule,
                field_type: definition.field_type,
            });
        }
    }

    if let (Some(min), Some(max)) = (rules.min_length, rules.max_length) {
        if min > max {
            return Err(SchemaDeclarationError::InvertedRange {
                field: name.to_string(),
                min: ValidationRule::MinLength,
                max: ValidationRule::MaxLength,
            });
        }
    }

    for (rule, bound) in [
        (ValidationRule::MinValue, rules.min_value),
        (ValidationRule::MaxValue, rules.max_value),
    ] {
        if bound.is_some_and(|value| !value.is_finite()) {
            return Err(SchemaDeclarationError::NonFiniteBound {
                field: name.to_string(),
                rule,
            });
        }
    }
    if let (Some(min), Some(max)) = (rules.min_value, rules.max_value) {
        if min > max {
            return Err(SchemaDeclarationError::InvertedRange {
                field: name.to_string(),
                min: ValidationRule::MinValue,
                max: ValidationRule::MaxValue,
            });
        }
    }

    if let Some(pattern) = rules.pattern.as_deref() {
        compiled_pattern(pattern).map_err(|err| SchemaDeclarationError::InvalidPattern {
            field: name.to_string(),
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })?;
    }

    Ok(())
}

/// Returns the compiled form of `pattern`, compiling it at most once while
/// it stays cached.
pub(crate) fn compiled_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let mut cache = PATTERN_CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }

    let regex = Regex::new(pattern)?;
    if cache.len() >= PATTERN_CACHE_CAPACITY {
        cache.clear();
    }
    cache.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

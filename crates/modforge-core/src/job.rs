//! Normalized generation job.
//!
//! Produced by the validator from a [`GenerateRequest`](crate::GenerateRequest).
//! Each field carries a [`FieldKind`] whose variant holds only the knobs legal
//! for its category, so downstream code never re-checks subtype conditions.

use serde::{Deserialize, Serialize};

use crate::constraints::{ReferentialAction, RelationKind};
use crate::descriptor::CreationConfig;
use crate::naming::EntityNames;
use crate::types::{ColumnType, Subtype, SubtypeAttrs, TypeCategory, quote_sql};

pub const DEFAULT_PASSWORD_MIN: u32 = 8;
pub const DEFAULT_PASSWORD_MAX: u32 = 15;
pub const PASSWORD_SPECIAL_CHARS: &str = "@$!%*#?&";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationJob {
    pub entity: EntityNames,
    /// Never empty; a single default `id` key is filled in when none is declared.
    pub primary_keys: Vec<PrimaryKeySpec>,
    pub fields: Vec<FieldSpec>,
    pub creation: CreationConfig,
    pub indices: Vec<IndexSpec>,
}

impl GenerationJob {
    pub fn relations(&self) -> impl Iterator<Item = (&FieldSpec, &RelationSpec)> {
        self.fields.iter().filter_map(|field| match &field.kind {
            FieldKind::Relation(relation) => Some((field, relation)),
            _ => None,
        })
    }

    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|field| !field.is_relation())
    }

    pub fn has_composite_key(&self) -> bool {
        self.primary_keys.len() > 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrimaryKeySpec {
    pub property: String,
    pub column: String,
    pub column_type: ColumnType,
    /// Value assigned by storage (auto increment) or by the access layer (uuid).
    pub generated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSpec {
    /// Name as declared in the request.
    pub name: String,
    /// camelCase property name.
    pub property: String,
    /// Storage column name.
    pub column: String,
    pub nullable: bool,
    pub unique: bool,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn is_relation(&self) -> bool {
        matches!(self.kind, FieldKind::Relation(_))
    }

    pub fn relation(&self) -> Option<&RelationSpec> {
        match &self.kind {
            FieldKind::Relation(relation) => Some(relation),
            _ => None,
        }
    }
}

/// Field shape per category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "category")]
pub enum FieldKind {
    String {
        subtype: Subtype,
        length: u32,
        default: Option<String>,
    },
    Text {
        subtype: Subtype,
        default: Option<String>,
    },
    Boolean {
        default: Option<bool>,
    },
    Json,
    Enum {
        values: Vec<String>,
        default: Option<String>,
    },
    Set {
        values: Vec<String>,
        default: Option<Vec<String>>,
    },
    Uid {
        subtype: Subtype,
    },
    DateTime {
        subtype: Subtype,
        default: Option<DefaultValue>,
    },
    Number {
        subtype: Subtype,
        precision: Option<u32>,
        scale: Option<u32>,
        default: Option<DefaultValue>,
    },
    Email {
        default: Option<String>,
    },
    Password {
        policy: PasswordPolicy,
        default: Option<String>,
    },
    PhoneNumber {
        subtype: Subtype,
        default: Option<String>,
    },
    Relation(RelationSpec),
}

impl FieldKind {
    pub fn category(&self) -> TypeCategory {
        match self {
            FieldKind::String { .. } => TypeCategory::String,
            FieldKind::Text { .. } => TypeCategory::Text,
            FieldKind::Boolean { .. } => TypeCategory::Boolean,
            FieldKind::Json => TypeCategory::Json,
            FieldKind::Enum { .. } => TypeCategory::Enum,
            FieldKind::Set { .. } => TypeCategory::Set,
            FieldKind::Uid { .. } => TypeCategory::Uid,
            FieldKind::DateTime { .. } => TypeCategory::DateTime,
            FieldKind::Number { .. } => TypeCategory::Number,
            FieldKind::Email { .. } => TypeCategory::Email,
            FieldKind::Password { .. } => TypeCategory::Password,
            FieldKind::PhoneNumber { .. } => TypeCategory::PhoneNumber,
            FieldKind::Relation(_) => TypeCategory::Relation,
        }
    }

    pub fn subtype(&self) -> Option<Subtype> {
        let subtype = match self {
            FieldKind::String { subtype, .. }
            | FieldKind::Text { subtype, .. }
            | FieldKind::Uid { subtype }
            | FieldKind::DateTime { subtype, .. }
            | FieldKind::Number { subtype, .. }
            | FieldKind::PhoneNumber { subtype, .. } => *subtype,
            FieldKind::Boolean { .. } => Subtype::Boolean,
            FieldKind::Json => Subtype::Json,
            FieldKind::Enum { .. } => Subtype::Enum,
            FieldKind::Set { .. } => Subtype::SimpleArray,
            FieldKind::Email { .. } => Subtype::Email,
            FieldKind::Password { .. } => Subtype::Password,
            FieldKind::Relation(_) => return None,
        };
        Some(subtype)
    }

    /// Runtime and storage type; `None` for relations, whose columns are the
    /// derived foreign keys.
    pub fn column_type(&self) -> Option<ColumnType> {
        let subtype = self.subtype()?;
        let attrs = match self {
            FieldKind::String { length, .. } => SubtypeAttrs {
                length: Some(*length),
                ..SubtypeAttrs::default()
            },
            FieldKind::Enum { values, .. } => SubtypeAttrs {
                values,
                ..SubtypeAttrs::default()
            },
            FieldKind::Number {
                precision, scale, ..
            } => SubtypeAttrs {
                precision: *precision,
                scale: *scale,
                ..SubtypeAttrs::default()
            },
            _ => SubtypeAttrs::default(),
        };
        Some(ColumnType::for_subtype(subtype, &attrs))
    }

    /// Declared default in a uniform shape.
    pub fn default_value(&self) -> Option<DefaultValue> {
        match self {
            FieldKind::String { default, .. }
            | FieldKind::Text { default, .. }
            | FieldKind::Enum { default, .. }
            | FieldKind::Email { default }
            | FieldKind::Password { default, .. }
            | FieldKind::PhoneNumber { default, .. } => default.clone().map(DefaultValue::Text),
            FieldKind::Boolean { default } => default.map(DefaultValue::Bool),
            FieldKind::Set { default, .. } => default.clone().map(DefaultValue::List),
            FieldKind::DateTime { default, .. } | FieldKind::Number { default, .. } => {
                default.clone()
            }
            FieldKind::Json | FieldKind::Uid { .. } | FieldKind::Relation(_) => None,
        }
    }
}

/// Validated default value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DefaultValue {
    Text(String),
    Integer(i64),
    /// Kept as written so precision survives into the migration.
    Decimal(String),
    Bool(bool),
    List(Vec<String>),
    /// Storage-evaluated sentinel such as `CURRENT_TIMESTAMP`.
    Expression(String),
}

impl DefaultValue {
    /// Literal for a `DEFAULT` clause.
    pub fn to_sql(&self) -> String {
        match self {
            DefaultValue::Text(value) => quote_sql(value),
            DefaultValue::Integer(value) => value.to_string(),
            DefaultValue::Decimal(value) => value.clone(),
            DefaultValue::Bool(value) => if *value { "TRUE" } else { "FALSE" }.to_string(),
            DefaultValue::List(values) => {
                quote_sql(&serde_json::Value::from(values.clone()).to_string())
            }
            DefaultValue::Expression(value) => match value.as_str() {
                "NOW()" => "CURRENT_TIMESTAMP".to_string(),
                other => other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: u32,
    pub max_length: u32,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_PASSWORD_MIN,
            max_length: DEFAULT_PASSWORD_MAX,
            require_digit: true,
            require_special: true,
        }
    }
}

impl PasswordPolicy {
    /// Lowercase and uppercase letters are always required.
    pub fn accepts(&self, value: &str) -> bool {
        let length = value.chars().count() as u32;
        if length < self.min_length || length > self.max_length {
            return false;
        }
        if !value.chars().any(|ch| ch.is_ascii_lowercase())
            || !value.chars().any(|ch| ch.is_ascii_uppercase())
        {
            return false;
        }
        if self.require_digit && !value.chars().any(|ch| ch.is_ascii_digit()) {
            return false;
        }
        if self.require_special && !value.chars().any(|ch| PASSWORD_SPECIAL_CHARS.contains(ch)) {
            return false;
        }
        true
    }

    pub fn describe(&self) -> String {
        let mut parts = vec![
            format!("between {}-{} characters", self.min_length, self.max_length),
            "one lowercase".to_string(),
            "one uppercase".to_string(),
        ];
        if self.require_digit {
            parts.push("one number".to_string());
        }
        if self.require_special {
            parts.push("one special character".to_string());
        }
        format!("password must contain {}", parts.join(", "))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationSpec {
    pub kind: RelationKind,
    /// Target class name.
    pub target: String,
    /// Target module name.
    pub target_module: String,
    /// Existing property on the target that already mirrors this relation.
    pub inverse_side: Option<String>,
    pub bidirectional: bool,
    pub is_array: bool,
    pub join: RelationJoin,
    pub cascade: bool,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
    pub nullable: bool,
    /// Foreign key columns owned by the declaring side (to-one kinds only).
    pub foreign_keys: Vec<ForeignKeyColumn>,
}

impl RelationSpec {
    /// Whether the target needs a mirrored property.
    pub fn needs_wiring(&self) -> bool {
        self.bidirectional || self.kind.requires_inverse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationJoin {
    None,
    Column(JoinColumnSpec),
    Table(JoinTableSpec),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinColumnSpec {
    pub name: Option<String>,
    pub referenced_column: Option<String>,
}

/// Resolved join table of a many-to-many relation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinTableSpec {
    pub name: String,
    /// Columns referencing the owning entity.
    pub join_columns: Vec<ForeignKeyColumn>,
    /// Columns referencing the target entity.
    pub inverse_join_columns: Vec<ForeignKeyColumn>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKeyColumn {
    pub column: String,
    pub property: String,
    pub referenced_column: String,
    pub column_type: ColumnType,
}

/// Index resolved against derived column names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub columns: Vec<String>,
    pub properties: Vec<String>,
    pub unique: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RuntimeType, StorageType};

    #[test]
    fn password_policy_requires_mixed_case() {
        let policy = PasswordPolicy::default();
        assert!(policy.accepts("Secret#123"));
        assert!(!policy.accepts("secret#123"));
        assert!(!policy.accepts("Sec#1"));
        assert!(!policy.accepts("Secret1234"));

        let relaxed = PasswordPolicy {
            require_digit: false,
            require_special: false,
            ..PasswordPolicy::default()
        };
        assert!(relaxed.accepts("SecretWord"));
        assert!(!relaxed.describe().contains("number"));
    }

    #[test]
    fn number_kind_resolves_decimal_column() {
        let kind = FieldKind::Number {
            subtype: Subtype::Decimal,
            precision: Some(12),
            scale: Some(4),
            default: Some(DefaultValue::Decimal("1.5".to_string())),
        };
        let column = kind.column_type().expect("column type");
        assert_eq!(column.runtime, RuntimeType::Decimal);
        assert_eq!(
            column.storage,
            StorageType::Decimal {
                precision: 12,
                scale: 4
            }
        );
        assert_eq!(kind.default_value().map(|value| value.to_sql()), Some("1.5".to_string()));
    }

    #[test]
    fn default_sql_literals() {
        assert_eq!(DefaultValue::Text("it's".to_string()).to_sql(), "'it''s'");
        assert_eq!(DefaultValue::Bool(false).to_sql(), "FALSE");
        assert_eq!(
            DefaultValue::List(vec!["a".to_string(), "b".to_string()]).to_sql(),
            r#"'["a","b"]'"#
        );
        assert_eq!(DefaultValue::Expression("NOW()".to_string()).to_sql(), "CURRENT_TIMESTAMP");
    }

    #[test]
    fn kind_round_trips_through_json() {
        let kind = FieldKind::Enum {
            values: vec!["DRAFT".to_string()],
            default: None,
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["category"], "Enum");
        let back: FieldKind = serde_json::from_value(json).unwrap();
        assert_eq!(back, kind);
    }
}

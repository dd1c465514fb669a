use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_VARCHAR_LENGTH: u32 = 255;
pub const DEFAULT_CHAR_LENGTH: u32 = 36;
/// Bytes of a uuid in its binary storage form.
pub const UUID_BINARY_LENGTH: u32 = 16;
pub const DEFAULT_DECIMAL_PRECISION: u32 = 10;
pub const DEFAULT_DECIMAL_SCALE: u32 = 2;
pub const PHONE_NUMBER_LENGTH: u32 = 20;

/// Closed taxonomy of field categories accepted in a generation request.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema,
)]
pub enum TypeCategory {
    String,
    Text,
    Boolean,
    Json,
    Enum,
    Set,
    Uid,
    DateTime,
    Number,
    Relation,
    Email,
    Password,
    PhoneNumber,
}

impl TypeCategory {
    /// Storage subtypes a field of this category may declare.
    pub fn allowed_subtypes(self) -> &'static [Subtype] {
        use Subtype::*;
        match self {
            TypeCategory::String => &[Varchar, Char],
            TypeCategory::Text => &[TinyText, MediumText, Text],
            TypeCategory::Json => &[Json],
            TypeCategory::Boolean => &[Boolean],
            TypeCategory::Enum => &[Enum],
            TypeCategory::Set => &[SimpleArray],
            TypeCategory::Uid => &[Uuid, BigInt, StringId],
            TypeCategory::DateTime => &[Date, DateTime, Timestamp, Time],
            TypeCategory::Number => &[SmallInt, Int, BigInt, Float, Double, Decimal],
            TypeCategory::Email => &[Email],
            TypeCategory::Password => &[Password],
            TypeCategory::PhoneNumber => &[LocalPhoneNumber, InternationalPhoneNumber],
            TypeCategory::Relation => &[],
        }
    }

    pub fn allows(self, subtype: Subtype) -> bool {
        self.allowed_subtypes().contains(&subtype)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TypeCategory::String => "String",
            TypeCategory::Text => "Text",
            TypeCategory::Boolean => "Boolean",
            TypeCategory::Json => "Json",
            TypeCategory::Enum => "Enum",
            TypeCategory::Set => "Set",
            TypeCategory::Uid => "Uid",
            TypeCategory::DateTime => "DateTime",
            TypeCategory::Number => "Number",
            TypeCategory::Relation => "Relation",
            TypeCategory::Email => "Email",
            TypeCategory::Password => "Password",
            TypeCategory::PhoneNumber => "PhoneNumber",
        }
    }
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete storage subtype drawn from the per-category allow-list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subtype {
    #[serde(rename = "varchar")]
    Varchar,
    #[serde(rename = "char")]
    Char,
    #[serde(rename = "tinytext")]
    TinyText,
    #[serde(rename = "mediumtext")]
    MediumText,
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "enum")]
    Enum,
    #[serde(rename = "simple-array")]
    SimpleArray,
    #[serde(rename = "uuid")]
    Uuid,
    #[serde(rename = "string")]
    StringId,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    #[serde(rename = "timestamp")]
    Timestamp,
    #[serde(rename = "time")]
    Time,
    #[serde(rename = "smallint")]
    SmallInt,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "bigint")]
    BigInt,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "decimal")]
    Decimal,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "password")]
    Password,
    #[serde(rename = "localPhoneNumber")]
    LocalPhoneNumber,
    #[serde(rename = "internationalPhoneNumber")]
    InternationalPhoneNumber,
}

const ALL_SUBTYPES: &[Subtype] = &[
    Subtype::Varchar,
    Subtype::Char,
    Subtype::TinyText,
    Subtype::MediumText,
    Subtype::Text,
    Subtype::Json,
    Subtype::Boolean,
    Subtype::Enum,
    Subtype::SimpleArray,
    Subtype::Uuid,
    Subtype::StringId,
    Subtype::Date,
    Subtype::DateTime,
    Subtype::Timestamp,
    Subtype::Time,
    Subtype::SmallInt,
    Subtype::Int,
    Subtype::BigInt,
    Subtype::Float,
    Subtype::Double,
    Subtype::Decimal,
    Subtype::Email,
    Subtype::Password,
    Subtype::LocalPhoneNumber,
    Subtype::InternationalPhoneNumber,
];

impl Subtype {
    pub fn parse(value: &str) -> Option<Subtype> {
        ALL_SUBTYPES
            .iter()
            .copied()
            .find(|subtype| subtype.as_str() == value)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Subtype::Varchar => "varchar",
            Subtype::Char => "char",
            Subtype::TinyText => "tinytext",
            Subtype::MediumText => "mediumtext",
            Subtype::Text => "text",
            Subtype::Json => "json",
            Subtype::Boolean => "boolean",
            Subtype::Enum => "enum",
            Subtype::SimpleArray => "simple-array",
            Subtype::Uuid => "uuid",
            Subtype::StringId => "string",
            Subtype::Date => "date",
            Subtype::DateTime => "datetime",
            Subtype::Timestamp => "timestamp",
            Subtype::Time => "time",
            Subtype::SmallInt => "smallint",
            Subtype::Int => "int",
            Subtype::BigInt => "bigint",
            Subtype::Float => "float",
            Subtype::Double => "double",
            Subtype::Decimal => "decimal",
            Subtype::Email => "email",
            Subtype::Password => "password",
            Subtype::LocalPhoneNumber => "localPhoneNumber",
            Subtype::InternationalPhoneNumber => "internationalPhoneNumber",
        }
    }

    /// Subtypes that accept an explicit `length`.
    pub fn accepts_length(self) -> bool {
        matches!(self, Subtype::Varchar | Subtype::Char)
    }

    /// Subtypes that accept `m`/`d` precision and scale.
    pub fn accepts_precision(self) -> bool {
        matches!(self, Subtype::Decimal)
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory type of a generated record field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeType {
    String,
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    Decimal,
    Uuid,
    Date,
    Time,
    DateTime,
    Timestamp,
    Json,
    StringList,
    /// A generated enum named after the owning field.
    Enum,
}

impl RuntimeType {
    /// Rust type path used in generated code; enums are named by the renderer.
    pub fn rust_type(self) -> Option<&'static str> {
        let ty = match self {
            RuntimeType::String => "String",
            RuntimeType::Bool => "bool",
            RuntimeType::I16 => "i16",
            RuntimeType::I32 => "i32",
            RuntimeType::I64 => "i64",
            RuntimeType::F32 => "f32",
            RuntimeType::F64 => "f64",
            RuntimeType::Decimal => "rust_decimal::Decimal",
            RuntimeType::Uuid => "uuid::Uuid",
            RuntimeType::Date => "chrono::NaiveDate",
            RuntimeType::Time => "chrono::NaiveTime",
            RuntimeType::DateTime => "chrono::NaiveDateTime",
            RuntimeType::Timestamp => "chrono::DateTime<chrono::Utc>",
            RuntimeType::Json => "serde_json::Value",
            RuntimeType::StringList => "Vec<String>",
            RuntimeType::Enum => return None,
        };
        Some(ty)
    }
}

/// Storage (MySQL) column type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageType {
    Varchar { length: u32 },
    Char { length: u32 },
    Binary { length: u32 },
    TinyText,
    MediumText,
    Text,
    Json,
    Boolean,
    Enum { values: Vec<String> },
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal { precision: u32, scale: u32 },
    Date,
    DateTime,
    Timestamp,
    Time,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::Varchar { length } => write!(f, "VARCHAR({length})"),
            StorageType::Char { length } => write!(f, "CHAR({length})"),
            StorageType::Binary { length } => write!(f, "BINARY({length})"),
            StorageType::TinyText => f.write_str("TINYTEXT"),
            StorageType::MediumText => f.write_str("MEDIUMTEXT"),
            StorageType::Text => f.write_str("TEXT"),
            StorageType::Json => f.write_str("JSON"),
            StorageType::Boolean => f.write_str("BOOLEAN"),
            StorageType::Enum { values } => {
                let quoted: Vec<String> = values.iter().map(|value| quote_sql(value)).collect();
                write!(f, "ENUM({})", quoted.join(","))
            }
            StorageType::SmallInt => f.write_str("SMALLINT"),
            StorageType::Int => f.write_str("INT"),
            StorageType::BigInt => f.write_str("BIGINT"),
            StorageType::Float => f.write_str("FLOAT"),
            StorageType::Double => f.write_str("DOUBLE"),
            StorageType::Decimal { precision, scale } => {
                write!(f, "DECIMAL({precision},{scale})")
            }
            StorageType::Date => f.write_str("DATE"),
            StorageType::DateTime => f.write_str("DATETIME"),
            StorageType::Timestamp => f.write_str("TIMESTAMP"),
            StorageType::Time => f.write_str("TIME"),
        }
    }
}

/// Quote `value` as a MySQL string literal.
///
/// Backslashes are escaped too, since the server treats them as escapes
/// unless `NO_BACKSLASH_ESCAPES` is set.
pub fn quote_sql(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Resolved runtime and storage type pair for one column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnType {
    pub runtime: RuntimeType,
    pub storage: StorageType,
}

/// Subtype attributes that influence the storage type.
#[derive(Debug, Clone, Default)]
pub struct SubtypeAttrs<'a> {
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub values: &'a [String],
}

impl ColumnType {
    pub fn new(runtime: RuntimeType, storage: StorageType) -> Self {
        Self { runtime, storage }
    }

    /// Map a subtype plus its attributes to runtime and storage types.
    pub fn for_subtype(subtype: Subtype, attrs: &SubtypeAttrs<'_>) -> ColumnType {
        let (runtime, storage) = match subtype {
            Subtype::Varchar => (
                RuntimeType::String,
                StorageType::Varchar {
                    length: attrs.length.unwrap_or(DEFAULT_VARCHAR_LENGTH),
                },
            ),
            Subtype::Char => (
                RuntimeType::String,
                StorageType::Char {
                    length: attrs.length.unwrap_or(DEFAULT_CHAR_LENGTH),
                },
            ),
            Subtype::TinyText => (RuntimeType::String, StorageType::TinyText),
            Subtype::MediumText => (RuntimeType::String, StorageType::MediumText),
            Subtype::Text => (RuntimeType::String, StorageType::Text),
            Subtype::Json => (RuntimeType::Json, StorageType::Json),
            Subtype::Boolean => (RuntimeType::Bool, StorageType::Boolean),
            Subtype::Enum => (
                RuntimeType::Enum,
                StorageType::Enum {
                    values: attrs.values.to_vec(),
                },
            ),
            Subtype::SimpleArray => (RuntimeType::StringList, StorageType::Text),
            // sqlx-mysql binds `uuid::Uuid` as 16 raw bytes.
            Subtype::Uuid => (
                RuntimeType::Uuid,
                StorageType::Binary {
                    length: UUID_BINARY_LENGTH,
                },
            ),
            Subtype::StringId => (
                RuntimeType::String,
                StorageType::Varchar {
                    length: DEFAULT_VARCHAR_LENGTH,
                },
            ),
            Subtype::Date => (RuntimeType::Date, StorageType::Date),
            Subtype::DateTime => (RuntimeType::DateTime, StorageType::DateTime),
            Subtype::Timestamp => (RuntimeType::Timestamp, StorageType::Timestamp),
            Subtype::Time => (RuntimeType::Time, StorageType::Time),
            Subtype::SmallInt => (RuntimeType::I16, StorageType::SmallInt),
            Subtype::Int => (RuntimeType::I32, StorageType::Int),
            Subtype::BigInt => (RuntimeType::I64, StorageType::BigInt),
            Subtype::Float => (RuntimeType::F32, StorageType::Float),
            Subtype::Double => (RuntimeType::F64, StorageType::Double),
            Subtype::Decimal => (
                RuntimeType::Decimal,
                StorageType::Decimal {
                    precision: attrs.precision.unwrap_or(DEFAULT_DECIMAL_PRECISION),
                    scale: attrs.scale.unwrap_or(DEFAULT_DECIMAL_SCALE),
                },
            ),
            Subtype::Email | Subtype::Password => (
                RuntimeType::String,
                StorageType::Varchar {
                    length: DEFAULT_VARCHAR_LENGTH,
                },
            ),
            Subtype::LocalPhoneNumber | Subtype::InternationalPhoneNumber => (
                RuntimeType::String,
                StorageType::Varchar {
                    length: PHONE_NUMBER_LENGTH,
                },
            ),
        };
        ColumnType { runtime, storage }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bigint_is_allowed_for_identifiers_and_numbers() {
        assert!(TypeCategory::Uid.allows(Subtype::BigInt));
        assert!(TypeCategory::Number.allows(Subtype::BigInt));
        assert!(!TypeCategory::String.allows(Subtype::BigInt));
        assert!(TypeCategory::Relation.allowed_subtypes().is_empty());
    }

    #[test]
    fn subtypes_round_trip_through_names() {
        for subtype in ALL_SUBTYPES {
            assert_eq!(Subtype::parse(subtype.as_str()), Some(*subtype));
        }
        assert_eq!(Subtype::parse("nvarchar"), None);
    }

    #[test]
    fn decimal_defaults_precision_and_scale() {
        let column = ColumnType::for_subtype(Subtype::Decimal, &SubtypeAttrs::default());
        assert_eq!(column.runtime, RuntimeType::Decimal);
        assert_eq!(column.storage.to_string(), "DECIMAL(10,2)");
    }

    #[test]
    fn enum_storage_quotes_values() {
        let values = vec!["DRAFT".to_string(), "O'NEIL".to_string()];
        let column = ColumnType::for_subtype(
            Subtype::Enum,
            &SubtypeAttrs {
                values: &values,
                ..SubtypeAttrs::default()
            },
        );
        assert_eq!(column.storage.to_string(), "ENUM('DRAFT','O''NEIL')");
    }

    #[test]
    fn uuid_is_stored_in_its_binary_form() {
        let column = ColumnType::for_subtype(Subtype::Uuid, &SubtypeAttrs::default());
        assert_eq!(column.runtime.rust_type(), Some("uuid::Uuid"));
        assert_eq!(column.storage.to_string(), "BINARY(16)");
    }

    #[test]
    fn string_literals_escape_backslashes_and_quotes() {
        assert_eq!(quote_sql(r"C:\"), r"'C:\\'");
        assert_eq!(quote_sql(r"it's \n"), r"'it''s \\n'");
    }
}

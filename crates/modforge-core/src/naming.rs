//! Name derivation for generated identifiers, columns and routes.

use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};

use crate::catalog::EntitySummary;
use crate::error::{Error, Result};
use crate::job::{ForeignKeyColumn, JoinColumnSpec};

/// Identifiers derived from an entity name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityNames {
    /// PascalCase type name (`OrderItem`).
    pub class_name: String,
    /// snake_case module and file name (`order_item`).
    pub module: String,
    /// Storage table name (`order_item`).
    pub table: String,
    /// camelCase property name (`orderItem`).
    pub property: String,
    /// Plural lowercase route segment (`orderitems`).
    pub route: String,
    /// SCREAMING_SNAKE prefix for constants (`ORDER_ITEM`).
    pub constant: String,
}

impl EntityNames {
    pub fn new(name: &str) -> Result<Self> {
        if !is_identifier(name) {
            return Err(Error::InvalidName(name.to_string()));
        }

        let class_name = name.to_case(Case::Pascal);
        let module = name.to_case(Case::Snake);
        Ok(Self {
            property: name.to_case(Case::Camel),
            route: pluralize(&class_name.to_lowercase()),
            constant: name.to_case(Case::UpperSnake),
            table: module.clone(),
            module,
            class_name,
        })
    }
}

/// True when `name` can be used as a generated identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Storage column name: explicit override or snake_case of the field name.
pub fn column_name(field_name: &str, db_name: Option<&str>) -> String {
    match db_name {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => field_name.to_case(Case::Snake),
    }
}

/// Entity-level property name (camelCase).
pub fn property_name(field_name: &str) -> String {
    field_name.to_case(Case::Camel)
}

/// Rust identifier (snake_case) for a property.
pub fn rust_ident(property: &str) -> String {
    let ident = property.to_case(Case::Snake);
    if is_reserved(&ident) {
        format!("r#{ident}")
    } else {
        ident
    }
}

/// PascalCase form of an arbitrary name, used for generated enum names.
pub fn pascal(name: &str) -> String {
    name.to_case(Case::Pascal)
}

pub fn pluralize(word: &str) -> String {
    pluralizer::pluralize(word, 2, false)
}

/// Foreign key columns for a to-one relation named `field_name` pointing at
/// `target`.
///
/// A single-key target yields one column (`<field>_id` unless overridden by the
/// join column). A composite-key target yields one column per key field named
/// `<lowercase target>_<key column>`.
pub fn derive_foreign_keys(
    field_name: &str,
    join_column: Option<&JoinColumnSpec>,
    target: &EntitySummary,
) -> Vec<ForeignKeyColumn> {
    if target.has_composite_key() {
        let prefix = target.class_name.to_lowercase();
        return target
            .primary_keys
            .iter()
            .map(|key| {
                let column = format!("{prefix}_{}", key.column);
                ForeignKeyColumn {
                    property: property_name(&column),
                    column,
                    referenced_column: key.column.clone(),
                    column_type: key.column_type.clone(),
                }
            })
            .collect();
    }

    let Some(key) = target.primary_keys.first() else {
        return Vec::new();
    };

    let column = join_column
        .and_then(|join| join.name.clone())
        .unwrap_or_else(|| format!("{}_id", field_name.to_case(Case::Snake)));
    let referenced_column = join_column
        .and_then(|join| join.referenced_column.clone())
        .unwrap_or_else(|| key.column.clone());

    vec![ForeignKeyColumn {
        column,
        property: format!("{}Id", property_name(field_name)),
        referenced_column,
        column_type: key.column_type.clone(),
    }]
}

fn is_reserved(ident: &str) -> bool {
    matches!(
        ident,
        "type" | "struct" | "enum" | "fn" | "impl" | "mod" | "use" | "match" | "ref" | "self"
            | "super" | "crate" | "where" | "loop" | "move" | "trait" | "static" | "const"
            | "let" | "in" | "as" | "for" | "if" | "else" | "while" | "return" | "pub"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::catalog::KeyColumn;
    use crate::types::{ColumnType, RuntimeType, StorageType};

    fn key(column: &str, storage: StorageType) -> KeyColumn {
        KeyColumn {
            property: property_name(column),
            column: column.to_string(),
            column_type: ColumnType::new(RuntimeType::I64, storage),
        }
    }

    fn summary(class_name: &str, keys: Vec<KeyColumn>) -> EntitySummary {
        EntitySummary {
            class_name: class_name.to_string(),
            module: class_name.to_lowercase(),
            table: class_name.to_lowercase(),
            primary_keys: keys,
            public_names: BTreeSet::new(),
        }
    }

    #[test]
    fn derives_entity_names() {
        let names = EntityNames::new("orderItem").unwrap();
        assert_eq!(names.class_name, "OrderItem");
        assert_eq!(names.module, "order_item");
        assert_eq!(names.property, "orderItem");
        assert_eq!(names.constant, "ORDER_ITEM");
        assert_eq!(names.route, "orderitems");

        assert_eq!(EntityNames::new("pizza").unwrap().route, "pizzas");
        assert!(EntityNames::new("9lives").is_err());
        assert!(EntityNames::new("my-entity").is_err());
    }

    #[test]
    fn column_names_prefer_overrides() {
        assert_eq!(column_name("firstName", None), "first_name");
        assert_eq!(column_name("firstName", Some("given")), "given");
        assert_eq!(column_name("firstName", Some("  ")), "first_name");
    }

    #[test]
    fn single_key_foreign_key_uses_field_name() {
        let user = summary("User", vec![key("id", StorageType::BigInt)]);
        let keys = derive_foreign_keys("createdByRole", None, &user);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].column, "created_by_role_id");
        assert_eq!(keys[0].property, "createdByRoleId");
        assert_eq!(keys[0].referenced_column, "id");
    }

    #[test]
    fn composite_key_foreign_keys_use_target_prefix() {
        let pizza = summary(
            "Pizza",
            vec![
                key("db_name", StorageType::BigInt),
                key("my_id", StorageType::Int),
            ],
        );
        let keys = derive_foreign_keys("pizza", None, &pizza);
        let columns: Vec<&str> = keys.iter().map(|key| key.column.as_str()).collect();
        assert_eq!(columns, vec!["pizza_db_name", "pizza_my_id"]);
        assert_eq!(keys[1].property, "pizzaMyId");
        assert_eq!(keys[1].column_type.storage, StorageType::Int);
    }

    #[test]
    fn reserved_words_are_raw_identifiers() {
        assert_eq!(rust_ident("type"), "r#type");
        assert_eq!(rust_ident("ownerId"), "owner_id");
    }
}

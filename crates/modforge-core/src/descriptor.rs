//! Raw generation request as accepted from callers.
//!
//! Every struct denies unknown fields so the emitted JSON Schema acts as a
//! whitelist. Values that need rule-level checks (subtype names, integer
//! ranges) are kept loose here and checked by the validator.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constraints::{ReferentialAction, RelationKind};
use crate::types::TypeCategory;

/// Request to generate one entity module.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GenerateRequest {
    /// Entity name; normalized into class, module and route names.
    pub name: String,
    /// Declared fields, including relations.
    pub fields: Vec<FieldDescriptor>,
    /// Explicit primary key fields; a single `id` is assumed when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_fields: Vec<PrimaryFieldDescriptor>,
    /// Lifecycle options.
    #[serde(default)]
    pub creation_config: CreationConfig,
    /// Requested indices over storage column names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indices: Vec<IndexDescriptor>,
}

/// One declared field.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FieldDescriptor {
    pub name: String,
    /// Explicit storage column name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    #[serde(rename = "type")]
    pub category: TypeCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
    /// Required for every category except `Relation`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype_options: Option<SubtypeOptionsDescriptor>,
    /// Required iff the category is `Relation`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<RelationDescriptor>,
}

/// Subtype options; legality of each knob depends on category and subtype.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SubtypeOptionsDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
    /// Decimal precision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<i64>,
    /// Decimal scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_digit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_special: Option<bool>,
    /// Permitted values for `Enum` and `Set`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    /// Default value; its shape depends on the subtype.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JoinColumnDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_column_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JoinTableDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_column: Option<JoinColumnDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse_join_column: Option<JoinColumnDescriptor>,
}

/// Relation options for a `Relation` field.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RelationDescriptor {
    #[serde(rename = "type")]
    pub kind: RelationKind,
    /// Class name of an existing entity.
    pub target: String,
    /// Property on the target that mirrors this relation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse_side: Option<String>,
    #[serde(default)]
    pub uni_directional: bool,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_column: Option<JoinColumnDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_table: Option<JoinTableDescriptor>,
    #[serde(default)]
    pub cascade: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ReferentialAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ReferentialAction>,
    #[serde(default = "default_true")]
    pub nullable: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrimaryRuntime {
    String,
    Number,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrimarySubtype {
    Int,
    #[serde(rename = "bigint")]
    BigInt,
    Uuid,
}

/// Explicit primary key field.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PrimaryFieldDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<PrimaryRuntime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<PrimarySubtype>,
}

/// Lifecycle columns and generation toggles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CreationConfig {
    /// Add `created_at` / `updated_at`.
    #[serde(default = "default_true")]
    pub with_timestamps: bool,
    /// Add the `deleted_at` soft-delete marker.
    #[serde(default = "default_true")]
    pub with_soft_delete: bool,
    /// Add `created_by` / `updated_by` / `deleted_by` user references.
    #[serde(default)]
    pub operator: bool,
    /// Render the permission seed script.
    #[serde(default = "default_true")]
    pub with_seed: bool,
}

impl Default for CreationConfig {
    fn default() -> Self {
        Self {
            with_timestamps: true,
            with_soft_delete: true,
            operator: false,
            with_seed: true,
        }
    }
}

/// Requested index over storage column names.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct IndexDescriptor {
    pub name: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_request_with_defaults() {
        let request: GenerateRequest = serde_json::from_value(serde_json::json!({
            "name": "invoice",
            "fields": [
                {
                    "name": "status",
                    "type": "Enum",
                    "subtype_options": { "subtype": "enum", "values": ["DRAFT", "SENT"] }
                },
                {
                    "name": "customer",
                    "type": "Relation",
                    "relation": { "type": "ManyToOne", "target": "Customer" }
                }
            ]
        }))
        .expect("parse request");

        assert!(request.primary_fields.is_empty());
        assert_eq!(request.creation_config, CreationConfig::default());
        let relation = request.fields[1].relation.as_ref().expect("relation");
        assert!(relation.nullable);
        assert!(!relation.uni_directional);
    }

    #[test]
    fn rejects_unknown_fields() {
        let result: Result<GenerateRequest, _> = serde_json::from_value(serde_json::json!({
            "name": "invoice",
            "fields": [],
            "colour": "blue"
        }));
        assert!(result.is_err());
    }
}

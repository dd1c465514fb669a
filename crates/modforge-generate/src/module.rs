//! Structural model of a generated module.
//!
//! Every module directory carries its model as `module.json`. Artifacts are
//! always rendered from the model, so mirroring a relation onto an existing
//! module means editing its model and rendering it again.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use modforge_core::{
    CONTRACT_VERSION, ColumnType, CreationConfig, DefaultValue, EntityCatalog, EntityNames,
    EntitySummary, FieldKind, ForeignKeyColumn, GenerationJob, IndexSpec, KeyColumn,
    PrimaryKeySpec, ReferentialAction, RelationJoin, RelationKind, RuntimeType, StorageType,
    derive_foreign_keys, pluralize,
};
use serde::{Deserialize, Serialize};

use crate::errors::{GenerateError, Result};

pub const MODULE_MODEL_FILE: &str = "module.json";

/// Operator relations added when `creation.operator` is set.
pub const OPERATOR_RELATIONS: [&str; 3] = ["createdBy", "updatedBy", "deletedBy"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleModel {
    pub contract_version: String,
    pub entity: EntityNames,
    pub primary_keys: Vec<PrimaryKeySpec>,
    pub columns: Vec<ColumnModel>,
    pub relations: Vec<RelationModel>,
    pub indices: Vec<IndexSpec>,
    pub creation: CreationConfig,
    /// Class names of related entities referenced by the record definition.
    pub imports: BTreeSet<String>,
    /// Properties selected by default.
    pub select_fields: Vec<String>,
    /// Relations that may be loaded alongside the record.
    pub relational_fields: Vec<String>,
    /// Many-to-many relations exposing a connect/disconnect mutation.
    pub sync_relations: Vec<String>,
    /// Name of the migration that created the module's table.
    pub migration: String,
}

/// One storage column of the module's table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnModel {
    pub property: String,
    pub column: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub unique: bool,
    pub default: Option<DefaultValue>,
    pub source: ColumnSource,
}

impl ColumnModel {
    pub fn field_kind(&self) -> Option<&FieldKind> {
        match &self.source {
            ColumnSource::Field { kind } => Some(kind),
            _ => None,
        }
    }

    /// Hidden columns are never part of the default selection.
    pub fn is_hidden(&self) -> bool {
        matches!(self.source, ColumnSource::DeletedAt)
            || matches!(self.field_kind(), Some(FieldKind::Password { .. }))
    }

    /// Maintained by storage or by the access layer, never by request payloads.
    pub fn is_managed(&self) -> bool {
        match &self.source {
            ColumnSource::Field { .. } => false,
            ColumnSource::ForeignKey { relation } => OPERATOR_RELATIONS.contains(&relation.as_str()),
            ColumnSource::CreatedAt | ColumnSource::UpdatedAt | ColumnSource::DeletedAt => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ColumnSource {
    Field { kind: FieldKind },
    ForeignKey { relation: String },
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

/// A relation property of the module's record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationModel {
    pub property: String,
    pub kind: RelationKind,
    pub target: String,
    pub target_module: String,
    pub target_table: String,
    pub inverse_property: Option<String>,
    /// Declared by this module's own request; mirrored relations are `false`.
    pub owner: bool,
    pub join: RelationJoin,
    /// Foreign key columns of the relation. They live on this table for
    /// to-one kinds and on the target table for one-to-many.
    pub foreign_keys: Vec<ForeignKeyColumn>,
    pub nullable: bool,
    pub cascade: bool,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
    pub target_keys: Vec<KeyColumn>,
}

impl RelationModel {
    pub fn is_self_reference(&self, entity: &EntityNames) -> bool {
        self.target == entity.class_name
    }
}

impl ModuleModel {
    /// Build the model of a freshly validated job.
    pub fn from_job(
        job: &GenerationJob,
        catalog: &EntityCatalog,
        user_entity: &str,
        migration: &str,
    ) -> Result<Self> {
        let mut model = ModuleModel {
            contract_version: CONTRACT_VERSION.to_string(),
            entity: job.entity.clone(),
            primary_keys: job.primary_keys.clone(),
            columns: Vec::new(),
            relations: Vec::new(),
            indices: job.indices.clone(),
            creation: job.creation.clone(),
            imports: BTreeSet::new(),
            select_fields: job.primary_keys.iter().map(|key| key.property.clone()).collect(),
            relational_fields: Vec::new(),
            sync_relations: Vec::new(),
            migration: migration.to_string(),
        };
        let own_summary = model.summary();

        for field in &job.fields {
            match &field.kind {
                FieldKind::Relation(relation) => {
                    let target = if relation.target == job.entity.class_name {
                        &own_summary
                    } else {
                        catalog
                            .get(&relation.target)
                            .ok_or_else(|| GenerateError::UnknownEntity(relation.target.clone()))?
                    };

                    let derived = (relation.inverse_side.is_none() && relation.needs_wiring())
                        .then(|| inverse_name(&job.entity, relation.kind));
                    // A declared inverse side already carries its foreign keys.
                    let foreign_keys = match (relation.kind, &derived) {
                        (RelationKind::OneToMany, Some(inverse)) => {
                            derive_foreign_keys(inverse, None, &own_summary)
                        }
                        (RelationKind::OneToMany, None) => Vec::new(),
                        _ => relation.foreign_keys.clone(),
                    };
                    let inverse_property = relation.inverse_side.clone().or(derived);

                    model.add_relation(RelationModel {
                        property: field.property.clone(),
                        kind: relation.kind,
                        target: relation.target.clone(),
                        target_module: relation.target_module.clone(),
                        target_table: target.table.clone(),
                        inverse_property,
                        owner: true,
                        join: relation.join.clone(),
                        foreign_keys,
                        nullable: relation.nullable,
                        cascade: relation.cascade,
                        on_delete: relation.on_delete,
                        on_update: relation.on_update,
                        target_keys: target.primary_keys.clone(),
                    });
                }
                kind => {
                    let Some(column_type) = kind.column_type() else {
                        continue;
                    };
                    model.add_column(ColumnModel {
                        property: field.property.clone(),
                        column: field.column.clone(),
                        column_type,
                        nullable: field.nullable,
                        unique: field.unique,
                        default: kind.default_value(),
                        source: ColumnSource::Field { kind: kind.clone() },
                    });
                }
            }
        }

        model.add_lifecycle(user_entity, catalog)?;
        model.refresh_select_fields();
        Ok(model)
    }

    fn add_lifecycle(&mut self, user_entity: &str, catalog: &EntityCatalog) -> Result<()> {
        let timestamp = || ColumnType::new(RuntimeType::Timestamp, StorageType::Timestamp);
        let now = || Some(DefaultValue::Expression("CURRENT_TIMESTAMP".to_string()));
        if self.creation.with_timestamps {
            self.add_column(ColumnModel {
                property: "createdAt".to_string(),
                column: "created_at".to_string(),
                column_type: timestamp(),
                nullable: false,
                unique: false,
                default: now(),
                source: ColumnSource::CreatedAt,
            });
            self.add_column(ColumnModel {
                property: "updatedAt".to_string(),
                column: "updated_at".to_string(),
                column_type: timestamp(),
                nullable: false,
                unique: false,
                default: now(),
                source: ColumnSource::UpdatedAt,
            });
        }
        if self.creation.with_soft_delete {
            self.add_column(ColumnModel {
                property: "deletedAt".to_string(),
                column: "deleted_at".to_string(),
                column_type: timestamp(),
                nullable: true,
                unique: false,
                default: None,
                source: ColumnSource::DeletedAt,
            });
        }
        if self.creation.operator {
            let user = catalog
                .get(user_entity)
                .ok_or_else(|| GenerateError::UnknownEntity(user_entity.to_string()))?
                .clone();
            for property in OPERATOR_RELATIONS {
                self.add_relation(RelationModel {
                    property: property.to_string(),
                    kind: RelationKind::ManyToOne,
                    target: user.class_name.clone(),
                    target_module: user.module.clone(),
                    target_table: user.table.clone(),
                    inverse_property: None,
                    owner: true,
                    join: RelationJoin::None,
                    foreign_keys: derive_foreign_keys(property, None, &user),
                    nullable: true,
                    cascade: false,
                    on_delete: Some(ReferentialAction::SetNull),
                    on_update: None,
                    target_keys: user.primary_keys.clone(),
                });
            }
        }
        Ok(())
    }

    /// Add a relation together with the columns and registry entries it
    /// implies. Returns `false` when the property already exists.
    pub fn add_relation(&mut self, relation: RelationModel) -> bool {
        if self
            .relations
            .iter()
            .any(|existing| existing.property == relation.property)
        {
            return false;
        }

        if relation.kind.owns_join_column() {
            for key in &relation.foreign_keys {
                self.add_column(ColumnModel {
                    property: key.property.clone(),
                    column: key.column.clone(),
                    column_type: key.column_type.clone(),
                    nullable: relation.nullable,
                    unique: relation.kind == RelationKind::OneToOne,
                    default: None,
                    source: ColumnSource::ForeignKey {
                        relation: relation.property.clone(),
                    },
                });
                push_unique(&mut self.select_fields, &key.property);
            }
        }
        if !relation.is_self_reference(&self.entity) {
            self.imports.insert(relation.target.clone());
        }
        push_unique(&mut self.relational_fields, &relation.property);
        if relation.kind == RelationKind::ManyToMany {
            push_unique(&mut self.sync_relations, &relation.property);
        }
        self.relations.push(relation);
        true
    }

    /// Returns `false` when a column with the same storage name exists.
    pub fn add_column(&mut self, column: ColumnModel) -> bool {
        if self.columns.iter().any(|existing| existing.column == column.column) {
            return false;
        }
        self.columns.push(column);
        true
    }

    fn refresh_select_fields(&mut self) {
        let visible: Vec<String> = self
            .columns
            .iter()
            .filter(|column| !column.is_hidden())
            .map(|column| column.property.clone())
            .collect();
        for property in visible {
            push_unique(&mut self.select_fields, &property);
        }
    }

    pub fn relation(&self, property: &str) -> Option<&RelationModel> {
        self.relations.iter().find(|relation| relation.property == property)
    }

    /// Keep what other modules mirrored onto a previous version of this model.
    pub fn carry_over(&mut self, previous: &ModuleModel) {
        self.migration = previous.migration.clone();
        for relation in previous.relations.iter().filter(|relation| !relation.owner) {
            if self.relation(&relation.property).is_none() {
                self.add_relation(relation.clone());
            }
        }
        self.refresh_select_fields();
    }

    pub fn key_columns(&self) -> Vec<KeyColumn> {
        self.primary_keys
            .iter()
            .map(|key| KeyColumn {
                property: key.property.clone(),
                column: key.column.clone(),
                column_type: key.column_type.clone(),
            })
            .collect()
    }

    pub fn has_composite_key(&self) -> bool {
        self.primary_keys.len() > 1
    }

    pub fn summary(&self) -> EntitySummary {
        EntitySummary {
            class_name: self.entity.class_name.clone(),
            module: self.entity.module.clone(),
            table: self.entity.table.clone(),
            primary_keys: self.key_columns(),
            public_names: self
                .select_fields
                .iter()
                .chain(&self.relational_fields)
                .cloned()
                .collect(),
        }
    }

    pub fn model_path(modules_dir: &Path, module: &str) -> PathBuf {
        modules_dir.join(module).join(MODULE_MODEL_FILE)
    }

    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(path: &Path, contents: &str) -> Result<Self> {
        let model: ModuleModel =
            serde_json::from_str(contents).map_err(|err| GenerateError::InvalidModel {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        if model.contract_version != CONTRACT_VERSION {
            return Err(GenerateError::InvalidModel {
                path: path.to_path_buf(),
                message: format!(
                    "contract version {} is not supported (expected {CONTRACT_VERSION})",
                    model.contract_version
                ),
            });
        }
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(path, &contents)
    }
}

/// Models of every generated module under `modules_dir`, sorted by module.
pub fn load_models(modules_dir: &Path) -> Result<Vec<ModuleModel>> {
    if !modules_dir.exists() {
        return Ok(Vec::new());
    }

    let mut models = Vec::new();
    for entry in std::fs::read_dir(modules_dir)? {
        let entry = entry?;
        let path = entry.path().join(MODULE_MODEL_FILE);
        if entry.file_type()?.is_dir() && path.exists() {
            models.push(ModuleModel::load(&path)?);
        }
    }
    models.sort_by(|a, b| a.entity.module.cmp(&b.entity.module));
    Ok(models)
}

/// Project catalog: declared external entities plus every generated module.
/// Generated modules win over an external entry with the same class name.
pub fn build_catalog(
    external: impl IntoIterator<Item = EntitySummary>,
    models: &[ModuleModel],
) -> EntityCatalog {
    external
        .into_iter()
        .chain(models.iter().map(ModuleModel::summary))
        .collect()
}

/// Default name of the property mirrored onto the target of a relation.
pub fn inverse_name(source: &EntityNames, kind: RelationKind) -> String {
    if kind.inverse().is_collection() {
        pluralize(&source.property)
    } else {
        source.property.clone()
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use modforge_core::{FieldSpec, RelationSpec, Subtype};

    use super::*;

    fn id_key() -> PrimaryKeySpec {
        PrimaryKeySpec {
            property: "id".to_string(),
            column: "id".to_string(),
            column_type: ColumnType::new(RuntimeType::I64, StorageType::BigInt),
            generated: true,
        }
    }

    fn summary(class_name: &str) -> EntitySummary {
        EntitySummary {
            class_name: class_name.to_string(),
            module: class_name.to_lowercase(),
            table: class_name.to_lowercase(),
            primary_keys: vec![KeyColumn {
                property: "id".to_string(),
                column: "id".to_string(),
                column_type: ColumnType::new(RuntimeType::I64, StorageType::BigInt),
            }],
            public_names: BTreeSet::from(["id".to_string()]),
        }
    }

    fn job(fields: Vec<FieldSpec>, creation: CreationConfig) -> GenerationJob {
        GenerationJob {
            entity: EntityNames::new("Invoice").unwrap(),
            primary_keys: vec![id_key()],
            fields,
            creation,
            indices: Vec::new(),
        }
    }

    fn title() -> FieldSpec {
        FieldSpec {
            name: "title".to_string(),
            property: "title".to_string(),
            column: "title".to_string(),
            nullable: false,
            unique: false,
            kind: FieldKind::String {
                subtype: Subtype::Varchar,
                length: 80,
                default: None,
            },
        }
    }

    fn relation(name: &str, kind: RelationKind, target: &str) -> FieldSpec {
        let target_summary = summary(target);
        FieldSpec {
            name: name.to_string(),
            property: name.to_string(),
            column: name.to_string(),
            nullable: true,
            unique: false,
            kind: FieldKind::Relation(RelationSpec {
                kind,
                target: target.to_string(),
                target_module: target.to_lowercase(),
                inverse_side: None,
                bidirectional: true,
                is_array: kind.is_collection(),
                join: RelationJoin::None,
                cascade: false,
                on_delete: None,
                on_update: None,
                nullable: true,
                foreign_keys: if kind.owns_join_column() {
                    derive_foreign_keys(name, None, &target_summary)
                } else {
                    Vec::new()
                },
            }),
        }
    }

    #[test]
    fn lifecycle_columns_follow_creation_config() {
        let catalog: EntityCatalog = [summary("User")].into_iter().collect();
        let creation = CreationConfig {
            operator: true,
            ..CreationConfig::default()
        };
        let model = ModuleModel::from_job(&job(vec![title()], creation), &catalog, "User", "m1")
            .unwrap();

        let columns: Vec<&str> = model.columns.iter().map(|c| c.column.as_str()).collect();
        assert_eq!(
            columns,
            vec![
                "title",
                "created_at",
                "updated_at",
                "deleted_at",
                "created_by_id",
                "updated_by_id",
                "deleted_by_id"
            ]
        );
        assert!(!model.select_fields.contains(&"deletedAt".to_string()));
        assert!(model.relational_fields.contains(&"createdBy".to_string()));
        assert!(model.imports.contains("User"));
    }

    #[test]
    fn one_to_many_keeps_remote_foreign_keys() {
        let catalog: EntityCatalog = [summary("Line")].into_iter().collect();
        let model = ModuleModel::from_job(
            &job(
                vec![relation("lines", RelationKind::OneToMany, "Line")],
                CreationConfig::default(),
            ),
            &catalog,
            "User",
            "m1",
        )
        .unwrap();

        let relation = model.relation("lines").unwrap();
        assert_eq!(relation.inverse_property.as_deref(), Some("invoice"));
        assert_eq!(relation.foreign_keys[0].column, "invoice_id");
        assert!(model.columns.iter().all(|c| c.column != "invoice_id"));
    }

    #[test]
    fn regeneration_keeps_mirrored_relations() {
        let catalog: EntityCatalog = [summary("Customer")].into_iter().collect();
        let mut previous =
            ModuleModel::from_job(&job(vec![title()], CreationConfig::default()), &catalog, "User", "old")
                .unwrap();
        previous.add_relation(RelationModel {
            property: "customers".to_string(),
            kind: RelationKind::OneToMany,
            target: "Customer".to_string(),
            target_module: "customer".to_string(),
            target_table: "customer".to_string(),
            inverse_property: Some("invoice".to_string()),
            owner: false,
            join: RelationJoin::None,
            foreign_keys: Vec::new(),
            nullable: true,
            cascade: false,
            on_delete: None,
            on_update: None,
            target_keys: summary("Customer").primary_keys,
        });

        let mut next =
            ModuleModel::from_job(&job(vec![title()], CreationConfig::default()), &catalog, "User", "new")
                .unwrap();
        next.carry_over(&previous);
        assert_eq!(next.migration, "old");
        assert!(next.relation("customers").is_some());
        assert!(!next.add_relation(previous.relations[0].clone()));
    }

    #[test]
    fn inverse_names_pluralize_collections() {
        let names = EntityNames::new("OrderItem").unwrap();
        assert_eq!(inverse_name(&names, RelationKind::ManyToOne), "orderItems");
        assert_eq!(inverse_name(&names, RelationKind::OneToOne), "orderItem");
    }
}

//! Mirroring relations onto their target modules.

use std::collections::BTreeMap;

use modforge_core::{GenerationJob, JoinTableSpec, RelationJoin, RelationKind};
use tracing::{info, warn};

use crate::changeset::ChangeSet;
use crate::errors::GenerateError;
use crate::model::{GenerationIssue, WiredRelation};
use crate::module::{ModuleModel, RelationModel};
use crate::render::Renderer;

/// Outcome of wiring the relations of one job.
#[derive(Debug, Default)]
pub struct WiringOutcome {
    pub wired: Vec<WiredRelation>,
    pub issues: Vec<GenerationIssue>,
}

/// Owner relations whose inverse must be added to the target by this run.
///
/// A relation naming its `inverse_side` points at a property the target
/// already declares, so it is left alone.
pub fn relations_to_wire(job: &GenerationJob) -> Vec<String> {
    job.relations()
        .filter(|(_, relation)| relation.inverse_side.is_none() && relation.needs_wiring())
        .map(|(field, _)| field.property.clone())
        .collect()
}

/// The property `relation` of `source` as seen from its target.
pub fn mirror(source: &ModuleModel, relation: &RelationModel) -> Option<RelationModel> {
    let property = relation.inverse_property.clone()?;
    let kind = relation.kind.inverse();
    let join = match &relation.join {
        RelationJoin::Table(join) if kind == RelationKind::ManyToMany => {
            RelationJoin::Table(JoinTableSpec {
                name: join.name.clone(),
                join_columns: join.inverse_join_columns.clone(),
                inverse_join_columns: join.join_columns.clone(),
            })
        }
        _ => RelationJoin::None,
    };
    let carries_keys = kind == RelationKind::ManyToOne;

    Some(RelationModel {
        property,
        kind,
        target: source.entity.class_name.clone(),
        target_module: source.entity.module.clone(),
        target_table: source.entity.table.clone(),
        inverse_property: Some(relation.property.clone()),
        owner: false,
        join,
        foreign_keys: if carries_keys {
            relation.foreign_keys.clone()
        } else {
            Vec::new()
        },
        nullable: relation.nullable,
        cascade: carries_keys && relation.cascade,
        on_delete: relation.on_delete.filter(|_| carries_keys),
        on_update: relation.on_update.filter(|_| carries_keys),
        target_keys: source.key_columns(),
    })
}

/// Add the inverse of every relation in `properties` to its target.
///
/// Self references are mirrored onto `model` itself. Other targets are
/// re-rendered from their updated model and staged into `changes`. A
/// relation that cannot be wired is reported and skipped.
pub fn wire_relations(
    renderer: &Renderer<'_>,
    model: &mut ModuleModel,
    properties: &[String],
    existing: &[ModuleModel],
    changes: &mut ChangeSet,
) -> WiringOutcome {
    let mut outcome = WiringOutcome::default();
    let mut targets: BTreeMap<String, ModuleModel> = BTreeMap::new();

    for property in properties {
        let Some(relation) = model.relation(property).cloned() else {
            continue;
        };
        let Some(inverse) = mirror(model, &relation) else {
            continue;
        };
        let inverse_property = inverse.property.clone();

        if relation.is_self_reference(&model.entity) {
            if model.add_relation(inverse) {
                info!(
                    module = %model.entity.module,
                    field = %relation.property,
                    inverse = %inverse_property,
                    "self relation wired"
                );
                outcome.wired.push(WiredRelation {
                    field: relation.property.clone(),
                    target_module: model.entity.module.clone(),
                    inverse_property,
                });
            }
            continue;
        }

        let target = match targets.get(&relation.target_module) {
            Some(target) => target.clone(),
            None => match existing
                .iter()
                .find(|candidate| candidate.entity.class_name == relation.target)
            {
                Some(target) => target.clone(),
                None => {
                    warn!(
                        module = %model.entity.module,
                        field = %relation.property,
                        target = %relation.target,
                        "relation target is not a generated module; inverse not written"
                    );
                    outcome.issues.push(
                        GenerationIssue::warning(
                            "wiring_skipped",
                            format!(
                                "{} is not a generated module; add '{inverse_property}' by hand",
                                relation.target
                            ),
                        )
                        .in_module(&relation.target_module),
                    );
                    continue;
                }
            },
        };

        let mut updated = target;
        if !updated.add_relation(inverse) {
            continue;
        }

        let rendered = renderer.module_sources(&updated);
        if let Some(issue) = rendered.issues.first() {
            let err = GenerateError::Wiring {
                relation: format!("{}.{}", model.entity.class_name, relation.property),
                message: issue.message.clone(),
            };
            warn!(
                module = %model.entity.module,
                target = %updated.entity.module,
                error = %err,
                "relation wiring failed"
            );
            outcome.issues.push(
                GenerationIssue::warning("wiring_failed", err.to_string())
                    .in_module(&updated.entity.module),
            );
            continue;
        }

        for artifact in rendered.artifacts {
            changes.stage(artifact.path, artifact.contents);
        }
        info!(
            module = %model.entity.module,
            field = %relation.property,
            target = %updated.entity.module,
            inverse = %inverse_property,
            "relation wired"
        );
        outcome.wired.push(WiredRelation {
            field: relation.property.clone(),
            target_module: updated.entity.module.clone(),
            inverse_property,
        });
        targets.insert(updated.entity.module.clone(), updated);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use modforge_core::{
        ColumnType, CreationConfig, EntityNames, ForeignKeyColumn, PrimaryKeySpec, RuntimeType,
        StorageType,
    };

    use super::*;

    fn model(name: &str) -> ModuleModel {
        ModuleModel {
            contract_version: modforge_core::CONTRACT_VERSION.to_string(),
            entity: EntityNames::new(name).unwrap(),
            primary_keys: vec![PrimaryKeySpec {
                property: "id".to_string(),
                column: "id".to_string(),
                column_type: ColumnType::new(RuntimeType::I64, StorageType::BigInt),
                generated: true,
            }],
            columns: Vec::new(),
            relations: Vec::new(),
            indices: Vec::new(),
            creation: CreationConfig::default(),
            imports: BTreeSet::new(),
            select_fields: vec!["id".to_string()],
            relational_fields: Vec::new(),
            sync_relations: Vec::new(),
            migration: "m1".to_string(),
        }
    }

    fn key(column: &str) -> ForeignKeyColumn {
        ForeignKeyColumn {
            column: column.to_string(),
            property: column.to_string(),
            referenced_column: "id".to_string(),
            column_type: ColumnType::new(RuntimeType::I64, StorageType::BigInt),
        }
    }

    fn relation(kind: RelationKind, join: RelationJoin) -> RelationModel {
        RelationModel {
            property: "tags".to_string(),
            kind,
            target: "Tag".to_string(),
            target_module: "tag".to_string(),
            target_table: "tag".to_string(),
            inverse_property: Some("posts".to_string()),
            owner: true,
            join,
            foreign_keys: Vec::new(),
            nullable: true,
            cascade: false,
            on_delete: None,
            on_update: None,
            target_keys: Vec::new(),
        }
    }

    #[test]
    fn many_to_many_mirror_swaps_join_columns() {
        let source = model("Post");
        let owner = relation(
            RelationKind::ManyToMany,
            RelationJoin::Table(JoinTableSpec {
                name: "post_tags_map".to_string(),
                join_columns: vec![key("post_id")],
                inverse_join_columns: vec![key("tag_id")],
            }),
        );

        let inverse = mirror(&source, &owner).unwrap();
        assert_eq!(inverse.property, "posts");
        assert!(!inverse.owner);
        let RelationJoin::Table(join) = inverse.join else {
            panic!("expected a join table");
        };
        assert_eq!(join.join_columns[0].column, "tag_id");
        assert_eq!(join.inverse_join_columns[0].column, "post_id");
        assert_eq!(inverse.target_keys[0].column, "id");
    }

    #[test]
    fn one_to_many_mirror_carries_foreign_keys() {
        let source = model("Invoice");
        let mut owner = relation(RelationKind::OneToMany, RelationJoin::None);
        owner.inverse_property = Some("invoice".to_string());
        owner.foreign_keys = vec![key("invoice_id")];

        let inverse = mirror(&source, &owner).unwrap();
        assert_eq!(inverse.kind, RelationKind::ManyToOne);
        assert_eq!(inverse.foreign_keys[0].column, "invoice_id");

        let mut target = model("Tag");
        assert!(target.add_relation(inverse.clone()));
        assert!(target.columns.iter().any(|c| c.column == "invoice_id"));
        assert!(target.imports.contains("Invoice"));
        assert!(!target.add_relation(inverse));
    }
}

use std::fmt::Write;

use chrono::{DateTime, Utc};
use modforge_core::{
    DefaultValue, ForeignKeyColumn, ReferentialAction, RelationJoin, RelationKind, RuntimeType,
    StorageType, quote_sql,
};

use super::permissions::{PERMISSION_ACTIONS, permission_slug};
use super::{ArtifactKind, render_error};
use crate::errors::Result;
use crate::module::{ColumnModel, ColumnSource, ModuleModel, RelationModel};

/// `<YYYYMMDDHHMMSS>_create_<module>_table`
pub fn migration_name(module: &str, at: DateTime<Utc>) -> String {
    format!("{}_create_{module}_table", at.format("%Y%m%d%H%M%S"))
}

pub(super) fn render_migration(model: &ModuleModel) -> Result<String> {
    if model.primary_keys.is_empty() {
        return Err(render_error(ArtifactKind::Migration, "entity has no primary key"));
    }
    let table = &model.entity.table;
    let mut out = String::new();
    writeln!(out, "-- {}", model.migration)?;
    writeln!(out)?;

    let mut lines: Vec<String> = Vec::new();
    let auto_increment = model.primary_keys.len() == 1
        && model.primary_keys[0].generated
        && model.primary_keys[0].column_type.runtime != RuntimeType::Uuid;
    for key in &model.primary_keys {
        let mut line = format!("`{}` {} NOT NULL", key.column, key.column_type.storage);
        if auto_increment {
            line.push_str(" AUTO_INCREMENT");
        }
        lines.push(line);
    }
    for column in &model.columns {
        lines.push(column_definition(column));
    }
    lines.push(format!(
        "PRIMARY KEY ({})",
        quoted_list(model.primary_keys.iter().map(|key| key.column.as_str()))
    ));
    for column in model.columns.iter().filter(|column| column.unique) {
        lines.push(format!(
            "UNIQUE KEY `uq_{table}_{0}` (`{0}`)",
            column.column
        ));
    }
    for index in &model.indices {
        let kind = if index.unique { "UNIQUE KEY" } else { "KEY" };
        lines.push(format!(
            "{kind} `{}` ({})",
            index.name,
            quoted_list(index.columns.iter().map(String::as_str))
        ));
    }
    for relation in model
        .relations
        .iter()
        .filter(|relation| relation.kind.owns_join_column() && !relation.foreign_keys.is_empty())
    {
        lines.push(foreign_key_constraint(
            &format!("fk_{table}_{}", relation.foreign_keys[0].column),
            &relation.foreign_keys,
            &relation.target_table,
            referential_actions(relation),
        ));
    }

    writeln!(out, "CREATE TABLE IF NOT EXISTS `{table}` (")?;
    writeln!(out, "  {}", lines.join(",\n  "))?;
    writeln!(out, ") ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;")?;

    for relation in model.relations.iter().filter(|relation| relation.owner) {
        match (relation.kind, &relation.join) {
            (RelationKind::ManyToMany, RelationJoin::Table(join)) => {
                writeln!(out)?;
                render_join_table(&mut out, model, relation, &join.name, &join.join_columns, &join.inverse_join_columns)?;
            }
            // Self references already carry the columns through their mirrored side.
            (RelationKind::OneToMany, _)
                if !relation.foreign_keys.is_empty() && !relation.is_self_reference(&model.entity) =>
            {
                writeln!(out)?;
                render_remote_foreign_key(&mut out, model, relation)?;
            }
            _ => {}
        }
    }
    Ok(out)
}

fn column_definition(column: &ColumnModel) -> String {
    let mut line = format!("`{}` {}", column.column, column.column_type.storage);
    line.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
    if let Some(default) = &column.default {
        line.push_str(" DEFAULT ");
        line.push_str(&default_sql(&column.column_type.storage, default));
    }
    if matches!(column.source, ColumnSource::UpdatedAt) {
        line.push_str(" ON UPDATE CURRENT_TIMESTAMP");
    }
    line
}

/// SQL default clause body; text-like columns take parenthesized expressions.
fn default_sql(storage: &StorageType, default: &DefaultValue) -> String {
    let expression = match (storage, default) {
        (StorageType::Date, DefaultValue::Expression(_)) => return "(CURRENT_DATE)".to_string(),
        (StorageType::Time, DefaultValue::Expression(_)) => return "(CURRENT_TIME)".to_string(),
        (_, default) => default.to_sql(),
    };
    match storage {
        StorageType::TinyText | StorageType::Text | StorageType::MediumText | StorageType::Json => {
            format!("({expression})")
        }
        _ => expression,
    }
}

fn referential_actions(relation: &RelationModel) -> (Option<ReferentialAction>, Option<ReferentialAction>) {
    let on_delete = relation
        .on_delete
        .or(relation.cascade.then_some(ReferentialAction::Cascade));
    (on_delete, relation.on_update)
}

fn foreign_key_constraint(
    name: &str,
    keys: &[ForeignKeyColumn],
    target_table: &str,
    (on_delete, on_update): (Option<ReferentialAction>, Option<ReferentialAction>),
) -> String {
    let mut line = format!(
        "CONSTRAINT `{name}` FOREIGN KEY ({}) REFERENCES `{target_table}` ({})",
        quoted_list(keys.iter().map(|key| key.column.as_str())),
        quoted_list(keys.iter().map(|key| key.referenced_column.as_str()))
    );
    if let Some(action) = on_delete {
        line.push_str(&format!(" ON DELETE {action}"));
    }
    if let Some(action) = on_update {
        line.push_str(&format!(" ON UPDATE {action}"));
    }
    line
}

fn render_join_table(
    out: &mut String,
    model: &ModuleModel,
    relation: &RelationModel,
    name: &str,
    join_columns: &[ForeignKeyColumn],
    inverse_columns: &[ForeignKeyColumn],
) -> Result<()> {
    let mut lines: Vec<String> = join_columns
        .iter()
        .chain(inverse_columns)
        .map(|key| format!("`{}` {} NOT NULL", key.column, key.column_type.storage))
        .collect();
    lines.push(format!(
        "PRIMARY KEY ({})",
        quoted_list(join_columns.iter().chain(inverse_columns).map(|key| key.column.as_str()))
    ));
    lines.push(foreign_key_constraint(
        &format!("fk_{name}_{}", model.entity.table),
        join_columns,
        &model.entity.table,
        (Some(ReferentialAction::Cascade), None),
    ));
    lines.push(foreign_key_constraint(
        &format!("fk_{name}_{}", relation.target_table),
        inverse_columns,
        &relation.target_table,
        (Some(ReferentialAction::Cascade), None),
    ));

    writeln!(out, "CREATE TABLE IF NOT EXISTS `{name}` (")?;
    writeln!(out, "  {}", lines.join(",\n  "))?;
    writeln!(out, ") ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;")?;
    Ok(())
}

/// Foreign key columns a one-to-many relation places on its target table.
fn render_remote_foreign_key(out: &mut String, model: &ModuleModel, relation: &RelationModel) -> Result<()> {
    let target_table = &relation.target_table;
    let nullability = if relation.nullable { "NULL" } else { "NOT NULL" };
    let mut clauses: Vec<String> = relation
        .foreign_keys
        .iter()
        .map(|key| {
            format!(
                "ADD COLUMN `{}` {} {nullability}",
                key.column, key.column_type.storage
            )
        })
        .collect();
    clauses.push(format!(
        "ADD {}",
        foreign_key_constraint(
            &format!("fk_{target_table}_{}", relation.foreign_keys[0].column),
            &relation.foreign_keys,
            &model.entity.table,
            referential_actions(relation),
        )
    ));

    writeln!(out, "ALTER TABLE `{target_table}`")?;
    writeln!(out, "  {};", clauses.join(",\n  "))?;
    Ok(())
}

pub(super) fn render_seed(model: &ModuleModel, super_admin_role: &str) -> Result<String> {
    let class = &model.entity.class_name;
    let mut out = String::new();
    writeln!(out, "-- Permissions of {class}")?;
    writeln!(out)?;
    writeln!(
        out,
        "INSERT IGNORE INTO `permission` (`module`, `action`, `slug`) VALUES"
    )?;
    let rows: Vec<String> = PERMISSION_ACTIONS
        .iter()
        .map(|(action, _)| {
            format!(
                "  ({}, {}, {})",
                quote_sql(class),
                quote_sql(action),
                quote_sql(&permission_slug(class, action))
            )
        })
        .collect();
    writeln!(out, "{};", rows.join(",\n"))?;
    writeln!(out)?;
    writeln!(
        out,
        "INSERT IGNORE INTO `role_permission_map` (`permission_id`, `role_id`)"
    )?;
    writeln!(out, "SELECT p.`id`, r.`id`")?;
    writeln!(out, "FROM `permission` p")?;
    writeln!(out, "CROSS JOIN `role` r")?;
    writeln!(
        out,
        "WHERE p.`module` = {} AND r.`name` = {};",
        quote_sql(class),
        quote_sql(super_admin_role)
    )?;
    Ok(out)
}

fn quoted_list<'s>(names: impl IntoIterator<Item = &'s str>) -> String {
    names
        .into_iter()
        .map(|name| format!("`{name}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn migration_names_are_timestamped() {
        let at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(migration_name("invoice", at), "20260304050607_create_invoice_table");
    }

    #[test]
    fn text_defaults_are_expressions() {
        assert_eq!(
            default_sql(&StorageType::Text, &DefaultValue::Text("hi".to_string())),
            "('hi')"
        );
        assert_eq!(
            default_sql(&StorageType::Varchar { length: 20 }, &DefaultValue::Text(r"C:\".to_string())),
            r"'C:\\'"
        );
        assert_eq!(
            default_sql(&StorageType::Date, &DefaultValue::Expression("NOW()".to_string())),
            "(CURRENT_DATE)"
        );
        assert_eq!(
            default_sql(
                &StorageType::Timestamp,
                &DefaultValue::Expression("NOW()".to_string())
            ),
            "CURRENT_TIMESTAMP"
        );
    }
}

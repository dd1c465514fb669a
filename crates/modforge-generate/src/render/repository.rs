use std::fmt::Write;

use modforge_core::naming::pascal;
use modforge_core::{RelationJoin, RuntimeType};

use super::{
    ArtifactKind, GENERATED_HEADER, bind_key, column_rust_type, field_ident, key_predicate,
    key_type, render_error,
};
use crate::errors::Result;
use crate::module::{ColumnModel, ModuleModel, OPERATOR_RELATIONS, RelationModel};

pub(super) fn render(model: &ModuleModel) -> Result<String> {
    let class = &model.entity.class_name;
    let key_columns = model.key_columns();
    key_type(&key_columns, ArtifactKind::Repository)?;
    let arity = key_columns.len();
    let key_where = key_predicate(key_columns.iter().map(|key| key.column.as_str()), None);
    let soft_delete = model.creation.with_soft_delete;
    let live = if soft_delete { " AND deleted_at IS NULL" } else { "" };
    let order_by: Vec<&str> = key_columns.iter().map(|key| key.column.as_str()).collect();
    let actor = actor_type(model);
    let actor_param = actor
        .as_ref()
        .map(|ty| format!(", actor: {ty}"))
        .unwrap_or_default();

    let mut out = String::from(GENERATED_HEADER);
    writeln!(out, "//! {class} access layer.")?;
    writeln!(out)?;
    if !model.sync_relations.is_empty() {
        writeln!(out, "use async_trait::async_trait;")?;
        writeln!(out, "use modforge_core::RelationStore;")?;
    }
    writeln!(out, "use sqlx::MySqlPool;")?;
    writeln!(out)?;
    writeln!(out, "use crate::pagination::ListQuery;")?;
    writeln!(out)?;
    writeln!(out, "use super::dto::{{Create{class}Dto, Update{class}Dto}};")?;
    writeln!(
        out,
        "use super::entity::{{{class}, {class}Key, SELECT_COLUMNS, TABLE}};"
    )?;

    writeln!(out)?;
    writeln!(out, "#[derive(Debug, Clone)]")?;
    writeln!(out, "pub struct {class}Repository {{")?;
    writeln!(out, "    pool: MySqlPool,")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "impl {class}Repository {{")?;
    writeln!(out, "    pub fn new(pool: MySqlPool) -> Self {{")?;
    writeln!(out, "        Self {{ pool }}")?;
    writeln!(out, "    }}")?;

    // find_all
    writeln!(out)?;
    writeln!(
        out,
        "    pub async fn find_all(&self, query: &ListQuery) -> Result<Vec<{class}>, sqlx::Error> {{"
    )?;
    writeln!(out, "        let sql = format!(")?;
    writeln!(
        out,
        "            \"SELECT {{}} FROM {{TABLE}}{} ORDER BY {} LIMIT ? OFFSET ?\",",
        if soft_delete { " WHERE deleted_at IS NULL" } else { "" },
        order_by.join(", ")
    )?;
    writeln!(out, "            SELECT_COLUMNS.join(\", \")")?;
    writeln!(out, "        );")?;
    writeln!(out, "        sqlx::query_as::<_, {class}>(&sql)")?;
    writeln!(out, "            .bind(query.limit())")?;
    writeln!(out, "            .bind(query.offset())")?;
    writeln!(out, "            .fetch_all(&self.pool)")?;
    writeln!(out, "            .await")?;
    writeln!(out, "    }}")?;

    // find_one
    writeln!(out)?;
    writeln!(
        out,
        "    pub async fn find_one(&self, key: {class}Key) -> Result<Option<{class}>, sqlx::Error> {{"
    )?;
    writeln!(out, "        let sql = format!(")?;
    writeln!(
        out,
        "            \"SELECT {{}} FROM {{TABLE}} WHERE {key_where}{live}\","
    )?;
    writeln!(out, "            SELECT_COLUMNS.join(\", \")")?;
    writeln!(out, "        );")?;
    writeln!(out, "        sqlx::query_as::<_, {class}>(&sql)")?;
    writeln!(out, "            {}", bind_key(arity, "key"))?;
    writeln!(out, "            .fetch_optional(&self.pool)")?;
    writeln!(out, "            .await")?;
    writeln!(out, "    }}")?;

    render_create(&mut out, model, &actor_param)?;
    render_update(&mut out, model, &key_where, live, &actor_param)?;
    if soft_delete {
        render_soft_delete(&mut out, model, &key_where, &actor_param)?;
    }

    writeln!(out)?;
    writeln!(
        out,
        "    pub async fn hard_delete(&self, key: {class}Key) -> Result<bool, sqlx::Error> {{"
    )?;
    writeln!(out, "        let result = sqlx::query(")?;
    writeln!(
        out,
        "            \"DELETE FROM {} WHERE {key_where}{}\",",
        model.entity.table,
        if soft_delete { " AND deleted_at IS NOT NULL" } else { "" }
    )?;
    writeln!(out, "        )")?;
    writeln!(out, "        {}", bind_key(arity, "key"))?;
    writeln!(out, "        .execute(&self.pool)")?;
    writeln!(out, "        .await?;")?;
    writeln!(out, "        Ok(result.rows_affected() > 0)")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;

    for property in &model.sync_relations {
        let relation = model.relation(property).ok_or_else(|| {
            render_error(
                ArtifactKind::Repository,
                format!("sync relation '{property}' is not a relation of {class}"),
            )
        })?;
        render_sync_store(&mut out, model, relation)?;
    }
    Ok(out)
}

/// Key type of the user entity when operator columns are enabled.
fn actor_type(model: &ModuleModel) -> Option<String> {
    if !model.creation.operator {
        return None;
    }
    model
        .relations
        .iter()
        .find(|relation| relation.property == OPERATOR_RELATIONS[0])
        .map(|relation| {
            format!(
                "crate::modules::{}::entity::{}Key",
                relation.target_module, relation.target
            )
        })
}

/// Foreign key columns of one operator relation, bound to the actor.
fn operator_columns<'m>(model: &'m ModuleModel, relation: &str) -> Vec<&'m str> {
    model
        .relation(relation)
        .map(|relation| {
            relation
                .foreign_keys
                .iter()
                .map(|key| key.column.as_str())
                .collect()
        })
        .unwrap_or_default()
}

fn input_columns(model: &ModuleModel) -> impl Iterator<Item = &ColumnModel> {
    model.columns.iter().filter(|column| !column.is_managed())
}

/// Bind expression for an input value, wrapping JSON-backed columns.
fn bind_value(column: &ColumnModel, expr: &str, optional: bool) -> String {
    match column.column_type.runtime {
        RuntimeType::Json | RuntimeType::StringList if optional => {
            format!(".bind({expr}.map(sqlx::types::Json))")
        }
        RuntimeType::Json | RuntimeType::StringList => format!(".bind(sqlx::types::Json({expr}))"),
        _ => format!(".bind({expr})"),
    }
}

/// Whether the create payload carries the column as an `Option`.
pub(super) fn optional_on_create(column: &ColumnModel) -> bool {
    column.nullable || column.default.is_some()
}

fn render_create(out: &mut String, model: &ModuleModel, actor_param: &str) -> Result<()> {
    let class = &model.entity.class_name;
    let auto_increment = model.primary_keys.len() == 1
        && model.primary_keys[0].generated
        && model.primary_keys[0].column_type.runtime != RuntimeType::Uuid;

    let mut columns: Vec<&str> = Vec::new();
    let mut values: Vec<String> = Vec::new();
    let mut binds: Vec<String> = Vec::new();

    writeln!(out)?;
    writeln!(
        out,
        "    pub async fn create(&self, input: Create{class}Dto{actor_param}) -> Result<{class}, sqlx::Error> {{"
    )?;
    if !auto_increment {
        let parts: Vec<String> = model
            .primary_keys
            .iter()
            .map(|key| {
                if key.generated {
                    "uuid::Uuid::new_v4()".to_string()
                } else {
                    format!("input.{}", field_ident(&key.property))
                }
            })
            .collect();
        if parts.len() == 1 {
            writeln!(out, "        let key = {};", parts[0])?;
        } else {
            writeln!(out, "        let key = ({});", parts.join(", "))?;
        }
        for key in &model.primary_keys {
            columns.push(&key.column);
            values.push("?".to_string());
        }
        binds.push(bind_key(model.primary_keys.len(), "key"));
    }

    for column in input_columns(model) {
        columns.push(&column.column);
        if column.default.is_some() && !column.nullable {
            values.push(format!("COALESCE(?, DEFAULT({}))", column.column));
        } else {
            values.push("?".to_string());
        }
        binds.push(bind_value(
            column,
            &format!("input.{}", field_ident(&column.property)),
            optional_on_create(column),
        ));
    }
    if model.creation.operator {
        for relation in [OPERATOR_RELATIONS[0], OPERATOR_RELATIONS[1]] {
            let fk = operator_columns(model, relation);
            let arity = fk.len();
            for column in fk {
                columns.push(column);
                values.push("?".to_string());
            }
            binds.push(bind_key(arity, "actor"));
        }
    }

    let statement = if columns.is_empty() {
        format!("INSERT INTO {} () VALUES ()", model.entity.table)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            model.entity.table,
            columns.join(", "),
            values.join(", ")
        )
    };
    if auto_increment {
        writeln!(out, "        let result = sqlx::query(")?;
    } else {
        writeln!(out, "        sqlx::query(")?;
    }
    writeln!(out, "            {statement:?},")?;
    writeln!(out, "        )")?;
    for bind in binds {
        writeln!(out, "        {bind}")?;
    }
    writeln!(out, "        .execute(&self.pool)")?;
    writeln!(out, "        .await?;")?;
    if auto_increment {
        let ty = column_rust_type(&model.primary_keys[0].column_type, "");
        writeln!(
            out,
            "        let key = {ty}::try_from(result.last_insert_id())"
        )?;
        writeln!(
            out,
            "            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;"
        )?;
    }
    writeln!(
        out,
        "        self.find_one(key).await?.ok_or(sqlx::Error::RowNotFound)"
    )?;
    writeln!(out, "    }}")?;
    Ok(())
}

fn render_update(
    out: &mut String,
    model: &ModuleModel,
    key_where: &str,
    live: &str,
    actor_param: &str,
) -> Result<()> {
    let class = &model.entity.class_name;
    let arity = model.primary_keys.len();
    let mut assignments = Vec::new();
    let mut binds = Vec::new();
    for column in input_columns(model) {
        assignments.push(format!("{0} = COALESCE(?, {0})", column.column));
        binds.push(bind_value(
            column,
            &format!("input.{}", field_ident(&column.property)),
            true,
        ));
    }
    if model.creation.operator {
        let fk = operator_columns(model, OPERATOR_RELATIONS[1]);
        let fk_arity = fk.len();
        for column in fk {
            assignments.push(format!("{column} = ?"));
        }
        binds.push(bind_key(fk_arity, "actor"));
    }

    writeln!(out)?;
    writeln!(
        out,
        "    pub async fn update(&self, key: {class}Key, input: Update{class}Dto{actor_param}) -> Result<Option<{class}>, sqlx::Error> {{"
    )?;
    if assignments.is_empty() {
        writeln!(out, "        let _ = input;")?;
    } else {
        writeln!(out, "        sqlx::query(")?;
        writeln!(
            out,
            "            {:?},",
            format!(
                "UPDATE {} SET {} WHERE {key_where}{live}",
                model.entity.table,
                assignments.join(", ")
            )
        )?;
        writeln!(out, "        )")?;
        for bind in binds {
            writeln!(out, "        {bind}")?;
        }
        writeln!(out, "        {}", bind_key(arity, "key"))?;
        writeln!(out, "        .execute(&self.pool)")?;
        writeln!(out, "        .await?;")?;
    }
    writeln!(out, "        self.find_one(key).await")?;
    writeln!(out, "    }}")?;
    Ok(())
}

fn render_soft_delete(
    out: &mut String,
    model: &ModuleModel,
    key_where: &str,
    actor_param: &str,
) -> Result<()> {
    let class = &model.entity.class_name;
    let table = &model.entity.table;
    let arity = model.primary_keys.len();
    let deleted_by = if model.creation.operator {
        operator_columns(model, OPERATOR_RELATIONS[2])
    } else {
        Vec::new()
    };

    let mut set = vec!["deleted_at = CURRENT_TIMESTAMP".to_string()];
    set.extend(deleted_by.iter().map(|column| format!("{column} = ?")));
    writeln!(out)?;
    writeln!(
        out,
        "    pub async fn soft_delete(&self, key: {class}Key{actor_param}) -> Result<bool, sqlx::Error> {{"
    )?;
    writeln!(out, "        let result = sqlx::query(")?;
    writeln!(
        out,
        "            {:?},",
        format!(
            "UPDATE {table} SET {} WHERE {key_where} AND deleted_at IS NULL",
            set.join(", ")
        )
    )?;
    writeln!(out, "        )")?;
    if !deleted_by.is_empty() {
        writeln!(out, "        {}", bind_key(deleted_by.len(), "actor"))?;
    }
    writeln!(out, "        {}", bind_key(arity, "key"))?;
    writeln!(out, "        .execute(&self.pool)")?;
    writeln!(out, "        .await?;")?;
    writeln!(out, "        Ok(result.rows_affected() > 0)")?;
    writeln!(out, "    }}")?;

    let mut reset = vec!["deleted_at = NULL".to_string()];
    reset.extend(deleted_by.iter().map(|column| format!("{column} = NULL")));
    writeln!(out)?;
    writeln!(
        out,
        "    pub async fn rollback(&self, key: {class}Key) -> Result<bool, sqlx::Error> {{"
    )?;
    writeln!(out, "        let result = sqlx::query(")?;
    writeln!(
        out,
        "            {:?},",
        format!(
            "UPDATE {table} SET {} WHERE {key_where} AND deleted_at IS NOT NULL",
            reset.join(", ")
        )
    )?;
    writeln!(out, "        )")?;
    writeln!(out, "        {}", bind_key(arity, "key"))?;
    writeln!(out, "        .execute(&self.pool)")?;
    writeln!(out, "        .await?;")?;
    writeln!(out, "        Ok(result.rows_affected() > 0)")?;
    writeln!(out, "    }}")?;
    Ok(())
}

/// Name of the generated store behind a many-to-many relation.
pub(super) fn store_name(model: &ModuleModel, relation: &RelationModel) -> String {
    format!("{}{}Store", model.entity.class_name, pascal(&relation.property))
}

/// Module path of the target's entity definitions.
pub(super) fn target_entity_path(model: &ModuleModel, relation: &RelationModel) -> String {
    if relation.is_self_reference(&model.entity) {
        "super::entity".to_string()
    } else {
        format!("crate::modules::{}::entity", relation.target_module)
    }
}

/// `.bind(..)` calls for a borrowed key.
fn bind_ref(arity: usize, name: &str) -> String {
    if arity == 1 {
        bind_key(1, &format!("*{name}"))
    } else {
        bind_key(arity, name)
    }
}

fn render_sync_store(out: &mut String, model: &ModuleModel, relation: &RelationModel) -> Result<()> {
    let RelationJoin::Table(join) = &relation.join else {
        return Err(render_error(
            ArtifactKind::Repository,
            format!("many-to-many relation '{}' has no join table", relation.property),
        ));
    };
    key_type(&relation.target_keys, ArtifactKind::Repository)?;

    let class = &model.entity.class_name;
    let target = &relation.target;
    let store = store_name(model, relation);
    let path = target_entity_path(model, relation);
    let owner_arity = join.join_columns.len();
    let target_arity = join.inverse_join_columns.len();
    let target_table = &relation.target_table;

    let on: Vec<String> = join
        .inverse_join_columns
        .iter()
        .map(|key| format!("j.{} = t.{}", key.column, key.referenced_column))
        .collect();
    let owner_where = key_predicate(join.join_columns.iter().map(|key| key.column.as_str()), Some("j"));
    let target_key_columns: Vec<&str> = relation
        .target_keys
        .iter()
        .map(|key| key.column.as_str())
        .collect();
    let link_columns: Vec<&str> = join
        .join_columns
        .iter()
        .chain(&join.inverse_join_columns)
        .map(|key| key.column.as_str())
        .collect();

    writeln!(out)?;
    writeln!(
        out,
        "/// Connect/disconnect storage for `{class}::{}`.",
        field_ident(&relation.property)
    )?;
    writeln!(out, "#[derive(Debug, Clone, Copy)]")?;
    writeln!(out, "pub struct {store}<'a> {{")?;
    writeln!(out, "    pool: &'a MySqlPool,")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "impl<'a> {store}<'a> {{")?;
    writeln!(out, "    pub fn new(pool: &'a MySqlPool) -> Self {{")?;
    writeln!(out, "        Self {{ pool }}")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "#[async_trait]")?;
    writeln!(out, "impl RelationStore for {store}<'_> {{")?;
    writeln!(out, "    type Owner = {class}Key;")?;
    writeln!(out, "    type Key = {path}::{target}Key;")?;
    writeln!(out, "    type Record = {path}::{target};")?;
    writeln!(out, "    type Error = sqlx::Error;")?;
    writeln!(out)?;
    writeln!(
        out,
        "    fn key_of(&self, record: &Self::Record) -> Self::Key {{"
    )?;
    writeln!(out, "        record.key()")?;
    writeln!(out, "    }}")?;

    writeln!(out)?;
    writeln!(
        out,
        "    async fn load_related(&self, owner: &Self::Owner) -> Result<Vec<Self::Record>, sqlx::Error> {{"
    )?;
    writeln!(out, "        let columns: Vec<String> = {path}::SELECT_COLUMNS")?;
    writeln!(out, "            .iter()")?;
    writeln!(out, "            .map(|column| format!(\"t.{{column}}\"))")?;
    writeln!(out, "            .collect();")?;
    writeln!(out, "        let sql = format!(")?;
    writeln!(
        out,
        "            \"SELECT {{}} FROM {target_table} t INNER JOIN {} j ON {} WHERE {owner_where}\",",
        join.name,
        on.join(" AND ")
    )?;
    writeln!(out, "            columns.join(\", \")")?;
    writeln!(out, "        );")?;
    writeln!(out, "        sqlx::query_as::<_, Self::Record>(&sql)")?;
    writeln!(out, "            {}", bind_ref(owner_arity, "owner"))?;
    writeln!(out, "            .fetch_all(self.pool)")?;
    writeln!(out, "            .await")?;
    writeln!(out, "    }}")?;

    let (predicate, placeholder) = if target_key_columns.len() == 1 {
        (target_key_columns[0].to_string(), "?".to_string())
    } else {
        (
            format!("({})", target_key_columns.join(", ")),
            format!("({})", vec!["?"; target_key_columns.len()].join(", ")),
        )
    };
    writeln!(out)?;
    writeln!(
        out,
        "    async fn resolve(&self, keys: &[Self::Key]) -> Result<Vec<Self::Record>, sqlx::Error> {{"
    )?;
    writeln!(out, "        if keys.is_empty() {{")?;
    writeln!(out, "            return Ok(Vec::new());")?;
    writeln!(out, "        }}")?;
    writeln!(
        out,
        "        let placeholders = vec![{placeholder:?}; keys.len()].join(\", \");"
    )?;
    writeln!(out, "        let sql = format!(")?;
    writeln!(
        out,
        "            \"SELECT {{}} FROM {target_table} WHERE {predicate} IN ({{placeholders}})\","
    )?;
    writeln!(out, "            {path}::SELECT_COLUMNS.join(\", \")")?;
    writeln!(out, "        );")?;
    writeln!(
        out,
        "        let mut query = sqlx::query_as::<_, Self::Record>(&sql);"
    )?;
    writeln!(out, "        for key in keys {{")?;
    writeln!(
        out,
        "            query = query{};",
        bind_ref(target_arity, "key")
    )?;
    writeln!(out, "        }}")?;
    writeln!(out, "        query.fetch_all(self.pool).await")?;
    writeln!(out, "    }}")?;

    writeln!(out)?;
    writeln!(out, "    async fn persist_related(")?;
    writeln!(out, "        &self,")?;
    writeln!(out, "        owner: &Self::Owner,")?;
    writeln!(out, "        related: Vec<Self::Record>,")?;
    writeln!(out, "    ) -> Result<(), sqlx::Error> {{")?;
    writeln!(out, "        let mut tx = self.pool.begin().await?;")?;
    writeln!(
        out,
        "        sqlx::query({:?})",
        format!(
            "DELETE FROM {} WHERE {}",
            join.name,
            key_predicate(join.join_columns.iter().map(|key| key.column.as_str()), None)
        )
    )?;
    writeln!(out, "            {}", bind_ref(owner_arity, "owner"))?;
    writeln!(out, "            .execute(&mut *tx)")?;
    writeln!(out, "            .await?;")?;
    writeln!(out, "        for record in &related {{")?;
    writeln!(out, "            let key = record.key();")?;
    writeln!(
        out,
        "            sqlx::query({:?})",
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            join.name,
            link_columns.join(", "),
            vec!["?"; link_columns.len()].join(", ")
        )
    )?;
    writeln!(out, "                {}", bind_ref(owner_arity, "owner"))?;
    writeln!(out, "                {}", bind_key(target_arity, "key"))?;
    writeln!(out, "                .execute(&mut *tx)")?;
    writeln!(out, "                .await?;")?;
    writeln!(out, "        }}")?;
    writeln!(out, "        tx.commit().await")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    Ok(())
}

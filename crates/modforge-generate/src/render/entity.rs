use std::collections::BTreeMap;
use std::fmt::Write;

use modforge_core::{FieldKind, RuntimeType};

use super::{
    ArtifactKind, GENERATED_HEADER, column_rust_type, enum_name, field_ident, key_type,
    quote_str_list, variant_ident,
};
use crate::errors::Result;
use crate::module::{ColumnModel, ModuleModel};

pub(super) fn render(model: &ModuleModel) -> Result<String> {
    let class = &model.entity.class_name;
    let key = key_type(&model.key_columns(), ArtifactKind::Entity)?;
    let mut out = String::from(GENERATED_HEADER);
    writeln!(out, "//! {class} record definition.")?;
    writeln!(out)?;
    writeln!(out, "use serde::{{Deserialize, Serialize}};")?;

    let modules: BTreeMap<&str, &str> = model
        .relations
        .iter()
        .map(|relation| (relation.target.as_str(), relation.target_module.as_str()))
        .collect();
    if !model.imports.is_empty() {
        writeln!(out)?;
    }
    for import in &model.imports {
        let module = modules
            .get(import.as_str())
            .copied()
            .unwrap_or(import.as_str());
        writeln!(out, "use crate::modules::{module}::entity::{import};")?;
    }

    writeln!(out)?;
    writeln!(out, "pub const TABLE: &str = {:?};", model.entity.table)?;
    writeln!(out)?;
    writeln!(out, "/// Properties returned by default.")?;
    writeln!(
        out,
        "pub const SELECT_FIELDS: &[&str] = &[{}];",
        quote_str_list(model.select_fields.iter().map(String::as_str))
    )?;
    writeln!(out)?;
    writeln!(out, "/// Relations that can be loaded with the record.")?;
    writeln!(
        out,
        "pub const RELATIONAL_FIELDS: &[&str] = &[{}];",
        quote_str_list(model.relational_fields.iter().map(String::as_str))
    )?;
    writeln!(out)?;
    writeln!(out, "/// Storage columns behind `SELECT_FIELDS`.")?;
    writeln!(
        out,
        "pub const SELECT_COLUMNS: &[&str] = &[{}];",
        quote_str_list(select_columns(model))
    )?;
    writeln!(out)?;
    writeln!(out, "pub type {class}Key = {key};")?;

    for column in &model.columns {
        if let Some(FieldKind::Enum { values, .. }) = column.field_kind() {
            render_enum(&mut out, &enum_name(model, &column.property), values)?;
        }
    }

    writeln!(out)?;
    writeln!(
        out,
        "#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]"
    )?;
    writeln!(out, "#[serde(rename_all = \"camelCase\")]")?;
    writeln!(out, "pub struct {class} {{")?;
    for key in &model.primary_keys {
        let ident = field_ident(&key.property);
        if ident.trim_start_matches("r#") != key.column {
            writeln!(out, "    #[sqlx(rename = {:?})]", key.column)?;
        }
        writeln!(
            out,
            "    pub {ident}: {},",
            column_rust_type(&key.column_type, "")
        )?;
    }
    for column in &model.columns {
        render_column(&mut out, model, column)?;
    }
    for relation in &model.relations {
        let ident = field_ident(&relation.property);
        writeln!(out, "    #[sqlx(skip)]")?;
        if relation.kind.is_collection() {
            writeln!(
                out,
                "    #[serde(default, skip_serializing_if = \"Vec::is_empty\")]"
            )?;
            writeln!(out, "    pub {ident}: Vec<{}>,", relation.target)?;
        } else {
            writeln!(
                out,
                "    #[serde(default, skip_serializing_if = \"Option::is_none\")]"
            )?;
            writeln!(out, "    pub {ident}: Option<Box<{}>>,", relation.target)?;
        }
    }
    writeln!(out, "}}")?;

    writeln!(out)?;
    writeln!(out, "impl {class} {{")?;
    writeln!(out, "    pub fn key(&self) -> {class}Key {{")?;
    let parts: Vec<String> = model
        .primary_keys
        .iter()
        .map(|key| format!("self.{}", field_ident(&key.property)))
        .collect();
    if parts.len() == 1 {
        writeln!(out, "        {}", parts[0])?;
    } else {
        writeln!(out, "        ({})", parts.join(", "))?;
    }
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;

    Ok(out)
}

/// Columns of the default selection, in `SELECT_FIELDS` order.
pub(super) fn select_columns(model: &ModuleModel) -> impl Iterator<Item = &str> {
    model.select_fields.iter().filter_map(|property| {
        model
            .primary_keys
            .iter()
            .find(|key| &key.property == property)
            .map(|key| key.column.as_str())
            .or_else(|| {
                model
                    .columns
                    .iter()
                    .find(|column| &column.property == property)
                    .map(|column| column.column.as_str())
            })
    })
}

fn render_enum(out: &mut String, name: &str, values: &[String]) -> Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]"
    )?;
    writeln!(out, "pub enum {name} {{")?;
    for value in values {
        writeln!(out, "    #[serde(rename = {value:?})]")?;
        writeln!(out, "    #[sqlx(rename = {value:?})]")?;
        writeln!(out, "    {},", variant_ident(value))?;
    }
    writeln!(out, "}}")?;
    Ok(())
}

fn render_column(out: &mut String, model: &ModuleModel, column: &ColumnModel) -> Result<()> {
    let ident = field_ident(&column.property);
    if ident.trim_start_matches("r#") != column.column {
        writeln!(out, "    #[sqlx(rename = {:?})]", column.column)?;
    }
    match column.column_type.runtime {
        RuntimeType::Json | RuntimeType::StringList if column.nullable => {
            writeln!(out, "    #[sqlx(json(nullable))]")?;
        }
        RuntimeType::Json | RuntimeType::StringList => writeln!(out, "    #[sqlx(json)]")?,
        _ => {}
    }
    if column.is_hidden() {
        writeln!(out, "    #[sqlx(default)]")?;
    }
    if matches!(column.field_kind(), Some(FieldKind::Password { .. })) {
        writeln!(out, "    #[serde(skip_serializing)]")?;
    }

    let ty = column_rust_type(&column.column_type, &enum_name(model, &column.property));
    if column.nullable {
        writeln!(out, "    pub {ident}: Option<{ty}>,")?;
    } else {
        writeln!(out, "    pub {ident}: {ty},")?;
    }
    Ok(())
}

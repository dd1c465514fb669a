use std::fmt::Write;

use modforge_core::job::PASSWORD_SPECIAL_CHARS;
use modforge_core::{FieldKind, PasswordPolicy, RuntimeType};
use modforge_schema::phone_pattern;

use super::repository::optional_on_create;
use super::{ArtifactKind, GENERATED_HEADER, column_rust_type, enum_name, field_ident, render_error};
use crate::errors::Result;
use crate::module::{ColumnModel, ModuleModel};

pub(super) fn render(model: &ModuleModel, phone_region: &str) -> Result<String> {
    let class = &model.entity.class_name;
    let inputs: Vec<&ColumnModel> = model
        .columns
        .iter()
        .filter(|column| !column.is_managed())
        .collect();

    let enums: Vec<String> = inputs
        .iter()
        .filter(|column| column.column_type.runtime == RuntimeType::Enum)
        .map(|column| enum_name(model, &column.property))
        .collect();
    let patterns: Vec<(&ColumnModel, &'static str)> = inputs
        .iter()
        .filter_map(|column| match column.field_kind() {
            Some(FieldKind::PhoneNumber { subtype, .. }) => Some(
                phone_pattern(*subtype, phone_region)
                    .map(|pattern| (*column, pattern))
                    .ok_or_else(|| {
                        render_error(
                            ArtifactKind::Dto,
                            format!("no phone number pattern for region '{phone_region}'"),
                        )
                    }),
            ),
            _ => None,
        })
        .collect::<Result<_>>()?;

    let mut out = String::from(GENERATED_HEADER);
    writeln!(out, "//! {class} request contracts.")?;
    writeln!(out)?;
    if !patterns.is_empty() {
        writeln!(out, "use std::sync::LazyLock;")?;
        writeln!(out)?;
        writeln!(out, "use regex::Regex;")?;
    }
    writeln!(out, "use serde::Deserialize;")?;
    writeln!(out, "use validator::{{Validate, ValidationError}};")?;
    if !enums.is_empty() {
        writeln!(out)?;
        writeln!(out, "use super::entity::{{{}}};", enums.join(", "))?;
    }

    for (column, pattern) in &patterns {
        writeln!(out)?;
        writeln!(
            out,
            "static {}: LazyLock<Regex> =",
            pattern_static(column)
        )?;
        writeln!(
            out,
            "    LazyLock::new(|| Regex::new(r#\"{pattern}\"#).expect(\"valid phone pattern\"));"
        )?;
    }

    writeln!(out)?;
    writeln!(out, "#[derive(Debug, Clone, Deserialize, Validate)]")?;
    writeln!(out, "#[serde(rename_all = \"camelCase\")]")?;
    writeln!(out, "pub struct Create{class}Dto {{")?;
    for key in model.primary_keys.iter().filter(|key| !key.generated) {
        writeln!(
            out,
            "    pub {}: {},",
            field_ident(&key.property),
            column_rust_type(&key.column_type, "")
        )?;
    }
    for column in &inputs {
        render_field(&mut out, model, column, optional_on_create(column))?;
    }
    writeln!(out, "}}")?;

    writeln!(out)?;
    writeln!(out, "#[derive(Debug, Clone, Default, Deserialize, Validate)]")?;
    writeln!(out, "#[serde(rename_all = \"camelCase\")]")?;
    writeln!(out, "pub struct Update{class}Dto {{")?;
    for column in &inputs {
        render_field(&mut out, model, column, true)?;
    }
    writeln!(out, "}}")?;

    for column in &inputs {
        match column.field_kind() {
            Some(FieldKind::Password { policy, .. }) => render_password_check(&mut out, column, policy)?,
            Some(FieldKind::Set { values, .. }) => render_set_check(&mut out, column, values)?,
            _ => {}
        }
    }
    Ok(out)
}

fn pattern_static(column: &ColumnModel) -> String {
    format!("{}_PATTERN", column.column.to_ascii_uppercase())
}

fn check_fn(column: &ColumnModel) -> String {
    format!("check_{}", field_ident(&column.property).trim_start_matches("r#"))
}

fn render_field(out: &mut String, model: &ModuleModel, column: &ColumnModel, optional: bool) -> Result<()> {
    match column.field_kind() {
        Some(FieldKind::String { length, .. }) => {
            writeln!(out, "    #[validate(length(max = {length}))]")?;
        }
        Some(FieldKind::Email { .. }) => writeln!(out, "    #[validate(email)]")?,
        Some(FieldKind::PhoneNumber { .. }) => {
            writeln!(out, "    #[validate(regex(path = *{}))]", pattern_static(column))?;
        }
        Some(FieldKind::Password { .. } | FieldKind::Set { .. }) => {
            writeln!(out, "    #[validate(custom(function = \"{}\"))]", check_fn(column))?;
        }
        _ => {}
    }

    let ty = column_rust_type(&column.column_type, &enum_name(model, &column.property));
    let ident = field_ident(&column.property);
    if optional {
        writeln!(out, "    pub {ident}: Option<{ty}>,")?;
    } else {
        writeln!(out, "    pub {ident}: {ty},")?;
    }
    Ok(())
}

fn render_password_check(out: &mut String, column: &ColumnModel, policy: &PasswordPolicy) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "fn {}(value: &str) -> Result<(), ValidationError> {{", check_fn(column))?;
    writeln!(out, "    let length = value.chars().count();")?;
    writeln!(
        out,
        "    let valid = ({}..={}).contains(&length)",
        policy.min_length, policy.max_length
    )?;
    writeln!(out, "        && value.chars().any(|ch| ch.is_ascii_lowercase())")?;
    write!(out, "        && value.chars().any(|ch| ch.is_ascii_uppercase())")?;
    if policy.require_digit {
        write!(out, "\n        && value.chars().any(|ch| ch.is_ascii_digit())")?;
    }
    if policy.require_special {
        write!(
            out,
            "\n        && value.chars().any(|ch| {PASSWORD_SPECIAL_CHARS:?}.contains(ch))"
        )?;
    }
    writeln!(out, ";")?;
    writeln!(out, "    if valid {{")?;
    writeln!(out, "        Ok(())")?;
    writeln!(out, "    }} else {{")?;
    writeln!(
        out,
        "        Err(ValidationError::new(\"password\").with_message({:?}.into()))",
        policy.describe()
    )?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    Ok(())
}

fn render_set_check(out: &mut String, column: &ColumnModel, values: &[String]) -> Result<()> {
    let allowed: Vec<String> = values.iter().map(|value| format!("{value:?}")).collect();
    writeln!(out)?;
    writeln!(
        out,
        "fn {}(items: &[String]) -> Result<(), ValidationError> {{",
        check_fn(column)
    )?;
    writeln!(out, "    const ALLOWED: &[&str] = &[{}];", allowed.join(", "))?;
    writeln!(
        out,
        "    if items.iter().all(|item| ALLOWED.contains(&item.as_str())) {{"
    )?;
    writeln!(out, "        Ok(())")?;
    writeln!(out, "    }} else {{")?;
    writeln!(
        out,
        "        Err(ValidationError::new(\"set\").with_message({:?}.into()))",
        format!("items must be among [{}]", values.join(", "))
    )?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    Ok(())
}
